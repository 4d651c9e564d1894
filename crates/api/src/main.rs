use axum::{
    extract::State,
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use econbrief_core::app::command::{Command, CommandError, CommandOutcome};
use econbrief_core::app::session::{SessionStore, DEFAULT_SESSION_TTL_SECS};
use econbrief_core::app::App;
use econbrief_core::domain::briefing::Briefing;
use econbrief_core::domain::quote::DataUnavailable;

const SESSION_HEADER: &str = "x-session-id";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = econbrief_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let app = App::from_settings(&settings)?;
    let sessions = SessionStore::new(settings.session_ttl_secs.unwrap_or(DEFAULT_SESSION_TTL_SECS));

    let state = AppState {
        app: Arc::new(app),
        sessions: Arc::new(sessions),
    };

    let router = Router::new()
        .route("/healthz", get(healthz))
        .route("/api/commands", post(run_command))
        .route("/api/briefing", get(get_briefing))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Clone)]
struct AppState {
    app: Arc<App>,
    sessions: Arc<SessionStore>,
}

#[derive(Debug, Serialize)]
struct CommandResponse {
    session_id: Uuid,
    #[serde(flatten)]
    outcome: CommandOutcome,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    session_id: Uuid,
    error: String,
}

fn session_id(headers: &HeaderMap) -> Option<Uuid> {
    headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| Uuid::parse_str(v.trim()).ok())
}

fn with_session_header(session_id: Uuid, mut response: Response) -> Response {
    if let Ok(value) = HeaderValue::from_str(&session_id.to_string()) {
        response.headers_mut().insert(SESSION_HEADER, value);
    }
    response
}

async fn run_command(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(command): Json<Command>,
) -> Response {
    let now = chrono::Utc::now();
    let session = state.sessions.checkout(session_id(&headers), now).await;
    // Held until the command finishes; requests on the same session run one at a time.
    let mut ctx = session.lock().await;
    let id = ctx.id;

    let result = state.app.handle(&mut ctx, command).await;
    drop(ctx);

    let response = match result {
        Ok(outcome) => Json(CommandResponse {
            session_id: id,
            outcome,
        })
        .into_response(),
        Err(err) => {
            let status = status_for(&err);
            if status.is_server_error() {
                sentry_anyhow::capture_anyhow(&err);
                tracing::error!(session = %id, error = %format!("{err:#}"), "command failed");
            } else {
                tracing::info!(session = %id, error = %err, "command rejected");
            }
            (
                status,
                Json(ErrorBody {
                    session_id: id,
                    error: user_message(&err),
                }),
            )
                .into_response()
        }
    };

    with_session_header(id, response)
}

async fn get_briefing(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<Briefing>, StatusCode> {
    let now = chrono::Utc::now();
    let session = state.sessions.checkout(session_id(&headers), now).await;
    let briefing = session.lock().await.briefing(now).cloned();
    briefing.map(Json).ok_or(StatusCode::NOT_FOUND)
}

fn status_for(err: &anyhow::Error) -> StatusCode {
    match err.downcast_ref::<CommandError>() {
        Some(CommandError::Unauthorized) => StatusCode::UNAUTHORIZED,
        Some(CommandError::BroadcastDisabled) => StatusCode::FORBIDDEN,
        Some(CommandError::NoBriefing) => StatusCode::CONFLICT,
        Some(CommandError::Signup(_)) => StatusCode::UNPROCESSABLE_ENTITY,
        Some(CommandError::Unavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
        None if err.chain().any(|e| e.is::<DataUnavailable>()) => StatusCode::BAD_GATEWAY,
        None => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn user_message(err: &anyhow::Error) -> String {
    match err.downcast_ref::<CommandError>() {
        Some(rejection) => rejection.to_string(),
        None => format!("요청을 처리하지 못했습니다: {err:#}"),
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn init_sentry(settings: &econbrief_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejections_map_to_client_errors() {
        let err: anyhow::Error = CommandError::Unauthorized.into();
        assert_eq!(status_for(&err), StatusCode::UNAUTHORIZED);

        let err: anyhow::Error = CommandError::NoBriefing.into();
        assert_eq!(status_for(&err), StatusCode::CONFLICT);
        assert_eq!(user_message(&err), CommandError::NoBriefing.to_string());
    }

    #[test]
    fn upstream_gaps_are_bad_gateway() {
        let err = anyhow::Error::new(DataUnavailable {
            symbol: "^VIX".to_string(),
            closes: 1,
            detail: "fewer than two closes",
        })
        .context("quote fetch failed for Vix");
        assert_eq!(status_for(&err), StatusCode::BAD_GATEWAY);

        assert_eq!(status_for(&anyhow::anyhow!("boom")), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn session_header_is_parsed_leniently() {
        let id = Uuid::new_v4();
        let mut headers = HeaderMap::new();
        headers.insert(SESSION_HEADER, HeaderValue::from_str(&format!(" {id} ")).unwrap());
        assert_eq!(session_id(&headers), Some(id));

        headers.insert(SESSION_HEADER, HeaderValue::from_static("not-a-uuid"));
        assert_eq!(session_id(&headers), None);
    }
}
