use anyhow::{Context, Result};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Duration, Utc};
use openssl::hash::MessageDigest;
use openssl::pkey::{PKey, Private};
use openssl::sign::Signer;
use serde::{Deserialize, Serialize};

pub const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
// Refresh a little before Google's stated expiry.
const EXPIRY_MARGIN_SECS: i64 = 60;

/// Subset of the service-account key JSON issued by Google Cloud.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub token_uri: Option<String>,
}

impl ServiceAccountKey {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("GCP_CREDENTIALS is not a valid service-account JSON")
    }

    fn token_uri(&self) -> &str {
        self.token_uri.as_deref().unwrap_or(DEFAULT_TOKEN_URI)
    }
}

#[derive(Debug, Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

/// RS256-signed assertion for the OAuth JWT bearer grant.
pub fn signed_assertion(key: &ServiceAccountKey, scope: &str, now: DateTime<Utc>) -> Result<String> {
    let header = serde_json::json!({"alg": "RS256", "typ": "JWT"});
    let claims = Claims {
        iss: &key.client_email,
        scope,
        aud: key.token_uri(),
        iat: now.timestamp(),
        exp: now.timestamp() + ASSERTION_LIFETIME_SECS,
    };

    let signing_input = format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header)?),
        URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims)?)
    );

    let pkey: PKey<Private> = PKey::private_key_from_pem(key.private_key.as_bytes())
        .context("service-account private_key is not a valid PEM key")?;
    let mut signer = Signer::new(MessageDigest::sha256(), &pkey)?;
    signer.update(signing_input.as_bytes())?;
    let signature = signer.sign_to_vec().context("failed to sign JWT assertion")?;

    Ok(format!("{signing_input}.{}", URL_SAFE_NO_PAD.encode(signature)))
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

/// Exchanges signed assertions for access tokens, caching one token per process.
#[derive(Debug)]
pub struct TokenSource {
    http: reqwest::Client,
    key: ServiceAccountKey,
    scope: String,
    cache: tokio::sync::Mutex<Option<CachedToken>>,
}

impl TokenSource {
    pub fn new(http: reqwest::Client, key: ServiceAccountKey, scope: &str) -> Self {
        Self {
            http,
            key,
            scope: scope.to_string(),
            cache: tokio::sync::Mutex::new(None),
        }
    }

    pub async fn access_token(&self) -> Result<String> {
        let mut guard = self.cache.lock().await;
        if let Some(cached) = guard.as_ref() {
            if cached.expires_at > Utc::now() {
                return Ok(cached.access_token.clone());
            }
        }

        let now = Utc::now();
        let assertion = signed_assertion(&self.key, &self.scope, now)?;
        let res = self
            .http
            .post(self.key.token_uri())
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .context("OAuth token request failed")?;

        let status = res.status();
        let text = res.text().await.context("failed to read OAuth token response")?;
        if !status.is_success() {
            anyhow::bail!("OAuth token HTTP {status}: {text}");
        }

        let token: TokenResponse = serde_json::from_str(&text)
            .with_context(|| format!("unexpected OAuth token response: {text}"))?;
        let lifetime = token.expires_in.unwrap_or(ASSERTION_LIFETIME_SECS) - EXPIRY_MARGIN_SECS;

        *guard = Some(CachedToken {
            access_token: token.access_token.clone(),
            expires_at: now + Duration::seconds(lifetime.max(0)),
        });
        Ok(token.access_token)
    }
}
