use crate::domain::briefing::Briefing;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

pub const DEFAULT_SESSION_TTL_SECS: u64 = 24 * 3600;

/// Per-visitor state, passed explicitly into every command.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub id: Uuid,
    pub logged_in_user: Option<String>,
    briefing: Option<(Briefing, DateTime<Utc>)>,
    expires_at: DateTime<Utc>,
}

impl SessionContext {
    pub fn new(now: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            id: Uuid::new_v4(),
            logged_in_user: None,
            briefing: None,
            expires_at: now + ttl,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// The last briefing shown in this session, if it has not outlived `expires_at`.
    pub fn briefing(&self, now: DateTime<Utc>) -> Option<&Briefing> {
        match &self.briefing {
            Some((b, expires_at)) if now < *expires_at => Some(b),
            _ => None,
        }
    }

    pub fn set_briefing(&mut self, briefing: Briefing, expires_at: DateTime<Utc>) {
        self.briefing = Some((briefing, expires_at));
    }

    fn touch(&mut self, now: DateTime<Utc>, ttl: Duration) {
        self.expires_at = now + ttl;
    }
}

/// A session shared between overlapping requests that carry the same id. Holding its lock
/// for a whole command serializes them, so no request overwrites another's changes.
pub type SharedSession = Arc<Mutex<SessionContext>>;

/// In-memory session registry.
#[derive(Debug)]
pub struct SessionStore {
    ttl: Duration,
    sessions: Mutex<HashMap<Uuid, SharedSession>>,
}

impl SessionStore {
    pub fn new(ttl_secs: u64) -> Self {
        Self {
            ttl: super::ttl_duration(ttl_secs),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Existing live session for `id`, or a fresh registered one with a new id.
    pub async fn checkout(&self, id: Option<Uuid>, now: DateTime<Utc>) -> SharedSession {
        let mut sessions = self.sessions.lock().await;
        // A session locked by a running command is in use, hence live.
        sessions.retain(|_, shared| match shared.try_lock() {
            Ok(ctx) => !ctx.is_expired(now),
            Err(_) => true,
        });

        if let Some(shared) = id.and_then(|id| sessions.get(&id)) {
            if let Ok(mut ctx) = shared.try_lock() {
                ctx.touch(now, self.ttl);
            }
            return Arc::clone(shared);
        }

        let ctx = SessionContext::new(now, self.ttl);
        let id = ctx.id;
        let shared = Arc::new(Mutex::new(ctx));
        sessions.insert(id, Arc::clone(&shared));
        shared
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }
}
