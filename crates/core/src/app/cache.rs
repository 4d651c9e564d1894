use crate::domain::briefing::Briefing;
use chrono::{DateTime, Duration, Utc};
use std::future::Future;

pub const DEFAULT_BRIEFING_TTL_SECS: u64 = 3600;

#[derive(Debug, Clone)]
struct Slot {
    briefing: Briefing,
    expires_at: DateTime<Utc>,
}

/// One global slot for the regular briefing, shared by every session.
///
/// The slot is not keyed by anything; a refresh overwrites it.
#[derive(Debug)]
pub struct BriefingCache {
    ttl: Duration,
    slot: tokio::sync::Mutex<Option<Slot>>,
}

impl BriefingCache {
    pub fn new(ttl_secs: u64) -> Self {
        Self {
            ttl: super::ttl_duration(ttl_secs),
            slot: tokio::sync::Mutex::new(None),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns the cached briefing and the slot's expiry if still fresh at `now`, otherwise
    /// runs `refresh` and stores its result. A failed refresh leaves the previous slot untouched.
    pub async fn get_or_refresh<F, Fut>(
        &self,
        now: DateTime<Utc>,
        refresh: F,
    ) -> anyhow::Result<(Briefing, DateTime<Utc>)>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<Briefing>>,
    {
        let mut guard = self.slot.lock().await;
        if let Some(slot) = guard.as_ref() {
            if now < slot.expires_at {
                tracing::debug!(expires_at = %slot.expires_at, "briefing cache hit");
                return Ok((slot.briefing.clone(), slot.expires_at));
            }
        }

        let briefing = refresh().await?;
        let expires_at = now + self.ttl;
        *guard = Some(Slot {
            briefing: briefing.clone(),
            expires_at,
        });
        Ok((briefing, expires_at))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::domain::briefing::Headlines;
    use chrono::TimeZone;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    pub(crate) fn briefing(narrative: &str) -> Briefing {
        Briefing {
            quotes: BTreeMap::new(),
            headlines: Headlines::NoNews,
            narrative: narrative.to_string(),
            issue: None,
            generated_at: Utc.with_ymd_and_hms(2026, 1, 5, 0, 0, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn serves_cached_value_until_ttl() {
        let cache = BriefingCache::new(3600);
        let calls = AtomicUsize::new(0);
        let t0 = Utc.with_ymd_and_hms(2026, 1, 5, 0, 0, 0).unwrap();

        let fetch = |text: &'static str| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { Ok::<_, anyhow::Error>(briefing(text)) }
        };

        let (a, a_expires) = cache.get_or_refresh(t0, || fetch("first")).await.unwrap();
        let (b, b_expires) = cache
            .get_or_refresh(t0 + Duration::minutes(59), || fetch("second"))
            .await
            .unwrap();
        assert_eq!(a.narrative, "first");
        assert_eq!(b.narrative, "first");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        // A hit reports when the slot itself expires, not `now + ttl`.
        assert_eq!(a_expires, t0 + Duration::hours(1));
        assert_eq!(b_expires, a_expires);

        let (c, c_expires) = cache
            .get_or_refresh(t0 + Duration::hours(1), || fetch("third"))
            .await
            .unwrap();
        assert_eq!(c.narrative, "third");
        assert_eq!(c_expires, t0 + Duration::hours(2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failed_refresh_is_not_cached() {
        let cache = BriefingCache::new(60);
        let t0 = Utc.with_ymd_and_hms(2026, 1, 5, 0, 0, 0).unwrap();

        let res = cache
            .get_or_refresh(t0, || async { Err::<Briefing, _>(anyhow::anyhow!("model down")) })
            .await;
        assert!(res.is_err());

        let (ok, _) = cache
            .get_or_refresh(t0, || async { Ok::<_, anyhow::Error>(briefing("recovered")) })
            .await
            .unwrap();
        assert_eq!(ok.narrative, "recovered");
    }
}
