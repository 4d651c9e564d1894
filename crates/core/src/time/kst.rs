use anyhow::Context;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Utc};

// Korea has no DST, so a fixed +09:00 offset is exact.
const KST_OFFSET_SECS: i32 = 9 * 3600;

fn in_kst(now_utc: DateTime<Utc>) -> anyhow::Result<DateTime<FixedOffset>> {
    let kst = FixedOffset::east_opt(KST_OFFSET_SECS).context("invalid KST offset")?;
    Ok(now_utc.with_timezone(&kst))
}

/// Wall-clock time in Korea, stored as the subscriber signup timestamp.
pub fn signup_time(now_utc: DateTime<Utc>) -> anyhow::Result<NaiveDateTime> {
    Ok(in_kst(now_utc)?.naive_local())
}

/// Calendar date in Korea, used in mail subjects.
pub fn briefing_date(now_utc: DateTime<Utc>) -> anyhow::Result<NaiveDate> {
    Ok(in_kst(now_utc)?.date_naive())
}
