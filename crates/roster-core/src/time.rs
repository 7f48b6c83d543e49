//! Calendar-day boundaries in an order's local timezone.
//!
//! Orders carry an IANA timezone. "Start of day" and "end of day" are computed
//! in that zone and converted back to UTC instants for storage.

use chrono::{DateTime, Duration, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

/// Midnight of the local calendar day containing `at`.
pub fn start_of_day(at: DateTime<Utc>, tz: Tz) -> DateTime<Utc> {
  let date = at.with_timezone(&tz).date_naive();
  resolve_local(date.and_time(NaiveTime::MIN), tz)
}

/// 23:59:59 of the local calendar day containing `at`.
pub fn end_of_day(at: DateTime<Utc>, tz: Tz) -> DateTime<Utc> {
  let date = at.with_timezone(&tz).date_naive();
  let last_second =
    date.and_time(NaiveTime::MIN) + Duration::days(1) - Duration::seconds(1);
  resolve_local(last_second, tz)
}

/// Window bound used for cancellations that leave no successor entry.
pub fn yesterday(now: DateTime<Utc>) -> DateTime<Utc> { now - Duration::days(1) }

fn resolve_local(naive: NaiveDateTime, tz: Tz) -> DateTime<Utc> {
  // A local time inside a DST gap does not exist; step past the gap.
  tz.from_local_datetime(&naive)
    .earliest()
    .or_else(|| tz.from_local_datetime(&(naive + Duration::hours(1))).earliest())
    .map(|dt| dt.with_timezone(&Utc))
    .unwrap_or_else(|| Utc.from_utc_datetime(&naive))
}
