//! Deadline arithmetic
//!
//! Converts a wall-clock time of day into the absolute instant the alarm
//! should go off, and computes snooze deadlines.

use chrono::{DateTime, Duration, LocalResult, NaiveDateTime, NaiveTime, TimeZone};

use crate::error::{AlarmError, Result};

/// Longest DST gap we walk across, in minutes
const MAX_GAP_MINUTES: i64 = 24 * 60;

/// Next occurrence of `hour:minute:00` at or after `now`
///
/// If that time of day has already passed today the deadline is tomorrow. A
/// time equal to `now` is today, so it fires immediately.
pub fn next_occurrence<Tz: TimeZone>(now: &DateTime<Tz>, hour: u32, minute: u32) -> Result<DateTime<Tz>> {
    let time = NaiveTime::from_hms_opt(hour, minute, 0)
        .ok_or(AlarmError::InvalidDeadline { hour, minute })?;

    let tz = now.timezone();
    let today = now.date_naive().and_time(time);
    let candidate = resolve_local(&tz, today);

    if candidate >= *now {
        return Ok(candidate);
    }

    Ok(resolve_local(&tz, today + Duration::days(1)))
}

/// Snooze deadline: exactly `minutes` after `now`
pub fn snooze_deadline<Tz: TimeZone>(now: &DateTime<Tz>, minutes: u32) -> DateTime<Tz> {
    now.clone() + Duration::minutes(i64::from(minutes))
}

/// Map a local wall-clock time to an instant
///
/// Ambiguous times (clocks going back) take the earlier instant; times that
/// fall in a gap (clocks going forward) take the first valid minute after it.
fn resolve_local<Tz: TimeZone>(tz: &Tz, naive: NaiveDateTime) -> DateTime<Tz> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => dt,
        LocalResult::Ambiguous(earliest, _) => earliest,
        LocalResult::None => {
            for offset in 1..=MAX_GAP_MINUTES {
                let probe = naive + Duration::minutes(offset);
                if let Some(dt) = tz.from_local_datetime(&probe).earliest() {
                    return dt;
                }
            }
            tz.from_utc_datetime(&naive)
        }
    }
}
