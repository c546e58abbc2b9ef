//! Daily cycle resolution.
//!
//! Picks roll over at 09:00 local business time. The resolved boundary
//! instant is the equality key for a cycle: it is computed here once and
//! passed around as an opaque value, never recomputed by callers.

use chrono::{DateTime, Duration, LocalResult, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;

/// Local wall-clock hour at which a new daily cycle starts.
pub const CYCLE_BOUNDARY_HOUR: u32 = 9;

/// Resolve the cycle date for `now`.
///
/// Before 09:00 local time the current cycle is the one that started at
/// yesterday's boundary; from 09:00 onward it is today's boundary.
pub fn resolve(now: DateTime<Utc>, tz: Tz) -> DateTime<Utc> {
    let local = now.with_timezone(&tz);
    let today = local.date_naive();
    let boundary = boundary_on(today, tz);

    if now < boundary {
        boundary_on(today - Duration::days(1), tz)
    } else {
        boundary
    }
}

/// The boundary that precedes `cycle`, i.e. the previous day's 09:00 local.
pub fn previous(cycle: DateTime<Utc>, tz: Tz) -> DateTime<Utc> {
    let local_day = cycle.with_timezone(&tz).date_naive();
    boundary_on(local_day - Duration::days(1), tz)
}

/// 09:00 local on `day`, as a UTC instant.
fn boundary_on(day: NaiveDate, tz: Tz) -> DateTime<Utc> {
    let wall = day
        .and_hms_opt(CYCLE_BOUNDARY_HOUR, 0, 0)
        .expect("09:00:00 is a valid wall-clock time");

    match tz.from_local_datetime(&wall) {
        LocalResult::Single(dt) => dt.with_timezone(&Utc),
        // Fall-back transition: two valid 09:00s, take the first.
        LocalResult::Ambiguous(first, _) => first.with_timezone(&Utc),
        // Spring-forward gap (cannot hit a 09:00 boundary in any real zone,
        // but stay total): interpret the wall time as if it were UTC-offset
        // shifted past the gap.
        LocalResult::None => tz
            .from_local_datetime(&(wall + Duration::hours(1)))
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|| Utc.from_utc_datetime(&wall)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::America::New_York;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn before_boundary_resolves_to_previous_day() {
        // 2025-01-15 08:59:59 EST == 13:59:59 UTC (winter, UTC-5)
        let now = utc(2025, 1, 15, 13, 59, 59);
        let cycle = resolve(now, New_York);
        assert_eq!(cycle, utc(2025, 1, 14, 14, 0, 0));
    }

    #[test]
    fn at_boundary_resolves_to_current_day() {
        // Exactly 09:00:00 EST
        let now = utc(2025, 1, 15, 14, 0, 0);
        let cycle = resolve(now, New_York);
        assert_eq!(cycle, utc(2025, 1, 15, 14, 0, 0));
    }

    #[test]
    fn after_boundary_resolves_to_current_day() {
        // 2025-07-15 10:30 EDT == 14:30 UTC (summer, UTC-4)
        let now = utc(2025, 7, 15, 14, 30, 0);
        let cycle = resolve(now, New_York);
        assert_eq!(cycle, utc(2025, 7, 15, 13, 0, 0));
    }

    #[test]
    fn dst_offset_respected_before_boundary() {
        // 2025-07-15 08:59 EDT == 12:59 UTC
        let now = utc(2025, 7, 15, 12, 59, 0);
        let cycle = resolve(now, New_York);
        assert_eq!(cycle, utc(2025, 7, 14, 13, 0, 0));
    }

    #[test]
    fn same_cycle_instants_share_one_key() {
        // 10:00 EST and 08:00 EST next morning belong to the same cycle.
        let evening = utc(2025, 1, 15, 15, 0, 0);
        let next_morning = utc(2025, 1, 16, 13, 0, 0);
        assert_eq!(resolve(evening, New_York), resolve(next_morning, New_York));
    }

    #[test]
    fn previous_steps_back_exactly_one_boundary() {
        let cycle = resolve(utc(2025, 1, 15, 20, 0, 0), New_York);
        let prev = previous(cycle, New_York);
        assert_eq!(prev, utc(2025, 1, 14, 14, 0, 0));
    }

    #[test]
    fn previous_across_spring_forward_is_23_hours() {
        // US DST began 2025-03-09 02:00. The 2025-03-09 boundary (EDT) is
        // only 23 hours after the 2025-03-08 boundary (EST).
        let cycle = resolve(utc(2025, 3, 9, 15, 0, 0), New_York);
        assert_eq!(cycle, utc(2025, 3, 9, 13, 0, 0));
        assert_eq!(previous(cycle, New_York), utc(2025, 3, 8, 14, 0, 0));
    }
}
