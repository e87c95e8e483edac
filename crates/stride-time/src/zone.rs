use chrono::{DateTime, Duration, FixedOffset, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use stride_core::{DateKey, Instant, StrideError};

/// The fixed challenge timezone. Configured once per deployment; all
/// date-key decisions in the process go through the same zone value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeZone {
    offset_secs: i32,
}

/// The UTC window of one civil day: `start_utc <= t < end_utc`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DayWindow {
    pub date_key: DateKey,
    pub start_utc: Instant,
    pub end_utc: Instant,
}

impl ChallengeZone {
    /// Parse a zone spec: `"+05:30"` / `"-08:00"` offsets, `"UTC"`, or the
    /// reference deployment's named zone `"Asia/Kolkata"` (fixed +05:30,
    /// no DST). Arbitrary IANA names are rejected; this deployment model
    /// pins a fixed offset on purpose.
    pub fn parse(spec: &str) -> Result<Self, StrideError> {
        match spec {
            "UTC" | "utc" | "Z" => return Ok(Self { offset_secs: 0 }),
            "Asia/Kolkata" | "Asia/Calcutta" => {
                return Ok(Self { offset_secs: 5 * 3600 + 30 * 60 })
            }
            _ => {}
        }

        let bytes = spec.as_bytes();
        let sign = match bytes.first() {
            Some(b'+') => 1i32,
            Some(b'-') => -1i32,
            _ => {
                return Err(StrideError::InvalidTimezone(format!(
                    "expected +HH:MM / -HH:MM / UTC / Asia/Kolkata, got {spec:?}"
                )))
            }
        };
        let rest = &spec[1..];
        let (hh, mm) = rest
            .split_once(':')
            .ok_or_else(|| StrideError::InvalidTimezone(spec.to_string()))?;
        let hours: i32 = hh
            .parse()
            .map_err(|_| StrideError::InvalidTimezone(spec.to_string()))?;
        let minutes: i32 = mm
            .parse()
            .map_err(|_| StrideError::InvalidTimezone(spec.to_string()))?;
        if hours > 14 || minutes > 59 {
            return Err(StrideError::InvalidTimezone(spec.to_string()));
        }
        Ok(Self {
            offset_secs: sign * (hours * 3600 + minutes * 60),
        })
    }

    pub fn utc() -> Self {
        Self { offset_secs: 0 }
    }

    fn offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.offset_secs).expect("offset validated at parse")
    }

    /// The civil date of `instant` in the challenge zone.
    pub fn date_key(&self, instant: Instant) -> DateKey {
        DateKey::from_naive(instant.with_timezone(&self.offset()).date_naive())
    }

    /// The UTC window of the civil day containing `instant`. Exclusive end;
    /// exactly 24 hours wide (fixed offsets have no transitions).
    pub fn day_window(&self, instant: Instant) -> DayWindow {
        self.window_for_key(&self.date_key(instant))
    }

    /// The UTC window of the civil day `key`.
    pub fn window_for_key(&self, key: &DateKey) -> DayWindow {
        let midnight = key.to_naive().and_time(NaiveTime::MIN);
        let start_local = self
            .offset()
            .from_local_datetime(&midnight)
            .single()
            .expect("fixed offsets map local midnight uniquely");
        let start_utc = start_local.with_timezone(&Utc);
        DayWindow {
            date_key: key.clone(),
            start_utc,
            end_utc: start_utc + Duration::days(1),
        }
    }

    /// Number of settlement days in `[start, end_exclusive)`, never below 1.
    pub fn total_days(&self, start: Instant, end_exclusive: Instant) -> u32 {
        let diff = crate::diff_days(&self.date_key(start), &self.date_key(end_exclusive));
        diff.max(1) as u32
    }

    /// 1-based day number of `target` within a challenge, clamped to
    /// `[1, total_days]`.
    pub fn day_number(&self, start: Instant, target: Instant, total_days: u32) -> u32 {
        let n = crate::diff_days(&self.date_key(start), &self.date_key(target)) + 1;
        n.clamp(1, total_days as i64) as u32
    }

    /// The civil day before the one containing `now` — the day the hourly
    /// settlement cron settles (the current day is still accepting
    /// submissions until its window closes).
    pub fn yesterday(&self, now: Instant) -> DateKey {
        crate::add_days(&self.date_key(now), -1)
    }

    /// Accept either an ISO-8601 instant or a bare date-key; the latter is
    /// anchored to 00:00 in the challenge zone.
    pub fn parse_date_input(&self, s: &str) -> Result<Instant, StrideError> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Ok(dt.with_timezone(&Utc));
        }
        let key = DateKey::parse(s)
            .map_err(|_| StrideError::InvalidDateInput(s.to_string()))?;
        Ok(self.window_for_key(&key).start_utc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn kolkata() -> ChallengeZone {
        ChallengeZone::parse("Asia/Kolkata").unwrap()
    }

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> Instant {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn parse_accepts_offsets_and_aliases() {
        assert_eq!(ChallengeZone::parse("+05:30").unwrap(), kolkata());
        assert_eq!(ChallengeZone::parse("UTC").unwrap(), ChallengeZone::utc());
        assert!(ChallengeZone::parse("-08:00").is_ok());
        assert!(ChallengeZone::parse("Mars/Olympus").is_err());
        assert!(ChallengeZone::parse("+25:00").is_err());
    }

    #[test]
    fn date_key_respects_offset() {
        let zone = kolkata();
        // 20:00 UTC = 01:30 next day in +05:30.
        let t = utc(2025, 3, 10, 20, 0, 0);
        assert_eq!(zone.date_key(t), DateKey::parse("2025-03-11").unwrap());
        // 18:00 UTC = 23:30 same day.
        let t = utc(2025, 3, 10, 18, 0, 0);
        assert_eq!(zone.date_key(t), DateKey::parse("2025-03-10").unwrap());
    }

    #[test]
    fn window_start_maps_back_to_same_key() {
        // dateKey(dayWindow(t).start_utc) == dateKey(t) for assorted instants.
        let zone = kolkata();
        for t in [
            utc(2025, 1, 1, 0, 0, 0),
            utc(2025, 3, 10, 18, 29, 59),
            utc(2025, 3, 10, 18, 30, 0),
            utc(2025, 12, 31, 23, 59, 59),
        ] {
            let w = zone.day_window(t);
            assert_eq!(zone.date_key(w.start_utc), w.date_key);
            assert_eq!(zone.date_key(t), w.date_key);
            assert!(w.start_utc <= t && t < w.end_utc);
        }
    }

    #[test]
    fn window_is_exactly_24_hours() {
        let zone = kolkata();
        let w = zone.day_window(utc(2025, 6, 15, 12, 0, 0));
        assert_eq!(w.end_utc - w.start_utc, Duration::days(1));
    }

    #[test]
    fn same_key_instants_share_one_window() {
        let zone = kolkata();
        let a = zone.day_window(utc(2025, 6, 14, 19, 0, 0)); // 00:30 on the 15th
        let b = zone.day_window(utc(2025, 6, 15, 18, 0, 0)); // 23:30 on the 15th
        assert_eq!(a, b);
    }

    #[test]
    fn submission_at_window_edge_counts_for_the_right_day() {
        let zone = kolkata();
        let w = zone.window_for_key(&DateKey::parse("2025-06-15").unwrap());
        // One millisecond before the exclusive end still belongs to the day;
        // the end itself belongs to the next.
        let just_inside = w.end_utc - Duration::milliseconds(1);
        assert_eq!(zone.date_key(just_inside), w.date_key);
        assert_eq!(
            zone.date_key(w.end_utc),
            DateKey::parse("2025-06-16").unwrap()
        );
    }

    #[test]
    fn total_days_floors_at_one() {
        let zone = kolkata();
        let start = zone.parse_date_input("2025-06-15").unwrap();
        // Same-day start and end still yields a one-day challenge.
        assert_eq!(zone.total_days(start, start), 1);
        let end = zone.parse_date_input("2025-06-25").unwrap();
        assert_eq!(zone.total_days(start, end), 10);
    }

    #[test]
    fn day_number_clamps_to_range() {
        let zone = kolkata();
        let start = zone.parse_date_input("2025-06-15").unwrap();
        let before = start - Duration::days(3);
        let after = start + Duration::days(30);
        assert_eq!(zone.day_number(start, before, 10), 1);
        assert_eq!(zone.day_number(start, start, 10), 1);
        assert_eq!(zone.day_number(start, start + Duration::days(4), 10), 5);
        assert_eq!(zone.day_number(start, after, 10), 10);
    }

    #[test]
    fn parse_date_input_accepts_both_forms() {
        let zone = kolkata();
        let from_key = zone.parse_date_input("2025-06-15").unwrap();
        // Bare keys anchor to local midnight: 00:00+05:30 = 18:30 UTC the day before.
        assert_eq!(from_key, utc(2025, 6, 14, 18, 30, 0));
        let from_iso = zone.parse_date_input("2025-06-15T10:00:00Z").unwrap();
        assert_eq!(from_iso, utc(2025, 6, 15, 10, 0, 0));
        assert!(zone.parse_date_input("tomorrow").is_err());
    }

    #[test]
    fn yesterday_crosses_boundaries() {
        let zone = ChallengeZone::utc();
        assert_eq!(
            zone.yesterday(utc(2025, 1, 1, 0, 0, 0)),
            DateKey::parse("2024-12-31").unwrap()
        );
    }
}
