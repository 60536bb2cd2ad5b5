use std::fmt;

use chrono::{DateTime, Duration, Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::clock::Clock;

/// Canonical identifier of one calendar day in the user's local frame of
/// reference. Two instants on the same local day derive the same key, and
/// keys order chronologically. This is the standard way of naming a day in
/// daytally: the `YYYY-MM-DD` rendering is also the last segment of the
/// stored document path.
#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct DayKey(NaiveDate);

impl DayKey {
    /// Derives the key for the local calendar day containing `instant`.
    pub fn from_instant(instant: DateTime<Utc>) -> Self {
        Self(instant.with_timezone(&Local).date_naive())
    }

    pub fn today(clock: &dyn Clock) -> Self {
        Self::from_instant(clock.time())
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self(date)
    }

    /// Shifts back by exactly one calendar day.
    pub fn previous(self) -> Self {
        Self(self.0 - Duration::days(1))
    }

    /// Shifts forward by exactly one calendar day.
    pub fn next(self) -> Self {
        Self(self.0 + Duration::days(1))
    }
}

impl fmt::Display for DayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

/// Renders minutes the way the tracker displays durations, e.g. `490`
/// becomes `"8h 10m"`.
pub fn format_minutes(minutes: u32) -> String {
    format!("{}h {}m", minutes / 60, minutes % 60)
}

#[cfg(test)]
mod tests {
    use chrono::{Local, TimeZone, Utc};

    use super::{format_minutes, DayKey};

    #[test]
    fn same_local_day_derives_same_key() {
        let morning = Local.with_ymd_and_hms(2024, 3, 1, 0, 0, 1).unwrap();
        let evening = Local.with_ymd_and_hms(2024, 3, 1, 23, 59, 59).unwrap();

        assert_eq!(
            DayKey::from_instant(morning.with_timezone(&Utc)),
            DayKey::from_instant(evening.with_timezone(&Utc)),
        );
    }

    #[test]
    fn midnight_splits_days_into_ordered_keys() {
        let before = Local.with_ymd_and_hms(2024, 3, 1, 23, 59, 59).unwrap();
        let after = Local.with_ymd_and_hms(2024, 3, 2, 0, 0, 0).unwrap();

        let first = DayKey::from_instant(before.with_timezone(&Utc));
        let second = DayKey::from_instant(after.with_timezone(&Utc));

        assert_ne!(first, second);
        assert!(first < second);
        assert_eq!(first.next(), second);
    }

    #[test]
    fn renders_canonically() {
        let instant = Local.with_ymd_and_hms(2024, 12, 5, 9, 30, 0).unwrap();
        let key = DayKey::from_instant(instant.with_timezone(&Utc));
        assert_eq!(key.to_string(), "2024-12-05");
    }

    #[test]
    fn navigation_shifts_by_one_day() {
        let instant = Local.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let key = DayKey::from_instant(instant.with_timezone(&Utc));

        assert_eq!(key.previous().to_string(), "2024-02-29");
        assert_eq!(key.next().to_string(), "2024-03-02");
        assert_eq!(key.previous().next(), key);
    }

    #[test]
    fn minutes_format_matches_display_convention() {
        assert_eq!(format_minutes(0), "0h 0m");
        assert_eq!(format_minutes(480), "8h 0m");
        assert_eq!(format_minutes(490), "8h 10m");
        assert_eq!(format_minutes(1440), "24h 0m");
    }
}
