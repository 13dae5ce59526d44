//! `START_to_END` date ranges used by the analytics endpoints.

use chrono::{DateTime, Days, Duration, NaiveDate, NaiveTime, Utc};

use crate::error::CoreError;

/// Half-open UTC interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

enum Boundary {
    Start,
    End,
}

impl DateRange {
    /// Parse `START_to_END`.
    ///
    /// Each side is either a calendar date (`YYYY-MM-DD`) or an RFC 3339
    /// timestamp. A calendar-date END covers that whole day.
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        let (start_raw, end_raw) = raw.trim().split_once("_to_").ok_or_else(|| {
            CoreError::InvalidRange("range must look like START_to_END".to_string())
        })?;
        let start = parse_boundary(start_raw, Boundary::Start)?;
        let end = parse_boundary(end_raw, Boundary::End)?;
        if end < start {
            return Err(CoreError::InvalidRange(
                "range end must be on or after its start".to_string(),
            ));
        }
        Ok(Self { start, end })
    }

    /// The `days` calendar days ending with `today`, inclusive.
    pub fn last_days(today: NaiveDate, days: u32) -> Result<Self, CoreError> {
        let back = u64::from(days.max(1) - 1);
        let start = today.checked_sub_days(Days::new(back)).ok_or_else(|| {
            CoreError::InvalidRange(format!("{days} days before {today} is out of range"))
        })?;
        Ok(Self {
            start: midnight(start),
            end: midnight(day_after(today)?),
        })
    }

    /// Number of calendar days touched by the range (at least 1).
    pub fn num_days(&self) -> i64 {
        ((self.end - self.start).num_seconds() + 86_399) / 86_400
    }

    /// Compact label used in export filenames, e.g. `2024-01-01_2024-01-31`.
    pub fn label(&self) -> String {
        let last = self.end - Duration::seconds(1);
        format!(
            "{}_{}",
            self.start.format("%Y-%m-%d"),
            last.max(self.start).format("%Y-%m-%d")
        )
    }
}

fn midnight(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

fn day_after(date: NaiveDate) -> Result<NaiveDate, CoreError> {
    date.succ_opt()
        .ok_or_else(|| CoreError::InvalidRange(format!("'{date}' is out of range")))
}

fn parse_boundary(raw: &str, boundary: Boundary) -> Result<DateTime<Utc>, CoreError> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(match boundary {
            Boundary::Start => midnight(date),
            Boundary::End => midnight(day_after(date)?),
        });
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| CoreError::InvalidRange(format!("'{raw}' is not an ISO date or timestamp")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parses_calendar_dates_with_inclusive_end() {
        let range = DateRange::parse("2024-01-01_to_2024-01-31").unwrap();
        assert_eq!(range.start, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(range.end, Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap());
        assert_eq!(range.num_days(), 31);
        assert_eq!(range.label(), "2024-01-01_2024-01-31");
    }

    #[test]
    fn parses_rfc3339_boundaries() {
        let range =
            DateRange::parse("2024-01-01T06:00:00Z_to_2024-01-02T08:30:00+02:00").unwrap();
        assert_eq!(range.start, Utc.with_ymd_and_hms(2024, 1, 1, 6, 0, 0).unwrap());
        assert_eq!(range.end, Utc.with_ymd_and_hms(2024, 1, 2, 6, 30, 0).unwrap());
    }

    #[test]
    fn rejects_missing_separator() {
        assert!(DateRange::parse("2024-01-01").is_err());
        assert!(DateRange::parse("2024-01-01..2024-01-02").is_err());
    }

    #[test]
    fn rejects_garbage_and_reversed_ranges() {
        assert!(DateRange::parse("yesterday_to_today").is_err());
        assert!(DateRange::parse("2024-02-01_to_2024-01-01").is_err());
    }

    #[test]
    fn same_day_range_covers_the_whole_day() {
        let range = DateRange::parse("2024-03-10_to_2024-03-10").unwrap();
        assert_eq!(range.num_days(), 1);
    }

    #[test]
    fn last_days_ends_tomorrow_midnight() {
        let today = NaiveDate::from_ymd_opt(2024, 5, 10).unwrap();
        let range = DateRange::last_days(today, 7).unwrap();
        assert_eq!(range.start, Utc.with_ymd_and_hms(2024, 5, 4, 0, 0, 0).unwrap());
        assert_eq!(range.end, Utc.with_ymd_and_hms(2024, 5, 11, 0, 0, 0).unwrap());
        assert_eq!(range.num_days(), 7);
    }

    #[test]
    fn out_of_range_dates_are_errors() {
        assert!(matches!(
            DateRange::parse("2024-01-01_to_+262142-12-31"),
            Err(CoreError::InvalidRange(_))
        ));
        assert!(DateRange::parse("2024-01-01_to_262143-01-01").is_err());
    }

    #[test]
    fn last_days_rejects_windows_past_the_calendar() {
        let today = NaiveDate::from_ymd_opt(2024, 5, 10).unwrap();
        assert!(DateRange::last_days(today, u32::MAX).is_err());
        assert!(DateRange::last_days(NaiveDate::MAX, 1).is_err());
        assert_eq!(DateRange::last_days(today, 0).unwrap().num_days(), 1);
    }
}
