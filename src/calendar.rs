use chrono::{Datelike, NaiveDate};

use crate::error::AutofillError;

/// A calendar month, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct MonthYear {
    year: i32,
    month: u32,
}

impl MonthYear {
    pub fn new(month: u32, year: i32) -> Result<Self, AutofillError> {
        if !(1..=12).contains(&month) {
            return Err(AutofillError::Validation(format!(
                "Invalid month value {month}; expected 1-12"
            )));
        }
        if NaiveDate::from_ymd_opt(year, month, 1).is_none() {
            return Err(AutofillError::Validation(format!("Invalid year value {year}")));
        }
        Ok(Self { year, month })
    }

    pub fn containing(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(self) -> i32 {
        self.year
    }

    pub fn month(self) -> u32 {
        self.month
    }

    /// Month number as the expected-hours endpoint wants it (January = 0).
    pub fn zero_based_month(self) -> u32 {
        self.month - 1
    }

    pub fn day(self, day: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, day)
    }

    pub fn days_in_month(self) -> u32 {
        (28..=31)
            .rev()
            .find(|day| self.day(*day).is_some())
            .unwrap_or(28)
    }

    /// `[first 00:00:00.000Z, last 23:59:59.999Z]` of the month.
    pub fn range_bounds(self) -> (String, String) {
        (
            format!("{:04}-{:02}-01T00:00:00.000Z", self.year, self.month),
            format!(
                "{:04}-{:02}-{:02}T23:59:59.999Z",
                self.year,
                self.month,
                self.days_in_month()
            ),
        )
    }
}

impl std::fmt::Display for MonthYear {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// Day-start timestamp in the exact form the attendance API stores.
pub fn day_timestamp(date: NaiveDate) -> String {
    format!("{}T00:00:00.000Z", date.format("%Y-%m-%d"))
}

/// Accept `YYYY-MM-DD` or a full day-start timestamp and return the latter.
pub fn normalize_day(input: &str) -> Result<String, AutofillError> {
    let day = input.trim();
    let date_part = day.split_once('T').map_or(day, |(date, _)| date);
    let date = NaiveDate::parse_from_str(date_part, "%Y-%m-%d").map_err(|_| {
        AutofillError::Validation(format!("invalid date '{input}', expected YYYY-MM-DD"))
    })?;
    Ok(day_timestamp(date))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn rejects_out_of_range_months() {
        assert!(MonthYear::new(0, 2026).is_err());
        assert!(MonthYear::new(13, 2026).is_err());
        assert!(MonthYear::new(12, 2026).is_ok());
    }

    #[test]
    fn range_covers_whole_month_including_leap_day() {
        let feb = MonthYear::new(2, 2024).unwrap();
        assert_eq!(
            feb.range_bounds(),
            (
                "2024-02-01T00:00:00.000Z".to_string(),
                "2024-02-29T23:59:59.999Z".to_string()
            )
        );
        assert_eq!(MonthYear::new(2, 2026).unwrap().days_in_month(), 28);
        assert_eq!(MonthYear::new(12, 2026).unwrap().days_in_month(), 31);
    }

    #[test]
    fn zero_based_month_for_the_api() {
        assert_eq!(MonthYear::new(1, 2026).unwrap().zero_based_month(), 0);
        assert_eq!(MonthYear::new(10, 2026).unwrap().zero_based_month(), 9);
    }

    #[test]
    fn day_timestamps_are_zero_padded() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 5).unwrap();
        assert_eq!(day_timestamp(date), "2026-03-05T00:00:00.000Z");
    }

    #[test]
    fn normalizes_plain_and_full_dates() {
        assert_eq!(normalize_day("2026-10-01").unwrap(), "2026-10-01T00:00:00.000Z");
        assert_eq!(
            normalize_day("2026-10-01T00:00:00.000Z").unwrap(),
            "2026-10-01T00:00:00.000Z"
        );
        assert!(normalize_day("01/10/2026").is_err());
    }
}
