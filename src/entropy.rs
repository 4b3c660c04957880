//! Parsing of `HH:MM` intervals and the random offsets added to them.

use std::fmt;
use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::AutofillError;

/// A wall-clock time as entered by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TimeOfDay {
    hours: u32,
    minutes: u32,
}

impl TimeOfDay {
    pub fn new(hours: u32, minutes: u32) -> Result<Self, AutofillError> {
        if hours > 23 || minutes > 59 {
            return Err(AutofillError::Validation(format!(
                "time {hours}:{minutes:02} is out of range"
            )));
        }
        Ok(Self { hours, minutes })
    }

    pub fn minutes_of_day(self) -> i64 {
        i64::from(self.hours * 60 + self.minutes)
    }
}

impl FromStr for TimeOfDay {
    type Err = AutofillError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || AutofillError::Validation(format!("invalid time '{s}', expected HH:MM"));
        let (hours, minutes) = s.trim().split_once(':').ok_or_else(invalid)?;
        let digits = |part: &str, max_len: usize| {
            if part.is_empty() || part.len() > max_len || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid());
            }
            part.parse::<u32>().map_err(|_| invalid())
        };
        let hours = digits(hours, 2)?;
        if minutes.len() != 2 {
            return Err(invalid());
        }
        let minutes = digits(minutes, 2)?;
        TimeOfDay::new(hours, minutes)
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hours, self.minutes)
    }
}

/// One fill template entry, e.g. `09:00-14:00`.
///
/// `end > start` is not checked; the pair is passed through as configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeInterval {
    pub start: TimeOfDay,
    pub end: TimeOfDay,
}

impl TimeInterval {
    pub fn new(start: &str, end: &str) -> Result<Self, AutofillError> {
        Ok(Self {
            start: start.parse()?,
            end: end.parse()?,
        })
    }
}

impl FromStr for TimeInterval {
    type Err = AutofillError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (start, end) = s.split_once('-').ok_or_else(|| {
            AutofillError::Validation(format!("invalid interval '{s}', expected HH:MM-HH:MM"))
        })?;
        TimeInterval::new(start, end)
    }
}

impl fmt::Display for TimeInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

impl Serialize for TimeInterval {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TimeInterval {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// Inclusive magnitude range of the random offset, in minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntropyRange {
    pub min: u32,
    pub max: u32,
}

impl Default for EntropyRange {
    fn default() -> Self {
        Self { min: 1, max: 10 }
    }
}

impl EntropyRange {
    pub fn validate(&self) -> Result<(), AutofillError> {
        if self.min > self.max {
            return Err(AutofillError::Validation(format!(
                "entropy range {}..={} is empty",
                self.min, self.max
            )));
        }
        Ok(())
    }

    /// Draw a signed offset: magnitude uniform in `min..=max`, sign a coin flip.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> i64 {
        let (lo, hi) = if self.min <= self.max {
            (self.min, self.max)
        } else {
            (self.max, self.min)
        };
        let magnitude = i64::from(rng.random_range(lo..=hi));
        if rng.random_bool(0.5) {
            magnitude
        } else {
            -magnitude
        }
    }
}

/// Minutes since midnight, optionally shifted by a random offset.
///
/// The result is not clamped: a jittered value may be negative or pass 1439.
pub fn to_minutes_of_day<R: Rng + ?Sized>(
    time: TimeOfDay,
    jitter: Option<&EntropyRange>,
    rng: &mut R,
) -> i64 {
    let base = time.minutes_of_day();
    match jitter {
        Some(range) => base + range.sample(rng),
        None => base,
    }
}

/// Format minutes of day as `HH:MM`, showing out-of-day values with a sign
/// or a day offset rather than wrapping them.
pub fn format_minutes(minutes: i64) -> String {
    if minutes < 0 {
        let m = -minutes;
        return format!("-{:02}:{:02}", m / 60, m % 60);
    }
    let day = minutes / (24 * 60);
    let rest = minutes % (24 * 60);
    if day > 0 {
        format!("{:02}:{:02}+{day}d", rest / 60, rest % 60)
    } else {
        format!("{:02}:{:02}", rest / 60, rest % 60)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn minutes_without_jitter_are_exact() {
        let mut rng = StdRng::seed_from_u64(7);
        for (text, expected) in [("00:00", 0), ("09:00", 540), ("9:05", 545), ("23:59", 1439)] {
            let time: TimeOfDay = text.parse().unwrap();
            assert_eq!(to_minutes_of_day(time, None, &mut rng), expected, "{text}");
        }
    }

    #[test]
    fn jitter_stays_within_default_range_and_is_never_zero() {
        let mut rng = StdRng::seed_from_u64(42);
        let range = EntropyRange::default();
        let time: TimeOfDay = "12:00".parse().unwrap();
        let base = time.minutes_of_day();
        let mut saw_negative = false;
        let mut saw_positive = false;
        for _ in 0..2_000 {
            let value = to_minutes_of_day(time, Some(&range), &mut rng);
            let offset = value - base;
            assert!((1..=10).contains(&offset.abs()), "offset {offset}");
            saw_negative |= offset < 0;
            saw_positive |= offset > 0;
        }
        assert!(saw_negative && saw_positive);
    }

    #[test]
    fn jitter_is_not_clamped_at_midnight() {
        let mut rng = StdRng::seed_from_u64(1);
        let range = EntropyRange { min: 5, max: 5 };
        let midnight: TimeOfDay = "00:00".parse().unwrap();
        let values: Vec<i64> = (0..64)
            .map(|_| to_minutes_of_day(midnight, Some(&range), &mut rng))
            .collect();
        assert!(values.contains(&-5));
        assert!(values.contains(&5));
    }

    #[test]
    fn rejects_malformed_times() {
        for text in ["", "9", "24:00", "12:60", "12:5", "ab:cd", "123:00", "-1:00"] {
            assert!(text.parse::<TimeOfDay>().is_err(), "{text:?} should fail");
        }
    }

    #[test]
    fn interval_parses_and_displays() {
        let interval: TimeInterval = "09:00 - 14:00".parse().unwrap();
        assert_eq!(interval.start.minutes_of_day(), 540);
        assert_eq!(interval.end.minutes_of_day(), 840);
        assert_eq!(interval.to_string(), "09:00-14:00");
    }

    #[test]
    fn reversed_interval_is_passed_through() {
        let interval: TimeInterval = "18:00-09:00".parse().unwrap();
        assert!(interval.end < interval.start);
    }

    #[test]
    fn intervals_round_trip_through_config_json() {
        let parsed: Vec<TimeInterval> = serde_json::from_str(r#"["09:00-14:00","15:00-18:00"]"#).unwrap();
        assert_eq!(serde_json::to_string(&parsed).unwrap(), r#"["09:00-14:00","15:00-18:00"]"#);
    }

    #[test]
    fn empty_entropy_range_is_rejected() {
        assert!(EntropyRange { min: 4, max: 2 }.validate().is_err());
        assert!(EntropyRange::default().validate().is_ok());
    }

    #[test]
    fn formats_out_of_day_minutes_visibly() {
        assert_eq!(format_minutes(545), "09:05");
        assert_eq!(format_minutes(-3), "-00:03");
        assert_eq!(format_minutes(1445), "00:05+1d");
    }
}
