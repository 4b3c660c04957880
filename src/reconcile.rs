use std::collections::HashSet;

use chrono::NaiveDate;

use crate::calendar::{self, MonthYear};
use crate::credentials::Credentials;
use crate::error::AutofillError;
use crate::remote::ApiClient;
use crate::transport::Transport;

/// Past working days of a month that have no attendance record yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingDateSet {
    pub period: MonthYear,
    /// Day-start timestamps (`YYYY-MM-DDT00:00:00.000Z`), ascending.
    pub dates: Vec<String>,
}

impl MissingDateSet {
    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    /// Dates as `YYYY-MM-DD` for display.
    pub fn display_dates(&self) -> Vec<&str> {
        self.dates
            .iter()
            .map(|date| date.split_once('T').map_or(date.as_str(), |(day, _)| day))
            .collect()
    }
}

/// Compare the expected-hours calendar with existing records and return the
/// days that still need filling.
///
/// `today` is the caller's local date; only days strictly before it are
/// reported, so future attendance is never pre-filled.
pub async fn scan<T: Transport>(
    client: &ApiClient<T>,
    credentials: Option<&Credentials>,
    period: MonthYear,
    today: NaiveDate,
) -> Result<MissingDateSet, AutofillError> {
    let credentials = credentials.ok_or_else(|| {
        AutofillError::Credential("no bearer token or user ID available".to_string())
    })?;

    // Candidate days: positive expected time
    let calendar = client.expected_hours(credentials, period).await?;
    let mut candidates: Vec<(NaiveDate, String)> = Vec::new();
    for (day, expectation) in &calendar.by_day {
        if !expectation.is_working_day() {
            continue;
        }
        let Some(date) = day.trim().parse::<u32>().ok().and_then(|d| period.day(d)) else {
            log::warn!("Ignoring expected-hours entry for invalid day '{day}' in {period}");
            continue;
        };
        candidates.push((date, calendar::day_timestamp(date)));
    }

    // Existing records for the month
    let records = client.find_records(credentials, period).await?;
    let existing: HashSet<&str> = records
        .iter()
        .filter_map(|record| record.date.as_deref())
        .collect();

    let mut dates: Vec<String> = candidates
        .into_iter()
        .filter(|(date, stamp)| *date < today && !existing.contains(stamp.as_str()))
        .map(|(_, stamp)| stamp)
        .collect();
    dates.sort();
    dates.dedup();

    log::info!(
        "Scanned {period}: {} existing records, {} missing days",
        records.len(),
        dates.len()
    );
    Ok(MissingDateSet { period, dates })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::config::AutofillConfig;
    use crate::remote::ClientIdentity;
    use crate::transport::{HttpRequest, HttpResponse, Method};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeApi {
        expected: (u16, String),
        records: (u16, String),
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Transport for FakeApi {
        async fn send(&self, request: HttpRequest) -> Result<HttpResponse, AutofillError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let (status, body) = match request.method {
                Method::Get => self.expected.clone(),
                Method::Post => self.records.clone(),
            };
            Ok(HttpResponse { status, body })
        }
    }

    fn client(expected: (u16, &str), records: (u16, &str)) -> ApiClient<FakeApi> {
        let config = AutofillConfig::default();
        ApiClient::new(
            FakeApi {
                expected: (expected.0, expected.1.to_string()),
                records: (records.0, records.1.to_string()),
                calls: AtomicUsize::new(0),
            },
            config.api.clone(),
            ClientIdentity::from_config(&config, None),
        )
    }

    fn creds() -> Credentials {
        Credentials {
            token: "token".to_string(),
            user_id: "user".to_string(),
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    const DAYS_1_5_10: &str = r#"{"expectedHoursByDay":{
        "1":{"expectedTime":480},"2":{"expectedTime":0},"5":{"expectedTime":480},
        "10":{"expectedTime":240},"11":{}}}"#;

    #[tokio::test]
    async fn reports_working_days_without_records() {
        let client = client(
            (200, DAYS_1_5_10),
            (200, r#"[{"date":"2026-09-05T00:00:00.000Z","startTime":540,"endTime":840},{"startTime":1}]"#),
        );
        let period = MonthYear::new(9, 2026).unwrap();
        let missing = scan(&client, Some(&creds()), period, date(2026, 9, 20))
            .await
            .unwrap();
        assert_eq!(
            missing.dates,
            ["2026-09-01T00:00:00.000Z", "2026-09-10T00:00:00.000Z"]
        );
        assert_eq!(missing.display_dates(), ["2026-09-01", "2026-09-10"]);
    }

    #[tokio::test]
    async fn today_and_later_are_excluded() {
        let client = client((200, DAYS_1_5_10), (200, "[]"));
        let period = MonthYear::new(9, 2026).unwrap();
        let missing = scan(&client, Some(&creds()), period, date(2026, 9, 5))
            .await
            .unwrap();
        assert_eq!(missing.dates, ["2026-09-01T00:00:00.000Z"]);
    }

    #[tokio::test]
    async fn future_month_is_empty() {
        let client = client((200, DAYS_1_5_10), (200, "[]"));
        let period = MonthYear::new(12, 2026).unwrap();
        let missing = scan(&client, Some(&creds()), period, date(2026, 10, 19))
            .await
            .unwrap();
        assert!(missing.is_empty());
    }

    #[tokio::test]
    async fn month_without_working_days_is_empty() {
        let client = client((200, r#"{"expectedHoursByDay":{}}"#), (200, "[]"));
        let period = MonthYear::new(8, 2026).unwrap();
        let missing = scan(&client, Some(&creds()), period, date(2026, 10, 19))
            .await
            .unwrap();
        assert_eq!(missing.len(), 0);
    }

    #[tokio::test]
    async fn invalid_days_are_skipped() {
        let client = client(
            (200, r#"{"expectedHoursByDay":{"30":{"expectedTime":480},"31":{"expectedTime":480},"x":{"expectedTime":1}}}"#),
            (200, "[]"),
        );
        let period = MonthYear::new(9, 2026).unwrap();
        let missing = scan(&client, Some(&creds()), period, date(2026, 10, 19))
            .await
            .unwrap();
        assert_eq!(missing.dates, ["2026-09-30T00:00:00.000Z"]);
    }

    #[tokio::test]
    async fn record_dates_must_match_exactly() {
        let client = client(
            (200, r#"{"expectedHoursByDay":{"1":{"expectedTime":480}}}"#),
            (200, r#"[{"date":"2026-09-01T02:00:00.000Z"}]"#),
        );
        let period = MonthYear::new(9, 2026).unwrap();
        let missing = scan(&client, Some(&creds()), period, date(2026, 10, 19))
            .await
            .unwrap();
        assert_eq!(missing.dates, ["2026-09-01T00:00:00.000Z"]);
    }

    #[tokio::test]
    async fn failed_calendar_fetch_is_a_remote_error() {
        let client = client((500, ""), (200, "[]"));
        let period = MonthYear::new(9, 2026).unwrap();
        let err = scan(&client, Some(&creds()), period, date(2026, 10, 19))
            .await
            .unwrap_err();
        assert!(matches!(err, AutofillError::Remote { status: Some(500), .. }));
    }

    #[tokio::test]
    async fn failed_record_fetch_is_a_remote_error() {
        let client = client((200, DAYS_1_5_10), (401, "unauthorized"));
        let period = MonthYear::new(9, 2026).unwrap();
        let err = scan(&client, Some(&creds()), period, date(2026, 10, 19))
            .await
            .unwrap_err();
        assert!(matches!(err, AutofillError::Remote { status: Some(401), .. }));
    }

    #[tokio::test]
    async fn undecodable_records_are_a_parse_error() {
        let client = client((200, DAYS_1_5_10), (200, r#"{"not":"an array"}"#));
        let period = MonthYear::new(9, 2026).unwrap();
        let err = scan(&client, Some(&creds()), period, date(2026, 10, 19))
            .await
            .unwrap_err();
        assert!(matches!(err, AutofillError::Parse(_)));
    }

    #[tokio::test]
    async fn missing_credentials_fail_before_any_request() {
        let client = client((200, DAYS_1_5_10), (200, "[]"));
        let period = MonthYear::new(9, 2026).unwrap();
        let err = scan(&client, None, period, date(2026, 10, 19))
            .await
            .unwrap_err();
        assert!(matches!(err, AutofillError::Credential(_)));
        assert_eq!(client.transport().calls.load(Ordering::SeqCst), 0);
    }
}
