//! Request/response mapping for the three attendance API operations.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::calendar::MonthYear;
use crate::config::{ApiEndpoints, AutofillConfig};
use crate::credentials::Credentials;
use crate::error::AutofillError;
use crate::transport::{HttpRequest, HttpResponse, Method, Transport};

const ACCEPT: &str = "application/json, text/plain, */*";

/// Sent when neither the config nor a browser supplies a user agent.
pub const FALLBACK_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
AppleWebKit/537.36 (KHTML, like Gecko) Chrome/130.0.0.0 Safari/537.36";

/// Headers that make our calls look like the web app's own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity {
    pub accept_language: String,
    pub origin: String,
    pub referer: String,
    pub user_agent: String,
}

impl ClientIdentity {
    pub fn from_config(config: &AutofillConfig, browser_user_agent: Option<String>) -> Self {
        let user_agent = config
            .user_agent
            .clone()
            .or(browser_user_agent)
            .unwrap_or_else(|| {
                log::warn!(
                    "No browser user agent available; sending a generic Chrome one. \
                     Set \"user_agent\" in the config to match your browser"
                );
                FALLBACK_USER_AGENT.to_string()
            });
        Self {
            accept_language: config.accept_language.clone(),
            origin: config.origin.clone(),
            referer: config.referer.clone(),
            user_agent,
        }
    }
}

/// Expected minutes for one day of the month.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct DayExpectation {
    #[serde(rename = "expectedTime", default)]
    pub expected_time: Option<f64>,
}

impl DayExpectation {
    pub fn is_working_day(&self) -> bool {
        self.expected_time.is_some_and(|minutes| minutes > 0.0)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ExpectedHoursCalendar {
    /// Keyed by day of month as sent by the API (`"1"`..`"31"`).
    #[serde(rename = "expectedHoursByDay")]
    pub by_day: BTreeMap<String, DayExpectation>,
}

/// An existing attendance entry. Only the fields we read are modelled.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AttendanceRecord {
    #[serde(rename = "_id", default)]
    pub id: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(rename = "startTime", default)]
    pub start_time: Option<f64>,
    #[serde(rename = "endTime", default)]
    pub end_time: Option<f64>,
}

/// Body of a create request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewAttendance {
    #[serde(rename = "_userId")]
    pub user_id: String,
    #[serde(rename = "ownerId")]
    pub owner_id: String,
    pub date: String,
    #[serde(rename = "startTime")]
    pub start_time: i64,
    #[serde(rename = "endTime")]
    pub end_time: i64,
    pub breaks: Vec<serde_json::Value>,
    #[serde(rename = "_changesTracking")]
    pub changes_tracking: Vec<serde_json::Value>,
    #[serde(rename = "_deleted")]
    pub deleted: bool,
    #[serde(rename = "_approved")]
    pub approved: bool,
    pub interface: &'static str,
}

impl NewAttendance {
    pub fn new(user_id: &str, date: &str, start_time: i64, end_time: i64) -> Self {
        Self {
            user_id: user_id.to_string(),
            owner_id: user_id.to_string(),
            date: date.to_string(),
            start_time,
            end_time,
            breaks: Vec::new(),
            changes_tracking: Vec::new(),
            deleted: false,
            approved: false,
            interface: "attendance-tab",
        }
    }
}

pub struct ApiClient<T> {
    transport: T,
    endpoints: ApiEndpoints,
    identity: ClientIdentity,
}

impl<T: Transport> ApiClient<T> {
    pub fn new(transport: T, endpoints: ApiEndpoints, identity: ClientIdentity) -> Self {
        Self {
            transport,
            endpoints,
            identity,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn headers(&self, credentials: &Credentials) -> Vec<(String, String)> {
        [
            ("accept", ACCEPT.to_string()),
            ("accept-language", self.identity.accept_language.clone()),
            ("authorization", format!("Bearer {}", credentials.token)),
            ("content-type", "application/json".to_string()),
            ("origin", self.identity.origin.clone()),
            ("referer", self.identity.referer.clone()),
            ("user-agent", self.identity.user_agent.clone()),
        ]
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect()
    }

    async fn send(
        &self,
        credentials: &Credentials,
        method: Method,
        url: String,
        body: Option<String>,
    ) -> Result<HttpResponse, AutofillError> {
        let request = HttpRequest {
            method,
            url,
            headers: self.headers(credentials),
            body,
        };
        self.transport.send(request).await
    }

    pub async fn expected_hours(
        &self,
        credentials: &Credentials,
        period: MonthYear,
    ) -> Result<ExpectedHoursCalendar, AutofillError> {
        let url = format!(
            "{}{}/{}/{}/true",
            self.endpoints.expected_hours,
            credentials.user_id,
            period.zero_based_month(),
            period.year()
        );
        let response = self.send(credentials, Method::Get, url, None).await?;
        if response.status != 200 {
            return Err(AutofillError::remote_status(response.status, ""));
        }
        decode(&response.body)
    }

    pub async fn find_records(
        &self,
        credentials: &Credentials,
        period: MonthYear,
    ) -> Result<Vec<AttendanceRecord>, AutofillError> {
        let (start, end) = period.range_bounds();
        let payload = json!({
            "_userId": credentials.user_id,
            "date": { "$gte": start, "$lte": end },
            "_deleted": false,
        });
        let response = self
            .send(
                credentials,
                Method::Post,
                self.endpoints.attendance_find.clone(),
                Some(payload.to_string()),
            )
            .await?;
        if response.status != 200 {
            return Err(AutofillError::remote_status(response.status, ""));
        }
        decode(&response.body)
    }

    pub async fn create_record(
        &self,
        credentials: &Credentials,
        entry: &NewAttendance,
    ) -> Result<(), AutofillError> {
        let body = serde_json::to_string(entry)?;
        let response = self
            .send(
                credentials,
                Method::Post,
                self.endpoints.attendance_create.clone(),
                Some(body),
            )
            .await?;
        if !response.is_success() {
            return Err(AutofillError::remote_status(response.status, response.body));
        }
        Ok(())
    }
}

fn decode<D: for<'de> Deserialize<'de>>(body: &str) -> Result<D, AutofillError> {
    serde_json::from_str(body).map_err(|e| AutofillError::Parse(e.to_string()))
}
