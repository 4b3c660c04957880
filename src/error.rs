use thiserror::Error;

/// Everything the autofill core can fail with.
///
/// The first four variants are the user-facing taxonomy; the rest are
/// infrastructure failures from the browser, config file or filesystem.
#[derive(Error, Debug)]
pub enum AutofillError {
    #[error("could not extract credentials from browser: {0}")]
    Credential(String),

    #[error("{}", remote_message(.status, .message))]
    Remote { status: Option<u16>, message: String },

    #[error("failed to parse response: {0}")]
    Parse(String),

    #[error("{0}")]
    Validation(String),

    #[error("browser error: {0}")]
    Browser(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),
}

fn remote_message(status: &Option<u16>, message: &str) -> String {
    match *status {
        Some(status) if message.is_empty() => format!("API returned status {status}"),
        Some(status) => format!("API returned status {status}: {message}"),
        None => format!("request failed: {message}"),
    }
}

impl AutofillError {
    pub fn remote_status(status: u16, body: impl Into<String>) -> Self {
        AutofillError::Remote {
            status: Some(status),
            message: body.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        AutofillError::Remote {
            status: None,
            message: message.into(),
        }
    }

    /// Short notice title shown for this failure.
    pub fn title(&self) -> &'static str {
        match self {
            AutofillError::Credential(_) => "Credentials Missing",
            AutofillError::Remote { .. } => "Request Failed",
            AutofillError::Parse(_) => "Unexpected Response",
            AutofillError::Validation(_) => "Invalid Input",
            _ => "Error",
        }
    }

    /// Whether re-invoking the same operation may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AutofillError::Credential(_) | AutofillError::Remote { .. } | AutofillError::Browser(_)
        )
    }
}

impl From<reqwest::Error> for AutofillError {
    fn from(error: reqwest::Error) -> Self {
        match error.status() {
            Some(status) => AutofillError::remote_status(status.as_u16(), error.to_string()),
            None => AutofillError::transport(error.to_string()),
        }
    }
}

impl From<chromiumoxide::error::CdpError> for AutofillError {
    fn from(error: chromiumoxide::error::CdpError) -> Self {
        AutofillError::Browser(error.to_string())
    }
}
