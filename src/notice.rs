use std::fmt;

use crate::error::AutofillError;
use crate::fill::FillOutcome;
use crate::reconcile::MissingDateSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Success,
    Info,
    Error,
}

impl NoticeKind {
    fn icon(self) -> &'static str {
        match self {
            NoticeKind::Success => "✓",
            NoticeKind::Info => "ℹ",
            NoticeKind::Error => "✗",
        }
    }
}

/// What the user is told when a scan or fill reaches a terminal state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub title: String,
    pub message: String,
}

impl Notice {
    pub fn scanned(missing: &MissingDateSet) -> Self {
        if missing.is_empty() {
            return Self {
                kind: NoticeKind::Info,
                title: "Scan Complete".to_string(),
                message: format!("No missing dates found for {}", missing.period),
            };
        }
        Self {
            kind: NoticeKind::Success,
            title: "Scan Complete".to_string(),
            message: format!("Found {} missing date(s)", missing.len()),
        }
    }

    pub fn filled(outcome: &FillOutcome) -> Self {
        let mut message = format!("Successfully created {} entries.", outcome.completed);
        if outcome.failed > 0 {
            message.push_str(&format!(" {} failed.", outcome.failed));
        }
        Self {
            kind: if outcome.failed == 0 {
                NoticeKind::Success
            } else {
                NoticeKind::Info
            },
            title: "Fill Complete".to_string(),
            message,
        }
    }

    pub fn failed(error: &AutofillError) -> Self {
        let mut message = format!("{}: {error}", error.title());
        if error.is_retryable() {
            message.push_str(retry_hint(error));
        }
        Self {
            kind: NoticeKind::Error,
            title: "Error".to_string(),
            message,
        }
    }
}

fn retry_hint(error: &AutofillError) -> &'static str {
    match error {
        AutofillError::Credential(_) => {
            ". Open a few pages in the app so it loads your data, then run again."
        }
        _ => ". Run the command again.",
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: {}", self.kind.icon(), self.title, self.message)
    }
}
