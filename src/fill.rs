use std::fmt;
use std::time::Duration;

use rand::Rng;

use crate::credentials::Credentials;
use crate::entropy::{self, EntropyRange, TimeInterval};
use crate::error::AutofillError;
use crate::remote::{ApiClient, NewAttendance};
use crate::transport::Transport;

/// One (date, interval) pair with its jittered minutes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FillTask {
    pub date: String,
    pub start_time: i64,
    pub end_time: i64,
}

impl FillTask {
    /// Start and end get independent offsets.
    pub fn generate<R: Rng + ?Sized>(
        date: &str,
        interval: &TimeInterval,
        entropy: &EntropyRange,
        rng: &mut R,
    ) -> Self {
        Self {
            date: date.to_string(),
            start_time: entropy::to_minutes_of_day(interval.start, Some(entropy), rng),
            end_time: entropy::to_minutes_of_day(interval.end, Some(entropy), rng),
        }
    }

    pub fn to_entry(&self, user_id: &str) -> NewAttendance {
        NewAttendance::new(user_id, &self.date, self.start_time, self.end_time)
    }
}

impl fmt::Display for FillTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let day = self.date.split_once('T').map_or(self.date.as_str(), |(d, _)| d);
        write!(
            f,
            "{day} {}-{}",
            entropy::format_minutes(self.start_time),
            entropy::format_minutes(self.end_time)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FillOutcome {
    pub completed: usize,
    pub failed: usize,
}

/// Cumulative progress, reported after every attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FillProgress {
    pub completed: usize,
    pub failed: usize,
    pub total: usize,
}

impl FillProgress {
    pub fn percent(&self) -> usize {
        if self.total == 0 {
            return 100;
        }
        ((self.completed + self.failed) * 200 + self.total) / (self.total * 2)
    }
}

impl fmt::Display for FillProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} successful, {} failed ({}%)",
            self.completed,
            self.failed,
            self.percent()
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FillSettings {
    pub entropy: EntropyRange,
    /// Pause after every attempt, successful or not.
    pub delay: Duration,
}

fn check_selection(dates: &[String], intervals: &[TimeInterval]) -> Result<(), AutofillError> {
    if dates.is_empty() {
        return Err(AutofillError::Validation("No dates selected".to_string()));
    }
    if intervals.is_empty() {
        return Err(AutofillError::Validation("No intervals configured".to_string()));
    }
    Ok(())
}

/// Generate every task without submitting anything, in fill order.
pub fn plan<R: Rng + ?Sized>(
    dates: &[String],
    intervals: &[TimeInterval],
    entropy: &EntropyRange,
    rng: &mut R,
) -> Result<Vec<FillTask>, AutofillError> {
    check_selection(dates, intervals)?;
    entropy.validate()?;
    let mut tasks = Vec::with_capacity(dates.len() * intervals.len());
    for date in dates {
        for interval in intervals {
            tasks.push(FillTask::generate(date, interval, entropy, rng));
        }
    }
    Ok(tasks)
}

/// Create one attendance record per (date, interval), dates outermost.
///
/// Individual create failures are counted, never returned. Only an empty
/// selection, a bad entropy range or missing credentials fail the call, and
/// they do so before any request is sent.
pub async fn fill<T, R, F>(
    client: &ApiClient<T>,
    credentials: Option<&Credentials>,
    dates: &[String],
    intervals: &[TimeInterval],
    settings: &FillSettings,
    rng: &mut R,
    mut on_progress: F,
) -> Result<FillOutcome, AutofillError>
where
    T: Transport,
    R: Rng + ?Sized,
    F: FnMut(FillProgress),
{
    check_selection(dates, intervals)?;
    settings.entropy.validate()?;
    let credentials = credentials.ok_or_else(|| {
        AutofillError::Credential("no bearer token or user ID available".to_string())
    })?;

    let total = dates.len() * intervals.len();
    let mut outcome = FillOutcome::default();
    log::info!("Filling {total} entries for {} dates", dates.len());

    for date in dates {
        for interval in intervals {
            let task = FillTask::generate(date, interval, &settings.entropy, rng);
            let entry = task.to_entry(&credentials.user_id);
            match client.create_record(credentials, &entry).await {
                Ok(()) => {
                    outcome.completed += 1;
                    log::debug!("Created {task}");
                }
                Err(e) => {
                    outcome.failed += 1;
                    log::warn!("Failed to create entry for {task}: {e}");
                }
            }
            on_progress(FillProgress {
                completed: outcome.completed,
                failed: outcome.failed,
                total,
            });
            tokio::time::sleep(settings.delay).await;
        }
    }

    log::info!(
        "Fill finished: {} created, {} failed",
        outcome.completed,
        outcome.failed
    );
    Ok(outcome)
}
