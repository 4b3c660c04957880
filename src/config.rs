use serde::{Deserialize, Serialize};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::entropy::{EntropyRange, TimeInterval};
use crate::error::AutofillError;

/// Endpoints of the attendance API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiEndpoints {
    /// Prefix; `{userId}/{month-1}/{year}/true` is appended.
    pub expected_hours: String,
    pub attendance_find: String,
    pub attendance_create: String,
}

impl Default for ApiEndpoints {
    fn default() -> Self {
        Self {
            expected_hours:
                "https://api.kenjo.io/controller/user-attendance/attendance-summary/expected-hours/"
                    .to_string(),
            attendance_find: "https://api.kenjo.io/user-attendance-db/find".to_string(),
            attendance_create: "https://api.kenjo.io/user-attendance-db".to_string(),
        }
    }
}

/// User configuration stored in `<config_dir>/kenjo-autofill/config.json`.
///
/// Every field has a default, so a partial file is fine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutofillConfig {
    pub app_url: String,
    pub api: ApiEndpoints,
    pub origin: String,
    pub referer: String,
    pub accept_language: String,
    /// Overrides the browser's own user agent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    pub intervals: Vec<TimeInterval>,
    pub entropy: EntropyRange,
    pub request_delay_ms: u64,
    pub credential_wait_secs: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_dir: Option<PathBuf>,
}

impl Default for AutofillConfig {
    fn default() -> Self {
        Self {
            app_url: "https://app.kenjo.io/".to_string(),
            api: ApiEndpoints::default(),
            origin: "https://app.kenjo.io".to_string(),
            referer: "https://app.kenjo.io/".to_string(),
            accept_language: "en-US,en;q=0.9".to_string(),
            user_agent: None,
            intervals: default_intervals(),
            entropy: EntropyRange::default(),
            request_delay_ms: 1000,
            credential_wait_secs: 60,
            profile_dir: None,
        }
    }
}

fn default_intervals() -> Vec<TimeInterval> {
    ["09:00-14:00", "15:00-18:00"]
        .iter()
        .filter_map(|text| text.parse().ok())
        .collect()
}

impl AutofillConfig {
    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    pub fn credential_wait(&self) -> Duration {
        Duration::from_secs(self.credential_wait_secs)
    }

    pub fn validate(&self) -> Result<(), AutofillError> {
        self.entropy.validate()?;
        if self.intervals.is_empty() {
            return Err(AutofillError::Config(
                "config must define at least one interval".to_string(),
            ));
        }
        Ok(())
    }
}

/// Return the default path `<config_dir>/kenjo-autofill/config.json`.
pub fn default_config_path() -> Result<PathBuf, AutofillError> {
    let base = dirs::config_dir()
        .ok_or_else(|| AutofillError::Config("could not determine config directory".to_string()))?;
    Ok(base.join("kenjo-autofill").join("config.json"))
}

/// Read the config, returning defaults if the file is missing or unreadable.
pub fn read_config(path: &Path) -> AutofillConfig {
    match std::fs::read_to_string(path) {
        Ok(text) => serde_json::from_str(&text).unwrap_or_else(|e| {
            log::warn!("failed to parse '{}': {e}", path.display());
            AutofillConfig::default()
        }),
        Err(e) if e.kind() == io::ErrorKind::NotFound => AutofillConfig::default(),
        Err(e) => {
            log::warn!("failed to read '{}': {e}", path.display());
            AutofillConfig::default()
        }
    }
}

/// Replace `path` with `temp_path`.
///
/// On Unix this is an atomic replace. On Windows we fall back to remove+rename
/// when the destination already exists.
fn replace_file(temp_path: &Path, path: &Path) -> io::Result<()> {
    match std::fs::rename(temp_path, path) {
        Ok(()) => Ok(()),
        Err(err) => {
            #[cfg(windows)]
            {
                if err.kind() == io::ErrorKind::AlreadyExists {
                    std::fs::remove_file(path)?;
                    return std::fs::rename(temp_path, path);
                }
            }
            Err(err)
        }
    }
}

/// Write the config via temp-file + rename.
pub fn write_config(path: &Path, config: &AutofillConfig) -> Result<(), AutofillError> {
    let parent = path
        .parent()
        .ok_or_else(|| AutofillError::Config("config path has no parent".to_string()))?;
    std::fs::create_dir_all(parent)?;

    let json = serde_json::to_string_pretty(config)?;
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let temp_path = parent.join(format!(".config.json.tmp-{}-{nanos}", std::process::id()));
    {
        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&temp_path)?;
        file.write_all(json.as_bytes())?;
        file.sync_all()?;
    }
    if let Err(err) = replace_file(&temp_path, path) {
        let _ = std::fs::remove_file(&temp_path);
        return Err(err.into());
    }
    Ok(())
}
