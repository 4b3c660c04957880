use std::path::{Path, PathBuf};

use crate::error::AutofillError;

/// Resolve the persistent browser profile directory.
///
/// Default: `dirs::data_dir()/kenjo-autofill/profile/`. A login done once in
/// this profile is reused by later runs.
///
/// `profile_override` (CLI flag or config) replaces the whole path.
pub fn resolve_profile_dir(profile_override: Option<&Path>) -> Result<PathBuf, AutofillError> {
    match profile_override {
        Some(p) => Ok(p.to_path_buf()),
        None => {
            let data_dir = dirs::data_dir().ok_or_else(|| {
                AutofillError::Config("could not determine data directory".to_string())
            })?;
            Ok(data_dir.join("kenjo-autofill").join("profile"))
        }
    }
}
