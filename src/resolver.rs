use std::path::Path;

use async_trait::async_trait;

use crate::credentials::{CredentialStore, Credentials};
use crate::error::AutofillError;
use crate::storage_scan::{self, StorageSnapshot};

/// Somewhere a [`StorageSnapshot`] can be read from on demand.
#[async_trait]
pub trait StorageSource: Send + Sync {
    async fn snapshot(&self) -> Result<StorageSnapshot, AutofillError>;
}

#[async_trait]
impl<S: StorageSource + ?Sized> StorageSource for Box<S> {
    async fn snapshot(&self) -> Result<StorageSnapshot, AutofillError> {
        (**self).snapshot().await
    }
}

#[async_trait]
impl StorageSource for StorageSnapshot {
    async fn snapshot(&self) -> Result<StorageSnapshot, AutofillError> {
        Ok(self.clone())
    }
}

/// Load a storage export written as JSON (see [`StorageSnapshot`]).
pub fn load_storage_file(path: &Path) -> Result<StorageSnapshot, AutofillError> {
    let text = std::fs::read_to_string(path)?;
    serde_json::from_str(&text).map_err(|e| {
        AutofillError::Config(format!("invalid storage file '{}': {e}", path.display()))
    })
}

/// Best-effort credential lookup: cache first, then a storage scan.
///
/// The traffic observer writes into the same [`CredentialStore`]
/// independently, so a later call may succeed where an earlier one did not.
pub struct CredentialResolver<S> {
    store: CredentialStore,
    source: S,
}

impl<S: StorageSource> CredentialResolver<S> {
    pub fn new(store: CredentialStore, source: S) -> Self {
        Self { store, source }
    }

    pub async fn resolve(&self) -> Option<Credentials> {
        if let Some(credentials) = self.store.get() {
            log::debug!("Using cached credentials");
            return Some(credentials);
        }

        let snapshot = match self.source.snapshot().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                log::warn!("Could not read page storage: {e}");
                return None;
            }
        };

        if !self.store.has_token() {
            match storage_scan::scan_token(&snapshot) {
                Some(found) => {
                    if self.store.offer_token(&found.value) {
                        log::info!("Found token in {}", found.location);
                    }
                }
                None => log::debug!("Bearer token not found in storage"),
            }
        }

        if !self.store.has_user_id() {
            match storage_scan::scan_user_id(&snapshot) {
                Some(found) => {
                    if self.store.offer_user_id(&found.value) {
                        log::info!("Found user ID in {}", found.location);
                    }
                }
                None => log::debug!("User ID not found in storage"),
            }
        }

        self.store.get()
    }

    /// Like [`resolve`](Self::resolve) but turns a miss into a
    /// [`AutofillError::Credential`] naming what is still missing.
    pub async fn require(&self) -> Result<Credentials, AutofillError> {
        if let Some(credentials) = self.resolve().await {
            return Ok(credentials);
        }
        let missing = match (self.store.has_token(), self.store.has_user_id()) {
            (false, false) => "bearer token and user ID",
            (false, true) => "bearer token",
            _ => "user ID",
        };
        Err(AutofillError::Credential(format!(
            "{missing} not found; open the attendance page so the app loads your data, then retry"
        )))
    }
}
