//! Where credentials come from for one CLI run.

use std::path::PathBuf;
use std::time::Duration;

use crate::browser::BrowserSession;
use crate::config::AutofillConfig;
use crate::credentials::{CredentialStore, Credentials};
use crate::error::AutofillError;
use crate::observer::{ObservingTransport, TrafficObserver};
use crate::remote::{ApiClient, ClientIdentity};
use crate::resolver::{self, CredentialResolver, StorageSource};
use crate::transport::ReqwestTransport;

const POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    /// A live browser on the persistent profile.
    Browser { profile: Option<PathBuf> },
    /// A storage export on disk; no browser is started.
    StorageFile(PathBuf),
}

pub type LiveClient = ApiClient<ObservingTransport<ReqwestTransport>>;

/// Credential store, its resolver and (optionally) the browser feeding them.
pub struct Session {
    observer: TrafficObserver,
    resolver: CredentialResolver<Box<dyn StorageSource>>,
    browser: Option<BrowserSession>,
    user_agent: Option<String>,
}

impl Session {
    pub async fn open(
        config: &AutofillConfig,
        source: &CredentialSource,
    ) -> Result<Self, AutofillError> {
        let store = CredentialStore::new();
        let observer = TrafficObserver::new(store.clone())?;

        match source {
            CredentialSource::StorageFile(path) => {
                let snapshot = resolver::load_storage_file(path)?;
                log::info!("Reading credentials from {}", path.display());
                Ok(Self {
                    observer,
                    resolver: CredentialResolver::new(
                        store,
                        Box::new(snapshot) as Box<dyn StorageSource>,
                    ),
                    browser: None,
                    user_agent: None,
                })
            }
            CredentialSource::Browser { profile } => {
                let profile = profile.as_deref().or(config.profile_dir.as_deref());
                let browser =
                    BrowserSession::open(&config.app_url, profile, observer.clone()).await?;
                let user_agent = browser.user_agent().await;
                Ok(Self {
                    observer,
                    resolver: CredentialResolver::new(
                        store,
                        Box::new(browser.storage()) as Box<dyn StorageSource>,
                    ),
                    browser: Some(browser),
                    user_agent,
                })
            }
        }
    }

    /// API client whose own requests also pass through the observer.
    ///
    /// Those requests carry the credentials already resolved, and the store
    /// keeps the first value it is offered, so they never change what was
    /// captured. New credentials only come from the page traffic feed.
    pub fn client(&self, config: &AutofillConfig) -> Result<LiveClient, AutofillError> {
        let transport = ObservingTransport::new(ReqwestTransport::new()?, self.observer.clone());
        Ok(ApiClient::new(
            transport,
            config.api.clone(),
            ClientIdentity::from_config(config, self.user_agent.clone()),
        ))
    }

    pub async fn credentials(&self, wait: Duration) -> Result<Credentials, AutofillError> {
        // Storage files never change, so there is nothing to wait for.
        let wait = if self.browser.is_some() {
            wait
        } else {
            Duration::ZERO
        };
        wait_for_credentials(&self.resolver, wait).await
    }

    pub async fn close(self) {
        if let Some(browser) = self.browser {
            browser.close().await;
        }
    }
}

/// Re-run `resolve()` every 500 ms until it succeeds or `wait` elapses.
pub async fn wait_for_credentials<S: StorageSource>(
    resolver: &CredentialResolver<S>,
    wait: Duration,
) -> Result<Credentials, AutofillError> {
    let deadline = tokio::time::Instant::now() + wait;
    let mut announced = false;
    loop {
        if let Some(credentials) = resolver.resolve().await {
            return Ok(credentials);
        }
        if tokio::time::Instant::now() >= deadline {
            return resolver.require().await;
        }
        if !announced {
            log::info!(
                "Waiting up to {}s for credentials; log in to the app if prompted",
                wait.as_secs()
            );
            announced = true;
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}
