pub mod launch;
pub mod page_storage;
pub mod profile;
pub mod traffic;

use std::path::Path;
use std::time::Duration;

use crate::error::AutofillError;
use crate::observer::TrafficObserver;

use launch::{AppWindow, LaunchPlan};
pub use page_storage::PageStorage;

/// A headed browser on the persistent profile, showing the web app, with
/// its outgoing fetch/XHR traffic fed to a [`TrafficObserver`].
pub struct BrowserSession {
    window: AppWindow,
}

impl BrowserSession {
    pub async fn open(
        app_url: &str,
        profile_override: Option<&Path>,
        observer: TrafficObserver,
    ) -> Result<Self, AutofillError> {
        let profile_dir = profile::resolve_profile_dir(profile_override)?;
        let plan = LaunchPlan::locate(profile_dir, app_url)?;
        let window = launch::open_app(&plan, observer).await?;
        Ok(Self { window })
    }

    pub fn storage(&self) -> PageStorage {
        PageStorage::new(self.window.page.clone())
    }

    pub async fn user_agent(&self) -> Option<String> {
        page_storage::page_user_agent(&self.window.page).await
    }

    pub async fn close(self) {
        let AppWindow {
            mut browser,
            handler,
            traffic,
            ..
        } = self.window;
        traffic.abort();
        if let Err(e) = browser.close().await {
            log::debug!("Browser close failed: {e}");
        }
        // Wait briefly for the handler to clean up, but don't block indefinitely
        let _ = tokio::time::timeout(Duration::from_secs(5), handler).await;
    }
}
