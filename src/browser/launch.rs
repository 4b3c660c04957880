//! Bringing up a headed browser window on the web app.
//!
//! The tab is attached to the traffic observer before it is pointed at the
//! app, so the app's first API calls after page load are seen too.

use std::path::PathBuf;
use std::time::Duration;

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::NavigateParams;
use chromiumoxide::error::CdpError;
use chromiumoxide::{Handler, Page};
use futures::StreamExt;

use crate::error::AutofillError;
use crate::observer::TrafficObserver;

use super::traffic;

/// Executables looked up on `PATH` when no known install location exists.
const PATH_NAMES: &[&str] = &[
    "google-chrome-stable",
    "google-chrome",
    "chromium",
    "chromium-browser",
    "microsoft-edge",
    "msedge",
];

/// The profile is reused across runs, so suppress first-run and restore UI.
const STARTUP_FLAGS: &[&str] = &[
    "--no-first-run",
    "--no-default-browser-check",
    "--disable-extensions",
    "--disable-session-crashed-bubble",
    "--hide-crash-restore-bubble",
];

const LAUNCH_TIMEOUT: Duration = Duration::from_secs(30);
const NEW_TAB_TIMEOUT: Duration = Duration::from_secs(10);
/// Tabs restored from the profile attach shortly after `fetch_targets`.
const TARGET_SETTLE: Duration = Duration::from_millis(250);

/// Which browser to start, on which profile, showing which page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchPlan {
    pub executable: PathBuf,
    pub profile_dir: PathBuf,
    pub app_url: String,
}

impl LaunchPlan {
    /// Plan a launch with the first browser found on this machine.
    pub fn locate(profile_dir: PathBuf, app_url: &str) -> Result<Self, AutofillError> {
        Ok(Self {
            executable: locate_browser(&install_locations(), PATH_NAMES)?,
            profile_dir,
            app_url: app_url.to_string(),
        })
    }

    pub fn args(&self) -> Vec<String> {
        STARTUP_FLAGS.iter().map(|flag| flag.to_string()).collect()
    }

    fn browser_config(&self) -> Result<BrowserConfig, AutofillError> {
        let builder = BrowserConfig::builder()
            .chrome_executable(&self.executable)
            .user_data_dir(&self.profile_dir)
            .with_head()
            .launch_timeout(LAUNCH_TIMEOUT);
        self.args()
            .into_iter()
            .fold(builder, |builder, arg| builder.arg(arg))
            .build()
            .map_err(|e| AutofillError::Browser(format!("invalid browser settings: {e}")))
    }

    fn navigation(&self) -> Result<NavigateParams, AutofillError> {
        NavigateParams::builder()
            .url(self.app_url.as_str())
            .build()
            .map_err(|e| AutofillError::Browser(format!("invalid app URL '{}': {e}", self.app_url)))
    }
}

/// A running browser showing the app, with its traffic being observed.
pub struct AppWindow {
    pub browser: Browser,
    pub handler: tokio::task::JoinHandle<()>,
    pub traffic: tokio::task::JoinHandle<()>,
    pub page: Page,
}

/// Start the browser, hook the observer onto its tab and open the app.
pub async fn open_app(
    plan: &LaunchPlan,
    observer: TrafficObserver,
) -> Result<AppWindow, AutofillError> {
    std::fs::create_dir_all(&plan.profile_dir)?;
    log::info!("Using browser: {}", plan.executable.display());
    log::info!("Profile dir: {}", plan.profile_dir.display());

    let (mut browser, handler) = Browser::launch(plan.browser_config()?).await.map_err(|e| {
        AutofillError::Browser(format!(
            "could not start {}: {e}; close other windows using this profile, or pass --profile",
            plan.executable.display()
        ))
    })?;
    let handler = tokio::spawn(drive_handler(handler));

    let page = app_tab(&mut browser).await?;
    let traffic = traffic::spawn_traffic_observer(&page, observer).await?;
    page.execute(plan.navigation()?).await?;
    log::info!("Opened {}", plan.app_url);

    Ok(AppWindow {
        browser,
        handler,
        traffic,
        page,
    })
}

/// First installed browser among `installed`, else the first of
/// `path_names` found on `PATH`.
pub fn locate_browser(
    installed: &[PathBuf],
    path_names: &[&str],
) -> Result<PathBuf, AutofillError> {
    if let Some(path) = installed.iter().find(|p| p.is_file()) {
        return Ok(path.clone());
    }
    path_names
        .iter()
        .find_map(|name| which::which(name).ok())
        .ok_or_else(|| {
            AutofillError::Browser(
                "no Chrome, Chromium or Edge installation found; install one, \
                 or pass --storage-file to read credentials from a storage export"
                    .to_string(),
            )
        })
}

#[cfg(target_os = "macos")]
fn install_locations() -> Vec<PathBuf> {
    let apps = [
        "Google Chrome.app/Contents/MacOS/Google Chrome",
        "Microsoft Edge.app/Contents/MacOS/Microsoft Edge",
        "Chromium.app/Contents/MacOS/Chromium",
    ];
    let roots = std::iter::once(PathBuf::from("/Applications"))
        .chain(dirs::home_dir().map(|home| home.join("Applications")));
    roots
        .flat_map(|root| apps.iter().map(move |app| root.join(app)))
        .collect()
}

#[cfg(target_os = "windows")]
fn install_locations() -> Vec<PathBuf> {
    let apps = [
        "Google\\Chrome\\Application\\chrome.exe",
        "Microsoft\\Edge\\Application\\msedge.exe",
    ];
    ["PROGRAMFILES", "PROGRAMFILES(X86)", "LOCALAPPDATA"]
        .iter()
        .filter_map(|var| std::env::var_os(var).map(PathBuf::from))
        .flat_map(|root| apps.iter().map(move |app| root.join(app)))
        .collect()
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn install_locations() -> Vec<PathBuf> {
    [
        "/usr/bin/google-chrome-stable",
        "/usr/bin/google-chrome",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
        "/snap/bin/chromium",
        "/usr/bin/microsoft-edge",
    ]
    .iter()
    .map(PathBuf::from)
    .collect()
}

/// Errors after which the DevTools connection cannot recover.
fn is_fatal(err: &CdpError) -> bool {
    matches!(
        err,
        CdpError::Ws(_)
            | CdpError::Io(_)
            | CdpError::ChannelSendError(_)
            | CdpError::LaunchExit(_, _)
            | CdpError::LaunchTimeout(_)
            | CdpError::LaunchIo(_, _)
    )
}

async fn drive_handler(mut handler: Handler) {
    let mut events = 0u64;
    while let Some(step) = handler.next().await {
        match step {
            Ok(()) => events += 1,
            Err(err) if is_fatal(&err) => {
                log::warn!("Lost the browser after {events} events: {err}");
                return;
            }
            Err(err) => log::debug!("Ignoring browser event error: {err}"),
        }
    }
    log::debug!("Browser connection closed after {events} events");
}

/// The tab the profile opened with, or a fresh blank one.
async fn app_tab(browser: &mut Browser) -> Result<Page, AutofillError> {
    browser.fetch_targets().await?;
    tokio::time::sleep(TARGET_SETTLE).await;
    if let Some(page) = browser.pages().await?.into_iter().next() {
        return Ok(page);
    }
    tokio::time::timeout(NEW_TAB_TIMEOUT, browser.new_page("about:blank"))
        .await
        .map_err(|_| {
            AutofillError::Browser(format!(
                "browser opened no tab within {}s",
                NEW_TAB_TIMEOUT.as_secs()
            ))
        })?
        .map_err(AutofillError::from)
}
