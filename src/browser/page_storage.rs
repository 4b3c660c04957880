use async_trait::async_trait;
use chromiumoxide::Page;

use crate::error::AutofillError;
use crate::resolver::StorageSource;
use crate::storage_scan::StorageSnapshot;

/// Dumps both storage areas in index order, plus `document.cookie`.
const STORAGE_DUMP: &str = r#"(() => {
  const dump = (area) => {
    const out = [];
    try {
      for (let i = 0; i < area.length; i++) {
        const key = area.key(i);
        if (key !== null) out.push([key, area.getItem(key) ?? ""]);
      }
    } catch (e) {}
    return out;
  };
  return {
    localStorage: dump(window.localStorage),
    sessionStorage: dump(window.sessionStorage),
    cookie: document.cookie || ""
  };
})()"#;

/// Reads web storage from a live page each time a snapshot is requested.
#[derive(Clone)]
pub struct PageStorage {
    page: Page,
}

impl PageStorage {
    pub fn new(page: Page) -> Self {
        Self { page }
    }
}

#[async_trait]
impl StorageSource for PageStorage {
    async fn snapshot(&self) -> Result<StorageSnapshot, AutofillError> {
        let result = self.page.evaluate(STORAGE_DUMP).await?;
        let value = result
            .value()
            .ok_or_else(|| AutofillError::Browser("storage dump returned no value".to_string()))?;
        serde_json::from_value(value.clone())
            .map_err(|e| AutofillError::Browser(format!("unexpected storage dump: {e}")))
    }
}

/// The browser's own user agent, so API calls look like the page's.
pub async fn page_user_agent(page: &Page) -> Option<String> {
    match page.evaluate("navigator.userAgent").await {
        Ok(result) => result
            .value()
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .filter(|ua| !ua.is_empty()),
        Err(e) => {
            log::warn!("Could not read user agent from page: {e}");
            None
        }
    }
}
