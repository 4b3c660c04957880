use chromiumoxide::cdp::browser_protocol::network::{
    EnableParams, EventRequestWillBeSent, ResourceType,
};
use chromiumoxide::Page;
use futures::StreamExt;
use serde_json::Value;

use crate::error::AutofillError;
use crate::observer::{ObservedRequest, RequestSource, TrafficObserver};

/// Feed every fetch/XHR request the page sends to `observer`.
///
/// Requests are only read from DevTools events; the browser sends them
/// unmodified. The returned task runs until the page goes away.
pub async fn spawn_traffic_observer(
    page: &Page,
    observer: TrafficObserver,
) -> Result<tokio::task::JoinHandle<()>, AutofillError> {
    page.execute(EnableParams::default())
        .await
        .map_err(|e| AutofillError::Browser(format!("failed to enable Network domain: {e}")))?;

    let mut events = page
        .event_listener::<EventRequestWillBeSent>()
        .await
        .map_err(|e| AutofillError::Browser(format!("failed to attach request listener: {e}")))?;

    Ok(tokio::spawn(async move {
        let mut seen = 0u64;
        while let Some(ev) = events.next().await {
            let Some(source) = request_source(ev.r#type.as_ref()) else {
                continue;
            };
            seen += 1;
            let request = ObservedRequest {
                source,
                method: ev.request.method.clone(),
                url: ev.request.url.clone(),
                headers: header_pairs(ev.request.headers.inner()),
                body: ev.request.post_data.clone(),
            };
            observer.observe(&request);
        }
        log::debug!("Request listener ended after {seen} fetch/XHR requests");
    }))
}

fn request_source(kind: Option<&ResourceType>) -> Option<RequestSource> {
    match kind? {
        ResourceType::Fetch => Some(RequestSource::Fetch),
        ResourceType::Xhr => Some(RequestSource::Xhr),
        _ => None,
    }
}

/// CDP headers arrive as a JSON object; non-string values are stringified.
fn header_pairs(headers: &Value) -> Vec<(String, String)> {
    let Some(map) = headers.as_object() else {
        return Vec::new();
    };
    map.iter()
        .map(|(name, value)| {
            let value = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (name.clone(), value)
        })
        .collect()
}
