//! Passive credential capture from outgoing requests.
//!
//! The observer never alters a request. It only reads headers, body and URL
//! and offers anything credential-shaped to the [`CredentialStore`], whose
//! write-once fields make every capture "first write wins".

use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;

use crate::credentials::CredentialStore;
use crate::error::AutofillError;
use crate::transport::{HttpRequest, HttpResponse, Transport};

/// 24 hex digits, i.e. a MongoDB ObjectId, as a whole path segment.
const OBJECT_ID_SEGMENT: &str = r"(?i)/([0-9a-f]{24})(?:[/?#]|$)";

/// Which request mechanism issued an observed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestSource {
    Fetch,
    Xhr,
    Client,
}

impl RequestSource {
    pub fn label(self) -> &'static str {
        match self {
            RequestSource::Fetch => "fetch",
            RequestSource::Xhr => "XHR",
            RequestSource::Client => "client",
        }
    }
}

/// A request as seen on its way out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedRequest {
    pub source: RequestSource,
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl ObservedRequest {
    fn authorization(&self) -> Option<&str> {
        self.headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case("authorization"))
            .map(|(_, value)| value.as_str())
    }
}

impl From<&HttpRequest> for ObservedRequest {
    fn from(request: &HttpRequest) -> Self {
        ObservedRequest {
            source: RequestSource::Client,
            method: request.method.as_str().to_string(),
            url: request.url.clone(),
            headers: request.headers.clone(),
            body: request.body.clone(),
        }
    }
}

/// What a single observation stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capture {
    pub token: bool,
    pub user_id: bool,
}

#[derive(Debug, Clone)]
pub struct TrafficObserver {
    store: CredentialStore,
    object_id: Regex,
}

impl TrafficObserver {
    pub fn new(store: CredentialStore) -> Result<Self, AutofillError> {
        Ok(Self {
            store,
            object_id: Regex::new(OBJECT_ID_SEGMENT)?,
        })
    }

    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    pub fn observe(&self, request: &ObservedRequest) -> Capture {
        let mut capture = Capture::default();
        let source = request.source.label();

        if !self.store.has_token() {
            if let Some(token) = request
                .authorization()
                .and_then(|value| value.strip_prefix("Bearer "))
            {
                if self.store.offer_token(token.trim()) {
                    log::info!("Captured bearer token from {source} request");
                    capture.token = true;
                }
            }
        }

        if !self.store.has_user_id() {
            if let Some(user_id) = request.body.as_deref().and_then(user_id_from_body) {
                if self.store.offer_user_id(&user_id) {
                    log::info!("Captured user ID from {source} request body");
                    capture.user_id = true;
                }
            }
        }

        if !self.store.has_user_id() {
            if let Some(user_id) = self.user_id_from_url(&request.url) {
                if self.store.offer_user_id(user_id) {
                    log::info!("Captured user ID from {source} URL");
                    capture.user_id = true;
                }
            }
        }

        capture
    }

    fn user_id_from_url<'a>(&self, url: &'a str) -> Option<&'a str> {
        // Only user-scoped endpoints carry the caller's own id in the path.
        if !url.contains("/user") {
            return None;
        }
        self.object_id
            .captures(url)
            .and_then(|captures| captures.get(1))
            .map(|m| m.as_str())
    }
}

fn user_id_from_body(body: &str) -> Option<String> {
    let Ok(Value::Object(object)) = serde_json::from_str::<Value>(body) else {
        return None;
    };
    ["_userId", "userId"].iter().find_map(|key| match object.get(*key) {
        Some(Value::String(id)) if !id.is_empty() => Some(id.clone()),
        _ => None,
    })
}

/// Middleware that shows every request to a [`TrafficObserver`] before
/// handing it, unchanged, to the wrapped transport.
pub struct ObservingTransport<T> {
    inner: T,
    observer: TrafficObserver,
}

impl<T: Transport> ObservingTransport<T> {
    pub fn new(inner: T, observer: TrafficObserver) -> Self {
        Self { inner, observer }
    }

    pub fn into_inner(self) -> T {
        self.inner
    }
}

#[async_trait]
impl<T: Transport> Transport for ObservingTransport<T> {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, AutofillError> {
        self.observer.observe(&ObservedRequest::from(&request));
        self.inner.send(request).await
    }
}
