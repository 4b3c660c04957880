//! One-shot search of page storage for a bearer token and a user id.
//!
//! The search is a priority-ordered chain of named probes. The first probe
//! that yields a value wins, so the order of [`TOKEN_PROBES`],
//! [`USER_ID_PROBES`] and of the key-name lists decides which value is picked
//! when several candidates exist.

use serde::Deserialize;
use serde_json::Value;

/// Key names that commonly hold a bearer token.
pub const TOKEN_KEYS: &[&str] = &[
    "token",
    "accessToken",
    "authToken",
    "bearerToken",
    "access_token",
    "auth_token",
    "bearer_token",
    "jwt",
    "jwtToken",
    "jwt_token",
    "idToken",
    "id_token",
];

/// Key names that commonly hold the current user's id.
pub const USER_ID_KEYS: &[&str] = &[
    "userId",
    "user_id",
    "userid",
    "uid",
    "id",
    "_id",
    "user",
    "currentUserId",
    "current_user_id",
];

/// Sub-objects searched one level below a stored JSON document.
const NESTED_CONTAINERS: &[&str] = &["data", "user"];

/// A token must be longer than this many characters.
pub const MIN_TOKEN_LEN: usize = 20;

/// Exclusive length bounds for a user id stored directly under a key.
const DIRECT_USER_ID_LEN: (usize, usize) = (5, 100);

/// Inclusive length bounds for a user id found inside a stored JSON document.
const NESTED_USER_ID_LEN: (usize, usize) = (20, 30);

/// The key/value storage areas of a page plus its cookie string.
///
/// Entries read from a live page keep the page's own index order, as does
/// the `[[key, value], ...]` file form. The `{key: value}` file form is read
/// in key order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct StorageSnapshot {
    #[serde(rename = "localStorage", default, deserialize_with = "entries")]
    pub local: Vec<(String, String)>,
    #[serde(rename = "sessionStorage", default, deserialize_with = "entries")]
    pub session: Vec<(String, String)>,
    #[serde(default)]
    pub cookie: String,
}

/// Storage entries as either `[[key, value], ...]` or `{key: value}`.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawEntries {
    Pairs(Vec<(String, String)>),
    Object(serde_json::Map<String, Value>),
}

fn entries<'de, D>(deserializer: D) -> Result<Vec<(String, String)>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(match RawEntries::deserialize(deserializer)? {
        RawEntries::Pairs(pairs) => pairs,
        RawEntries::Object(map) => {
            let mut entries: Vec<(String, String)> = map
                .into_iter()
                .map(|(key, value)| {
                    let text = match value {
                        Value::String(s) => s,
                        other => other.to_string(),
                    };
                    (key, text)
                })
                .collect();
            // Map order depends on serde_json features; pin it.
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            entries
        }
    })
}

impl StorageSnapshot {
    pub fn is_empty(&self) -> bool {
        self.local.is_empty() && self.session.is_empty() && self.cookie.trim().is_empty()
    }

    fn area(&self, area: Area) -> &[(String, String)] {
        match area {
            Area::Local => &self.local,
            Area::Session => &self.session,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Area {
    Local,
    Session,
}

impl Area {
    fn label(self) -> &'static str {
        match self {
            Area::Local => "localStorage",
            Area::Session => "sessionStorage",
        }
    }
}

/// A value found by a probe and where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Found {
    pub value: String,
    pub location: String,
}

pub type Probe = fn(&StorageSnapshot) -> Option<Found>;

pub const TOKEN_PROBES: &[(&str, Probe)] = &[
    ("localStorage keys", local_token_keys),
    ("sessionStorage keys", session_token_keys),
    ("localStorage documents", local_token_documents),
    ("sessionStorage documents", session_token_documents),
    ("cookies", token_in_cookies),
];

pub const USER_ID_PROBES: &[(&str, Probe)] = &[
    ("localStorage keys", local_user_id_keys),
    ("sessionStorage keys", session_user_id_keys),
    ("localStorage documents", local_user_id_documents),
    ("sessionStorage documents", session_user_id_documents),
];

/// Run probes in order and return the first hit.
pub fn first_match(snapshot: &StorageSnapshot, probes: &[(&str, Probe)]) -> Option<Found> {
    probes.iter().find_map(|(name, probe)| {
        let found = probe(snapshot);
        if found.is_none() {
            log::trace!("probe '{name}' found nothing");
        }
        found
    })
}

pub fn scan_token(snapshot: &StorageSnapshot) -> Option<Found> {
    first_match(snapshot, TOKEN_PROBES)
}

pub fn scan_user_id(snapshot: &StorageSnapshot) -> Option<Found> {
    first_match(snapshot, USER_ID_PROBES)
}

fn is_token_shaped(value: &str) -> bool {
    value.len() > MIN_TOKEN_LEN
}

fn is_direct_user_id_shaped(value: &str) -> bool {
    let (min, max) = DIRECT_USER_ID_LEN;
    // A JSON document stored under `user` is not an id.
    value.len() > min && value.len() < max && !looks_like_document(value)
}

fn is_nested_user_id_shaped(value: &str) -> bool {
    let (min, max) = NESTED_USER_ID_LEN;
    (min..=max).contains(&value.len())
}

fn looks_like_document(value: &str) -> bool {
    let trimmed = value.trim_start();
    trimmed.starts_with('{') || trimmed.starts_with('[')
}

fn get_item<'a>(entries: &'a [(String, String)], key: &str) -> Option<&'a str> {
    entries
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

fn under_keys(
    snapshot: &StorageSnapshot,
    area: Area,
    keys: &[&str],
    accept: fn(&str) -> bool,
) -> Option<Found> {
    let entries = snapshot.area(area);
    keys.iter().find_map(|key| {
        get_item(entries, key)
            .filter(|value| accept(value))
            .map(|value| Found {
                value: value.to_string(),
                location: format!("{}.{key}", area.label()),
            })
    })
}

/// Look through every stored JSON object: direct fields first, then one
/// level down inside the conventional containers.
fn in_documents(
    snapshot: &StorageSnapshot,
    area: Area,
    keys: &[&str],
    accept: fn(&str) -> bool,
) -> Option<Found> {
    for (entry_key, raw) in snapshot.area(area) {
        let Ok(Value::Object(doc)) = serde_json::from_str::<Value>(raw) else {
            continue;
        };
        let prefix = format!("{}.{entry_key}", area.label());
        if let Some(found) = string_field(&doc, keys, accept, &prefix) {
            return Some(found);
        }
        for container in NESTED_CONTAINERS {
            if let Some(Value::Object(inner)) = doc.get(*container) {
                let nested_prefix = format!("{prefix}.{container}");
                if let Some(found) = string_field(inner, keys, accept, &nested_prefix) {
                    return Some(found);
                }
            }
        }
    }
    None
}

fn string_field(
    object: &serde_json::Map<String, Value>,
    keys: &[&str],
    accept: fn(&str) -> bool,
    prefix: &str,
) -> Option<Found> {
    keys.iter().find_map(|key| match object.get(*key) {
        Some(Value::String(value)) if accept(value) => Some(Found {
            value: value.clone(),
            location: format!("{prefix}.{key}"),
        }),
        _ => None,
    })
}

fn local_token_keys(snapshot: &StorageSnapshot) -> Option<Found> {
    under_keys(snapshot, Area::Local, TOKEN_KEYS, is_token_shaped)
}

fn session_token_keys(snapshot: &StorageSnapshot) -> Option<Found> {
    under_keys(snapshot, Area::Session, TOKEN_KEYS, is_token_shaped)
}

fn local_token_documents(snapshot: &StorageSnapshot) -> Option<Found> {
    in_documents(snapshot, Area::Local, TOKEN_KEYS, is_token_shaped)
}

fn session_token_documents(snapshot: &StorageSnapshot) -> Option<Found> {
    in_documents(snapshot, Area::Session, TOKEN_KEYS, is_token_shaped)
}

fn local_user_id_keys(snapshot: &StorageSnapshot) -> Option<Found> {
    under_keys(snapshot, Area::Local, USER_ID_KEYS, is_direct_user_id_shaped)
}

fn session_user_id_keys(snapshot: &StorageSnapshot) -> Option<Found> {
    under_keys(snapshot, Area::Session, USER_ID_KEYS, is_direct_user_id_shaped)
}

fn local_user_id_documents(snapshot: &StorageSnapshot) -> Option<Found> {
    in_documents(snapshot, Area::Local, USER_ID_KEYS, is_nested_user_id_shaped)
}

fn session_user_id_documents(snapshot: &StorageSnapshot) -> Option<Found> {
    in_documents(snapshot, Area::Session, USER_ID_KEYS, is_nested_user_id_shaped)
}

fn token_in_cookies(snapshot: &StorageSnapshot) -> Option<Found> {
    for cookie in snapshot.cookie.split(';') {
        let Some((name, value)) = cookie.trim().split_once('=') else {
            continue;
        };
        let lower = name.to_ascii_lowercase();
        if !(lower.contains("token") || lower.contains("auth")) || !is_token_shaped(value) {
            continue;
        }
        let decoded = urlencoding::decode(value)
            .map(|v| v.into_owned())
            .unwrap_or_else(|_| value.to_string());
        return Some(Found {
            value: decoded,
            location: format!("cookie {name}"),
        });
    }
    None
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    const TOKEN_30: &str = "abcdefghijklmnopqrstuvwxyz0123";
    const OBJECT_ID: &str = "5f1e0c9b2a3d4e5f6a7b8c9d";

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn finds_access_token_in_local_storage() {
        let snapshot = StorageSnapshot {
            local: pairs(&[("accessToken", TOKEN_30)]),
            ..Default::default()
        };
        let found = scan_token(&snapshot).unwrap();
        assert_eq!(found.value, TOKEN_30);
        assert_eq!(found.location, "localStorage.accessToken");
    }

    #[test]
    fn short_values_are_not_tokens() {
        let snapshot = StorageSnapshot {
            local: pairs(&[("token", "short")]),
            ..Default::default()
        };
        assert!(scan_token(&snapshot).is_none());
    }

    #[test]
    fn key_list_order_wins_over_storage_order() {
        let snapshot = StorageSnapshot {
            local: pairs(&[
                ("jwt", "jwt-value-that-is-long-enough"),
                ("token", "token-value-that-is-long-enough"),
            ]),
            ..Default::default()
        };
        assert_eq!(
            scan_token(&snapshot).unwrap().value,
            "token-value-that-is-long-enough"
        );
    }

    #[test]
    fn local_storage_is_searched_before_session_storage() {
        let snapshot = StorageSnapshot {
            local: pairs(&[("id_token", "local-token-long-enough-000")]),
            session: pairs(&[("token", "session-token-long-enough-0")]),
            ..Default::default()
        };
        let found = scan_token(&snapshot).unwrap();
        assert_eq!(found.location, "localStorage.id_token");
    }

    #[test]
    fn plain_keys_are_searched_before_documents() {
        let doc = format!(r#"{{"accessToken":"{TOKEN_30}"}}"#);
        let snapshot = StorageSnapshot {
            local: pairs(&[("session", &doc)]),
            session: pairs(&[("authToken", "session-token-long-enough-0")]),
            ..Default::default()
        };
        assert_eq!(
            scan_token(&snapshot).unwrap().location,
            "sessionStorage.authToken"
        );
    }

    #[test]
    fn finds_token_nested_under_data() {
        let doc = format!(r#"{{"data":{{"token":"{TOKEN_30}"}},"expires":3600}}"#);
        let snapshot = StorageSnapshot {
            local: pairs(&[("not-json", "{broken"), ("auth", &doc)]),
            ..Default::default()
        };
        let found = scan_token(&snapshot).unwrap();
        assert_eq!(found.value, TOKEN_30);
        assert_eq!(found.location, "localStorage.auth.data.token");
    }

    #[test]
    fn nested_non_string_fields_are_ignored() {
        let snapshot = StorageSnapshot {
            local: pairs(&[("auth", r#"{"token": 12345678901234567890123}"#)]),
            ..Default::default()
        };
        assert!(scan_token(&snapshot).is_none());
    }

    #[test]
    fn cookie_token_is_percent_decoded() {
        let snapshot = StorageSnapshot {
            cookie: "theme=dark; kenjo_auth=eyJhbGciOi%3D%3Dabcdefghijklmnop; other=1".to_string(),
            ..Default::default()
        };
        let found = scan_token(&snapshot).unwrap();
        assert_eq!(found.value, "eyJhbGciOi==abcdefghijklmnop");
        assert_eq!(found.location, "cookie kenjo_auth");
    }

    #[test]
    fn cookie_names_without_token_or_auth_are_skipped() {
        let snapshot = StorageSnapshot {
            cookie: "_ga=GA1.2.1234567890.1234567890123".to_string(),
            ..Default::default()
        };
        assert!(scan_token(&snapshot).is_none());
    }

    #[test]
    fn finds_user_id_under_plain_key() {
        let snapshot = StorageSnapshot {
            session: pairs(&[("currentUserId", OBJECT_ID)]),
            ..Default::default()
        };
        let found = scan_user_id(&snapshot).unwrap();
        assert_eq!(found.value, OBJECT_ID);
        assert_eq!(found.location, "sessionStorage.currentUserId");
    }

    #[test]
    fn user_document_is_not_taken_as_an_id() {
        let doc = format!(r#"{{"_id":"{OBJECT_ID}","email":"a@b.c"}}"#);
        let snapshot = StorageSnapshot {
            local: pairs(&[("user", &doc)]),
            ..Default::default()
        };
        let found = scan_user_id(&snapshot).unwrap();
        assert_eq!(found.value, OBJECT_ID);
        assert_eq!(found.location, "localStorage.user._id");
    }

    #[test]
    fn finds_user_id_nested_under_user_object() {
        let doc = format!(r#"{{"user":{{"_id":"{OBJECT_ID}"}},"id":"x"}}"#);
        let snapshot = StorageSnapshot {
            local: pairs(&[("profile", &doc)]),
            ..Default::default()
        };
        assert_eq!(
            scan_user_id(&snapshot).unwrap().location,
            "localStorage.profile.user._id"
        );
    }

    #[test]
    fn nested_user_ids_outside_the_tight_window_are_ignored() {
        let snapshot = StorageSnapshot {
            local: pairs(&[("prefs", r#"{"id":"42"}"#)]),
            ..Default::default()
        };
        assert!(scan_user_id(&snapshot).is_none());
    }

    #[test]
    fn snapshot_accepts_pairs_and_objects() {
        let json = r#"{
            "localStorage": [["b", "2"], ["a", "1"]],
            "sessionStorage": {"count": 3, "name": "x"},
            "cookie": "k=v"
        }"#;
        let snapshot: StorageSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snapshot.local, pairs(&[("b", "2"), ("a", "1")]));
        assert_eq!(snapshot.session, pairs(&[("count", "3"), ("name", "x")]));
        assert_eq!(snapshot.cookie, "k=v");
    }

    #[test]
    fn object_form_is_read_in_key_order() {
        let json = r#"{"localStorage": {"zeta": "1", "alpha": "2"}}"#;
        let snapshot: StorageSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snapshot.local, pairs(&[("alpha", "2"), ("zeta", "1")]));
    }

    #[test]
    fn cookie_names_match_regardless_of_case() {
        let snapshot = StorageSnapshot {
            cookie: format!("lang=en; AUTH_TOKEN={TOKEN_30}"),
            ..Default::default()
        };
        let found = scan_token(&snapshot).unwrap();
        assert_eq!(found.value, TOKEN_30);
        assert_eq!(found.location, "cookie AUTH_TOKEN");

        let snapshot = StorageSnapshot {
            cookie: format!("X-Auth={TOKEN_30}"),
            ..Default::default()
        };
        assert_eq!(scan_token(&snapshot).unwrap().location, "cookie X-Auth");
    }

    #[test]
    fn cookies_are_the_last_resort() {
        let doc = format!(r#"{{"jwt":"{TOKEN_30}"}}"#);
        let snapshot = StorageSnapshot {
            session: pairs(&[("auth", &doc)]),
            cookie: "auth_token=cookie-token-long-enough-000".to_string(),
            ..Default::default()
        };
        assert_eq!(scan_token(&snapshot).unwrap().location, "sessionStorage.auth.jwt");
    }

    #[test]
    fn finds_token_in_session_storage_document() {
        let doc = format!(r#"{{"user":{{"accessToken":"{TOKEN_30}"}}}}"#);
        let snapshot = StorageSnapshot {
            local: pairs(&[("settings", r#"{"theme":"dark"}"#)]),
            session: pairs(&[("login", &doc)]),
            ..Default::default()
        };
        let found = scan_token(&snapshot).unwrap();
        assert_eq!(found.value, TOKEN_30);
        assert_eq!(found.location, "sessionStorage.login.user.accessToken");
    }

    #[test]
    fn local_documents_are_searched_before_session_documents() {
        let local_doc = r#"{"token":"local-document-token-0001"}"#;
        let session_doc = r#"{"token":"session-document-token-01"}"#;
        let snapshot = StorageSnapshot {
            local: pairs(&[("a", local_doc)]),
            session: pairs(&[("b", session_doc)]),
            ..Default::default()
        };
        assert_eq!(scan_token(&snapshot).unwrap().location, "localStorage.a.token");
    }

    #[test]
    fn finds_user_id_in_session_storage_documents() {
        let direct = format!(r#"{{"_id":"{OBJECT_ID}"}}"#);
        let snapshot = StorageSnapshot {
            session: pairs(&[("me", &direct)]),
            ..Default::default()
        };
        assert_eq!(
            scan_user_id(&snapshot).unwrap().location,
            "sessionStorage.me._id"
        );

        let nested = format!(r#"{{"data":{{"userId":"{OBJECT_ID}"}}}}"#);
        let snapshot = StorageSnapshot {
            session: pairs(&[("state", &nested)]),
            ..Default::default()
        };
        let found = scan_user_id(&snapshot).unwrap();
        assert_eq!(found.value, OBJECT_ID);
        assert_eq!(found.location, "sessionStorage.state.data.userId");
    }

    #[test]
    fn direct_user_id_length_is_exclusive_on_both_ends() {
        let scan = |value: &str| {
            let snapshot = StorageSnapshot {
                local: pairs(&[("userId", value)]),
                ..Default::default()
            };
            scan_user_id(&snapshot).map(|found| found.value)
        };
        assert_eq!(scan(&"a".repeat(5)), None);
        assert_eq!(scan(&"a".repeat(6)), Some("a".repeat(6)));
        assert_eq!(scan(&"a".repeat(99)), Some("a".repeat(99)));
        assert_eq!(scan(&"a".repeat(100)), None);
    }

    #[test]
    fn document_user_id_length_is_inclusive_20_to_30() {
        let scan = |value: &str| {
            let doc = format!(r#"{{"userId":"{value}"}}"#);
            let snapshot = StorageSnapshot {
                local: pairs(&[("prefs", &doc)]),
                ..Default::default()
            };
            scan_user_id(&snapshot).map(|found| found.value)
        };
        assert_eq!(scan(&"b".repeat(19)), None);
        assert_eq!(scan(&"b".repeat(20)), Some("b".repeat(20)));
        assert_eq!(scan(&"b".repeat(30)), Some("b".repeat(30)));
        assert_eq!(scan(&"b".repeat(31)), None);
    }

    #[test]
    fn missing_areas_default_to_empty() {
        let snapshot: StorageSnapshot = serde_json::from_str("{}").unwrap();
        assert!(snapshot.is_empty());
    }
}
