//! Parsed browser location (path + query string).
//!
//! The access core never touches the real `window.location`; the hosting page
//! hands in a `Location` per navigation. Query parsing is deliberately
//! forgiving: flags it does not know are ignored, duplicate keys keep the
//! first occurrence.

use std::collections::HashMap;
use std::str::FromStr;

use crate::Role;

/// Current page location as seen by the access core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    path: String,
    query: HashMap<String, String>,
}

impl Location {
    /// Parse from a path and raw query string (`"?demo=true&role=agency"`,
    /// leading `?` optional).
    pub fn parse(path: impl Into<String>, query: &str) -> Self {
        let mut map = HashMap::new();
        for pair in query.trim_start_matches('?').split('&') {
            if pair.is_empty() {
                continue;
            }
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            map.entry(key.to_string()).or_insert_with(|| value.to_string());
        }
        Self {
            path: path.into(),
            query: map,
        }
    }

    /// Location with no query parameters.
    pub fn path_only(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            query: HashMap::new(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.query.get(key).map(String::as_str)
    }

    fn flag(&self, key: &str) -> bool {
        matches!(self.query_param(key), Some("true") | Some("1"))
    }

    /// `?demo=true` — requests an anonymous demo session.
    pub fn demo_flag(&self) -> bool {
        self.flag("demo")
    }

    /// `?dev=true` — forces a local dev identity, bypassing the provider.
    pub fn dev_flag(&self) -> bool {
        self.flag("dev")
    }

    /// `?role=...` — the role override carried by demo/dev links.
    /// Malformed values are ignored, same as an absent parameter.
    pub fn query_role(&self) -> Option<Role> {
        self.query_param("role").and_then(|raw| Role::from_str(raw).ok())
    }

}
