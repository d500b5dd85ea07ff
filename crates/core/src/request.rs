//! Transport-independent snapshot of an inbound webhook request.

use std::collections::HashMap;

/// Immutable view of one inbound HTTP request.
///
/// Header names are stored lowercased so lookups are case-insensitive.
/// Only the first value of a repeated header or query parameter is kept.
#[derive(Debug, Clone, Default)]
pub struct InboundRequest {
    body: Vec<u8>,
    headers: HashMap<String, String>,
    query: HashMap<String, String>,
}

impl InboundRequest {
    pub fn new(body: impl Into<Vec<u8>>) -> Self {
        Self {
            body: body.into(),
            headers: HashMap::new(),
            query: HashMap::new(),
        }
    }

    /// Add a header; the first value for a given name wins.
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers
            .entry(name.as_ref().to_ascii_lowercase())
            .or_insert_with(|| value.into());
        self
    }

    /// Add a query parameter; the first value for a given name wins.
    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.entry(name.into()).or_insert_with(|| value.into());
        self
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn query(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }

    /// Media type of the body without parameters, lowercased
    /// (`application/json; charset=utf-8` → `application/json`).
    pub fn content_type(&self) -> Option<String> {
        self.header("content-type").map(|v| {
            v.split(';')
                .next()
                .unwrap_or_default()
                .trim()
                .to_ascii_lowercase()
        })
    }
}
