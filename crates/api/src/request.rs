//! Request construction: per-call options and the overlay rules applied on
//! top of provider defaults.

use serde_json::Value;
use tether_types::{Headers, HttpMethod, Query};

/// Content type used for PATCH bodies computed as JSON merge patches.
pub const MERGE_PATCH_CONTENT_TYPE: &str = "application/merge-patch+json";
/// Content type used for every other JSON body.
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Per-call options for the typed client.
///
/// `query` and `header` replace provider-level defaults key by key; keys not
/// mentioned here inherit the defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestOptions {
    /// Overrides the operation's default method.
    pub method: Option<HttpMethod>,
    pub query: Query,
    pub header: Headers,
    /// Send PATCH bodies as plain JSON instead of a merge patch.
    pub merge_patch_disabled: bool,
    /// Explicit content type for the request body.
    pub content_type: Option<String>,
}

impl RequestOptions {
    pub fn with_method(mut self, method: HttpMethod) -> Self {
        self.method = Some(method);
        self
    }

    pub fn with_query(mut self, query: Query) -> Self {
        self.query = query;
        self
    }

    pub fn with_header(mut self, header: Headers) -> Self {
        self.header = header;
        self
    }

    /// Layer `query`/`header` on top of the options already present.
    pub fn overlaid(mut self, query: &Query, header: &Headers) -> Self {
        overlay_query(&mut self.query, query);
        overlay_headers(&mut self.header, header);
        self
    }
}

/// A fully resolved request handed to an [`HttpClient`](crate::HttpClient).
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: HttpMethod,
    /// Path relative to the base URL, or an absolute URL.
    pub path: String,
    pub query: Query,
    pub header: Headers,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Query::new(),
            header: Headers::new(),
            body: None,
        }
    }

    pub fn with_body(mut self, body: Option<Value>) -> Self {
        self.body = body;
        self
    }

    /// Value of a header, matched case-insensitively.
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.header
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Replace whole query keys in `base` with those in `overlay`.
pub fn overlay_query(base: &mut Query, overlay: &Query) {
    for (key, values) in overlay {
        base.insert(key.clone(), values.clone());
    }
}

/// Replace headers in `base` with those in `overlay`, comparing names
/// case-insensitively.
pub fn overlay_headers(base: &mut Headers, overlay: &Headers) {
    for (name, value) in overlay {
        base.retain(|existing, _| !existing.eq_ignore_ascii_case(name));
        base.insert(name.clone(), value.clone());
    }
}

/// Content type for a body sent with `method`.
pub fn content_type_for(method: HttpMethod, options: &RequestOptions) -> String {
    if let Some(content_type) = options.content_type.as_deref() {
        return content_type.to_string();
    }
    if method == HttpMethod::Patch && !options.merge_patch_disabled {
        MERGE_PATCH_CONTENT_TYPE.to_string()
    } else {
        JSON_CONTENT_TYPE.to_string()
    }
}
