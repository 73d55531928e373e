//! Declarative configuration for each resource kind.
//!
//! These structures mirror what a user writes in a configuration document.
//! They are deliberately permissive: fields that depend on other crates to
//! validate (templates, JSON paths) are checked by the engine's validation
//! pass rather than here.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{ConfigError, Headers, HttpMethod, Locator, PollOptions, PrecheckStep, Query};

/// Environment variable consulted when `base_url` is not configured.
pub const BASE_URL_ENV_VAR: &str = "TETHER_BASE_URL";

fn default_timeout_secs() -> u64 {
    30
}

/// Provider-level settings shared by every resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Base URL every resource path is resolved against.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Default headers; resource and call overlays replace matching keys.
    #[serde(default)]
    pub header: Headers,
    /// Default query parameters; resource and call overlays replace matching keys.
    #[serde(default)]
    pub query: Query,
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Keep cookies between requests.
    #[serde(default)]
    pub cookie_jar: bool,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            header: Headers::new(),
            query: Query::new(),
            timeout_secs: default_timeout_secs(),
            cookie_jar: false,
        }
    }
}

impl ProviderConfig {
    /// Resolve the base URL from the configuration or `TETHER_BASE_URL`.
    pub fn resolve_base_url(&self) -> Result<String, ConfigError> {
        let raw = match self.base_url.as_deref().map(str::trim).filter(|value| !value.is_empty()) {
            Some(configured) => configured.to_string(),
            None => std::env::var(BASE_URL_ENV_VAR).map_err(|_| ConfigError::MissingBaseUrl)?,
        };
        validate_base_url(&raw)?;
        Ok(raw.trim_end_matches('/').to_string())
    }
}

/// Validate that a base URL is absolute, uses http(s) and names a host.
pub fn validate_base_url(raw: &str) -> Result<(), ConfigError> {
    let parsed = url::Url::parse(raw).map_err(|error| ConfigError::InvalidBaseUrl {
        url: raw.to_string(),
        reason: error.to_string(),
    })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidBaseUrl {
            url: raw.to_string(),
            reason: format!("unsupported scheme '{}'", parsed.scheme()),
        });
    }
    if parsed.host_str().is_none() {
        return Err(ConfigError::InvalidBaseUrl {
            url: raw.to_string(),
            reason: "missing host".to_string(),
        });
    }
    Ok(())
}

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}

/// A fully managed REST resource with create/read/update/delete semantics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceConfig {
    /// Path the resource is created at (collection path for POST, resource path for PUT).
    pub path: String,
    /// Desired state sent on create and update.
    #[serde(default = "empty_object")]
    pub body: Value,
    /// Write-only fragment merged into request bodies but never persisted.
    #[serde(default, skip_serializing)]
    pub ephemeral_body: Option<Value>,

    /// Template for the identifier, evaluated against the create response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete_path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_method: Option<HttpMethod>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_method: Option<HttpMethod>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete_method: Option<HttpMethod>,

    /// Narrows the create response before the identifier is derived.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_selector: Option<String>,
    /// Narrows the read response before reconciliation.
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "read_body_locator")]
    pub read_selector: Option<String>,
    /// Reshapes the read response before reconciliation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_response_template: Option<String>,

    /// Paths whose server echo is ignored during reconciliation.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub write_only_attrs: Vec<String>,
    /// Paths kept in `output`; empty keeps everything.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub output_attrs: Vec<String>,

    #[serde(default)]
    pub merge_patch_disabled: bool,
    /// Probe the resource path before creating and fail when it exists.
    #[serde(default)]
    pub check_existance: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete_body: Option<Value>,

    #[serde(default, skip_serializing_if = "Query::is_empty")]
    pub query: Query,
    #[serde(default, skip_serializing_if = "Headers::is_empty")]
    pub header: Headers,
    #[serde(default, skip_serializing_if = "Query::is_empty")]
    pub create_query: Query,
    #[serde(default, skip_serializing_if = "Headers::is_empty")]
    pub create_header: Headers,
    #[serde(default, skip_serializing_if = "Query::is_empty")]
    pub read_query: Query,
    #[serde(default, skip_serializing_if = "Headers::is_empty")]
    pub read_header: Headers,
    #[serde(default, skip_serializing_if = "Query::is_empty")]
    pub update_query: Query,
    #[serde(default, skip_serializing_if = "Headers::is_empty")]
    pub update_header: Headers,
    #[serde(default, skip_serializing_if = "Query::is_empty")]
    pub delete_query: Query,
    #[serde(default, skip_serializing_if = "Headers::is_empty")]
    pub delete_header: Headers,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll_create: Option<PollOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll_update: Option<PollOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll_delete: Option<PollOptions>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub precheck_create: Vec<PrecheckStep>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub precheck_update: Vec<PrecheckStep>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub precheck_delete: Vec<PrecheckStep>,
}

impl ResourceConfig {
    /// Minimal configuration for a resource at `path` with the given body.
    pub fn new(path: impl Into<String>, body: Value) -> Self {
        Self {
            path: path.into(),
            body,
            ephemeral_body: None,
            read_path: None,
            update_path: None,
            delete_path: None,
            create_method: None,
            update_method: None,
            delete_method: None,
            create_selector: None,
            read_selector: None,
            read_response_template: None,
            write_only_attrs: Vec::new(),
            output_attrs: Vec::new(),
            merge_patch_disabled: false,
            check_existance: false,
            delete_body: None,
            query: Query::new(),
            header: Headers::new(),
            create_query: Query::new(),
            create_header: Headers::new(),
            read_query: Query::new(),
            read_header: Headers::new(),
            update_query: Query::new(),
            update_header: Headers::new(),
            delete_query: Query::new(),
            delete_header: Headers::new(),
            poll_create: None,
            poll_update: None,
            poll_delete: None,
            precheck_create: Vec::new(),
            precheck_update: Vec::new(),
            precheck_delete: Vec::new(),
        }
    }

    pub fn create_method(&self) -> HttpMethod {
        self.create_method.unwrap_or(HttpMethod::Post)
    }

    pub fn update_method(&self) -> HttpMethod {
        self.update_method.unwrap_or(HttpMethod::Put)
    }

    pub fn delete_method(&self) -> HttpMethod {
        self.delete_method.unwrap_or(HttpMethod::Delete)
    }
}

/// A one-shot API call whose response is stored verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationConfig {
    pub path: String,
    pub method: HttpMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    #[serde(default, skip_serializing)]
    pub ephemeral_body: Option<Value>,
    /// Template for the identifier, evaluated against the response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_builder: Option<String>,
    #[serde(default, skip_serializing_if = "Query::is_empty")]
    pub query: Query,
    #[serde(default, skip_serializing_if = "Headers::is_empty")]
    pub header: Headers,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub precheck: Vec<PrecheckStep>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll: Option<PollOptions>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub output_attrs: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete_method: Option<HttpMethod>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete_body: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub precheck_delete: Vec<PrecheckStep>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll_delete: Option<PollOptions>,
}

impl OperationConfig {
    pub fn new(path: impl Into<String>, method: HttpMethod) -> Self {
        Self {
            path: path.into(),
            method,
            body: None,
            ephemeral_body: None,
            id_builder: None,
            query: Query::new(),
            header: Headers::new(),
            precheck: Vec::new(),
            poll: None,
            output_attrs: Vec::new(),
            delete_method: None,
            delete_path: None,
            delete_body: None,
            precheck_delete: Vec::new(),
            poll_delete: None,
        }
    }

    /// True when a destroy-time call is configured.
    pub fn has_delete(&self) -> bool {
        self.delete_method.is_some() || self.delete_path.is_some()
    }
}

/// A fire-and-forget call: create only, never read, updated or deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionConfig {
    pub path: String,
    #[serde(default = "default_action_method")]
    pub method: HttpMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    #[serde(default, skip_serializing_if = "Query::is_empty")]
    pub query: Query,
    #[serde(default, skip_serializing_if = "Headers::is_empty")]
    pub header: Headers,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub precheck: Vec<PrecheckStep>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll: Option<PollOptions>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub output_attrs: Vec<String>,
}

fn default_action_method() -> HttpMethod {
    HttpMethod::Post
}

/// A request replayed later on behalf of an ephemeral resource.
///
/// The `path` and `body` may reference the open response through
/// `$(body.x)` templates; they are expanded once, at open time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestSpec {
    pub path: String,
    pub method: HttpMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    #[serde(default, skip_serializing_if = "Query::is_empty")]
    pub query: Query,
    #[serde(default, skip_serializing_if = "Headers::is_empty")]
    pub header: Headers,
}

/// How an expiry value extracted from a response is interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ExpiryType {
    /// A relative duration such as `"3600"` (scaled by `expiry_unit`) or `"1h"`.
    Duration,
    /// An absolute instant; `None` means RFC 3339.
    Time(Option<String>),
}

impl FromStr for ExpiryType {
    type Err = ConfigError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "duration" => Ok(Self::Duration),
            "time" => Ok(Self::Time(None)),
            other => match other.strip_prefix("time.") {
                Some(layout) if !layout.is_empty() => Ok(Self::Time(Some(layout.to_string()))),
                _ => Err(ConfigError::InvalidExpiryType { value: raw.to_string() }),
            },
        }
    }
}

impl fmt::Display for ExpiryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Duration => f.write_str("duration"),
            Self::Time(None) => f.write_str("time"),
            Self::Time(Some(layout)) => write!(f, "time.{layout}"),
        }
    }
}

impl TryFrom<String> for ExpiryType {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ExpiryType> for String {
    fn from(value: ExpiryType) -> Self {
        value.to_string()
    }
}

/// A short-lived lease opened, renewed and closed by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EphemeralConfig {
    pub path: String,
    #[serde(default = "default_action_method")]
    pub method: HttpMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    #[serde(default, skip_serializing_if = "Query::is_empty")]
    pub query: Query,
    #[serde(default, skip_serializing_if = "Headers::is_empty")]
    pub header: Headers,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub output_attrs: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry_type: Option<ExpiryType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry_locator: Option<Locator>,
    /// Unit for bare numeric durations: `ns`, `us`, `ms`, `s`, `m` or `h`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry_unit: Option<String>,
    /// How long before the expiry the lease should be renewed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry_ahead: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub renew: Option<RequestSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub close: Option<RequestSpec>,
}

fn default_list_method() -> HttpMethod {
    HttpMethod::Get
}

fn default_id_template() -> String {
    "$(path)/$(body.id)".to_string()
}

fn default_max_pages() -> usize {
    100
}

/// A collection endpoint enumerated into importable identities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListConfig {
    pub path: String,
    #[serde(default = "default_list_method")]
    pub method: HttpMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    #[serde(default, skip_serializing_if = "Query::is_empty")]
    pub query: Query,
    #[serde(default, skip_serializing_if = "Headers::is_empty")]
    pub header: Headers,
    /// JSON path selecting the item array in each page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    /// Identifier template evaluated per item, `$(path)` being the list path.
    #[serde(default = "default_id_template")]
    pub id_template: String,
    /// Where the next page URL lives in each page response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_link_locator: Option<Locator>,
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,
    /// Carried into each emitted identity for the subsequent read.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_selector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_response_template: Option<String>,
}

impl ListConfig {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            method: default_list_method(),
            body: None,
            query: Query::new(),
            header: Headers::new(),
            selector: None,
            id_template: default_id_template(),
            next_link_locator: None,
            max_pages: default_max_pages(),
            read_selector: None,
            read_response_template: None,
        }
    }
}
