//! Long-running-operation polling and precheck configuration.

use serde::{Deserialize, Serialize};

use crate::{Headers, Locator, Query};

/// Default delay between polls when the server sends no `Retry-After`.
pub const DEFAULT_POLL_DELAY_SECONDS: u64 = 10;

fn default_delay_sec() -> u64 {
    DEFAULT_POLL_DELAY_SECONDS
}

/// How to wait for an asynchronous server-side operation to finish.
///
/// The status is extracted with `status_locator` from every poll response and
/// compared (case-sensitively) with `success` and `pending`. Any other status
/// ends polling with a failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollOptions {
    /// Where the status sentinel lives in each response.
    pub status_locator: Locator,
    /// Status value that ends polling successfully.
    pub success: String,
    /// Status values that keep polling going. An empty string is a legal
    /// pending value and means "the status field is not there yet".
    #[serde(default)]
    pub pending: Vec<String>,
    /// Where the poll URL lives in the initial response. When absent the
    /// original request URL is polled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_locator: Option<Locator>,
    /// Header overlay applied to every poll request.
    #[serde(default, skip_serializing_if = "Headers::is_empty")]
    pub header: Headers,
    /// Minimum delay between polls, in seconds.
    #[serde(default = "default_delay_sec", alias = "default_delay_seconds")]
    pub default_delay_sec: u64,
}

impl PollOptions {
    /// Build options polling the original request URL with the default delay.
    pub fn new(status_locator: Locator, success: impl Into<String>, pending: Vec<String>) -> Self {
        Self {
            status_locator,
            success: success.into(),
            pending,
            url_locator: None,
            header: Headers::new(),
            default_delay_sec: DEFAULT_POLL_DELAY_SECONDS,
        }
    }

    /// Poll the URL found by `locator` instead of the request URL.
    pub fn with_url_locator(mut self, locator: Locator) -> Self {
        self.url_locator = Some(locator);
        self
    }

    /// Override the default delay between polls.
    pub fn with_default_delay(mut self, seconds: u64) -> Self {
        self.default_delay_sec = seconds;
        self
    }

    /// True when `status` is the success sentinel.
    pub fn is_success(&self, status: &str) -> bool {
        self.success == status
    }

    /// True when `status` is one of the pending sentinels.
    pub fn is_pending(&self, status: &str) -> bool {
        self.pending.iter().any(|pending| pending == status)
    }
}

/// A polled HTTP probe that must reach `success` before a mutating call.
///
/// The probe GETs `path` (which may contain `$(body.x)` templates expanded
/// against the desired body) and polls that URL with the embedded options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrecheckApi {
    pub path: String,
    #[serde(default, skip_serializing_if = "Query::is_empty")]
    pub query: Query,
    #[serde(flatten)]
    pub poll: PollOptions,
}

/// One gate evaluated before a mutating call, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrecheckStep {
    /// Poll an API until it reports success.
    Api(PrecheckApi),
    /// Acquire a process-wide named lock, held until the guarded call finishes.
    Mutex(String),
}
