//! Configuration errors surfaced while loading or validating documents.

use thiserror::Error;

/// Errors describing malformed configuration.
///
/// These are reported before any network call is made; callers should treat
/// them as plan/validate-time failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid locator '{locator}': {reason}")]
    InvalidLocator { locator: String, reason: String },

    #[error("unknown HTTP method '{method}'")]
    InvalidMethod { method: String },

    #[error("method {method} is not allowed for {operation}")]
    MethodNotAllowed { method: String, operation: String },

    #[error("invalid expiry type '{value}': expected 'duration', 'time' or 'time.<layout>'")]
    InvalidExpiryType { value: String },

    #[error("invalid duration '{value}'")]
    InvalidDuration { value: String },

    #[error("invalid base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("no base URL configured; set base_url or TETHER_BASE_URL")]
    MissingBaseUrl,

    #[error("invalid template '{template}': {reason}")]
    InvalidTemplate { template: String, reason: String },

    #[error("invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("write-only attribute '{path}' does not exist in body")]
    WriteOnlyPathMissing { path: String },

    #[error("invalid header '{name}': {reason}")]
    InvalidHeader { name: String, reason: String },

    #[error("invalid document: {reason}")]
    Document { reason: String },
}

impl ConfigError {
    /// Create an invalid locator error.
    pub fn invalid_locator(locator: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidLocator {
            locator: locator.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid template error.
    pub fn invalid_template(template: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidTemplate {
            template: template.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid path error.
    pub fn invalid_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a method-not-allowed error.
    pub fn method_not_allowed(method: impl Into<String>, operation: impl Into<String>) -> Self {
        Self::MethodNotAllowed {
            method: method.into(),
            operation: operation.into(),
        }
    }
}
