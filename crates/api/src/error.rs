use tether_types::ConfigError;
use thiserror::Error;

/// Errors returned by the transport and the typed client.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never produced a response (network, TLS, timeout, framing).
    #[error("{method} {url} failed: {message}")]
    Transport { method: String, url: String, message: String },

    /// The server answered with a status outside the success range.
    #[error("{method} {url} returned HTTP {status}: {body}")]
    Http {
        method: String,
        url: String,
        status: u16,
        body: String,
    },

    /// The caller cancelled the call while it was in flight.
    #[error("request cancelled")]
    Cancelled,

    /// The request could not be built.
    #[error("invalid request: {reason}")]
    InvalidRequest { reason: String },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl ApiError {
    /// Create a transport error.
    pub fn transport(method: impl Into<String>, url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            method: method.into(),
            url: url.into(),
            message: message.into(),
        }
    }

    /// Create an invalid request error.
    pub fn invalid_request(reason: impl Into<String>) -> Self {
        Self::InvalidRequest { reason: reason.into() }
    }

    /// HTTP status carried by the error, when there is one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}
