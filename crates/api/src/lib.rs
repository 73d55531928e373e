//! Tether API client utilities.
//!
//! This crate owns everything that touches the wire:
//!
//! - [`HttpClient`]: the transport capability the engine consumes. It is a
//!   trait so hosts (and tests) can supply their own transport.
//! - [`ReqwestTransport`]: the default transport built from a
//!   [`ProviderConfig`](tether_types::ProviderConfig).
//! - [`RestClient`]: typed create/read/update/delete/operation calls with
//!   query/header overlays, method defaults and merge-patch content types.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use tether_api::{RequestOptions, RestClient, ReqwestTransport};
//! use tether_types::ProviderConfig;
//! use tokio_util::sync::CancellationToken;
//!
//! let config = ProviderConfig { base_url: Some("https://api.example.com".into()), ..Default::default() };
//! let client = RestClient::from_provider(Arc::new(ReqwestTransport::new(&config)?), &config);
//! let cancel = CancellationToken::new();
//! let response = client.create(&cancel, "/things", &serde_json::json!({"name": "a"}), &RequestOptions::default()).await?;
//! println!("status: {}", response.status());
//! ```

pub mod client;
pub mod error;
pub mod redact;
pub mod request;
pub mod response;
pub mod transport;

pub use client::RestClient;
pub use error::ApiError;
pub use redact::{redact_headers, redact_sensitive};
pub use request::{ApiRequest, MERGE_PATCH_CONTENT_TYPE, RequestOptions};
pub use response::{ApiResponse, ReadOutcome};
pub use transport::{HttpClient, ReqwestTransport};
