//! # Tether Types
//!
//! Shared data model for the Tether resource engine. Every type here is plain
//! data: it can be deserialized from a YAML/JSON document, carried in state,
//! and handed to the engine. Parsing that can fail (locators, methods, expiry
//! types) happens at deserialization time so that malformed configuration is
//! reported as a [`ConfigError`] before any request is issued.
//!
//! - [`Locator`]: points at a status or URL inside an HTTP response
//! - [`PollOptions`] and [`PrecheckStep`]: long-running-operation and gating configuration
//! - [`ResourceConfig`], [`OperationConfig`], [`ActionConfig`], [`EphemeralConfig`], [`ListConfig`]
//! - [`ResourceState`] and [`ImportSpec`]: what the host round-trips between calls

pub mod config;
pub mod error;
pub mod locator;
pub mod method;
pub mod poll;
pub mod state;

use indexmap::IndexMap;

pub use config::{
    ActionConfig, EphemeralConfig, ExpiryType, ListConfig, OperationConfig, ProviderConfig, RequestSpec, ResourceConfig,
};
pub use error::ConfigError;
pub use locator::Locator;
pub use method::HttpMethod;
pub use poll::{PollOptions, PrecheckApi, PrecheckStep};
pub use state::{ImportSpec, OperationState, ResourceState};

/// Multi-valued query parameters; each key is emitted once per value.
pub type Query = IndexMap<String, Vec<String>>;

/// Single-valued request headers keyed by header name.
pub type Headers = IndexMap<String, String>;
