//! # Tether Engine
//!
//! Drives declaratively configured HTTP resources through their lifecycles.
//! A host (a CLI, a provider plugin, a test) hands the engine configuration
//! and previously persisted state; the engine issues the requests, waits for
//! long-running operations, and hands back the state to persist.
//!
//! ## Resource kinds
//!
//! - **Resources** ([`Engine::create_resource`], [`Engine::read_resource`],
//!   [`Engine::update_resource`], [`Engine::delete_resource`],
//!   [`Engine::import_resource`]): full CRUD with the response reconciled
//!   against the desired body.
//! - **Operations** ([`Engine::create_operation`], [`Engine::update_operation`],
//!   [`Engine::delete_operation`]): one call per create or update, output kept
//!   verbatim.
//! - **Actions** ([`Engine::run_action`]): fire and forget.
//! - **Ephemeral leases** ([`Engine::open_ephemeral`],
//!   [`Engine::renew_ephemeral`], [`Engine::close_ephemeral`]).
//! - **Listing** ([`Engine::list_resources`]) into importable identities.
//!
//! ## Supporting pieces
//!
//! - **`poll`**: waits on long-running operations until a success status
//! - **`precheck`** and **`locks`**: gates and process-wide named locks
//!   taken before mutating calls
//! - **`ephemeral_body`**: fingerprints write-only fragments kept in
//!   [`PrivateState`]
//! - **`validate`**: configuration checks run before any request
//!
//! Every entry point takes a [`CancellationToken`](tokio_util::sync::CancellationToken)
//! observed by network calls, poll sleeps and lock waits, and runs inside a
//! `tracing` span naming the resource.

pub mod action;
pub mod clock;
pub mod diagnostics;
pub mod ephemeral;
pub mod ephemeral_body;
pub mod error;
pub mod list;
pub mod locks;
pub mod operation;
pub mod orchestrator;
pub mod poll;
pub mod precheck;
pub mod private_state;
pub mod resource;
pub mod validate;

pub use clock::{Clock, ManualClock, SystemClock};
pub use diagnostics::{Diagnostic, Diagnostics, Severity};
pub use ephemeral::OpenedEphemeral;
pub use error::{EngineError, PartialState};
pub use list::ListedResource;
pub use locks::{LockRegistry, NamedLock, PrecheckGuard};
pub use operation::operation_output_changes;
pub use orchestrator::Engine;
pub use poll::poll_until_done;
pub use private_state::{PrivateState, PrivateStore};
