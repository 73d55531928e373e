//! The [`Engine`] handle shared by every lifecycle entry point.
//!
//! Entry points for each resource kind live in their own modules
//! (`resource`, `operation`, `action`, `ephemeral`, `list`) as `impl Engine`
//! blocks; this module holds the state they share.

use std::sync::Arc;

use tether_api::{ApiResponse, RequestOptions, RestClient};
use tether_types::{Headers, HttpMethod, PollOptions, Query};
use tether_util::ExpandContext;
use tokio_util::sync::CancellationToken;

use crate::{
    EngineError,
    clock::{Clock, SystemClock},
    locks::LockRegistry,
    poll::poll_until_done,
};

/// Drives resources through their lifecycles against one provider.
///
/// Cloning is cheap; clones share the client, the lock registry and the clock.
#[derive(Clone)]
pub struct Engine {
    client: RestClient,
    locks: Arc<LockRegistry>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine").field("client", &self.client).finish_non_exhaustive()
    }
}

impl Engine {
    /// Engine with its own lock registry and the system clock.
    pub fn new(client: RestClient) -> Self {
        Self {
            client,
            locks: Arc::new(LockRegistry::new()),
            clock: Arc::new(SystemClock),
        }
    }

    /// Share `locks` with other engines in the process.
    pub fn with_locks(mut self, locks: Arc<LockRegistry>) -> Self {
        self.locks = locks;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn client(&self) -> &RestClient {
        &self.client
    }

    pub fn locks(&self) -> &Arc<LockRegistry> {
        &self.locks
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub(crate) fn context<'a>(&'a self, path: &'a str) -> ExpandContext<'a> {
        ExpandContext::new(path, self.client.base_url())
    }

    /// Poll when `options` is configured; otherwise hand `response` back.
    pub(crate) async fn maybe_poll(
        &self,
        cancel: &CancellationToken,
        response: ApiResponse,
        options: Option<&PollOptions>,
    ) -> Result<ApiResponse, EngineError> {
        match options {
            Some(options) => poll_until_done(&self.client, self.clock(), cancel, response, options).await,
            None => Ok(response),
        }
    }
}

/// Resource-level query and headers with a per-call overlay on top.
pub(crate) fn layered_options(
    method: HttpMethod,
    query: &Query,
    header: &Headers,
    call_query: &Query,
    call_header: &Headers,
) -> RequestOptions {
    RequestOptions::default()
        .with_query(query.clone())
        .with_header(header.clone())
        .overlaid(call_query, call_header)
        .with_method(method)
}
