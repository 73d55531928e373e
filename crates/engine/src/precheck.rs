//! Gates evaluated before a mutating call.

use serde_json::Value;
use tether_api::RequestOptions;
use tether_types::{HttpMethod, PrecheckApi, PrecheckStep};
use tether_util::{Template, expand};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::{Engine, EngineError, locks::PrecheckGuard, poll::poll_until_done};

impl Engine {
    /// Run `steps` in order and return the locks they took.
    ///
    /// `overlay` carries the caller's query and headers for API probes;
    /// templates in probe paths and mutex names expand against `body`, with
    /// `$(path)` standing for `path`. When a step fails every lock taken so
    /// far is released before the error is returned.
    pub async fn precheck(
        &self,
        cancel: &CancellationToken,
        steps: &[PrecheckStep],
        overlay: &RequestOptions,
        path: &str,
        body: &Value,
    ) -> Result<PrecheckGuard, EngineError> {
        let mut guard = PrecheckGuard::default();
        for step in steps {
            match step {
                PrecheckStep::Mutex(raw) => {
                    let name = self
                        .lock_name(raw, path, body)
                        .map_err(|err| EngineError::precheck(format!("mutex {raw}"), err))?;
                    let lock = self
                        .locks()
                        .acquire(&name, cancel)
                        .await
                        .map_err(|err| EngineError::precheck(format!("mutex {name}"), err))?;
                    guard.push(lock);
                }
                PrecheckStep::Api(api) => {
                    self.probe(cancel, api, overlay, path, body)
                        .await
                        .map_err(|err| EngineError::precheck(format!("api {}", api.path), err))?;
                }
            }
        }
        if !steps.is_empty() {
            debug!(steps = steps.len(), locks = ?guard.names().collect::<Vec<_>>(), "prechecks passed");
        }
        Ok(guard)
    }

    fn lock_name(&self, raw: &str, path: &str, body: &Value) -> Result<String, EngineError> {
        if !raw.contains('$') && !raw.contains("#(") {
            return Ok(raw.to_string());
        }
        Ok(Template::parse(raw)?.render_raw(&self.context(path), body)?)
    }

    async fn probe(
        &self,
        cancel: &CancellationToken,
        api: &PrecheckApi,
        overlay: &RequestOptions,
        path: &str,
        body: &Value,
    ) -> Result<(), EngineError> {
        let target = expand(&api.path, &self.context(path), body)?;
        let options = overlay.clone().overlaid(&api.query, &api.poll.header);
        let initial = self
            .client()
            .execute(cancel, HttpMethod::Get, &target, None, &options)
            .await?;
        poll_until_done(self.client(), self.clock(), cancel, initial, &api.poll).await?;
        info!(path = %target, "precheck satisfied");
        Ok(())
    }
}
