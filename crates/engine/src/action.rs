//! One-shot actions: a single call with no state kept afterwards.

use serde_json::Value;
use tether_types::ActionConfig;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, info, info_span};

use crate::{
    EngineError,
    operation::output_of,
    orchestrator::{Engine, layered_options},
    validate::validate_action,
};

impl Engine {
    /// Run the action and return its filtered response body.
    pub async fn run_action(&self, cancel: &CancellationToken, config: &ActionConfig) -> Result<Value, EngineError> {
        let span = info_span!("action.run", path = %config.path, method = %config.method);
        async {
            validate_action(config)?;
            let options = layered_options(config.method, &Default::default(), &Default::default(), &config.query, &config.header);
            let probe_body = config.body.clone().unwrap_or(Value::Null);
            let _guard = self
                .precheck(cancel, &config.precheck, &options, &config.path, &probe_body)
                .await?;

            let response = self
                .client()
                .operation(cancel, &config.path, config.body.as_ref(), &options)
                .await?;
            let raw = response.json()?;
            info!(status = %response.status(), "action sent");
            self.maybe_poll(cancel, response, config.poll.as_ref()).await?;
            output_of(&raw, &config.output_attrs)
        }
        .instrument(span)
        .await
    }
}
