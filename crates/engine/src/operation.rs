//! Operations: a single call on create and update, an optional call on
//! delete, and the raw response kept as output.

use serde_json::Value;
use tether_api::ApiResponse;
use tether_types::{HttpMethod, OperationConfig, OperationState};
use tether_util::{expand, filter_attrs, render_json_value};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span};

use crate::{
    EngineError, ephemeral_body,
    orchestrator::{Engine, layered_options},
    private_state::PrivateState,
    validate::{parse_paths, validate_operation},
};

impl Engine {
    pub async fn create_operation(
        &self,
        cancel: &CancellationToken,
        config: &OperationConfig,
        private: &mut dyn PrivateState,
    ) -> Result<OperationState, EngineError> {
        let span = info_span!("operation.create", path = %config.path, method = %config.method);
        self.run_operation(cancel, config, private).instrument(span).await
    }

    /// Re-run the operation when its configuration or ephemeral body changed.
    pub async fn update_operation(
        &self,
        cancel: &CancellationToken,
        prior: &OperationState,
        config: &OperationConfig,
        private: &mut dyn PrivateState,
    ) -> Result<OperationState, EngineError> {
        let span = info_span!("operation.update", id = %prior.id, method = %config.method);
        async {
            let changed = prior.config != persisted(config)
                || ephemeral_body::diff(&*private, config.ephemeral_body.as_ref())?;
            if !changed {
                debug!(id = %prior.id, "operation unchanged; update skipped");
                return Ok(prior.clone());
            }
            self.run_operation(cancel, config, &mut *private).await
        }
        .instrument(span)
        .await
    }

    async fn run_operation(
        &self,
        cancel: &CancellationToken,
        config: &OperationConfig,
        private: &mut dyn PrivateState,
    ) -> Result<OperationState, EngineError> {
        validate_operation(config)?;
        let options = layered_options(config.method, &config.query, &config.header, &Default::default(), &Default::default());
        let probe_body = config.body.clone().unwrap_or(Value::Null);
        let _guard = self
            .precheck(cancel, &config.precheck, &options, &config.path, &probe_body)
            .await?;

        let body = match (&config.body, &config.ephemeral_body) {
            (None, None) => None,
            (body, ephemeral) => Some(ephemeral_body::merged(
                body.as_ref().unwrap_or(&Value::Null),
                ephemeral.as_ref(),
            )),
        };
        let response = self.client().operation(cancel, &config.path, body.as_ref(), &options).await?;
        let raw = response.json()?;
        let id = match &config.id_builder {
            Some(id_builder) => expand(id_builder, &self.context(&config.path), &raw)?,
            None => config.path.clone(),
        };
        info!(id = %id, status = %response.status(), "operation sent");

        let mut state = OperationState {
            id,
            config: persisted(config),
            output: Value::Null,
        };
        let finished = self
            .finish_operation(cancel, config, &mut *private, response, raw)
            .await;
        match finished {
            Ok(output) => {
                state.output = output;
                Ok(state)
            }
            Err(err) => Err(err.partial_operation(state)),
        }
    }

    async fn finish_operation(
        &self,
        cancel: &CancellationToken,
        config: &OperationConfig,
        private: &mut dyn PrivateState,
        response: ApiResponse,
        mut raw: Value,
    ) -> Result<Value, EngineError> {
        ephemeral_body::set(&mut *private, config.ephemeral_body.as_ref())?;
        self.maybe_poll(cancel, response, config.poll.as_ref()).await?;
        ephemeral_body::strip(&*private, &mut raw)?;
        output_of(&raw, &config.output_attrs)
    }

    /// Run the configured delete call, if any. A 404 counts as deleted.
    pub async fn delete_operation(
        &self,
        cancel: &CancellationToken,
        state: &OperationState,
        private: &mut dyn PrivateState,
    ) -> Result<(), EngineError> {
        let span = info_span!("operation.delete", id = %state.id);
        async {
            let config = &state.config;
            if !config.has_delete() {
                debug!(id = %state.id, "operation has no delete call");
                return ephemeral_body::set(&mut *private, None);
            }

            let method = config.delete_method.unwrap_or(HttpMethod::Delete);
            let options = layered_options(method, &config.query, &config.header, &Default::default(), &Default::default());
            let probe_body = config.body.clone().unwrap_or(Value::Null);
            let _guard = self
                .precheck(cancel, &config.precheck_delete, &options, &config.path, &probe_body)
                .await?;

            let context = self.context(&state.id);
            let target = match &config.delete_path {
                Some(delete_path) => expand(delete_path, &context, &state.output)?,
                None => state.id.clone(),
            };
            let body = config
                .delete_body
                .clone()
                .map(|body| render_json_value(body, &context, &state.output))
                .transpose()?;
            match self.client().delete(cancel, &target, body.as_ref(), &options).await? {
                Some(response) => {
                    self.maybe_poll(cancel, response, config.poll_delete.as_ref()).await?;
                    info!(id = %state.id, "operation deleted");
                }
                None => info!(id = %state.id, "operation target already deleted"),
            }
            ephemeral_body::set(&mut *private, None)
        }
        .instrument(span)
        .await
    }
}

/// Whether an operation's output must be treated as unknown at plan time:
/// true when the ephemeral body differs from the one last sent.
pub fn operation_output_changes(private: &dyn PrivateState, current: Option<&Value>) -> Result<bool, EngineError> {
    ephemeral_body::diff(private, current)
}

fn persisted(config: &OperationConfig) -> OperationConfig {
    OperationConfig {
        ephemeral_body: None,
        ..config.clone()
    }
}

/// `raw` filtered through `output_attrs`.
pub(crate) fn output_of(raw: &Value, output_attrs: &[String]) -> Result<Value, EngineError> {
    Ok(filter_attrs(raw, &parse_paths(output_attrs)?))
}
