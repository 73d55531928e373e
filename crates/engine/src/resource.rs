//! Lifecycle of fully managed resources: create, read, update, delete and
//! import.

use serde_json::Value;
use tether_api::{ApiResponse, ReadOutcome, RequestOptions};
use tether_types::{ConfigError, HttpMethod, ImportSpec, ResourceConfig, ResourceState};
use tether_util::{
    JsonPath, create_merge_patch, expand, filter_attrs, modify_body, modify_body_for_import, render_json_template,
    render_json_value,
};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span};

use crate::{
    Diagnostics, EngineError, ephemeral_body,
    orchestrator::{Engine, layered_options},
    private_state::PrivateState,
    validate::{parse_paths, validate_resource},
};

impl Engine {
    /// Create the resource described by `config` and read it back.
    ///
    /// Once the create call has succeeded, any later failure is returned as
    /// [`EngineError::Partial`] carrying the state to keep.
    pub async fn create_resource(
        &self,
        cancel: &CancellationToken,
        config: &ResourceConfig,
        private: &mut dyn PrivateState,
        diagnostics: &mut Diagnostics,
    ) -> Result<ResourceState, EngineError> {
        let span = info_span!("resource.create", path = %config.path);
        self.create_resource_inner(cancel, config, private, diagnostics)
            .instrument(span)
            .await
    }

    async fn create_resource_inner(
        &self,
        cancel: &CancellationToken,
        config: &ResourceConfig,
        private: &mut dyn PrivateState,
        diagnostics: &mut Diagnostics,
    ) -> Result<ResourceState, EngineError> {
        validate_resource(config)?;
        let method = config.create_method();
        let mut options = layered_options(method, &config.query, &config.header, &config.create_query, &config.create_header);
        options.merge_patch_disabled = config.merge_patch_disabled;

        if config.check_existance || method == HttpMethod::Put {
            self.ensure_absent(cancel, config).await?;
        }
        let _guard = self
            .precheck(cancel, &config.precheck_create, &options, &config.path, &config.body)
            .await?;

        let body = ephemeral_body::merged(&config.body, config.ephemeral_body.as_ref());
        let response = self.client().create(cancel, &config.path, &body, &options).await?;

        let id = self
            .created_id(config, &response)
            .map_err(|err| err.partial_resource(ResourceState::pending(config.path.clone(), persisted(config))))?;
        let state = ResourceState::pending(id, persisted(config));
        info!(id = %state.id, status = %response.status(), "resource created");

        let finished = async {
            ephemeral_body::set(&mut *private, config.ephemeral_body.as_ref())?;
            self.maybe_poll(cancel, response, config.poll_create.as_ref()).await?;
            self.read_resource(cancel, &state, &*private, false)
                .await?
                .ok_or_else(|| EngineError::Gone { id: state.id.clone() })
        }
        .await;

        match finished {
            Ok(read) => {
                if read.config.body != config.body {
                    diagnostics.warn(
                        format!("resource '{}' differs from its configuration after create", read.id),
                        serde_json::to_string(&read.config.body).unwrap_or_default(),
                    );
                }
                Ok(read)
            }
            Err(err) => Err(err.partial_resource(state)),
        }
    }

    /// Identifier of a freshly created resource. The response body is only
    /// parsed when `create_selector` or `read_path` needs it.
    fn created_id(&self, config: &ResourceConfig, response: &ApiResponse) -> Result<String, EngineError> {
        let Some(read_path) = &config.read_path else {
            return Ok(config.path.clone());
        };
        let mut created = response.json()?;
        if let Some(selector) = &config.create_selector {
            created = JsonPath::parse(selector)?
                .get(&created)
                .ok_or_else(|| EngineError::Selection {
                    selector: selector.clone(),
                })?;
        }
        Ok(expand(read_path, &self.context(&config.path), &created)?)
    }

    /// Probe the identifier before creating; only a 404 lets the create go ahead.
    async fn ensure_absent(&self, cancel: &CancellationToken, config: &ResourceConfig) -> Result<(), EngineError> {
        let id = match &config.read_path {
            Some(read_path) => expand(read_path, &self.context(&config.path), &config.body)?,
            None => config.path.clone(),
        };
        match self.client().read(cancel, &id, &read_options(config)).await? {
            ReadOutcome::NotFound => Ok(()),
            ReadOutcome::Found(_) => Err(EngineError::AlreadyExists { id }),
        }
    }

    /// Read the resource behind `state`.
    ///
    /// `Ok(None)` means the resource is gone and should be dropped. When
    /// `importing` is set the body in `state` is treated as an import
    /// template rather than a desired document.
    pub async fn read_resource(
        &self,
        cancel: &CancellationToken,
        state: &ResourceState,
        private: &dyn PrivateState,
        importing: bool,
    ) -> Result<Option<ResourceState>, EngineError> {
        let span = info_span!("resource.read", id = %state.id, importing);
        self.read_resource_inner(cancel, state, private, importing)
            .instrument(span)
            .await
    }

    async fn read_resource_inner(
        &self,
        cancel: &CancellationToken,
        state: &ResourceState,
        private: &dyn PrivateState,
        importing: bool,
    ) -> Result<Option<ResourceState>, EngineError> {
        let config = &state.config;
        let ReadOutcome::Found(response) = self.client().read(cancel, &state.id, &read_options(config)).await? else {
            info!(id = %state.id, "resource not found");
            return Ok(None);
        };

        let mut body = response.json()?;
        if let Some(selector) = &config.read_selector {
            let Some(selected) = JsonPath::parse(selector)?.get(&body) else {
                info!(id = %state.id, selector = %selector, "read selector matched nothing; treating as not found");
                return Ok(None);
            };
            body = selected;
        }
        if let Some(template) = &config.read_response_template {
            body = render_json_template(template, &self.context(&config.path), &body)?;
        }
        ephemeral_body::strip(private, &mut body)?;

        let managed = if importing {
            modify_body_for_import(&config.body, &body)?
        } else {
            let write_only = parse_paths(&config.write_only_attrs)?;
            modify_body(&config.body, &body, &write_only)
        };
        let output = filter_attrs(&body, &parse_paths(&config.output_attrs)?);
        debug!(id = %state.id, "resource read");

        let mut next = state.clone();
        next.config.body = managed;
        next.output = output;
        Ok(Some(next))
    }

    /// Bring the resource in `prior` to `config` and read it back.
    ///
    /// No request is sent when the desired body is unchanged and the
    /// ephemeral body has not moved.
    pub async fn update_resource(
        &self,
        cancel: &CancellationToken,
        prior: &ResourceState,
        config: &ResourceConfig,
        private: &mut dyn PrivateState,
    ) -> Result<ResourceState, EngineError> {
        let span = info_span!("resource.update", id = %prior.id);
        self.update_resource_inner(cancel, prior, config, private)
            .instrument(span)
            .await
    }

    async fn update_resource_inner(
        &self,
        cancel: &CancellationToken,
        prior: &ResourceState,
        config: &ResourceConfig,
        private: &mut dyn PrivateState,
    ) -> Result<ResourceState, EngineError> {
        validate_resource(config)?;
        let state = ResourceState {
            id: prior.id.clone(),
            config: persisted(config),
            output: prior.output.clone(),
        };
        let ephemeral_changed = ephemeral_body::diff(private, config.ephemeral_body.as_ref())?;
        if prior.config.body == config.body && !ephemeral_changed {
            debug!(id = %prior.id, "body unchanged; update skipped");
            return Ok(state);
        }

        let method = config.update_method();
        let mut options = layered_options(method, &config.query, &config.header, &config.update_query, &config.update_header);
        options.merge_patch_disabled = config.merge_patch_disabled;
        let _guard = self
            .precheck(cancel, &config.precheck_update, &options, &config.path, &config.body)
            .await?;

        let desired = if method == HttpMethod::Patch && !config.merge_patch_disabled {
            create_merge_patch(&prior.config.body, &config.body)
        } else {
            config.body.clone()
        };
        let body = ephemeral_body::merged(&desired, config.ephemeral_body.as_ref());
        let target = match &config.update_path {
            Some(update_path) => expand(update_path, &self.context(&prior.id), &prior.output)?,
            None => prior.id.clone(),
        };
        let response = self.client().update(cancel, &target, &body, &options).await?;
        info!(id = %prior.id, status = %response.status(), "resource updated");

        let finished = async {
            ephemeral_body::set(&mut *private, config.ephemeral_body.as_ref())?;
            self.maybe_poll(cancel, response, config.poll_update.as_ref()).await?;
            self.read_resource(cancel, &state, &*private, false)
                .await?
                .ok_or_else(|| EngineError::Gone { id: state.id.clone() })
        }
        .await;
        finished.map_err(|err| err.partial_resource(state))
    }

    /// Delete the resource in `state`. A resource that is already gone
    /// counts as deleted.
    pub async fn delete_resource(
        &self,
        cancel: &CancellationToken,
        state: &ResourceState,
        private: &mut dyn PrivateState,
    ) -> Result<(), EngineError> {
        let span = info_span!("resource.delete", id = %state.id);
        self.delete_resource_inner(cancel, state, private)
            .instrument(span)
            .await
    }

    async fn delete_resource_inner(
        &self,
        cancel: &CancellationToken,
        state: &ResourceState,
        private: &mut dyn PrivateState,
    ) -> Result<(), EngineError> {
        let config = &state.config;
        let method = config.delete_method();
        let options = layered_options(method, &config.query, &config.header, &config.delete_query, &config.delete_header);
        let _guard = self
            .precheck(cancel, &config.precheck_delete, &options, &config.path, &config.body)
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
                info!(id = %state.id, "resource deleted");
            }
            None => info!(id = %state.id, "resource already deleted"),
        }
        ephemeral_body::set(private, None)
    }

    /// Import a resource from an identity emitted by listing.
    ///
    /// `import_id` is the JSON encoding of an [`ImportSpec`]. `Ok(None)` means
    /// nothing exists at the identified path.
    pub async fn import_resource(
        &self,
        cancel: &CancellationToken,
        import_id: &str,
        private: &dyn PrivateState,
    ) -> Result<Option<ResourceState>, EngineError> {
        let spec: ImportSpec = serde_json::from_str(import_id).map_err(|err| ConfigError::Document {
            reason: format!("import id is not a valid identity: {err}"),
        })?;
        let span = info_span!("resource.import", id = %spec.id);
        async {
            let state = ResourceState::pending(spec.id.clone(), import_config(&spec));
            let imported = self.read_resource(cancel, &state, private, true).await?;
            if imported.is_some() {
                info!(id = %spec.id, "resource imported");
            }
            Ok(imported)
        }
        .instrument(span)
        .await
    }
}

/// Configuration as recorded in state: everything but the ephemeral body.
fn persisted(config: &ResourceConfig) -> ResourceConfig {
    ResourceConfig {
        ephemeral_body: None,
        ..config.clone()
    }
}

fn import_config(spec: &ImportSpec) -> ResourceConfig {
    let mut config = ResourceConfig::new(spec.path.clone(), spec.body.clone().unwrap_or(Value::Null));
    config.query = spec.query.clone().unwrap_or_default();
    config.header = spec.header.clone().unwrap_or_default();
    config.read_selector = spec.read_selector.clone();
    config.read_response_template = spec.read_response_template.clone();
    config
}

fn read_options(config: &ResourceConfig) -> RequestOptions {
    layered_options(HttpMethod::Get, &config.query, &config.header, &config.read_query, &config.read_header)
}
