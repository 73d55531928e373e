//! Ephemeral resources: leases that are opened, renewed while in use and
//! closed when the host is done with them.
//!
//! Open expands the renew and close requests against the open response and
//! keeps them in private state, so renew and close need nothing but that
//! state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tether_api::ApiResponse;
use tether_types::{EphemeralConfig, ExpiryType, Locator, RequestSpec};
use tether_util::{
    date_handling::{parse_duration, parse_instant, parse_scaled_duration},
    expand, locate, render_json_value,
};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span};

use crate::{
    Diagnostics, EngineError,
    operation::output_of,
    orchestrator::{Engine, layered_options},
    private_state::{PrivateState, get_json, keys, set_json},
    validate::validate_ephemeral,
};

/// Result of opening a lease.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OpenedEphemeral {
    /// Response body filtered through `output_attrs`.
    pub result: Value,
    /// When the host should renew, if the lease expires.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub renew_at: Option<DateTime<Utc>>,
}

/// How to find and interpret the expiry in a response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct Expiry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expiry_type: Option<ExpiryType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expiry_locator: Option<Locator>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expiry_unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expiry_ahead: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct RenewRecord {
    request: RequestSpec,
    #[serde(default)]
    expiry: Expiry,
}

impl Expiry {
    fn from_config(config: &EphemeralConfig) -> Self {
        Self {
            expiry_type: config.expiry_type.clone(),
            expiry_locator: config.expiry_locator.clone(),
            expiry_unit: config.expiry_unit.clone(),
            expiry_ahead: config.expiry_ahead.clone(),
        }
    }

    /// `expiry - ahead`, where the expiry comes from `response`.
    fn renew_at(&self, now: DateTime<Utc>, response: &ApiResponse) -> Result<Option<DateTime<Utc>>, EngineError> {
        let Some(expiry_type) = &self.expiry_type else {
            return Ok(None);
        };
        let Some(locator) = &self.expiry_locator else {
            return Err(EngineError::expiry("expiry_locator is not set"));
        };
        let Some(raw) = locate(locator, response)?.filter(|value| !value.is_empty()) else {
            return Err(EngineError::expiry(format!("no value at '{locator}'")));
        };

        let ahead = to_chrono(parse_duration(self.expiry_ahead.as_deref().unwrap_or("0"))?)?;
        let expires = match expiry_type {
            ExpiryType::Duration => now + to_chrono(parse_scaled_duration(&raw, self.expiry_unit.as_deref())?)?,
            ExpiryType::Time(layout) => parse_instant(&raw, layout.as_deref())?,
        };
        Ok(Some(expires - ahead))
    }
}

fn to_chrono(duration: std::time::Duration) -> Result<chrono::Duration, EngineError> {
    chrono::Duration::from_std(duration).map_err(|err| EngineError::expiry(err.to_string()))
}

impl Engine {
    /// Open the lease described by `config`.
    pub async fn open_ephemeral(
        &self,
        cancel: &CancellationToken,
        config: &EphemeralConfig,
        private: &mut dyn PrivateState,
    ) -> Result<OpenedEphemeral, EngineError> {
        let span = info_span!("ephemeral.open", path = %config.path);
        async {
            validate_ephemeral(config)?;
            let options = layered_options(config.method, &Default::default(), &Default::default(), &config.query, &config.header);
            let response = self
                .client()
                .operation(cancel, &config.path, config.body.as_ref(), &options)
                .await?;
            let raw = response.json()?;
            let expiry = Expiry::from_config(config);
            let renew_at = expiry.renew_at(self.clock().now(), &response)?;

            let renew = config
                .renew
                .as_ref()
                .map(|spec| {
                    Ok::<_, EngineError>(RenewRecord {
                        request: self.resolve_request(config, spec, &raw)?,
                        expiry: expiry.clone(),
                    })
                })
                .transpose()?;
            let close = config
                .close
                .as_ref()
                .map(|spec| self.resolve_request(config, spec, &raw))
                .transpose()?;
            set_json(&mut *private, keys::RENEW, renew.as_ref())?;
            set_json(&mut *private, keys::CLOSE, close.as_ref())?;

            info!(status = %response.status(), renew_at = ?renew_at, "lease opened");
            Ok(OpenedEphemeral {
                result: output_of(&raw, &config.output_attrs)?,
                renew_at,
            })
        }
        .instrument(span)
        .await
    }

    /// Expand `spec` against the open response and layer the lease's query
    /// and headers beneath its own.
    fn resolve_request(&self, config: &EphemeralConfig, spec: &RequestSpec, opened: &Value) -> Result<RequestSpec, EngineError> {
        let context = self.context(&config.path);
        let options = layered_options(spec.method, &config.query, &config.header, &spec.query, &spec.header);
        Ok(RequestSpec {
            path: expand(&spec.path, &context, opened)?,
            method: spec.method,
            body: spec
                .body
                .clone()
                .map(|body| render_json_value(body, &context, opened))
                .transpose()?,
            query: options.query,
            header: options.header,
        })
    }

    /// Renew the lease recorded in `private`.
    ///
    /// Returns the next renewal instant. `Ok(None)` means either nothing is
    /// renewable or the renewed lease carries no expiry.
    pub async fn renew_ephemeral(
        &self,
        cancel: &CancellationToken,
        private: &dyn PrivateState,
    ) -> Result<Option<DateTime<Utc>>, EngineError> {
        let span = info_span!("ephemeral.renew");
        async {
            let Some(record) = get_json::<RenewRecord>(private, keys::RENEW)? else {
                debug!("lease has no renew request");
                return Ok(None);
            };
            let response = self.send_recorded(cancel, &record.request).await?;
            let renew_at = record.expiry.renew_at(self.clock().now(), &response)?;
            info!(path = %record.request.path, renew_at = ?renew_at, "lease renewed");
            Ok(renew_at)
        }
        .instrument(span)
        .await
    }

    /// Close the lease recorded in `private` and clear its private state.
    ///
    /// A failing close request is reported in `diagnostics` and the state is
    /// cleared regardless; only cancellation is returned as an error.
    pub async fn close_ephemeral(
        &self,
        cancel: &CancellationToken,
        private: &mut dyn PrivateState,
        diagnostics: &mut Diagnostics,
    ) -> Result<(), EngineError> {
        let span = info_span!("ephemeral.close");
        async {
            let outcome = match get_json::<RequestSpec>(&*private, keys::CLOSE) {
                Ok(Some(request)) => self.send_recorded(cancel, &request).await.map(|_| true),
                Ok(None) => Ok(false),
                Err(err) => Err(err),
            };
            private.set(keys::RENEW, None);
            private.set(keys::CLOSE, None);

            match outcome {
                Ok(true) => {
                    info!("lease closed");
                    Ok(())
                }
                Ok(false) => {
                    debug!("lease has no close request");
                    Ok(())
                }
                Err(err) if err.is_cancelled() => Err(err),
                Err(err) => {
                    diagnostics.error("failed to close lease", err.to_string());
                    Ok(())
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn send_recorded(&self, cancel: &CancellationToken, request: &RequestSpec) -> Result<ApiResponse, EngineError> {
        let options = layered_options(request.method, &request.query, &request.header, &Default::default(), &Default::default());
        Ok(self
            .client()
            .operation(cancel, &request.path, request.body.as_ref(), &options)
            .await?)
    }
}
