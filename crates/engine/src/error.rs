use tether_api::ApiError;
use tether_types::{ConfigError, OperationState, ResourceState};
use tether_util::{PathError, ReconcileError};
use thiserror::Error;

/// Errors returned by the engine's lifecycle entry points.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Path(#[from] PathError),

    #[error(transparent)]
    Reconcile(#[from] ReconcileError),

    #[error("response is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Polling reached a status that is neither success nor pending.
    #[error("polling stopped on unexpected status '{status}'")]
    PollFailure { status: String },

    /// The poll URL locator found nothing in the initial response.
    #[error("poll URL not found at '{locator}'")]
    PollUrlMissing { locator: String },

    /// A create probe found the resource already present.
    #[error("resource '{id}' already exists")]
    AlreadyExists { id: String },

    /// The resource disappeared while the engine was still working on it.
    #[error("resource '{id}' no longer exists")]
    Gone { id: String },

    /// A selector matched nothing in a response that must contain it.
    #[error("selector '{selector}' matched nothing")]
    Selection { selector: String },

    #[error("cannot compute lease expiry: {reason}")]
    Expiry { reason: String },

    #[error("private state is corrupt: {reason}")]
    PrivateState { reason: String },

    #[error("precheck '{step}' failed: {source}")]
    Precheck {
        step: String,
        #[source]
        source: Box<EngineError>,
    },

    #[error("operation cancelled")]
    Cancelled,

    /// The mutation went through but a later step failed. `state` holds what
    /// the host must keep so the next refresh can finish reconciliation.
    #[error("{source}")]
    Partial {
        state: Box<PartialState>,
        #[source]
        source: Box<EngineError>,
    },
}

/// State recovered from a partially completed mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum PartialState {
    Resource(ResourceState),
    Operation(OperationState),
}

impl EngineError {
    pub fn expiry(reason: impl Into<String>) -> Self {
        Self::Expiry { reason: reason.into() }
    }

    pub fn private_state(reason: impl Into<String>) -> Self {
        Self::PrivateState { reason: reason.into() }
    }

    pub fn precheck(step: impl Into<String>, source: EngineError) -> Self {
        Self::Precheck {
            step: step.into(),
            source: Box::new(source),
        }
    }

    /// Wrap `self` with the resource state to keep.
    pub fn partial_resource(self, state: ResourceState) -> Self {
        self.partial(PartialState::Resource(state))
    }

    /// Wrap `self` with the operation state to keep.
    pub fn partial_operation(self, state: OperationState) -> Self {
        self.partial(PartialState::Operation(state))
    }

    fn partial(self, state: PartialState) -> Self {
        match self {
            Self::Partial { source, .. } => Self::Partial {
                state: Box::new(state),
                source,
            },
            other => Self::Partial {
                state: Box::new(state),
                source: Box::new(other),
            },
        }
    }

    /// True when the caller's cancellation ended the call, however deeply
    /// the cancellation is wrapped.
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Cancelled | Self::Api(ApiError::Cancelled) => true,
            Self::Precheck { source, .. } | Self::Partial { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }

    /// The state to keep, when the failure happened after a mutation.
    pub fn partial_state(&self) -> Option<&PartialState> {
        match self {
            Self::Partial { state, .. } => Some(state),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tether_types::ResourceConfig;

    #[test]
    fn cancellation_is_detected_through_wrappers() {
        let error = EngineError::precheck("mutex a", EngineError::Api(ApiError::Cancelled));
        assert!(error.is_cancelled());
        assert!(!EngineError::PollFailure { status: "Failed".into() }.is_cancelled());
    }

    #[test]
    fn partial_wrapping_replaces_state_without_nesting() {
        let first = ResourceState::pending("/things/1", ResourceConfig::new("/things", json!({})));
        let second = ResourceState::pending("/things/2", ResourceConfig::new("/things", json!({})));
        let error = EngineError::PollFailure { status: "Failed".into() }
            .partial_resource(first)
            .partial_resource(second.clone());

        let EngineError::Partial { state, source } = &error else {
            panic!("expected partial error");
        };
        assert_eq!(**state, PartialState::Resource(second));
        assert!(matches!(**source, EngineError::PollFailure { .. }));
        assert_eq!(error.to_string(), "polling stopped on unexpected status 'Failed'");
    }
}
