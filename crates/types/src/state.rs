//! State the host persists between engine calls.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Headers, OperationConfig, Query, ResourceConfig};

/// Persisted state of a managed resource.
///
/// The configuration is flattened next to the identifier and the raw
/// `output`, so the state document carries everything needed to read,
/// update or delete the resource without the original configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceState {
    /// Canonical path used by read, update and delete.
    pub id: String,
    #[serde(flatten)]
    pub config: ResourceConfig,
    /// Last response body observed for the resource.
    #[serde(default)]
    pub output: Value,
}

impl ResourceState {
    /// State holding only an identifier, as written right after a create call.
    pub fn pending(id: impl Into<String>, config: ResourceConfig) -> Self {
        Self {
            id: id.into(),
            config,
            output: Value::Null,
        }
    }
}

/// Persisted state of an operation resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationState {
    pub id: String,
    #[serde(flatten)]
    pub config: OperationConfig,
    #[serde(default)]
    pub output: Value,
}

/// Identity emitted by listing and consumed by import.
///
/// The JSON encoding of this struct is the import identifier: the host hands
/// it back verbatim and the engine decodes it into pre-read state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportSpec {
    /// Identifier (read path) of the resource.
    pub id: String,
    /// Creation path recorded in state.
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<Query>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header: Option<Headers>,
    /// Template whose keys select which response fields become managed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_selector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_response_template: Option<String>,
}

impl ImportSpec {
    pub fn new(id: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
            query: None,
            header: None,
            body: None,
            read_selector: None,
            read_response_template: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn resource_state_flattens_configuration() {
        let state = ResourceState {
            id: "/things/1".into(),
            config: ResourceConfig::new("/things", json!({ "name": "a" })),
            output: json!({ "name": "a", "id": "1" }),
        };
        let value = serde_json::to_value(&state).unwrap();
        assert_eq!(value["id"], "/things/1");
        assert_eq!(value["path"], "/things");
        assert_eq!(value["body"], json!({ "name": "a" }));

        let back: ResourceState = serde_json::from_value(value).unwrap();
        assert_eq!(back, state);
    }

    #[test]
    fn import_spec_omits_absent_fields() {
        let spec = ImportSpec::new("/things/1", "/things");
        assert_eq!(serde_json::to_string(&spec).unwrap(), r#"{"id":"/things/1","path":"/things"}"#);
    }
}
