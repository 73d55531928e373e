//! Configuration documents and the state files the CLI reads back.

use std::{fs, path::Path};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tether_engine::{Diagnostics, PrivateStore};
use tether_types::{ActionConfig, EphemeralConfig, ListConfig, OperationConfig, ProviderConfig, ResourceConfig};

/// A YAML or JSON document: provider settings plus one section per kind.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Document {
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub resource: Option<ResourceConfig>,
    #[serde(default)]
    pub operation: Option<OperationConfig>,
    #[serde(default)]
    pub action: Option<ActionConfig>,
    #[serde(default)]
    pub ephemeral: Option<EphemeralConfig>,
    #[serde(default)]
    pub list: Option<ListConfig>,
}

impl Document {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).with_context(|| format!("failed to read config file: {}", path.display()))?;
        serde_yaml::from_str(&content).with_context(|| format!("invalid config document: {}", path.display()))
    }

    pub fn resource(&self) -> Result<&ResourceConfig> {
        self.resource.as_ref().context("document has no 'resource' section")
    }

    pub fn operation(&self) -> Result<&OperationConfig> {
        self.operation.as_ref().context("document has no 'operation' section")
    }

    pub fn action(&self) -> Result<&ActionConfig> {
        self.action.as_ref().context("document has no 'action' section")
    }

    pub fn ephemeral(&self) -> Result<&EphemeralConfig> {
        self.ephemeral.as_ref().context("document has no 'ephemeral' section")
    }

    pub fn list(&self) -> Result<&ListConfig> {
        self.list.as_ref().context("document has no 'list' section")
    }
}

/// State printed by a command. Feeding it back through `--state` resumes
/// from it; diagnostics are ignored on the way in.
#[derive(Debug, Serialize)]
pub struct Output<T> {
    pub state: T,
    #[serde(skip_serializing_if = "PrivateStore::is_empty")]
    pub private: PrivateStore,
    #[serde(skip_serializing_if = "Diagnostics::is_empty")]
    pub diagnostics: Diagnostics,
}

#[derive(Debug, Deserialize)]
pub struct Saved<T> {
    pub state: T,
    #[serde(default)]
    pub private: PrivateStore,
}

impl<T: DeserializeOwned> Saved<T> {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).with_context(|| format!("failed to read state file: {}", path.display()))?;
        serde_json::from_str(&content).with_context(|| format!("invalid state file: {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use serde_json::json;
    use tempfile::NamedTempFile;
    use tether_engine::PrivateState;
    use tether_types::{HttpMethod, ResourceState};

    use super::*;

    fn file_with(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn loads_a_yaml_resource_document() {
        let file = file_with(
            r#"
provider:
  base_url: https://api.example.com/v1
  header:
    Authorization: Bearer abc
resource:
  path: /things
  body:
    name: a
  read_path: $(path)/$(body.id)
  update_method: PATCH
  poll_create:
    status_locator: body.status
    success: Succeeded
    pending: [Running]
"#,
        );
        let document = Document::load(file.path()).unwrap();
        assert_eq!(document.provider.resolve_base_url().unwrap(), "https://api.example.com/v1");

        let resource = document.resource().unwrap();
        assert_eq!(resource.body, json!({ "name": "a" }));
        assert_eq!(resource.update_method(), HttpMethod::Patch);
        assert!(resource.poll_create.is_some());
        assert!(document.operation().is_err());
    }

    #[test]
    fn json_documents_load_too() {
        let file = file_with(r#"{"list": {"path": "/things", "selector": "value"}}"#);
        let document = Document::load(file.path()).unwrap();
        assert_eq!(document.list().unwrap().selector.as_deref(), Some("value"));
    }

    #[test]
    fn unknown_sections_are_rejected() {
        let file = file_with("resources:\n  path: /things\n");
        assert!(Document::load(file.path()).is_err());
    }

    #[test]
    fn printed_output_reads_back_as_saved_state() {
        let mut private = PrivateStore::new();
        private.set("ephemeral_body", Some(b"{}".to_vec()));
        let mut diagnostics = Diagnostics::new();
        diagnostics.warn("drift", "name differs");
        let output = Output {
            state: ResourceState::pending("/things/1", ResourceConfig::new("/things", json!({ "name": "a" }))),
            private,
            diagnostics,
        };
        let file = file_with(&serde_json::to_string_pretty(&output).unwrap());

        let saved: Saved<ResourceState> = Saved::load(file.path()).unwrap();
        assert_eq!(saved.state, output.state);
        assert_eq!(saved.private, output.private);
    }
}
