//! Listing a collection into importable identities.

use serde::Serialize;
use serde_json::Value;
use tether_types::{ImportSpec, ListConfig};
use tether_util::{JsonPath, expand, http::to_request_path, locate};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::{
    EngineError,
    orchestrator::{Engine, layered_options},
    validate::validate_list,
};

/// One element of a listed collection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListedResource {
    /// JSON encoding of `spec`, accepted by
    /// [`Engine::import_resource`](crate::Engine::import_resource).
    pub import_id: String,
    pub spec: ImportSpec,
    /// The element as returned by the server.
    pub value: Value,
}

impl Engine {
    /// Enumerate the collection at `config.path`, following next links.
    pub async fn list_resources(&self, cancel: &CancellationToken, config: &ListConfig) -> Result<Vec<ListedResource>, EngineError> {
        let span = info_span!("list", path = %config.path, method = %config.method);
        async {
            validate_list(config)?;
            let selector = config.selector.as_deref().map(JsonPath::parse).transpose()?;
            let options = layered_options(config.method, &Default::default(), &Default::default(), &config.query, &config.header);
            let context = self.context(&config.path);

            let mut listed = Vec::new();
            let mut next = Some(config.path.clone());
            let mut pages = 0usize;
            while let Some(url) = next.take() {
                if pages == config.max_pages {
                    warn!(max_pages = config.max_pages, next = %url, "page limit reached; stopping");
                    break;
                }
                pages += 1;

                let response = self
                    .client()
                    .operation(cancel, &url, config.body.as_ref(), &options)
                    .await?;
                let page = response.json()?;
                let items = match &selector {
                    Some(selector) => selector.get(&page).unwrap_or(Value::Null),
                    None => page,
                };
                let items = match items {
                    Value::Array(items) => items,
                    Value::Null => Vec::new(),
                    _ => {
                        return Err(EngineError::Selection {
                            selector: config.selector.clone().unwrap_or_default(),
                        });
                    }
                };
                debug!(page = pages, items = items.len(), "page listed");

                for item in items {
                    let spec = ImportSpec {
                        id: expand(&config.id_template, &context, &item)?,
                        path: config.path.clone(),
                        query: (!config.query.is_empty()).then(|| config.query.clone()),
                        header: (!config.header.is_empty()).then(|| config.header.clone()),
                        body: None,
                        read_selector: config.read_selector.clone(),
                        read_response_template: config.read_response_template.clone(),
                    };
                    listed.push(ListedResource {
                        import_id: serde_json::to_string(&spec)?,
                        spec,
                        value: item,
                    });
                }

                if let Some(locator) = &config.next_link_locator {
                    next = locate(locator, &response)?
                        .filter(|link| !link.is_empty())
                        .map(|link| to_request_path(&link, self.client().base_url()));
                }
            }
            info!(count = listed.len(), pages, "collection listed");
            Ok(listed)
        }
        .instrument(span)
        .await
    }
}
