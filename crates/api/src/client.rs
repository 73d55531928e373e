//! Typed REST calls on top of an [`HttpClient`].

use std::sync::Arc;

use reqwest::StatusCode;
use serde_json::Value;
use tether_types::{Headers, HttpMethod, ProviderConfig, Query};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{
    ApiError, ApiRequest, ApiResponse, HttpClient, ReadOutcome, RequestOptions,
    request::{content_type_for, overlay_headers, overlay_query},
};

/// Typed client shared by every resource of a provider.
///
/// Holds the provider-level default query and headers; each call overlays its
/// own [`RequestOptions`] on top of them.
#[derive(Clone)]
pub struct RestClient {
    transport: Arc<dyn HttpClient>,
    default_query: Query,
    default_header: Headers,
}

impl std::fmt::Debug for RestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestClient")
            .field("base_url", &self.transport.base_url())
            .field("default_query", &self.default_query)
            .field("default_header_names", &self.default_header.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl RestClient {
    pub fn new(transport: Arc<dyn HttpClient>) -> Self {
        Self {
            transport,
            default_query: Query::new(),
            default_header: Headers::new(),
        }
    }

    /// Client using the provider's default query and headers.
    pub fn from_provider(transport: Arc<dyn HttpClient>, config: &ProviderConfig) -> Self {
        Self {
            transport,
            default_query: config.query.clone(),
            default_header: config.header.clone(),
        }
    }

    pub fn base_url(&self) -> &str {
        self.transport.base_url()
    }

    pub fn transport(&self) -> &Arc<dyn HttpClient> {
        &self.transport
    }

    /// Create a resource. Defaults to POST; non-2xx statuses are errors.
    pub async fn create(
        &self,
        cancel: &CancellationToken,
        path: &str,
        body: &Value,
        options: &RequestOptions,
    ) -> Result<ApiResponse, ApiError> {
        let method = options.method.unwrap_or(HttpMethod::Post);
        let response = self.execute(cancel, method, path, Some(body), options).await?;
        ensure_success(method, response)
    }

    /// Read a resource. A 404 yields [`ReadOutcome::NotFound`].
    pub async fn read(
        &self,
        cancel: &CancellationToken,
        path: &str,
        options: &RequestOptions,
    ) -> Result<ReadOutcome, ApiError> {
        let method = options.method.unwrap_or(HttpMethod::Get);
        let response = self.execute(cancel, method, path, None, options).await?;
        if response.status() == StatusCode::NOT_FOUND {
            debug!(path = %path, "read returned not found");
            return Ok(ReadOutcome::NotFound);
        }
        ensure_success(method, response).map(ReadOutcome::Found)
    }

    /// Update a resource. Defaults to PUT; PATCH bodies are sent as a merge
    /// patch unless the options disable it.
    pub async fn update(
        &self,
        cancel: &CancellationToken,
        path: &str,
        body: &Value,
        options: &RequestOptions,
    ) -> Result<ApiResponse, ApiError> {
        let method = options.method.unwrap_or(HttpMethod::Put);
        let response = self.execute(cancel, method, path, Some(body), options).await?;
        ensure_success(method, response)
    }

    /// Delete a resource. Defaults to DELETE; `None` means the resource was
    /// already gone (404).
    pub async fn delete(
        &self,
        cancel: &CancellationToken,
        path: &str,
        body: Option<&Value>,
        options: &RequestOptions,
    ) -> Result<Option<ApiResponse>, ApiError> {
        let method = options.method.unwrap_or(HttpMethod::Delete);
        let response = self.execute(cancel, method, path, body, options).await?;
        if response.status() == StatusCode::NOT_FOUND {
            debug!(path = %path, "delete target already absent");
            return Ok(None);
        }
        ensure_success(method, response).map(Some)
    }

    /// Run an arbitrary operation; the method must be given in `options`.
    pub async fn operation(
        &self,
        cancel: &CancellationToken,
        path: &str,
        body: Option<&Value>,
        options: &RequestOptions,
    ) -> Result<ApiResponse, ApiError> {
        let method = options
            .method
            .ok_or_else(|| ApiError::invalid_request("operation requires an explicit method"))?;
        let response = self.execute(cancel, method, path, body, options).await?;
        ensure_success(method, response)
    }

    /// Send a request with the defaults overlaid and return the response
    /// whatever its status.
    pub async fn execute(
        &self,
        cancel: &CancellationToken,
        method: HttpMethod,
        path: &str,
        body: Option<&Value>,
        options: &RequestOptions,
    ) -> Result<ApiResponse, ApiError> {
        let mut query = self.default_query.clone();
        overlay_query(&mut query, &options.query);
        if let Some((_, existing)) = path.split_once('?') {
            let present: Vec<String> = url::form_urlencoded::parse(existing.as_bytes())
                .map(|(key, _)| key.into_owned())
                .collect();
            query.retain(|key, _| !present.contains(key));
        }
        let mut header = self.default_header.clone();
        overlay_headers(&mut header, &options.header);

        if body.is_some() && !header.keys().any(|name| name.eq_ignore_ascii_case("content-type")) {
            header.insert("Content-Type".to_string(), content_type_for(method, options));
        }
        let mut request = ApiRequest::new(method, path).with_body(body.cloned());
        request.query = query;
        request.header = header;

        if cancel.is_cancelled() {
            return Err(ApiError::Cancelled);
        }
        self.transport.send(request, cancel).await
    }
}

fn ensure_success(method: HttpMethod, response: ApiResponse) -> Result<ApiResponse, ApiError> {
    if response.is_success() {
        return Ok(response);
    }
    Err(ApiError::Http {
        method: method.as_str().to_string(),
        url: response.request_url().to_string(),
        status: response.status().as_u16(),
        body: response.body().to_string(),
    })
}
