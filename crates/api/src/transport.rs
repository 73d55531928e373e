//! Transport capability and its reqwest implementation.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{
    Client, Method,
    header::{self, HeaderMap, HeaderName, HeaderValue},
};
use tether_types::{HttpMethod, ProviderConfig, Query};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

use crate::{ApiError, ApiRequest, ApiResponse, redact::redact_headers};

/// The HTTP capability the engine consumes.
///
/// Implementations own connection pooling, TLS, cookies and credentials.
/// The engine treats an instance as an immutable handle shared across
/// resources; every call must honour `cancel` by aborting the request and
/// returning [`ApiError::Cancelled`].
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Base URL relative request paths are resolved against.
    fn base_url(&self) -> &str;

    /// Send `request` and return the response whatever its status.
    async fn send(&self, request: ApiRequest, cancel: &CancellationToken) -> Result<ApiResponse, ApiError>;
}

/// Default [`HttpClient`] backed by a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    base_url: String,
    http: Client,
}

impl ReqwestTransport {
    /// Build a transport from provider settings.
    ///
    /// The base URL comes from the configuration or `TETHER_BASE_URL` and must
    /// be an absolute http(s) URL.
    pub fn new(config: &ProviderConfig) -> Result<Self, ApiError> {
        let base_url = config.resolve_base_url()?;

        let mut default_headers = HeaderMap::new();
        default_headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        default_headers.insert(
            header::USER_AGENT,
            HeaderValue::from_str(&format!("tether/{}; {}", env!("CARGO_PKG_VERSION"), std::env::consts::OS))
                .map_err(|error| ApiError::invalid_request(error.to_string()))?,
        );

        let http = Client::builder()
            .default_headers(default_headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .cookie_store(config.cookie_jar)
            .build()
            .map_err(|error| ApiError::invalid_request(format!("could not build the HTTP client: {error}")))?;

        Ok(Self { base_url, http })
    }

    /// Resolve `path` against the base URL and append the query.
    pub fn resolve_url(&self, path: &str, query: &Query) -> Result<Url, ApiError> {
        resolve_url(&self.base_url, path, query)
    }
}

#[async_trait]
impl HttpClient for ReqwestTransport {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn send(&self, request: ApiRequest, cancel: &CancellationToken) -> Result<ApiResponse, ApiError> {
        let url = self.resolve_url(&request.path, &request.query)?;
        let method = to_reqwest_method(request.method);
        let start = Instant::now();
        debug!(
            method = %method,
            url = %url,
            headers = ?redact_headers(&request.header),
            has_body = request.body.is_some(),
            "http request started"
        );

        let mut builder = self.http.request(method.clone(), url.clone());
        for (name, value) in &request.header {
            let name = HeaderName::try_from(name.as_str())
                .map_err(|error| ApiError::invalid_request(format!("invalid header name '{name}': {error}")))?;
            let value = HeaderValue::try_from(value.as_str())
                .map_err(|error| ApiError::invalid_request(format!("invalid value for header '{name}': {error}")))?;
            builder = builder.header(name, value);
        }
        if let Some(body) = &request.body {
            let payload = serde_json::to_vec(body).map_err(|error| ApiError::invalid_request(error.to_string()))?;
            if request.header_value(header::CONTENT_TYPE.as_str()).is_none() {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
            }
            builder = builder.body(payload);
        }

        let exchange = async {
            let response = builder
                .send()
                .await
                .map_err(|error| ApiError::transport(method.as_str(), url.as_str(), error.to_string()))?;
            let status = response.status();
            let headers = response.headers().clone();
            let final_url = response.url().to_string();
            let text = response
                .text()
                .await
                .map_err(|error| ApiError::transport(method.as_str(), url.as_str(), error.to_string()))?;
            Ok::<_, ApiError>(ApiResponse::new(status, headers, text, final_url))
        };

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ApiError::Cancelled),
            result = exchange => result,
        };

        match &result {
            Ok(response) => debug!(
                method = %method,
                url = %url,
                status = %response.status(),
                duration_ms = start.elapsed().as_millis(),
                "http request completed"
            ),
            Err(error) => warn!(
                method = %method,
                url = %url,
                error = %error,
                duration_ms = start.elapsed().as_millis(),
                "http request failed"
            ),
        }
        result
    }
}

/// Resolve `path` against `base_url`.
///
/// Absolute URLs are used as they are; anything else is appended to the base
/// URL. Query values are URL-encoded and multi-valued keys repeat.
pub fn resolve_url(base_url: &str, path: &str, query: &Query) -> Result<Url, ApiError> {
    let raw = if path.starts_with("http://") || path.starts_with("https://") {
        path.to_string()
    } else if path.is_empty() || path.starts_with('/') || path.starts_with('?') {
        format!("{}{}", base_url.trim_end_matches('/'), path)
    } else {
        format!("{}/{}", base_url.trim_end_matches('/'), path)
    };
    let mut url = Url::parse(&raw).map_err(|error| ApiError::invalid_request(format!("invalid URL '{raw}': {error}")))?;
    if !query.is_empty() {
        let mut pairs = url.query_pairs_mut();
        for (key, values) in query {
            for value in values {
                pairs.append_pair(key, value);
            }
        }
    }
    Ok(url)
}

fn to_reqwest_method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Patch => Method::PATCH,
        HttpMethod::Delete => Method::DELETE,
        HttpMethod::Head => Method::HEAD,
    }
}
