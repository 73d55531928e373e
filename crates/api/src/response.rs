use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::{
    StatusCode,
    header::{HeaderMap, RETRY_AFTER},
};
use serde_json::Value;

/// A response as seen by the engine: status, headers, body text and the
/// final URL the request was sent to.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: String,
    request_url: String,
}

impl ApiResponse {
    pub fn new(status: StatusCode, headers: HeaderMap, body: impl Into<String>, request_url: impl Into<String>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
            request_url: request_url.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    /// Absolute URL the request was sent to, query string included.
    pub fn request_url(&self) -> &str {
        &self.request_url
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// First value of header `name` (case-insensitive), if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    /// Body parsed as JSON; an empty body parses as `null`.
    pub fn json(&self) -> Result<Value, serde_json::Error> {
        if self.body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&self.body)
    }

    /// Delay requested through `Retry-After`, relative to `now`.
    ///
    /// Accepts a number of seconds or an HTTP-date. Dates in the past yield a
    /// zero delay; unparsable values yield `None`.
    pub fn retry_after(&self, now: DateTime<Utc>) -> Option<Duration> {
        let raw = self.headers.get(RETRY_AFTER)?.to_str().ok()?.trim();
        if let Ok(seconds) = raw.parse::<u64>() {
            return Some(Duration::from_secs(seconds));
        }
        let date = DateTime::parse_from_rfc2822(raw).ok()?.with_timezone(&Utc);
        Some((date - now).to_std().unwrap_or(Duration::ZERO))
    }
}

/// Outcome of a read: a 404 is a distinguished result, not an error.
#[derive(Debug, Clone)]
pub enum ReadOutcome {
    Found(ApiResponse),
    NotFound,
}

impl ReadOutcome {
    pub fn found(self) -> Option<ApiResponse> {
        match self {
            Self::Found(response) => Some(response),
            Self::NotFound => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use reqwest::header::HeaderValue;

    fn response_with_retry_after(value: &str) -> ApiResponse {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_str(value).unwrap());
        ApiResponse::new(StatusCode::ACCEPTED, headers, "", "http://localhost/op")
    }

    #[test]
    fn retry_after_accepts_seconds() {
        let response = response_with_retry_after("3");
        assert_eq!(response.retry_after(Utc::now()), Some(Duration::from_secs(3)));
    }

    #[test]
    fn retry_after_accepts_http_dates() {
        let now = Utc.with_ymd_and_hms(2015, 10, 21, 7, 27, 50).unwrap();
        let response = response_with_retry_after("Wed, 21 Oct 2015 07:28:00 GMT");
        assert_eq!(response.retry_after(now), Some(Duration::from_secs(10)));

        let later = Utc.with_ymd_and_hms(2015, 10, 21, 8, 0, 0).unwrap();
        assert_eq!(response.retry_after(later), Some(Duration::ZERO));
    }

    #[test]
    fn retry_after_ignores_garbage() {
        let response = response_with_retry_after("soon");
        assert_eq!(response.retry_after(Utc::now()), None);
    }

    #[test]
    fn header_lookup_is_case_insensitive() {
        let mut headers = HeaderMap::new();
        headers.insert("azure-asyncoperation", HeaderValue::from_static("http://localhost/op/1"));
        let response = ApiResponse::new(StatusCode::ACCEPTED, headers, "", "http://localhost/things");
        assert_eq!(response.header("Azure-AsyncOperation"), Some("http://localhost/op/1"));
        assert_eq!(response.header("location"), None);
    }

    #[test]
    fn empty_body_parses_as_null() {
        let response = ApiResponse::new(StatusCode::NO_CONTENT, HeaderMap::new(), "  ", "http://localhost/x");
        assert_eq!(response.json().unwrap(), Value::Null);
    }
}
