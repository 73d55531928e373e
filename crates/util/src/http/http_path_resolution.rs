//! URL and path helpers shared by the expander, the poller and list
//! pagination.

use percent_encoding::percent_decode_str;
use url::{Url, form_urlencoded};

/// Percent-encodes a path segment while preserving RFC 3986 unreserved bytes.
///
/// Unreserved bytes (`A-Z`, `a-z`, `0-9`, `-`, `.`, `_`, `~`) are emitted as-is.
/// All other bytes are percent-encoded using uppercase hex.
pub fn encode_path_segment(value: &str) -> String {
    const HEX: &[u8; 16] = b"0123456789ABCDEF";
    let mut encoded = String::with_capacity(value.len());
    for byte in value.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'.' | b'_' | b'~') {
            encoded.push(byte as char);
        } else {
            encoded.push('%');
            encoded.push(HEX[usize::from(byte >> 4)] as char);
            encoded.push(HEX[usize::from(byte & 0x0f)] as char);
        }
    }
    encoded
}

/// Reverse of [`encode_path_segment`]; invalid UTF-8 is replaced lossily.
pub fn decode_path_segment(value: &str) -> String {
    percent_decode_str(value).decode_utf8_lossy().into_owned()
}

/// Form-encode a query value (`space` becomes `+`).
pub fn encode_query_value(value: &str) -> String {
    form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

/// Reverse of [`encode_query_value`].
pub fn decode_query_value(value: &str) -> String {
    decode_path_segment(&value.replace('+', " "))
}

/// Strip `base_url` from the front of `value`, leaving a path relative to
/// the base. Values that do not start with the base URL are returned as is.
pub fn strip_base_url(value: &str, base_url: &str) -> String {
    let base = base_url.trim_end_matches('/');
    match value.strip_prefix(base) {
        Some(rest) if rest.is_empty() || rest.starts_with('/') || rest.starts_with('?') => rest.to_string(),
        _ => value.to_string(),
    }
}

/// Path (and query) of an absolute URL; relative values are returned as is.
pub fn url_path(value: &str) -> String {
    let Ok(url) = Url::parse(value) else {
        return value.to_string();
    };
    match url.query() {
        Some(query) => format!("{}?{}", url.path(), query),
        None => url.path().to_string(),
    }
}

/// Remove the path component of `base_url` from the front of `path`.
///
/// With a base URL of `https://host/api/v1`, `/api/v1/things/1` becomes
/// `/things/1`.
pub fn trim_base_path(path: &str, base_url: &str) -> String {
    let base_path = Url::parse(base_url)
        .map(|url| url.path().trim_end_matches('/').to_string())
        .unwrap_or_default();
    if base_path.is_empty() {
        return path.to_string();
    }
    match path.strip_prefix(&base_path) {
        Some(rest) if rest.is_empty() || rest.starts_with('/') || rest.starts_with('?') => rest.to_string(),
        _ => path.to_string(),
    }
}

/// Last non-empty `/`-separated segment of `path`.
pub fn last_segment(path: &str) -> String {
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_string()
}

/// Turn a URL returned by the server (absolute or relative) into a request
/// path for the transport: URLs under the base URL become relative, other
/// absolute URLs are kept whole.
pub fn to_request_path(location: &str, base_url: &str) -> String {
    let stripped = strip_base_url(location, base_url);
    if stripped.is_empty() {
        return "/".to_string();
    }
    stripped
}
