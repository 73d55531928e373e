//! Redaction of credentials before values reach the logs.

use once_cell::sync::Lazy;
use regex::Regex;
use tether_types::Headers;

static SECRET_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)(authorization:\s*)([\w\-\.=:/+ ]+)",
        r"(?i)([A-Z0-9_]*?(?:KEY|TOKEN|SECRET|PASSWORD)=)([^\s&]+)",
        r#"(?i)("[A-Za-z0-9_]*?(?:key|token|secret|password)"\s*:\s*)("[^"]*")"#,
    ]
    .into_iter()
    .filter_map(|pattern| Regex::new(pattern).ok())
    .collect()
});

static SECRET_HEADER_NAME: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"(?i)(authorization|cookie|key|token|secret|password)").ok());

/// Redacts values that look like secrets in a string.
///
/// Covers `Authorization:` lines, `NAME_TOKEN=value` pairs and JSON members
/// whose name mentions a key, token, secret or password.
pub fn redact_sensitive(input: &str) -> String {
    let mut redacted = input.to_string();
    for pattern in SECRET_PATTERNS.iter() {
        redacted = pattern
            .replace_all(&redacted, |captures: &regex::Captures| {
                let prefix = captures.get(1).map(|prefix| prefix.as_str()).unwrap_or_default();
                format!("{prefix}<redacted>")
            })
            .into_owned();
    }
    redacted
}

/// Copy of `headers` with credential-bearing values replaced, for logging.
pub fn redact_headers(headers: &Headers) -> Headers {
    headers
        .iter()
        .map(|(name, value)| {
            let sensitive = SECRET_HEADER_NAME
                .as_ref()
                .is_some_and(|pattern| pattern.is_match(name));
            let shown = if sensitive { "<redacted>".to_string() } else { value.clone() };
            (name.clone(), shown)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redacts_authorization_and_secret_assignments() {
        let input = "Authorization: Bearer abc.def\nAPI_TOKEN=xyz other=1";
        let output = redact_sensitive(input);
        assert!(output.contains("Authorization: <redacted>"));
        assert!(output.contains("API_TOKEN=<redacted>"));
        assert!(output.contains("other=1"));
        assert!(!output.contains("xyz"));
    }

    #[test]
    fn redacts_json_secret_members() {
        let output = redact_sensitive(r#"{"name":"a","client_secret":"s3cr3t"}"#);
        assert_eq!(output, r#"{"name":"a","client_secret":<redacted>}"#);
    }

    #[test]
    fn redacts_sensitive_header_values() {
        let headers = Headers::from_iter([
            ("Authorization".to_string(), "Bearer abc".to_string()),
            ("X-Api-Key".to_string(), "k".to_string()),
            ("Accept".to_string(), "application/json".to_string()),
        ]);
        let redacted = redact_headers(&headers);
        assert_eq!(redacted["Authorization"], "<redacted>");
        assert_eq!(redacted["X-Api-Key"], "<redacted>");
        assert_eq!(redacted["Accept"], "application/json");
    }
}
