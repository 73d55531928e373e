//! Value locators.
//!
//! A locator is a tiny grammar that points at a value inside an HTTP response:
//!
//! - `code` – the decimal status code
//! - `exact.<value>` – a literal value
//! - `header.<name>` – the first value of a response header
//! - `body.<path>` – a dotted path into the JSON response body
//!
//! Locators serialize to and from their string form, so they can be written
//! directly in configuration documents.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// A parsed value locator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Locator {
    /// The HTTP status code, rendered as a decimal string.
    Code,
    /// A literal value, returned unchanged.
    Exact(String),
    /// A response header, matched case-insensitively.
    Header(String),
    /// A path into the JSON response body.
    Body(String),
}

impl Locator {
    /// Short tag naming the locator kind, used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Code => "code",
            Self::Exact(_) => "exact",
            Self::Header(_) => "header",
            Self::Body(_) => "body",
        }
    }
}

impl FromStr for Locator {
    type Err = ConfigError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        if raw == "code" {
            return Ok(Self::Code);
        }
        let Some((tag, rest)) = raw.split_once('.') else {
            return Err(ConfigError::invalid_locator(
                raw,
                "expected 'code', 'exact.<value>', 'header.<name>' or 'body.<path>'",
            ));
        };
        if rest.is_empty() {
            return Err(ConfigError::invalid_locator(raw, format!("'{tag}' locator requires a non-empty value")));
        }
        match tag {
            "exact" => Ok(Self::Exact(rest.to_string())),
            "header" => Ok(Self::Header(rest.to_string())),
            "body" => Ok(Self::Body(rest.to_string())),
            other => Err(ConfigError::invalid_locator(raw, format!("unknown locator kind '{other}'"))),
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Code => f.write_str("code"),
            Self::Exact(value) => write!(f, "exact.{value}"),
            Self::Header(name) => write!(f, "header.{name}"),
            Self::Body(path) => write!(f, "body.{path}"),
        }
    }
}

impl TryFrom<String> for Locator {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Locator> for String {
    fn from(locator: Locator) -> Self {
        locator.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_locator_kind() {
        assert_eq!("code".parse::<Locator>().unwrap(), Locator::Code);
        assert_eq!("exact.Succeeded".parse::<Locator>().unwrap(), Locator::Exact("Succeeded".into()));
        assert_eq!(
            "header.Azure-AsyncOperation".parse::<Locator>().unwrap(),
            Locator::Header("Azure-AsyncOperation".into())
        );
        assert_eq!(
            "body.properties.provisioningState".parse::<Locator>().unwrap(),
            Locator::Body("properties.provisioningState".into())
        );
    }

    #[test]
    fn splits_on_first_dot_only() {
        let locator: Locator = "exact.1.5".parse().unwrap();
        assert_eq!(locator, Locator::Exact("1.5".into()));
    }

    #[test]
    fn rejects_malformed_locators() {
        for raw in ["", "status", "body.", "header.", "cookie.session", "code.200"] {
            let error = raw.parse::<Locator>().expect_err(raw);
            assert!(matches!(error, ConfigError::InvalidLocator { .. }), "{raw}: {error}");
        }
    }

    #[test]
    fn round_trips_through_serde_as_string() {
        let locator: Locator = serde_json::from_str("\"header.location\"").unwrap();
        assert_eq!(locator, Locator::Header("location".into()));
        assert_eq!(serde_json::to_string(&locator).unwrap(), "\"header.location\"");

        let error = serde_json::from_str::<Locator>("\"nope\"").unwrap_err();
        assert!(error.to_string().contains("invalid locator"));
    }
}
