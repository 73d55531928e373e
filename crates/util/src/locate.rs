//! Evaluation of [`Locator`]s against HTTP responses.

use serde_json::Value;
use tether_api::ApiResponse;
use tether_types::Locator;

use crate::{
    error::PathError,
    json_path::{JsonPath, value_to_string},
};

/// Evaluate `locator` against `response`.
///
/// Returns `None` when a header or body path is absent, so callers can tell
/// an absent value from an empty string. A body that is not JSON behaves as
/// if every path were absent.
pub fn locate(locator: &Locator, response: &ApiResponse) -> Result<Option<String>, PathError> {
    match locator {
        Locator::Code => Ok(Some(response.status().as_u16().to_string())),
        Locator::Exact(value) => Ok(Some(value.clone())),
        Locator::Header(name) => Ok(response.header(name).map(str::to_string)),
        Locator::Body(path) => {
            let path = JsonPath::parse(path)?;
            let Ok(body) = response.json() else {
                return Ok(None);
            };
            Ok(locate_in_body(&path, &body))
        }
    }
}

/// String form of the value at `path` in an already parsed body.
pub fn locate_in_body(path: &JsonPath, body: &Value) -> Option<String> {
    path.get(body).map(|value| value_to_string(&value))
}

/// Check that a locator's path, if it has one, parses.
pub fn validate_locator(locator: &Locator) -> Result<(), PathError> {
    if let Locator::Body(path) = locator {
        JsonPath::parse(path)?;
    }
    Ok(())
}
