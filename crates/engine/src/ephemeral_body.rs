//! Tracking of ephemeral bodies in private state.
//!
//! An ephemeral body is merged into request bodies but never persisted. What
//! is kept is a fingerprint, to notice when it changes, and a nullified
//! skeleton, to strip its values back out of responses.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tether_util::{nullify, subtract_skeleton};

use crate::{
    EngineError,
    private_state::{PrivateState, get_json, keys, set_json},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct Record {
    hash: String,
    null: String,
}

fn fingerprint(body: &Value) -> Result<String, EngineError> {
    let bytes = serde_json::to_vec(body)?;
    Ok(STANDARD.encode(Sha256::digest(&bytes)))
}

fn is_empty(body: &Value) -> bool {
    match body {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// True when `current` differs from the body last recorded with [`set`].
pub fn diff(private: &dyn PrivateState, current: Option<&Value>) -> Result<bool, EngineError> {
    let current = current.filter(|body| !body.is_null());
    let Some(record) = get_json::<Record>(private, keys::EPHEMERAL_BODY)? else {
        return Ok(current.is_some_and(|body| !is_empty(body)));
    };
    match current {
        Some(body) => Ok(record.hash != fingerprint(body)?),
        None => Ok(true),
    }
}

/// Record `current` as the ephemeral body last sent, or forget it.
pub fn set(private: &mut dyn PrivateState, current: Option<&Value>) -> Result<(), EngineError> {
    let Some(body) = current.filter(|body| !body.is_null()) else {
        return set_json::<Record>(private, keys::EPHEMERAL_BODY, None);
    };
    let skeleton = serde_json::to_vec(&nullify(body))?;
    let record = Record {
        hash: fingerprint(body)?,
        null: STANDARD.encode(skeleton),
    };
    set_json(private, keys::EPHEMERAL_BODY, Some(&record))
}

/// The nullified skeleton of the recorded ephemeral body.
pub fn skeleton(private: &dyn PrivateState) -> Result<Option<Value>, EngineError> {
    let Some(record) = get_json::<Record>(private, keys::EPHEMERAL_BODY)? else {
        return Ok(None);
    };
    let bytes = STANDARD
        .decode(record.null.as_bytes())
        .map_err(|err| EngineError::private_state(format!("{}: {err}", keys::EPHEMERAL_BODY)))?;
    Ok(Some(serde_json::from_slice(&bytes)?))
}

/// Remove the recorded ephemeral leaves from `document`.
pub fn strip(private: &dyn PrivateState, document: &mut Value) -> Result<(), EngineError> {
    if let Some(skeleton) = skeleton(private)? {
        subtract_skeleton(document, &skeleton);
    }
    Ok(())
}

/// `body` with `ephemeral` merge-patched on top.
pub fn merged(body: &Value, ephemeral: Option<&Value>) -> Value {
    let mut merged = body.clone();
    if let Some(ephemeral) = ephemeral.filter(|ephemeral| !ephemeral.is_null()) {
        json_patch::merge(&mut merged, ephemeral);
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::private_state::PrivateStore;
    use serde_json::json;

    #[test]
    fn diff_tracks_the_last_recorded_body() {
        let mut store = PrivateStore::new();
        let secret = json!({ "password": "a" });
        assert!(diff(&store, Some(&secret)).unwrap());
        assert!(!diff(&store, None).unwrap());
        assert!(!diff(&store, Some(&json!({}))).unwrap());

        set(&mut store, Some(&secret)).unwrap();
        assert!(!diff(&store, Some(&secret)).unwrap());
        assert!(diff(&store, Some(&json!({ "password": "b" }))).unwrap());
        assert!(diff(&store, None).unwrap());

        set(&mut store, None).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn stored_record_is_base64_hash_and_skeleton() {
        let mut store = PrivateStore::new();
        set(&mut store, Some(&json!({ "auth": { "token": "t" } }))).unwrap();

        let raw: Value = serde_json::from_slice(&store.get(keys::EPHEMERAL_BODY).unwrap()).unwrap();
        let hash = STANDARD.decode(raw["hash"].as_str().unwrap()).unwrap();
        assert_eq!(hash.len(), 32);
        assert_eq!(skeleton(&store).unwrap(), Some(json!({ "auth": { "token": null } })));
    }

    #[test]
    fn strip_removes_ephemeral_leaves_only() {
        let mut store = PrivateStore::new();
        set(&mut store, Some(&json!({ "auth": { "token": "t" } }))).unwrap();

        let mut response = json!({ "name": "a", "auth": { "token": "t", "kind": "basic" } });
        strip(&store, &mut response).unwrap();
        assert_eq!(response, json!({ "name": "a", "auth": { "kind": "basic" } }));
    }

    #[test]
    fn merged_overlays_ephemeral_values() {
        let body = json!({ "name": "a", "auth": { "kind": "basic" } });
        let ephemeral = json!({ "auth": { "token": "t" } });
        assert_eq!(
            merged(&body, Some(&ephemeral)),
            json!({ "name": "a", "auth": { "kind": "basic", "token": "t" } })
        );
        assert_eq!(merged(&body, None), body);
    }

    #[test]
    fn merged_follows_merge_patch_rules() {
        let body = json!({ "name": "a", "auth": { "kind": "basic", "user": "u" }, "tags": [1, 2] });
        let ephemeral = json!({ "auth": { "user": null, "token": "t" }, "tags": [3] });
        assert_eq!(
            merged(&body, Some(&ephemeral)),
            json!({ "name": "a", "auth": { "kind": "basic", "token": "t" }, "tags": [3] })
        );
        assert_eq!(merged(&body, Some(&Value::Null)), body);
    }
}
