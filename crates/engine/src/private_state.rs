//! Host-owned private storage.
//!
//! Private state travels with a resource but is never shown to the user. The
//! engine uses the keys in [`keys`] and stores JSON bytes under each.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer, de::DeserializeOwned};

use crate::EngineError;

pub mod keys {
    pub const EPHEMERAL_BODY: &str = "ephemeral_body";
    pub const RENEW: &str = "renew";
    pub const CLOSE: &str = "close";
}

/// Key/value bytes kept by the host for one resource.
pub trait PrivateState: Send + Sync {
    fn get(&self, key: &str) -> Option<Vec<u8>>;
    /// Store `value` under `key`; `None` removes the key.
    fn set(&mut self, key: &str, value: Option<Vec<u8>>);
}

/// In-memory [`PrivateState`].
///
/// Serializes as a map of base64 strings so hosts can persist it next to
/// the resource state.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PrivateStore {
    entries: IndexMap<String, Vec<u8>>,
}

impl Serialize for PrivateStore {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.entries.iter().map(|(key, bytes)| (key, STANDARD.encode(bytes))))
    }
}

impl<'de> Deserialize<'de> for PrivateStore {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let entries = IndexMap::<String, String>::deserialize(deserializer)?
            .into_iter()
            .map(|(key, encoded)| {
                let bytes = STANDARD.decode(&encoded).map_err(serde::de::Error::custom)?;
                Ok((key, bytes))
            })
            .collect::<Result<_, D::Error>>()?;
        Ok(Self { entries })
    }
}

impl PrivateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

impl PrivateState for PrivateStore {
    fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: Option<Vec<u8>>) {
        match value {
            Some(bytes) => {
                self.entries.insert(key.to_string(), bytes);
            }
            None => {
                self.entries.shift_remove(key);
            }
        }
    }
}

/// Decode the JSON stored under `key`.
pub(crate) fn get_json<T: DeserializeOwned>(private: &dyn PrivateState, key: &str) -> Result<Option<T>, EngineError> {
    let Some(bytes) = private.get(key) else {
        return Ok(None);
    };
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|err| EngineError::private_state(format!("{key}: {err}")))
}

/// Store `value` under `key` as JSON, or remove the key.
pub(crate) fn set_json<T: Serialize>(private: &mut dyn PrivateState, key: &str, value: Option<&T>) -> Result<(), EngineError> {
    let bytes = value.map(serde_json::to_vec).transpose()?;
    private.set(key, bytes);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    #[test]
    fn json_values_round_trip_and_clear() {
        let mut store = PrivateStore::new();
        set_json(&mut store, keys::RENEW, Some(&json!({ "path": "/lease/1" }))).unwrap();
        let stored: Option<Value> = get_json(&store, keys::RENEW).unwrap();
        assert_eq!(stored, Some(json!({ "path": "/lease/1" })));

        set_json::<Value>(&mut store, keys::RENEW, None).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn corrupt_bytes_are_reported() {
        let mut store = PrivateStore::new();
        store.set(keys::CLOSE, Some(b"not json".to_vec()));
        let result: Result<Option<Value>, _> = get_json(&store, keys::CLOSE);
        assert!(matches!(result, Err(EngineError::PrivateState { .. })));
    }

    #[test]
    fn store_persists_as_base64() {
        let mut store = PrivateStore::new();
        store.set(keys::EPHEMERAL_BODY, Some(b"{}".to_vec()));
        let persisted = serde_json::to_value(&store).unwrap();
        assert_eq!(persisted, json!({ "ephemeral_body": "e30=" }));

        let restored: PrivateStore = serde_json::from_value(persisted).unwrap();
        assert_eq!(restored, store);
        assert!(serde_json::from_value::<PrivateStore>(json!({ "renew": "%%" })).is_err());
    }
}
