//! Reconciliation of a desired body against the body the server returns.
//!
//! The managed body is the response projected onto the shape of the desired
//! body: keys the caller never set are dropped, arrays whose length changed
//! are taken from the response whole, and write-only attributes keep the
//! caller's values because servers never echo them back.

use std::collections::HashSet;

use serde_json::{Map, Value};

use crate::{error::ReconcileError, json_path::JsonPath};

/// Project `response` onto `base`, keeping write-only attributes from `base`.
///
/// The result contains only keys that exist in `base`. Write-only paths are
/// removed from the response before projecting and then re-inserted with the
/// values found in `base`; splats expand against `base`.
pub fn modify_body(base: &Value, response: &Value, write_only: &[JsonPath]) -> Value {
    let mut masked = response.clone();
    for path in write_only {
        path.delete(&mut masked);
    }

    let mut managed = project(base, &masked);
    for path in write_only {
        for location in path.concrete_paths(base) {
            if let Some(value) = location.get(base) {
                location.set(&mut managed, value.clone());
            }
        }
    }
    managed
}

/// Like [`modify_body`] but for bodies seeded by an import.
///
/// Arrays in `base` act as templates: an empty array takes the response array
/// as is, a single element is applied to every response element. Arrays with
/// more than one element are ambiguous and rejected.
pub fn modify_body_for_import(base: &Value, response: &Value) -> Result<Value, ReconcileError> {
    project_for_import(base, response, &mut Vec::new())
}

fn project(base: &Value, response: &Value) -> Value {
    match (base, response) {
        (Value::Object(base_map), Value::Object(response_map)) => {
            let mut projected = Map::new();
            for (key, base_value) in base_map {
                if let Some(response_value) = response_map.get(key) {
                    projected.insert(key.clone(), project(base_value, response_value));
                }
            }
            Value::Object(projected)
        }
        (Value::Array(base_items), Value::Array(response_items)) if base_items.len() == response_items.len() => {
            Value::Array(
                base_items
                    .iter()
                    .zip(response_items)
                    .map(|(base_item, response_item)| project(base_item, response_item))
                    .collect(),
            )
        }
        _ => response.clone(),
    }
}

fn project_for_import(base: &Value, response: &Value, location: &mut Vec<String>) -> Result<Value, ReconcileError> {
    match (base, response) {
        (Value::Array(base_items), _) if base_items.len() > 1 => Err(ReconcileError::ImportArrayTooLong {
            path: location.join("."),
            len: base_items.len(),
        }),
        (Value::Object(base_map), Value::Object(response_map)) => {
            let mut projected = Map::new();
            for (key, base_value) in base_map {
                if let Some(response_value) = response_map.get(key) {
                    location.push(key.clone());
                    let value = project_for_import(base_value, response_value, location);
                    location.pop();
                    projected.insert(key.clone(), value?);
                }
            }
            Ok(Value::Object(projected))
        }
        (Value::Array(base_items), Value::Array(response_items)) => {
            let Some(template) = base_items.first() else {
                return Ok(response.clone());
            };
            let mut projected = Vec::with_capacity(response_items.len());
            for (index, response_item) in response_items.iter().enumerate() {
                location.push(index.to_string());
                let value = project_for_import(template, response_item, location);
                location.pop();
                projected.push(value?);
            }
            Ok(Value::Array(projected))
        }
        _ => Ok(response.clone()),
    }
}

/// Keep only the locations named by `paths`.
///
/// Splats and queries keep every matching array element, filtered further
/// by the remaining steps. An empty `paths` list returns `document` unchanged.
pub fn filter_attrs(document: &Value, paths: &[JsonPath]) -> Value {
    if paths.is_empty() {
        return document.clone();
    }
    let mut kept = empty_like(document);
    let mut written = HashSet::new();
    for path in paths {
        for location in path.concrete_paths(document) {
            if let Some(value) = location.get(document) {
                location.set(&mut kept, value.clone());
                let keys = location.keys();
                written.extend((1..=keys.len()).map(|end| keys[..end].to_vec()));
            }
        }
    }
    drop_padding(&mut kept, &mut Vec::new(), &written);
    kept
}

fn empty_like(document: &Value) -> Value {
    match document {
        Value::Array(_) => Value::Array(Vec::new()),
        _ => Value::Object(Map::new()),
    }
}

/// Drop the null slots [`filter_attrs`] pads arrays with when it keeps a
/// sparse set of indices. Elements that were copied in stay, nulls included.
fn drop_padding(value: &mut Value, location: &mut Vec<String>, written: &HashSet<Vec<String>>) {
    match value {
        Value::Array(items) => {
            let mut kept = Vec::with_capacity(items.len());
            for (index, mut item) in std::mem::take(items).into_iter().enumerate() {
                location.push(index.to_string());
                if written.contains(&*location) {
                    drop_padding(&mut item, location, written);
                    kept.push(item);
                }
                location.pop();
            }
            *items = kept;
        }
        Value::Object(map) => {
            for (key, child) in map.iter_mut() {
                location.push(key.clone());
                drop_padding(child, location, written);
                location.pop();
            }
        }
        _ => {}
    }
}

/// Copy of `document` with every scalar leaf replaced by `null`.
pub fn nullify(document: &Value) -> Value {
    match document {
        Value::Object(map) => Value::Object(map.iter().map(|(key, value)| (key.clone(), nullify(value))).collect()),
        Value::Array(items) => Value::Array(items.iter().map(nullify).collect()),
        _ => Value::Null,
    }
}

/// Remove from `document` every leaf that is `null` in `skeleton`.
///
/// Used with a [`nullify`]-ed ephemeral body so ephemeral values never reach
/// the managed document.
pub fn subtract_skeleton(document: &mut Value, skeleton: &Value) {
    match (document, skeleton) {
        (Value::Object(map), Value::Object(skeleton_map)) => {
            for (key, skeleton_value) in skeleton_map {
                if skeleton_value.is_null() {
                    map.shift_remove(key);
                } else if let Some(child) = map.get_mut(key) {
                    subtract_skeleton(child, skeleton_value);
                }
            }
        }
        (Value::Array(items), Value::Array(skeleton_items)) => {
            for (item, skeleton_item) in items.iter_mut().zip(skeleton_items) {
                subtract_skeleton(item, skeleton_item);
            }
        }
        _ => {}
    }
}

/// JSON merge patch (RFC 7396) turning `original` into `modified`.
pub fn create_merge_patch(original: &Value, modified: &Value) -> Value {
    let (Value::Object(original_map), Value::Object(modified_map)) = (original, modified) else {
        return modified.clone();
    };
    let mut patch = Map::new();
    for key in original_map.keys() {
        if !modified_map.contains_key(key) {
            patch.insert(key.clone(), Value::Null);
        }
    }
    for (key, modified_value) in modified_map {
        match original_map.get(key) {
            Some(original_value) if original_value == modified_value => {}
            Some(original_value) => {
                patch.insert(key.clone(), create_merge_patch(original_value, modified_value));
            }
            None => {
                patch.insert(key.clone(), modified_value.clone());
            }
        }
    }
    Value::Object(patch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn paths(raw: &[&str]) -> Vec<JsonPath> {
        raw.iter().map(|path| JsonPath::parse(path).unwrap()).collect()
    }

    #[test]
    fn modify_body_projects_and_keeps_write_only_values() {
        let base = json!({"obj": {"a": 1, "b": 2}, "z": 2});
        let response = json!({"obj": {"a": 3, "d": "5"}, "new": 4});
        let managed = modify_body(&base, &response, &paths(&["obj.b"]));
        assert_eq!(managed, json!({"obj": {"a": 3, "b": 2}}));
    }

    #[test]
    fn write_only_values_shadow_response_echoes() {
        let base = json!({"password": "secret", "name": "a"});
        let response = json!({"password": "***", "name": "b"});
        let managed = modify_body(&base, &response, &paths(&["password"]));
        assert_eq!(managed, json!({"password": "secret", "name": "b"}));
    }

    #[test]
    fn arrays_of_different_length_come_from_the_response() {
        let base = json!({"tags": ["a"], "rules": [{"port": 80, "name": "x"}]});
        let response = json!({"tags": ["a", "b"], "rules": [{"port": 81, "name": "x", "id": 1}]});
        let managed = modify_body(&base, &response, &[]);
        assert_eq!(managed, json!({"tags": ["a", "b"], "rules": [{"port": 81, "name": "x"}]}));
    }

    #[test]
    fn modify_body_is_idempotent() {
        let base = json!({"items": [{"secret": 1, "v": 1}], "obj": {"a": 1, "b": 2}, "gone": true});
        let response = json!({"items": [{"secret": 9, "v": 2}, {"v": 3}], "obj": {"a": 5}, "extra": 1});
        let write_only = paths(&["items.#.secret", "obj.b"]);

        let once = modify_body(&base, &response, &write_only);
        let twice = modify_body(&once, &response, &write_only);
        assert_eq!(once, twice);
        assert_eq!(once["items"][0]["secret"], json!(1));
        assert!(once.get("extra").is_none());
    }

    #[test]
    fn import_broadcasts_single_element_templates() {
        let base = json!([{"k": null}]);
        let response = json!([{"k": 1, "z": 2}, {"k": 2, "z": 3}]);
        assert_eq!(modify_body_for_import(&base, &response).unwrap(), json!([{"k": 1}, {"k": 2}]));

        let empty = json!({"list": []});
        let with_list = json!({"list": [1, 2], "other": true});
        assert_eq!(modify_body_for_import(&empty, &with_list).unwrap(), json!({"list": [1, 2]}));
    }

    #[test]
    fn import_rejects_multi_element_templates() {
        let base = json!({"spec": {"rules": [{"a": null}, {"b": null}]}});
        let error = modify_body_for_import(&base, &json!({"spec": {"rules": []}})).unwrap_err();
        assert_eq!(
            error,
            ReconcileError::ImportArrayTooLong {
                path: "spec.rules".to_string(),
                len: 2
            }
        );
    }

    #[test]
    fn filter_attrs_keeps_listed_paths_through_splats() {
        let document = json!({
            "a": 1,
            "b": {"c": 2, "d": 3},
            "arr": [{"x": 1, "y": 2}, {"x": 3, "y": 4}]
        });
        let filtered = filter_attrs(&document, &paths(&["b.c", "arr.#.x"]));
        assert_eq!(filtered, json!({"b": {"c": 2}, "arr": [{"x": 1}, {"x": 3}]}));
        assert_eq!(filter_attrs(&document, &[]), document);
    }

    #[test]
    fn filter_attrs_keeps_nulls_the_response_carries() {
        let document = json!({"a": [null, 1, null], "b": 2});
        assert_eq!(filter_attrs(&document, &paths(&["a"])), json!({"a": [null, 1, null]}));

        let sparse = json!({"rows": [{"k": null, "v": 1}, {"k": 2, "v": 3}, {"k": null}]});
        assert_eq!(
            filter_attrs(&sparse, &paths(&["rows.#.k"])),
            json!({"rows": [{"k": null}, {"k": 2}, {"k": null}]})
        );
        assert_eq!(filter_attrs(&sparse, &paths(&["rows.1.v"])), json!({"rows": [{"v": 3}]}));
    }

    #[test]
    fn nullify_keeps_structure() {
        let document = json!({"token": "abc", "nested": {"n": 1, "list": [true, {"k": "v"}]}});
        assert_eq!(
            nullify(&document),
            json!({"token": null, "nested": {"n": null, "list": [null, {"k": null}]}})
        );
    }

    #[test]
    fn subtract_skeleton_removes_ephemeral_leaves() {
        let mut document = json!({"name": "a", "auth": {"token": "t", "kind": "basic"}, "key": "k"});
        subtract_skeleton(&mut document, &json!({"auth": {"token": null}, "key": null}));
        assert_eq!(document, json!({"name": "a", "auth": {"kind": "basic"}}));
    }

    #[test]
    fn merge_patch_round_trips() {
        let original = json!({"a": 1, "b": {"c": 2, "d": 3}, "e": [1]});
        let modified = json!({"a": 1, "b": {"c": 4}, "e": [1, 2], "f": "new"});
        let patch = create_merge_patch(&original, &modified);
        assert_eq!(patch, json!({"b": {"c": 4, "d": null}, "e": [1, 2], "f": "new"}));

        let mut patched = original.clone();
        json_patch::merge(&mut patched, &patch);
        assert_eq!(patched, modified);
    }

    #[test]
    fn merge_patch_fidelity_holds_for_arbitrary_patches() {
        let cases = [
            (json!({"a": 1, "b": 2}), json!({"a": null, "c": {"d": 1}})),
            (json!({"a": {"b": {"c": 1}}}), json!({"a": {"b": {"c": 2, "x": null}}})),
            (json!([1, 2]), json!({"k": "v"})),
            (json!({"a": 1}), json!({"a": 1})),
        ];
        for (document, patch) in cases {
            let mut patched = document.clone();
            json_patch::merge(&mut patched, &patch);
            let recomputed = create_merge_patch(&document, &patched);
            assert!(is_subset(&recomputed, &patch), "{recomputed} not within {patch}");
        }
    }

    fn is_subset(candidate: &Value, reference: &Value) -> bool {
        match (candidate, reference) {
            (Value::Object(candidate), Value::Object(reference)) => candidate
                .iter()
                .all(|(key, value)| reference.get(key).is_some_and(|other| is_subset(value, other))),
            _ => candidate == reference,
        }
    }
}
