//! Shared property-map type used by nodes, edges, tasks and artifacts
//!
//! The source system treats these as open dynamic dictionaries; this port
//! uses `serde_json::Value` directly rather than a serialized-string
//! convention, since the core inspects individual keys (`name`, `description`,
//! `page`, `section`, `step_number`, `chunk_id`) structurally.

use std::collections::HashMap;

use serde_json::Value;

/// An open property map, as carried by `Node`, `Edge`, `WorkflowTask` and artifacts
pub type PropertyMap = HashMap<String, Value>;

/// Build a `PropertyMap` from `(key, value)` pairs where the value already
/// implements `Into<Value>` via `serde_json::json!` or similar.
pub fn props(pairs: impl IntoIterator<Item = (&'static str, Value)>) -> PropertyMap {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_props_builds_map_from_pairs() {
        let map = props([("name", json!("Healing Potion")), ("step_number", json!(1))]);
        assert_eq!(map.get("name"), Some(&json!("Healing Potion")));
        assert_eq!(map.get("step_number"), Some(&json!(1)));
    }
}
