//! The execution envelope threaded between workflow nodes.
//!
//! An envelope is an ordered JSON object. Each node receives the previous
//! node's envelope and returns a superset of it: business fields are never
//! dropped, only added or overwritten. Diagnostics go under the reserved
//! `_meta` object, one namespace per node type.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Reserved key for per-node diagnostic side-channel data.
pub const META_KEY: &str = "_meta";

/// Ordered key/value record passed from node to node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Envelope(Map<String, Value>);

impl Envelope {
    /// An empty envelope.
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Build from an arbitrary JSON value. Non-objects are wrapped under `payload`.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self(map),
            Value::Null => Self::new(),
            other => {
                let mut map = Map::new();
                map.insert("payload".to_string(), other);
                Self(map)
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Insert or overwrite a single field.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    /// Overwrite fields from `other`; keys missing from `other` are kept.
    ///
    /// An incoming `_meta` object is merged namespace by namespace, so
    /// namespaces it does not mention survive.
    pub fn merge(&mut self, other: Map<String, Value>) {
        for (key, value) in other {
            match value {
                Value::Object(namespaces) if key == META_KEY => {
                    for (namespace, fields) in namespaces {
                        self.merge_meta_value(&namespace, fields);
                    }
                }
                value => {
                    self.0.insert(key, value);
                }
            }
        }
    }

    fn merge_meta_value(&mut self, namespace: &str, value: Value) {
        match value {
            Value::Object(fields) => self.merge_meta(namespace, fields),
            other => {
                let meta = self
                    .0
                    .entry(META_KEY.to_string())
                    .or_insert_with(|| Value::Object(Map::new()));
                if !meta.is_object() {
                    *meta = Value::Object(Map::new());
                }
                if let Value::Object(meta) = meta {
                    meta.insert(namespace.to_string(), other);
                }
            }
        }
    }

    /// Merge `fields` into `_meta.<namespace>`.
    ///
    /// Sibling namespaces under `_meta` are preserved, and so are existing
    /// keys of the same namespace that `fields` does not mention. A `_meta`
    /// that is not an object is replaced.
    pub fn merge_meta(&mut self, namespace: &str, fields: Map<String, Value>) {
        let meta = self
            .0
            .entry(META_KEY.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !meta.is_object() {
            *meta = Value::Object(Map::new());
        }
        let Value::Object(meta) = meta else {
            return;
        };

        let slot = meta
            .entry(namespace.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        match (slot, fields) {
            (Value::Object(existing), fields) => {
                for (key, value) in fields {
                    existing.insert(key, value);
                }
            }
            (slot, fields) => *slot = Value::Object(fields),
        }
    }

    /// Read `_meta.<namespace>`.
    pub fn meta(&self, namespace: &str) -> Option<&Value> {
        self.0.get(META_KEY).and_then(|m| m.get(namespace))
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Clone into a `serde_json::Value::Object`.
    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for Envelope {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl From<Envelope> for Value {
    fn from(envelope: Envelope) -> Self {
        Value::Object(envelope.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn test_merge_keeps_unmentioned_fields() {
        let mut env = Envelope::from_value(json!({ "symbol": "600519", "score": 70 }));
        env.merge(obj(json!({ "score": 85, "riskLevel": "LOW" })));
        assert_eq!(env.get("symbol"), Some(&json!("600519")));
        assert_eq!(env.get("score"), Some(&json!(85)));
        assert_eq!(env.get("riskLevel"), Some(&json!("LOW")));
    }

    #[test]
    fn test_merge_preserves_insertion_order() {
        let mut env = Envelope::from_value(json!({ "b": 1, "a": 2 }));
        env.insert("c", json!(3));
        let keys: Vec<_> = env.keys().cloned().collect();
        assert_eq!(keys, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_merge_meta_keeps_sibling_namespaces() {
        let mut env = Envelope::from_value(json!({
            "_meta": { "dataFetch": { "source": "quotes" } }
        }));
        env.merge_meta("riskGate", obj(json!({ "riskLevel": "HIGH" })));
        assert_eq!(env.meta("dataFetch"), Some(&json!({ "source": "quotes" })));
        assert_eq!(env.meta("riskGate"), Some(&json!({ "riskLevel": "HIGH" })));
    }

    #[test]
    fn test_merge_meta_extends_same_namespace() {
        let mut env = Envelope::new();
        env.merge_meta("riskGate", obj(json!({ "a": 1 })));
        env.merge_meta("riskGate", obj(json!({ "b": 2 })));
        assert_eq!(env.meta("riskGate"), Some(&json!({ "a": 1, "b": 2 })));
    }

    #[test]
    fn test_merge_meta_replaces_non_object_meta() {
        let mut env = Envelope::from_value(json!({ "_meta": "garbage" }));
        env.merge_meta("join", obj(json!({ "branches": 2 })));
        assert_eq!(env.meta("join"), Some(&json!({ "branches": 2 })));
    }

    #[test]
    fn test_merge_keeps_meta_namespaces_absent_from_other() {
        let mut env = Envelope::from_value(json!({
            "symbol": "600519",
            "_meta": { "rulePack": { "code": "momentum" }, "agent": { "name": "analyst" } }
        }));
        env.merge(obj(json!({
            "decision": "BUY",
            "_meta": { "riskGate": { "riskLevel": "LOW" }, "agent": { "tokens": 12 }, "note": "x" }
        })));
        assert_eq!(env.get("decision"), Some(&json!("BUY")));
        assert_eq!(env.meta("rulePack"), Some(&json!({ "code": "momentum" })));
        assert_eq!(env.meta("riskGate"), Some(&json!({ "riskLevel": "LOW" })));
        assert_eq!(env.meta("agent"), Some(&json!({ "name": "analyst", "tokens": 12 })));
        assert_eq!(env.meta("note"), Some(&json!("x")));
    }

    #[test]
    fn test_merge_replaces_non_object_meta_wholesale() {
        let mut env = Envelope::from_value(json!({ "_meta": { "rulePack": { "code": "m" } } }));
        env.merge(obj(json!({ "_meta": null })));
        assert_eq!(env.get("_meta"), Some(&Value::Null));
    }

    #[test]
    fn test_from_value_wraps_scalars() {
        let env = Envelope::from_value(json!(42));
        assert_eq!(env.get("payload"), Some(&json!(42)));
        assert!(Envelope::from_value(Value::Null).is_empty());
    }
}
