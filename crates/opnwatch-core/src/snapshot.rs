// ── Status snapshots ──
//
// One immutable capture of device status per poll. Cloning is an `Arc`
// bump; the coordinator swaps whole snapshots, never mutates one.

use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};

/// Look up a dotted key path in a nested JSON mapping.
///
/// Walks each `.`-separated segment. Returns `None` when a segment is
/// absent or an intermediate value is not an object. A present `null`
/// leaf is returned as `Some(&Value::Null)`.
pub fn dict_get<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(value, |current, segment| current.as_object()?.get(segment))
}

/// Point-in-time status of one device.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Snapshot {
    root: Arc<Value>,
}

impl Snapshot {
    /// The snapshot held before the first successful poll: `{}`.
    pub fn empty() -> Self {
        Self::from_map(Map::new())
    }

    pub fn from_map(map: Map<String, Value>) -> Self {
        Self {
            root: Arc::new(Value::Object(map)),
        }
    }

    /// Wrap a JSON value. Returns `None` unless it is an object.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self::from_map(map)),
            _ => None,
        }
    }

    /// Dotted-path lookup; see [`dict_get`].
    pub fn get(&self, path: &str) -> Option<&Value> {
        dict_get(&self.root, path)
    }

    /// A boolean at `path`, or `None` if absent or not a boolean.
    pub fn get_bool(&self, path: &str) -> Option<bool> {
        self.get(path).and_then(Value::as_bool)
    }

    /// A string at `path`, or `None` if absent or not a string.
    pub fn get_str(&self, path: &str) -> Option<&str> {
        self.get(path).and_then(Value::as_str)
    }

    /// The value at `path` cloned, with absence collapsed to `null`.
    pub fn get_or_null(&self, path: &str) -> Value {
        self.get(path).cloned().unwrap_or(Value::Null)
    }

    /// Whether `path` resolves to a non-null value.
    pub fn has(&self, path: &str) -> bool {
        self.get(path).is_some_and(|v| !v.is_null())
    }

    pub fn is_empty(&self) -> bool {
        self.root.as_object().is_none_or(Map::is_empty)
    }

    pub fn as_value(&self) -> &Value {
        &self.root
    }
}

impl Default for Snapshot {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn dict_get_walks_nested_objects() {
        let v = json!({ "a": { "b": { "c": 42 } } });
        assert_eq!(dict_get(&v, "a.b.c"), Some(&v["a"]["b"]["c"]));
        assert_eq!(dict_get(&v, "a.b"), Some(&json!({ "c": 42 })));
    }

    #[test]
    fn dict_get_missing_segment_is_none() {
        let v = json!({ "a": { "b": 1 } });
        assert_eq!(dict_get(&v, "a.x"), None);
        assert_eq!(dict_get(&v, "x.b"), None);
    }

    #[test]
    fn dict_get_through_non_object_is_none() {
        let v = json!({ "a": { "b": 1 }, "list": [ { "c": 1 } ], "n": null });
        assert_eq!(dict_get(&v, "a.b.c"), None);
        assert_eq!(dict_get(&v, "list.c"), None);
        assert_eq!(dict_get(&v, "n.c"), None);
    }

    #[test]
    fn dict_get_returns_present_null() {
        let v = json!({ "firmware_update_info": null });
        assert_eq!(dict_get(&v, "firmware_update_info"), Some(&Value::Null));
    }

    #[test]
    fn from_value_rejects_non_objects() {
        assert!(Snapshot::from_value(json!([1, 2])).is_none());
        assert!(Snapshot::from_value(json!("x")).is_none());
        assert!(Snapshot::from_value(json!({})).unwrap().is_empty());
    }

    #[test]
    fn typed_accessors_reject_wrong_types() {
        let snap = Snapshot::from_value(json!({ "carp_status": "yes", "flag": true })).unwrap();
        assert_eq!(snap.get_bool("carp_status"), None);
        assert_eq!(snap.get_str("carp_status"), Some("yes"));
        assert_eq!(snap.get_bool("flag"), Some(true));
        assert_eq!(snap.get_or_null("missing.path"), Value::Null);
    }

    #[test]
    fn has_treats_null_as_absent() {
        let snap = Snapshot::from_value(json!({ "a": null, "b": 0 })).unwrap();
        assert!(!snap.has("a"));
        assert!(snap.has("b"));
        assert!(!snap.has("c"));
    }
}
