//! Cached values and their persisted layout.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Properties with this suffix are back-references and are never persisted.
pub const BACK_REFERENCE_SUFFIX: &str = "Ref";

/// Layout tag for map payloads.
const MAP_KIND: &str = "map";

/// A value held by the cache.
///
/// The kind is kept across a round trip: a `Map` comes back as a `Map` with
/// its keys in insertion order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CacheValue {
    /// Any JSON value except an array. `Null` is never stored.
    Scalar(Value),
    Sequence(Vec<Value>),
    /// Ordered keyed collection, persisted as `[key, value]` pairs.
    Map(Map<String, Value>),
}

impl CacheValue {
    /// Wrap a JSON value, sending arrays to `Sequence`.
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Array(items) => CacheValue::Sequence(items),
            other => CacheValue::Scalar(other),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            CacheValue::Scalar(value) => value.clone(),
            CacheValue::Sequence(items) => Value::Array(items.clone()),
            CacheValue::Map(map) => Value::Object(map.clone()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, CacheValue::Scalar(Value::Null))
    }

    pub fn is_map(&self) -> bool {
        matches!(self, CacheValue::Map(_))
    }

    /// Entry count for collections.
    pub fn len(&self) -> Option<usize> {
        match self {
            CacheValue::Scalar(_) => None,
            CacheValue::Sequence(items) => Some(items.len()),
            CacheValue::Map(map) => Some(map.len()),
        }
    }

    /// Look up one entry of a `Map`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            CacheValue::Map(map) => map.get(key),
            CacheValue::Scalar(Value::Object(map)) => map.get(key),
            _ => None,
        }
    }
}

impl From<Value> for CacheValue {
    fn from(value: Value) -> Self {
        CacheValue::from_json(value)
    }
}

/// Persisted form of one entry:
/// `{ "type"?: "map", "length"?: n, "data": value | pairs, "created": epoch-millis }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct StoredEntry {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<usize>,
    pub data: Value,
    pub created: i64,
}

impl StoredEntry {
    pub fn new(value: &CacheValue, created: i64) -> Self {
        match value {
            CacheValue::Scalar(value) => Self {
                kind: None,
                length: None,
                data: value.clone(),
                created,
            },
            CacheValue::Sequence(items) => Self {
                kind: None,
                length: Some(items.len()),
                data: Value::Array(items.clone()),
                created,
            },
            CacheValue::Map(map) => {
                let pairs: Vec<Value> = map
                    .iter()
                    .filter(|(key, _)| !is_back_reference(key))
                    .map(|(key, value)| {
                        Value::Array(vec![Value::String(key.clone()), strip_back_references(value)])
                    })
                    .collect();
                Self {
                    kind: Some(MAP_KIND.to_string()),
                    length: Some(pairs.len()),
                    data: Value::Array(pairs),
                    created,
                }
            }
        }
    }

    pub fn is_map(&self) -> bool {
        self.kind.as_deref() == Some(MAP_KIND)
    }

    /// Rebuild the cached value; `None` if a map entry is malformed.
    pub fn into_value(self) -> Option<CacheValue> {
        if !self.is_map() {
            return Some(CacheValue::from_json(self.data));
        }

        let Value::Array(pairs) = self.data else {
            return None;
        };
        let mut map = Map::with_capacity(pairs.len());
        for pair in pairs {
            let Value::Array(mut kv) = pair else {
                return None;
            };
            if kv.len() != 2 {
                return None;
            }
            let value = kv.pop()?;
            let Some(Value::String(key)) = kv.pop() else {
                return None;
            };
            map.insert(key, value);
        }
        Some(CacheValue::Map(map))
    }
}

fn is_back_reference(key: &str) -> bool {
    key.ends_with(BACK_REFERENCE_SUFFIX)
}

/// Drop back-reference properties at every depth.
fn strip_back_references(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(key, _)| !is_back_reference(key))
                .map(|(key, value)| (key.clone(), strip_back_references(value)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(strip_back_references).collect()),
        other => other.clone(),
    }
}
