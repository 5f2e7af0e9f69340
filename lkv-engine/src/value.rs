//! # Value Model
//!
//! A cache entry is one of three kinds: a scalar string, an ordered list of
//! strings, or a string-to-string map. The closed enum replaces runtime type
//! switching with variant matching; every command that cares about kind
//! matches on `Value` and renders `kind()` into its type-error message.

use std::collections::VecDeque;

use ahash::RandomState;
use serde::{Deserialize, Serialize};

/// String-to-string map stored under a single key.
pub type Map = hashbrown::HashMap<String, String, RandomState>;

/// The keyspace: key to typed value.
pub type Fields = hashbrown::HashMap<String, Value, RandomState>;

/// A typed cache value.
///
/// Serde's external tagging doubles as the snapshot format's per-value kind
/// tag, so deserialization never has to guess the kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// Scalar string, written by SET.
    Str(String),
    /// Ordered list with O(1) push/pop at both ends and O(1) indexing.
    List(VecDeque<String>),
    /// Field-to-value map; field order is not preserved.
    Map(Map),
}

impl Value {
    /// Kind name used in `Requested field is of type <kind>` errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
        }
    }
}

/// Kind name for a lookup result, rendering absence as `nil`.
pub fn kind_of(value: Option<&Value>) -> &'static str {
    value.map(Value::kind).unwrap_or("nil")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_names() {
        assert_eq!(Value::Str("a".into()).kind(), "string");
        assert_eq!(Value::List(VecDeque::new()).kind(), "list");
        assert_eq!(Value::Map(Map::default()).kind(), "map");
        assert_eq!(kind_of(None), "nil");
    }

    #[test]
    fn serde_tags_every_kind() {
        let scalar = Value::Str("hello".into());
        let encoded = serde_json::to_string(&scalar).unwrap();
        assert_eq!(encoded, r#"{"Str":"hello"}"#);

        let list = Value::List(VecDeque::from(["a".to_string(), "b".to_string()]));
        let encoded = serde_json::to_string(&list).unwrap();
        assert_eq!(encoded, r#"{"List":["a","b"]}"#);

        let mut map = Map::default();
        map.insert("field".into(), "value".into());
        let encoded = serde_json::to_string(&Value::Map(map.clone())).unwrap();
        assert_eq!(encoded, r#"{"Map":{"field":"value"}}"#);

        for value in [scalar, list, Value::Map(map)] {
            let blob = serde_json::to_vec(&value).unwrap();
            let decoded: Value = serde_json::from_slice(&blob).unwrap();
            assert_eq!(decoded, value);
        }
    }
}
