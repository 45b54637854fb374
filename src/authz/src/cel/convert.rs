//! Value conversion from serde_json::Value to cel_interpreter types

use std::collections::HashMap;
use std::sync::Arc;

use cel_interpreter::objects::{Key, Map, Value as CelValue};
use serde_json::Value as JsonValue;

/// Convert serde_json::Value to cel_interpreter::Value
pub fn json_to_cel(value: &JsonValue) -> CelValue {
    match value {
        JsonValue::Null => CelValue::Null,
        JsonValue::Bool(b) => CelValue::Bool(*b),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                CelValue::Int(i)
            } else if let Some(u) = n.as_u64() {
                CelValue::UInt(u)
            } else if let Some(f) = n.as_f64() {
                CelValue::Float(f)
            } else {
                CelValue::Null
            }
        }
        JsonValue::String(s) => CelValue::String(Arc::new(s.clone())),
        JsonValue::Array(arr) => {
            let items: Vec<CelValue> = arr.iter().map(json_to_cel).collect();
            CelValue::List(Arc::new(items))
        }
        JsonValue::Object(obj) => {
            let mut entries: HashMap<Key, CelValue> = HashMap::with_capacity(obj.len());
            for (k, v) in obj {
                entries.insert(Key::from(k.clone()), json_to_cel(v));
            }
            CelValue::Map(Map {
                map: Arc::new(entries),
            })
        }
    }
}
