//! Recursive merge of JSON objects.

use serde_json::Value;

/// Deep-merge `source` into `target`.
///
/// Nested objects are merged recursively; arrays and scalars are treated
/// as leaves. With `overwrite = false`, keys already present in `target`
/// keep their current leaf values (new nested keys are still added).
pub fn deep_merge(target: &mut Value, source: &Value, overwrite: bool) {
    let (Value::Object(target_map), Value::Object(source_map)) = (&mut *target, source) else {
        if overwrite {
            *target = source.clone();
        }
        return;
    };
    for (key, source_value) in source_map {
        match target_map.get_mut(key) {
            Some(existing) => {
                if existing.is_object() && source_value.is_object() {
                    deep_merge(existing, source_value, overwrite);
                } else if overwrite {
                    *existing = source_value.clone();
                }
            }
            None => {
                target_map.insert(key.clone(), source_value.clone());
            }
        }
    }
}
