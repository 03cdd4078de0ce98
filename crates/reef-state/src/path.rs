//! Dotted-path access into JSON values.

use serde_json::Value;

/// Look up a dotted path (`a.b.c`) inside a value. An empty path returns
/// the value itself. Array indices are supported as numeric segments.
pub fn lookup_path<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(root);
    }
    let mut current = root;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Get a mutable slot for a dotted path, creating intermediate objects
/// for missing segments. Returns `None` when the path runs through a
/// non-object value (writes never clobber scalars or arrays implicitly).
pub fn ensure_path<'a>(root: &'a mut Value, path: &str) -> Option<&'a mut Value> {
    if path.is_empty() {
        return Some(root);
    }
    let mut current = root;
    for segment in path.split('.') {
        match current {
            Value::Object(map) => {
                current = map
                    .entry(segment.to_string())
                    .or_insert(Value::Object(Default::default()));
            }
            Value::Array(items) => {
                let index = segment.parse::<usize>().ok()?;
                current = items.get_mut(index)?;
            }
            _ => return None,
        }
    }
    Some(current)
}
