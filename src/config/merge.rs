//! Merge functionality for override configurations.
//!
//! Only the top level is merged: each key present in the override replaces the
//! default's value for that key wholesale. Nested objects are not combined.

use serde_json::Value;

/// Shallow merge two JSON values, with `overlay` taking precedence over `base`.
///
/// - Both objects: each overlay key replaces the base key entirely
/// - Overlay null: base is preserved (null means "not specified")
/// - Anything else: overlay replaces base
///
/// # Example
/// ```
/// use serde_json::json;
/// use nyl_pages::config::shallow_merge;
///
/// let base = json!({
///     "build": { "src": "src", "dist": "dist" },
///     "data": {}
/// });
/// let overlay = json!({
///     "build": { "src": "app" }
/// });
/// let result = shallow_merge(base, overlay);
/// assert_eq!(result, json!({ "build": { "src": "app" }, "data": {} }));
/// ```
pub fn shallow_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base_map), Value::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                if !overlay_value.is_null() {
                    base_map.insert(key, overlay_value);
                }
            }
            Value::Object(base_map)
        }
        (base, Value::Null) => base,
        (_, overlay) => overlay,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_merge_simple_objects() {
        let base = json!({"a": 1, "b": 2});
        let overlay = json!({"b": 3, "c": 4});
        assert_eq!(shallow_merge(base, overlay), json!({"a": 1, "b": 3, "c": 4}));
    }

    #[test]
    fn test_nested_objects_replaced_wholesale() {
        let base = json!({
            "build": {"src": "src", "dist": "dist"},
            "data": {"title": "x"}
        });
        let overlay = json!({
            "build": {"dist": "out"}
        });
        assert_eq!(
            shallow_merge(base, overlay),
            json!({
                "build": {"dist": "out"},
                "data": {"title": "x"}
            })
        );
    }

    #[test]
    fn test_null_preserves_base() {
        let base = json!({"a": 1, "b": {"c": 2}});
        let overlay = json!({"a": null});
        assert_eq!(shallow_merge(base, overlay), json!({"a": 1, "b": {"c": 2}}));
    }

    #[test]
    fn test_non_object_overlay_replaces_base() {
        let base = json!({"a": 1});
        assert_eq!(shallow_merge(base, json!([1, 2])), json!([1, 2]));
    }
}
