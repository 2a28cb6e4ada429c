//! Layer merging
//!
//! - Objects: deep-merge by key
//! - Arrays: replace (last wins)
//! - Scalars: override (last wins)

use serde_json::Value;

/// Deep merge `overlay` onto `base`.
///
/// Null in the overlay overrides any value.
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base_map), Value::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                let merged = match base_map.remove(&key) {
                    Some(base_value) => deep_merge(base_value, overlay_value),
                    None => overlay_value,
                };
                base_map.insert(key, merged);
            }
            Value::Object(base_map)
        }
        (_, overlay) => overlay,
    }
}

/// Merge layers in order; later layers take precedence.
pub fn merge_layers(layers: Vec<Value>) -> Value {
    layers.into_iter().fold(Value::Null, deep_merge)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scalar_override() {
        let result = deep_merge(json!({"sdk": "iphoneos"}), json!({"sdk": "iphonesimulator"}));
        assert_eq!(result["sdk"], "iphonesimulator");
    }

    #[test]
    fn test_keys_preserved_and_added() {
        let result = deep_merge(
            json!({"clean": true, "archive": true}),
            json!({"archive": false, "scheme": "App"}),
        );
        assert_eq!(result["clean"], true);
        assert_eq!(result["archive"], false);
        assert_eq!(result["scheme"], "App");
    }

    #[test]
    fn test_nested_objects_merge() {
        let result = deep_merge(
            json!({"signing": {"identity": "A", "embed": "x.mobileprovision"}}),
            json!({"signing": {"identity": "B"}}),
        );
        assert_eq!(result["signing"]["identity"], "B");
        assert_eq!(result["signing"]["embed"], "x.mobileprovision");
    }

    #[test]
    fn test_array_replaced() {
        let result = deep_merge(json!({"list": [1, 2, 3]}), json!({"list": [9]}));
        assert_eq!(result["list"], json!([9]));
    }

    #[test]
    fn test_merge_layers_precedence() {
        let result = merge_layers(vec![
            json!({"sdk": "iphoneos", "destination": "."}),
            json!({"destination": "build"}),
            json!({"destination": "out", "scheme": "App"}),
        ]);
        assert_eq!(result["sdk"], "iphoneos");
        assert_eq!(result["destination"], "out");
        assert_eq!(result["scheme"], "App");
    }

    #[test]
    fn test_merge_no_layers_is_null() {
        assert!(merge_layers(Vec::new()).is_null());
    }
}
