//! Retrieve payload shapes.
//!
//! The backend has answered `retrieve_flow_data` in several shapes over time.
//! [`flatten_payload`] reduces all of them to one list of raw items.

use serde_json::Value;
use tracing::debug;

use crate::{IvrFlowError, Result};

/// Flattens a retrieve response into the flat record list it carries.
///
/// An empty object is what the backend returns for an unknown flow and
/// yields an empty list.
pub fn flatten_payload(value: Value) -> Result<Vec<Value>> {
    match value {
        Value::String(text) => {
            let parsed = serde_json::from_str::<Value>(&text).map_err(|e| IvrFlowError::MalformedPayload(format!("flow data is not valid JSON: {}", e)))?;
            if parsed.is_string() {
                return Err(IvrFlowError::MalformedPayload("flow data is doubly encoded".to_string()));
            }
            flatten_payload(parsed)
        }
        Value::Array(items) => Ok(items),
        Value::Object(mut map) => {
            if map.is_empty() {
                return Ok(Vec::new());
            }

            if let Some(main) = map.get_mut("pagesData").and_then(|p| p.get_mut("Main")).and_then(Value::as_object_mut) {
                debug!("flow data in pages shape");
                let mut items = take_array(main.remove("NodesData"));
                items.extend(take_array(main.remove("EdgesData")));
                return Ok(items);
            }

            for key in ["lastData", "0"] {
                if map.get(key).is_some_and(Value::is_array) {
                    debug!("flow data under key '{}'", key);
                    return Ok(take_array(map.remove(key)));
                }
            }

            if !map.values().all(|v| v.is_array() || v.is_object()) {
                return Err(IvrFlowError::MalformedPayload("unrecognized flow data object".to_string()));
            }
            let mut items = Vec::new();
            for (_, value) in map {
                match value {
                    Value::Array(inner) => items.extend(inner),
                    other => items.push(other),
                }
            }
            Ok(items)
        }
        other => Err(IvrFlowError::MalformedPayload(format!("unexpected flow data: {}", other))),
    }
}

fn take_array(value: Option<Value>) -> Vec<Value> {
    match value {
        Some(Value::Array(items)) => items,
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_array_and_string() {
        let items = flatten_payload(json!([{"id": "a"}, {"id": "b"}])).unwrap();
        assert_eq!(items.len(), 2);

        let items = flatten_payload(json!(r#"[{"id": "a"}]"#)).unwrap();
        assert_eq!(items, vec![json!({"id": "a"})]);

        let err = flatten_payload(json!("{not json")).unwrap_err();
        assert!(matches!(err, IvrFlowError::MalformedPayload(_)));
    }

    #[test]
    fn test_empty_object() {
        assert!(flatten_payload(json!({})).unwrap().is_empty());
    }

    #[test]
    fn test_pages_shape() {
        let items = flatten_payload(json!({
            "pagesData": {"Main": {"NodesData": [{"id": "start-1"}], "EdgesData": [{"id": "e1"}]}}
        }))
        .unwrap();
        assert_eq!(items, vec![json!({"id": "start-1"}), json!({"id": "e1"})]);
    }

    #[test]
    fn test_keyed_shapes() {
        let items = flatten_payload(json!({"flowName": "Sales IVR", "lastData": [{"id": "a"}]})).unwrap();
        assert_eq!(items, vec![json!({"id": "a"})]);

        let items = flatten_payload(json!({"0": [{"id": "a"}, {"id": "b"}]})).unwrap();
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn test_object_values_flattened() {
        let items = flatten_payload(json!({"nodes": [{"id": "a"}], "edge": {"id": "e1"}})).unwrap();
        assert_eq!(items.len(), 2);
        assert!(items.contains(&json!({"id": "e1"})));
    }

    #[test]
    fn test_malformed() {
        for value in [json!(42), json!(true), Value::Null, json!({"flowName": "x", "nodes": []})] {
            let err = flatten_payload(value).unwrap_err();
            assert!(matches!(err, IvrFlowError::MalformedPayload(_)));
        }
    }
}
