use crate::domain::types::ToolArguments;
use serde_json::Value;

/// Checks tool arguments against the subset of JSON Schema that tool servers
/// commonly advertise: required keys, primitive property types, and
/// `additionalProperties: false`. Anything else in the schema is accepted.
pub fn validate_arguments(schema: &Value, arguments: &ToolArguments) -> Result<(), String> {
    let Some(schema) = schema.as_object() else {
        return Ok(());
    };
    if let Some(kind) = schema.get("type").and_then(Value::as_str) {
        if kind != "object" {
            return Ok(());
        }
    }

    if let Some(required) = schema.get("required").and_then(Value::as_array) {
        for key in required.iter().filter_map(Value::as_str) {
            if !arguments.contains_key(key) {
                return Err(format!("missing required argument '{key}'"));
            }
        }
    }

    let properties = schema.get("properties").and_then(Value::as_object);
    let closed = schema.get("additionalProperties") == Some(&Value::Bool(false));

    for (key, value) in arguments {
        let Some(property) = properties.and_then(|props| props.get(key)) else {
            if closed {
                return Err(format!("unexpected argument '{key}'"));
            }
            continue;
        };
        let allowed: Vec<&str> = match property.get("type") {
            Some(Value::String(kind)) => vec![kind.as_str()],
            Some(Value::Array(kinds)) => kinds.iter().filter_map(Value::as_str).collect(),
            _ => continue,
        };
        if !allowed.iter().any(|kind| matches_type(kind, value)) {
            return Err(format!(
                "argument '{key}' must be of type {}",
                allowed.join(" or ")
            ));
        }
    }

    Ok(())
}

fn matches_type(kind: &str, value: &Value) -> bool {
    match kind {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => {
            value.is_i64()
                || value.is_u64()
                || value.as_f64().is_some_and(|n| n.is_finite() && n.fract() == 0.0)
        }
        "boolean" => value.is_boolean(),
        "object" => value.is_object(),
        "array" => value.is_array(),
        "null" => value.is_null(),
        _ => true,
    }
}
