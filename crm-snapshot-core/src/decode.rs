//! Decoding of a single custom-field value against its descriptor.

use serde_json::Value;

use crate::schema::{scalar_key, FieldDescriptor, FieldKind};

const MULTIPLE_SEPARATOR: &str = ", ";

/// Decode `raw` according to `descriptor`. Never fails.
///
/// Multiplicity is checked before the kind: a multiple-valued field is always
/// joined into one string of its raw elements, so the choice ids of a
/// multiple enumeration are kept as ids rather than mapped to labels.
pub fn decode_value(raw: &Value, descriptor: &FieldDescriptor) -> Value {
    if descriptor.is_multiple {
        return Value::String(join_multiple(raw));
    }

    match &descriptor.kind {
        FieldKind::Enumeration(choices) => scalar_key(raw)
            .and_then(|id| choices.get(&id))
            .map(|label| Value::String(label.clone()))
            .unwrap_or_else(|| raw.clone()),
        FieldKind::Boolean => Value::Bool(matches!(raw, Value::String(s) if s == "Y")),
        FieldKind::Passthrough => raw.clone(),
    }
}

fn join_multiple(raw: &Value) -> String {
    let elements: &[Value] = match raw {
        Value::Null => &[],
        Value::Array(items) => items,
        scalar => std::slice::from_ref(scalar),
    };

    elements
        .iter()
        .filter(|v| !v.is_null())
        .map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .collect::<Vec<_>>()
        .join(MULTIPLE_SEPARATOR)
}
