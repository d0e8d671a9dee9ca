//! Field codec
//!
//! Moves field metadata (`options`, `validationRule`) between its stored text
//! encoding and its structured shape, and moves submitted values between the
//! loosely typed JSON a client posts, the text the store keeps, and the typed
//! JSON handed back on reads.

use crate::models::{
    FieldOption, FieldType, FieldValueResponse, FieldValueRow, FormField, FormFieldRow,
    NewFormField, FieldInput, ValidationRule,
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

/// Encode structured metadata as text. `None` stays `None`.
pub fn encode_field_meta<T: Serialize>(meta: Option<&T>) -> Option<String> {
    let meta = meta?;
    match serde_json::to_string(meta) {
        Ok(text) => Some(text),
        Err(e) => {
            tracing::warn!("Failed to encode field metadata: {}", e);
            None
        }
    }
}

/// Decode stored metadata text. Malformed input decodes to `T::default()`
/// so a corrupt blob never breaks a read path.
pub fn decode_field_meta<T: DeserializeOwned + Default>(text: Option<&str>) -> Option<T> {
    let text = text?;
    if text.trim().is_empty() {
        return None;
    }
    match serde_json::from_str(text) {
        Ok(meta) => Some(meta),
        Err(e) => {
            tracing::warn!("Malformed field metadata, using default: {}", e);
            Some(T::default())
        }
    }
}

/// Decode a stored field row for callers.
pub fn decode_field(row: FormFieldRow) -> FormField {
    let options = decode_field_meta::<Vec<FieldOption>>(row.options.as_deref());
    let validation_rule = decode_field_meta::<ValidationRule>(row.validation_rule.as_deref());
    FormField {
        id: row.id,
        form_id: row.form_id,
        field_name: row.field_name,
        field_label: row.field_label,
        field_type: row.field_type,
        field_order: row.field_order,
        is_required: row.is_required,
        is_hidden: row.is_hidden,
        placeholder: row.placeholder,
        help_text: row.help_text,
        default_value: row.default_value,
        column_width: row.column_width,
        options,
        validation_rule,
    }
}

/// Encode a validated field definition into its insert shape.
pub fn encode_field(input: &FieldInput) -> NewFormField {
    let validation_rule = input
        .validation_rule
        .as_ref()
        .filter(|rule| !rule.is_empty());
    NewFormField {
        field_name: input.field_name.clone(),
        field_label: input.field_label.clone(),
        field_type: input.field_type,
        field_order: input.field_order,
        is_required: input.is_required,
        is_hidden: input.is_hidden,
        placeholder: input.placeholder.clone(),
        help_text: input.help_text.clone(),
        default_value: input.default_value.clone(),
        column_width: input.column_width.clone(),
        options: encode_field_meta(input.options.as_ref()),
        validation_rule: encode_field_meta(validation_rule),
    }
}

/// Parse a checkbox value. Accepts a JSON boolean or the text forms
/// `"true"`/`"false"`.
pub fn parse_checkbox(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Reduce a posted value to the text kept in storage.
///
/// Returns `Ok(None)` for null or blank input, `Err(reason)` when the value
/// cannot represent the field type.
pub fn value_to_text(field_type: FieldType, value: &Value) -> Result<Option<String>, String> {
    match value {
        Value::Null => return Ok(None),
        Value::String(s) if s.trim().is_empty() => return Ok(None),
        _ => {}
    }

    match field_type {
        FieldType::Checkbox => parse_checkbox(value)
            .map(|b| Some(b.to_string()))
            .ok_or_else(|| "must be true or false".to_string()),
        FieldType::Number => match value {
            Value::Number(n) => Ok(Some(n.to_string())),
            Value::String(s) => s
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|n| n.is_finite())
                .map(|_| Some(s.trim().to_string()))
                .ok_or_else(|| "must be a number".to_string()),
            _ => Err("must be a number".to_string()),
        },
        _ => match value {
            Value::String(s) => Ok(Some(s.trim().to_string())),
            Value::Number(n) => Ok(Some(n.to_string())),
            Value::Bool(b) => Ok(Some(b.to_string())),
            Value::Array(_) | Value::Object(_) => Err("must be a single value".to_string()),
            Value::Null => Ok(None),
        },
    }
}

/// Interpret stored text according to the field type.
pub fn text_to_typed(field_type: FieldType, text: Option<&str>) -> Value {
    let Some(text) = text else {
        return Value::Null;
    };
    match field_type {
        FieldType::Checkbox => parse_checkbox(&Value::String(text.to_string()))
            .map(Value::Bool)
            .unwrap_or(Value::Null),
        FieldType::Number => text
            .parse::<i64>()
            .map(Value::from)
            .or_else(|_| text.parse::<f64>().map(Value::from))
            .unwrap_or_else(|_| Value::String(text.to_string())),
        _ => Value::String(text.to_string()),
    }
}

pub fn decode_value(row: FieldValueRow) -> FieldValueResponse {
    let typed_value = text_to_typed(row.field_type, row.value.as_deref());
    FieldValueResponse {
        field_id: row.field_id,
        field_name: row.field_name,
        field_label: row.field_label,
        field_type: row.field_type,
        field_order: row.field_order,
        value: row.value,
        typed_value,
    }
}
