//! Feed frame validation.

use serde_json::Value;

use crate::error::MalformedMessageError;
use crate::port::JsonObject;

/// Parse a text frame into a JSON object carrying every `required` field.
///
/// A field that is present but `null` counts as missing.
///
/// # Errors
///
/// Returns [`MalformedMessageError`] describing why the frame was rejected.
pub fn parse_message(text: &str, required: &[String]) -> Result<JsonObject, MalformedMessageError> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| MalformedMessageError::InvalidJson(e.to_string()))?;

    let object = match value {
        Value::Object(object) => object,
        Value::Array(_) => return Err(MalformedMessageError::NotAnObject("array")),
        Value::String(_) => return Err(MalformedMessageError::NotAnObject("string")),
        Value::Number(_) => return Err(MalformedMessageError::NotAnObject("number")),
        Value::Bool(_) => return Err(MalformedMessageError::NotAnObject("boolean")),
        Value::Null => return Err(MalformedMessageError::NotAnObject("null")),
    };

    if let Some(missing) = required
        .iter()
        .find(|field| object.get(field.as_str()).map_or(true, Value::is_null))
    {
        return Err(MalformedMessageError::MissingField(missing.clone()));
    }

    Ok(object)
}
