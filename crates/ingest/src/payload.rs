//! Body decoding shared by the templated providers.

use hookrelay_core::InboundRequest;
use serde_json::{Map, Value};

use crate::error::HandlerError;

pub const CONTENT_TYPE_JSON: &str = "application/json";
pub const CONTENT_TYPE_FORM: &str = "application/x-www-form-urlencoded";

/// Form field that carries the embedded JSON document.
pub const FORM_PAYLOAD_FIELD: &str = "payload";

/// Decode a JSON body, or a form body whose `payload` field holds JSON.
pub fn decode_json_or_form(req: &InboundRequest) -> Result<Value, HandlerError> {
    match req.content_type().as_deref() {
        Some(CONTENT_TYPE_JSON) => parse_document(req.body()),
        Some(CONTENT_TYPE_FORM) => {
            parse_document(form_payload(req.body()).unwrap_or_default().as_bytes())
        }
        Some(other) => Err(HandlerError::malformed(format!(
            "unsupported content type '{other}'"
        ))),
        None => Err(HandlerError::malformed("missing content type")),
    }
}

/// Decode a body that must be `application/json`.
pub fn decode_json(req: &InboundRequest) -> Result<Value, HandlerError> {
    match req.content_type().as_deref() {
        Some(CONTENT_TYPE_JSON) => parse_document(req.body()),
        Some(other) => Err(HandlerError::malformed(format!(
            "unsupported content type '{other}'"
        ))),
        None => Err(HandlerError::malformed("missing content type")),
    }
}

/// Require a JSON object at the top level.
pub fn into_object(value: Value, what: &str) -> Result<Map<String, Value>, HandlerError> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(HandlerError::malformed(format!(
            "{what} must be a JSON object, got {}",
            json_kind(&other)
        ))),
    }
}

fn form_payload(body: &[u8]) -> Option<String> {
    url::form_urlencoded::parse(body)
        .find(|(key, _)| key == FORM_PAYLOAD_FIELD)
        .map(|(_, value)| value.into_owned())
}

fn parse_document(raw: &[u8]) -> Result<Value, HandlerError> {
    if raw.trim_ascii().is_empty() {
        return Err(HandlerError::malformed("payload is empty"));
    }
    serde_json::from_slice(raw).map_err(|e| HandlerError::malformed(format!("invalid JSON: {e}")))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
