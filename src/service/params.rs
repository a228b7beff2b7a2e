//! Lectura tipada de los parámetros JSON de cada operación.
use serde::de::DeserializeOwned;
use serde_json::Value;
use uuid::Uuid;

use crate::errors::ApiError;

pub fn opt_str<'a>(params: &'a Value, key: &str) -> Result<Option<&'a str>, ApiError> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(other) => Err(ApiError::Validation(format!("{key} must be a string, got {other}"))),
    }
}

pub fn req_str<'a>(params: &'a Value, key: &str) -> Result<&'a str, ApiError> {
    opt_str(params, key)?.filter(|s| !s.trim().is_empty())
                         .ok_or_else(|| ApiError::missing_param(key))
}

pub fn opt_bool(params: &Value, key: &str) -> Result<Option<bool>, ApiError> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(other) => Err(ApiError::Validation(format!("{key} must be a boolean, got {other}"))),
    }
}

pub fn uuid_param(params: &Value, key: &str) -> Result<Uuid, ApiError> {
    let raw = req_str(params, key)?;
    Uuid::parse_str(raw.trim()).map_err(|e| ApiError::Validation(format!("{key} is not a valid uuid: {e}")))
}

pub fn workflow_id(params: &Value) -> Result<Uuid, ApiError> {
    uuid_param(params, "workflowId")
}

/// Clave de fase: nombre o id (`phase`, `phaseId` o `phaseName`).
pub fn phase_key(params: &Value) -> Result<String, ApiError> {
    for key in ["phase", "phaseId", "phaseName"] {
        match params.get(key) {
            Some(Value::String(s)) if !s.trim().is_empty() => return Ok(s.trim().to_string()),
            Some(Value::Number(n)) => return Ok(n.to_string()),
            _ => {}
        }
    }
    Err(ApiError::missing_param("phase"))
}

/// Campo opcional deserializado a `T`.
pub fn opt_field<T: DeserializeOwned>(params: &Value, key: &str) -> Result<Option<T>, ApiError> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => serde_json::from_value(v.clone()).map(Some)
                                                    .map_err(|e| ApiError::Validation(format!("{key}: {e}"))),
    }
}
