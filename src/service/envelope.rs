//! Envelope uniforme de respuesta: `{success: true, ...}` o
//! `{success: false, error, errorKind}`.
use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::errors::ApiError;

/// Envelope exitoso. Los campos de un cuerpo objeto se aplanan junto a
/// `success` (y pueden sobrescribirlo); cualquier otro valor va en `result`.
pub fn success(body: Value) -> Value {
    let mut out = Map::new();
    out.insert("success".into(), Value::Bool(true));
    match body {
        Value::Object(fields) => out.extend(fields),
        Value::Null => {}
        other => {
            out.insert("result".into(), other);
        }
    }
    Value::Object(out)
}

pub fn failure(err: &ApiError) -> Value {
    json!({
        "success": false,
        "error": err.to_string(),
        "errorKind": err.error_kind().as_str(),
    })
}

pub fn respond(result: Result<Value, ApiError>) -> Value {
    match result {
        Ok(body) => success(body),
        Err(e) => failure(&e),
    }
}

/// Serializa un valor de dominio como cuerpo de respuesta.
pub fn to_body<T: Serialize>(value: &T) -> Result<Value, ApiError> {
    serde_json::to_value(value).map_err(|e| ApiError::Internal(e.to_string()))
}

/// Agrega campos a un cuerpo objeto.
pub fn with_fields(mut body: Value, fields: Value) -> Value {
    if let (Value::Object(target), Value::Object(extra)) = (&mut body, fields) {
        target.extend(extra);
    }
    body
}
