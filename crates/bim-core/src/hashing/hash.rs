//! Huellas blake3 sobre JSON canónico.

use blake3::Hasher;
use serde_json::Value;

use super::to_canonical_json;

/// Huella estable de una operación atómica (método + parámetros). Dos
/// operaciones con la misma huella son la misma petición al modelo.
pub fn operation_fingerprint(method: &str, params: &Value) -> String {
    let mut h = Hasher::new();
    h.update(method.as_bytes());
    h.update(b"\n");
    h.update(to_canonical_json(params).as_bytes());
    h.finalize().to_hex().to_string()
}
