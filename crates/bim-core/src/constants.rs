//! Constantes del motor de workflows.
//!
//! Valores estáticos compartidos por el orquestador y por las capas que lo
//! envuelven (gating de confianza, servicio).

/// Versión lógica del motor. Se registra en el evento `WorkflowCreated` para
/// poder distinguir estados persistidos por versiones incompatibles.
pub const ENGINE_VERSION: &str = "W1.0";

/// Timeout por defecto de una operación atómica contra el ejecutor de
/// construcción (milisegundos).
pub const DEFAULT_OPERATION_TIMEOUT_MS: u64 = 30_000;

/// Claves que el ejecutor de construcción usa en sus resultados para
/// informar los identificadores de elementos creados.
pub const CREATED_ID_KEYS: [&str; 2] = ["elementId", "elementIds"];
