//! Contratos de ejecución: el ejecutor opaco de construcción y los
//! ejecutores de fase que traducen el programa en operaciones atómicas.
use async_trait::async_trait;
use log::debug;
use serde_json::{Map, Value};
use std::time::Duration;
use uuid::Uuid;

use super::{AtomicOperation, OperationOrigin, PhaseDefinition, PhaseId};
use crate::constants::CREATED_ID_KEYS;
use crate::errors::{CoreEngineError, ExecutorError};
use crate::model::Registry;

/// Acción de construcción opaca (crea geometría o recursos en el modelo
/// destino). Devuelve el payload de resultado de la llamada.
#[async_trait]
pub trait BuildExecutor: Send + Sync {
    async fn execute(&self, method: &str, params: &Value) -> Result<Map<String, Value>, ExecutorError>;
}

/// Ejecuta una llamada acotada por `timeout`. Vencido el plazo devuelve
/// `ExecutorError::Timeout` y la llamada en curso se descarta.
pub async fn call_with_timeout(build: &dyn BuildExecutor,
                               method: &str,
                               params: &Value,
                               timeout: Duration)
                               -> Result<Map<String, Value>, ExecutorError> {
    match tokio::time::timeout(timeout, build.execute(method, params)).await {
        Ok(res) => res,
        Err(_) => Err(ExecutorError::Timeout(timeout.as_millis() as u64)),
    }
}

/// Ids de elementos creados informados en un payload de resultado
/// (`elementId` escalar o `elementIds` lista; textos o números).
pub fn created_ids(result: &Map<String, Value>) -> Vec<String> {
    fn as_id(v: &Value) -> Option<String> {
        match v {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
    let mut ids = Vec::new();
    for key in CREATED_ID_KEYS {
        match result.get(key) {
            Some(Value::Array(items)) => ids.extend(items.iter().filter_map(as_id)),
            Some(v) => ids.extend(as_id(v)),
            None => {}
        }
    }
    ids
}

/// Snapshot de lo que una fase necesita para planificar sus operaciones. Es
/// una copia: el ejecutor nunca ve el estado mutable del workflow.
#[derive(Debug, Clone)]
pub struct PhaseContext {
    pub workflow_id: Uuid,
    pub definition: PhaseDefinition,
    /// Programa de construcción en JSON neutral.
    pub program: Value,
    pub registry: Registry,
    pub operation_timeout: Duration,
}

impl PhaseContext {
    pub fn origin(&self) -> OperationOrigin {
        OperationOrigin { workflow_id: self.workflow_id,
                          phase_id: self.definition.id }
    }

    /// Ids ya registrados en `bucket` (en orden de inserción).
    pub fn bucket_ids(&self, bucket: &str) -> Vec<String> {
        self.registry.ids(bucket)
    }
}

/// Lo que deja una ejecución exitosa de fase.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PhaseOutput {
    pub created_ids: Vec<String>,
    pub warnings: Vec<String>,
    pub confidence: Option<f64>,
    /// (slot, id) de las operaciones que declaran clave estable.
    pub slots: Vec<(String, String)>,
}

/// Un ejecutor por fase del catálogo.
///
/// `operations` planifica la lista de operaciones atómicas (sin efectos).
/// `execute` las corre en directo; una fase puede devolver una lista vacía en
/// `operations` y sobrescribir `execute` para forzar siempre el camino
/// directo (descubrimiento con deduplicación previa).
#[async_trait]
pub trait PhaseExecutor: Send + Sync {
    fn phase_id(&self) -> PhaseId;

    fn validate(&self, ctx: &PhaseContext) -> Result<(), CoreEngineError> {
        validate_required_inputs(ctx)
    }

    fn operations(&self, ctx: &PhaseContext) -> Result<Vec<AtomicOperation>, CoreEngineError>;

    async fn execute(&self, ctx: &PhaseContext, build: &dyn BuildExecutor) -> Result<PhaseOutput, CoreEngineError> {
        let operations = self.operations(ctx)?;
        execute_operations_direct(build, &operations, ctx.operation_timeout).await
    }
}

/// Verifica que cada input requerido exista: como campo no vacío del
/// programa o como bucket no vacío del registro.
pub fn validate_required_inputs(ctx: &PhaseContext) -> Result<(), CoreEngineError> {
    let missing: Vec<&str> = ctx.definition
                                .required_inputs
                                .iter()
                                .map(String::as_str)
                                .filter(|input| !input_present(ctx, input))
                                .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(CoreEngineError::Validation(format!("phase '{}' is missing required inputs: {}",
                                                ctx.definition.name,
                                                missing.join(", "))))
    }
}

fn input_present(ctx: &PhaseContext, input: &str) -> bool {
    let in_program = match ctx.program.get(input) {
        None | Some(Value::Null) => false,
        Some(Value::Array(a)) => !a.is_empty(),
        Some(Value::String(s)) => !s.is_empty(),
        Some(_) => true,
    };
    in_program || ctx.registry.count(input) > 0
}

/// Ejecuta en secuencia; la primera operación fallida aborta la fase.
pub async fn execute_operations_direct(build: &dyn BuildExecutor,
                                       operations: &[AtomicOperation],
                                       timeout: Duration)
                                       -> Result<PhaseOutput, CoreEngineError> {
    let mut output = PhaseOutput::default();
    for op in operations {
        let result = call_with_timeout(build, &op.method, &op.params, timeout).await
                     .map_err(|e| CoreEngineError::Executor(format!("{} failed: {e}", op.method)))?;
        let ids = created_ids(&result);
        debug!("direct op method={} created={}", op.method, ids.len());
        if let (Some(slot), Some(first)) = (&op.slot, ids.first()) {
            output.slots.push((slot.clone(), first.clone()));
        }
        output.created_ids.extend(ids);
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn created_ids_reads_scalar_and_list_keys() {
        let r = json!({"elementId": 42, "elementIds": ["a", "b", ""], "name": "x"});
        let ids = created_ids(r.as_object().unwrap());
        assert_eq!(ids, vec!["42", "a", "b"]);
        assert!(created_ids(&Map::new()).is_empty());
    }
}
