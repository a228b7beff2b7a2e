//! Contrato entre el orquestador y el subsistema de confianza.
//!
//! El orquestador no conoce umbrales ni colas: entrega un lote de operaciones
//! y recibe qué se ejecutó, qué falló y qué quedó a la espera de revisión. Un
//! `Err` del gate es un fallo interno del pipeline y dispara la ejecución
//! directa de la fase.
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::CoreEngineError;
use crate::phase::{AtomicOperation, OperationOrigin};

#[derive(Debug, Clone, PartialEq)]
pub struct GatedBatch {
    pub description: String,
    pub operations: Vec<AtomicOperation>,
    pub auto_execute: bool,
    pub origin: Option<OperationOrigin>,
    /// Ids ya existentes en el workflow; el scoring los usa como contexto.
    pub known_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GateOutcome {
    pub success: bool,
    pub created_ids: Vec<String>,
    pub executed: usize,
    pub verified: usize,
    pub failed: usize,
    pub queued: usize,
    pub review_ids: Vec<String>,
    pub average_confidence: Option<f64>,
    pub errors: Vec<String>,
    /// (slot, id) de las operaciones ejecutadas que declaran clave estable.
    #[serde(default)]
    pub slots: Vec<(String, String)>,
    /// El pipeline falló después de ejecutar parte del lote. `remaining` son
    /// las operaciones que no llegó a procesar, en el orden del lote.
    #[serde(default)]
    pub interrupted: Option<String>,
    #[serde(default)]
    pub remaining: Vec<AtomicOperation>,
}

/// Desenlace de un ítem de revisión visto desde la fase que lo originó.
#[derive(Debug, Clone, PartialEq)]
pub enum ReviewVerdict {
    /// Aprobado y ejecutado sin error.
    Applied {
        created_ids: Vec<String>,
        slot: Option<String>,
    },
    /// Rechazado; no se ejecutó nada.
    Rejected,
    /// Aprobado, pero la ejecución falló. La fase pasa a `Failed`.
    Failed { error: String },
}

impl ReviewVerdict {
    pub fn is_approval(&self) -> bool {
        !matches!(self, ReviewVerdict::Rejected)
    }
}

#[async_trait]
pub trait OperationGate: Send + Sync {
    fn is_enabled(&self) -> bool;

    async fn process(&self, batch: GatedBatch) -> Result<GateOutcome, CoreEngineError>;

    /// Retira de la cola ítems de revisión que ya no pueden aplicarse (la
    /// fase que los originó se re-ejecutó, se omitió o falló). Devuelve
    /// cuántos retiró.
    fn withdraw(&self, _review_ids: &[String]) -> usize {
        0
    }
}
