//! `BuildService`: fachada de la aplicación.
//!
//! Une el orquestador de workflows con el pipeline de confianza (que actúa
//! como su gate) y expone cada operación con parámetros JSON. `dispatch`
//! enruta por nombre y devuelve siempre el envelope uniforme.
use bim_adapters::{standard_catalog, InMemoryBuildModel, StandardPhase};
use bim_confidence::{CipsOrchestrator, FeedbackStore, InMemoryFeedbackStore, InMemoryReviewStore, ReviewStore};
use bim_core::{BuildExecutor, WorkflowOrchestrator};
use bim_persistence::{JsonFileFeedbackStore, JsonFileReviewStore};
use log::{debug, info, warn};
use serde_json::Value;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::errors::ApiError;

mod confidence_api;
pub mod envelope;
pub mod params;
mod workflow_api;

pub use envelope::{failure, respond, success};

/// Nombres de operación aceptados por [`BuildService::dispatch`].
pub const METHODS: &[&str] = &["createWorkflow",
                               "getWorkflow",
                               "executeNextPhase",
                               "executePhase",
                               "executeAll",
                               "skipPhase",
                               "getPhaseDefinitions",
                               "getDependencyGraph",
                               "getProgress",
                               "listWorkflows",
                               "deleteWorkflow",
                               "getWorkflowEvents",
                               "calculateConfidence",
                               "processOperation",
                               "processBatch",
                               "submitReview",
                               "getPendingReviews",
                               "getReview",
                               "getQueueStats",
                               "getFeedbackStats",
                               "getEnvelope",
                               "purgeExpiredReviews"];

pub struct BuildService {
    orchestrator: WorkflowOrchestrator,
    cips: Arc<CipsOrchestrator>,
}

impl BuildService {
    /// Servicio sobre el catálogo estándar y un ejecutor de construcción
    /// arbitrario. Con rutas de stores configuradas restaura la cola de
    /// revisión y el historial de feedback desde disco.
    pub fn new(config: AppConfig, build: Arc<dyn BuildExecutor>) -> Result<Self, ApiError> {
        let cips = CipsOrchestrator::new(config.confidence.clone(), build.clone())?
            .with_operation_timeout(config.operation_timeout);
        let cips = if config.storage.review_queue_path.is_some() || config.storage.feedback_path.is_some() {
            let review_store: Arc<dyn ReviewStore> = match &config.storage.review_queue_path {
                Some(path) => Arc::new(JsonFileReviewStore::new(path)),
                None => Arc::new(InMemoryReviewStore::new()),
            };
            let feedback_store: Arc<dyn FeedbackStore> = match &config.storage.feedback_path {
                Some(path) => Arc::new(JsonFileFeedbackStore::new(path)),
                None => Arc::new(InMemoryFeedbackStore::new()),
            };
            cips.with_stores(review_store, feedback_store)?
        } else {
            cips
        };
        let cips = Arc::new(cips);

        let orchestrator = WorkflowOrchestrator::builder(standard_catalog()?, build).executors(StandardPhase::executors())
                                                                                  .gate(cips.clone())
                                                                                  .operation_timeout(config.operation_timeout)
                                                                                  .build()?;
        info!("build service ready phases={} confidence_enabled={}",
              orchestrator.catalog().len(),
              cips.is_enabled());
        Ok(Self { orchestrator, cips })
    }

    /// Servicio sobre el modelo en memoria; devuelve también el modelo para
    /// poder inspeccionarlo.
    pub fn in_memory(config: AppConfig) -> Result<(Self, Arc<InMemoryBuildModel>), ApiError> {
        let model = Arc::new(InMemoryBuildModel::new());
        let service = Self::new(config, model.clone())?;
        Ok((service, model))
    }

    /// Configuración del entorno y modelo en memoria.
    pub fn from_env() -> Result<Self, ApiError> {
        let config = AppConfig::from_env()?;
        Ok(Self::in_memory(config)?.0)
    }

    pub fn orchestrator(&self) -> &WorkflowOrchestrator {
        &self.orchestrator
    }

    pub fn cips(&self) -> &CipsOrchestrator {
        &self.cips
    }

    /// Enruta `method` a su operación. Un nombre desconocido produce un
    /// envelope `NotFound`; ningún error escapa como pánico. Tras cada
    /// operación, las fases se enteran de los ítems de revisión que caducaron
    /// o fueron expulsados de la cola.
    pub async fn dispatch(&self, method: &str, params: &Value) -> Value {
        debug!("dispatch method={method}");
        let result = match method {
            "createWorkflow" => self.create_workflow(params),
            "getWorkflow" => self.get_workflow(params).await,
            "executeNextPhase" => self.execute_next_phase(params).await,
            "executePhase" => self.execute_phase(params).await,
            "executeAll" => self.execute_all(params).await,
            "skipPhase" => self.skip_phase(params).await,
            "getPhaseDefinitions" => self.phase_definitions(),
            "getDependencyGraph" => self.dependency_graph(),
            "getProgress" => self.progress(params).await,
            "listWorkflows" => self.list_workflows().await,
            "deleteWorkflow" => self.delete_workflow(params).await,
            "getWorkflowEvents" => self.workflow_events(params),
            "calculateConfidence" => self.calculate_confidence(params),
            "processOperation" => self.process_operation(params).await,
            "processBatch" => self.process_batch(params).await,
            "submitReview" => self.submit_review(params).await,
            "getPendingReviews" => self.pending_reviews(),
            "getReview" => self.review(params),
            "getQueueStats" => self.queue_stats(),
            "getFeedbackStats" => self.feedback_stats(),
            "getEnvelope" => self.envelope(params),
            "purgeExpiredReviews" => self.purge_expired_reviews(),
            other => Err(ApiError::NotFound(format!("unknown method '{other}'"))),
        };
        if let Err(e) = &result {
            warn!("operation failed method={method} kind={} error={e}", e.error_kind());
        }
        self.release_lapsed_reviews().await;
        respond(result)
    }
}
