//! Orquestador del pipeline de confianza.
//!
//! Reúne el cálculo de confianza, la tabla de umbrales, el bucle multi-pase,
//! la cola de revisión y el aprendizaje por feedback. Es la única puerta por
//! la que pasan las operaciones de construcción cuando el gating está activo.
use bim_core::constants::DEFAULT_OPERATION_TIMEOUT_MS;
use bim_core::phase::{call_with_timeout, created_ids};
use bim_core::{AtomicOperation, BuildExecutor, OperationOrigin, ReviewVerdict};
use chrono::Utc;
use dashmap::DashMap;
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::calculator::{ConfidenceCalculator, HeuristicCalculator, ScoringContext};
use crate::config::{ConfidenceConfig, Thresholds};
use crate::envelope::{ConfidenceEnvelope, EnvelopeStatus};
use crate::errors::PipelineError;
use crate::feedback::{FeedbackLearner, FeedbackRecord, MethodStats};
use crate::passes::{PassCoordinator, PassSummary};
use crate::review::{QueueStats, ReviewDecision, ReviewItem, ReviewQueueManager};
use crate::store::{FeedbackStore, InMemoryFeedbackStore, InMemoryReviewStore, ReviewStore};
use crate::thresholds::{clears, ThresholdTable};

/// Qué haría el pipeline con una operación de esa confianza.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Recommendation {
    /// Alcanza el umbral del primer pase.
    AutoExecute,
    /// Se ejecutaría en un pase posterior.
    Defer,
    /// No alcanza ningún umbral: terminaría en la cola de revisión.
    Review,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfidenceAssessment {
    pub method: String,
    pub confidence: f64,
    pub factors: BTreeMap<String, f64>,
    pub thresholds: Thresholds,
    /// Umbral efectivo de cada pase, del primero al último.
    pub pass_thresholds: Vec<f64>,
    pub adjustment: f64,
    pub recommendation: Recommendation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub batch_id: Uuid,
    pub description: String,
    pub success: bool,
    pub total: usize,
    /// Operaciones ejecutadas sin error (incluye las verificadas).
    pub executed: usize,
    pub verified: usize,
    pub failed: usize,
    pub queued: usize,
    pub created_ids: Vec<String>,
    pub review_ids: Vec<String>,
    pub average_confidence: Option<f64>,
    pub errors: Vec<String>,
    pub passes: Vec<PassSummary>,
    pub envelopes: Vec<ConfidenceEnvelope>,
    pub duration_ms: u64,
    /// El calculador falló después de ejecutar parte del lote.
    #[serde(default)]
    pub interrupted: Option<String>,
}

impl BatchReport {
    fn from_envelopes(description: &str,
                      envelopes: Vec<ConfidenceEnvelope>,
                      passes: Vec<PassSummary>,
                      interrupted: Option<String>,
                      started: Instant)
                      -> Self {
        let count = |s: EnvelopeStatus| envelopes.iter().filter(|e| e.status == s).count();
        let verified = count(EnvelopeStatus::Verified);
        let executed = count(EnvelopeStatus::Executed) + verified;
        let failed = count(EnvelopeStatus::Failed);
        let queued = count(EnvelopeStatus::Queued);
        let created_ids: Vec<String> = envelopes.iter().flat_map(|e| e.created_ids()).collect();
        let review_ids = envelopes.iter().filter_map(|e| e.review_id.clone()).collect();
        let errors = envelopes.iter()
                              .filter_map(|e| e.error.as_ref().map(|err| format!("{}: {err}", e.method)))
                              .collect();
        let scored: Vec<f64> = envelopes.iter().filter(|e| e.pass > 0).map(|e| e.confidence).collect();
        let average_confidence = if scored.is_empty() {
            None
        } else {
            Some(scored.iter().sum::<f64>() / scored.len() as f64)
        };
        Self { batch_id: Uuid::new_v4(),
               description: description.to_string(),
               success: failed == 0 || !created_ids.is_empty(),
               total: envelopes.len(),
               executed,
               verified,
               failed,
               queued,
               created_ids,
               review_ids,
               average_confidence,
               errors,
               passes,
               envelopes,
               duration_ms: started.elapsed().as_millis() as u64,
               interrupted }
    }
}

/// Desenlace de una decisión de revisión.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewOutcome {
    pub review_id: String,
    pub decision: ReviewDecision,
    /// Se llamó al ejecutor de construcción.
    pub executed: bool,
    pub success: bool,
    pub created_ids: Vec<String>,
    pub error: Option<String>,
    pub origin: Option<OperationOrigin>,
    pub notes: Option<String>,
    /// El ítem resuelto, con la decisión y el envelope final.
    pub item: ReviewItem,
    /// Nuevo ajuste del método si la decisión lo movió.
    pub threshold_adjustment: Option<f64>,
}

impl ReviewOutcome {
    /// Desenlace visto desde la fase que originó el ítem.
    pub fn verdict(&self) -> ReviewVerdict {
        match (self.decision, self.success) {
            (ReviewDecision::Reject, _) => ReviewVerdict::Rejected,
            (_, true) => ReviewVerdict::Applied { created_ids: self.created_ids.clone(),
                                                  slot: self.item.envelope.slot.clone() },
            (_, false) => ReviewVerdict::Failed { error: self.error
                                                            .clone()
                                                            .unwrap_or_else(|| "execution failed".to_string()) },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodFeedback {
    #[serde(flatten)]
    pub stats: MethodStats,
    pub approval_rate: f64,
    pub thresholds: Thresholds,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackStats {
    pub total_records: usize,
    pub min_samples_to_learn: usize,
    pub max_adjustment: f64,
    pub methods: BTreeMap<String, MethodFeedback>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn log_lapsed(reason: &str, item: &ReviewItem) {
    match item.envelope.origin {
        Some(origin) => {
            warn!("review item {reason} review_id={} method={} workflow_id={} phase={}",
                  item.review_id, item.envelope.method, origin.workflow_id, origin.phase_id)
        }
        None => warn!("review item {reason} review_id={} method={}", item.review_id, item.envelope.method),
    }
}

pub struct CipsOrchestrator {
    config: ConfidenceConfig,
    calculator: Arc<dyn ConfidenceCalculator>,
    build: Arc<dyn BuildExecutor>,
    thresholds: RwLock<ThresholdTable>,
    envelopes: DashMap<Uuid, ConfidenceEnvelope>,
    queue: Mutex<ReviewQueueManager>,
    /// Ítems con origen que salieron de la cola sin decisión y cuya fase aún
    /// no fue avisada.
    lapsed: Mutex<Vec<ReviewItem>>,
    learner: Mutex<FeedbackLearner>,
    review_store: Arc<dyn ReviewStore>,
    feedback_store: Arc<dyn FeedbackStore>,
    operation_timeout: Duration,
}

impl CipsOrchestrator {
    /// Crea el pipeline con el calculador heurístico y stores en memoria.
    pub fn new(config: ConfidenceConfig, build: Arc<dyn BuildExecutor>) -> Result<Self, PipelineError> {
        config.validate()?;
        Ok(Self { thresholds: RwLock::new(ThresholdTable::from_config(&config)),
                  queue: Mutex::new(ReviewQueueManager::new(config.review_queue.max_size,
                                                            config.review_queue.expire_hours)),
                  lapsed: Mutex::new(Vec::new()),
                  learner: Mutex::new(FeedbackLearner::new(config.feedback.min_samples_to_learn,
                                                           config.feedback.max_adjustment)),
                  calculator: Arc::new(HeuristicCalculator::new()),
                  build,
                  envelopes: DashMap::new(),
                  review_store: Arc::new(InMemoryReviewStore::new()),
                  feedback_store: Arc::new(InMemoryFeedbackStore::new()),
                  operation_timeout: Duration::from_millis(DEFAULT_OPERATION_TIMEOUT_MS),
                  config })
    }

    pub fn with_calculator(mut self, calculator: Arc<dyn ConfidenceCalculator>) -> Self {
        self.calculator = calculator;
        self
    }

    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    /// Conecta stores persistentes y restaura de ellos la cola pendiente y el
    /// historial de feedback (re-aplicando los ajustes aprendidos).
    pub fn with_stores(mut self,
                       review_store: Arc<dyn ReviewStore>,
                       feedback_store: Arc<dyn FeedbackStore>)
                       -> Result<Self, PipelineError> {
        let items = review_store.load()?;
        let records = feedback_store.load()?;

        let mut queue = ReviewQueueManager::new(self.config.review_queue.max_size, self.config.review_queue.expire_hours);
        let restored = items.len();
        queue.restore(items);

        let mut learner = FeedbackLearner::new(self.config.feedback.min_samples_to_learn,
                                               self.config.feedback.max_adjustment);
        let replayed = records.len();
        learner.replay(records);
        let mut table = ThresholdTable::from_config(&self.config);
        for (method, stats) in learner.stats() {
            if stats.adjustment != 0.0 {
                table.set_adjustment(method, stats.adjustment);
            }
        }
        info!("confidence stores loaded reviews={restored} feedback_records={replayed}");

        self.queue = Mutex::new(queue);
        self.learner = Mutex::new(learner);
        self.thresholds = RwLock::new(table);
        self.review_store = review_store;
        self.feedback_store = feedback_store;
        Ok(self)
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn config(&self) -> &ConfidenceConfig {
        &self.config
    }

    fn threshold_table(&self) -> ThresholdTable {
        self.thresholds.read().unwrap_or_else(|p| p.into_inner()).clone()
    }

    /// Umbrales vigentes de `method` (configuración más ajuste aprendido).
    pub fn thresholds_for(&self, method: &str) -> Thresholds {
        self.threshold_table().thresholds_for(method)
    }

    /// Puntúa una operación sin ejecutarla.
    pub fn calculate_confidence(&self,
                                method: &str,
                                params: &Value,
                                known_ids: &[String])
                                -> Result<ConfidenceAssessment, PipelineError> {
        let ctx = ScoringContext { pass: 1,
                                   known_ids: known_ids.iter().cloned().collect() };
        let score = self.calculator.score(method, params, &ctx)?;
        let table = self.threshold_table();
        let pass_thresholds: Vec<f64> =
            (1..=self.config.multi_pass.max_passes).map(|p| table.effective(method, p)).collect();
        let recommendation = match pass_thresholds.iter().position(|t| clears(score.value, *t)) {
            Some(0) => Recommendation::AutoExecute,
            Some(_) => Recommendation::Defer,
            None => Recommendation::Review,
        };
        Ok(ConfidenceAssessment { method: method.to_string(),
                                  confidence: score.value,
                                  factors: score.factors,
                                  thresholds: table.thresholds_for(method),
                                  pass_thresholds,
                                  adjustment: table.adjustment(method),
                                  recommendation })
    }

    /// Lote de una sola operación.
    pub async fn process_operation(&self,
                                   operation: AtomicOperation,
                                   auto_execute: bool,
                                   origin: Option<OperationOrigin>)
                                   -> Result<BatchReport, PipelineError> {
        let description = operation.description.clone();
        self.process_batch(vec![operation], &description, auto_execute, origin, Vec::new()).await
    }

    /// Pasa un lote por el bucle multi-pase. Las operaciones que no alcanzan
    /// ningún umbral (o todas, sin `auto_execute`) quedan en la cola de
    /// revisión. Un fallo de ejecución se registra en su envelope y no aborta
    /// el lote. Un fallo del calculador devuelve `Err` si aún no se ejecutó
    /// nada; si no, el lote termina `interrupted` y las operaciones sin
    /// procesar quedan `Failed`.
    pub async fn process_batch(&self,
                               operations: Vec<AtomicOperation>,
                               description: &str,
                               auto_execute: bool,
                               origin: Option<OperationOrigin>,
                               known_ids: Vec<String>)
                               -> Result<BatchReport, PipelineError> {
        self.run_batch(operations, description, auto_execute, origin, known_ids, false).await
    }

    /// Con `keep_unprocessed` las operaciones que un lote interrumpido no
    /// llegó a procesar quedan `Pending` para que el llamador las ejecute.
    pub(crate) async fn run_batch(&self,
                                  operations: Vec<AtomicOperation>,
                                  description: &str,
                                  auto_execute: bool,
                                  origin: Option<OperationOrigin>,
                                  known_ids: Vec<String>,
                                  keep_unprocessed: bool)
                                  -> Result<BatchReport, PipelineError> {
        let started = Instant::now();
        let envelopes: Vec<ConfidenceEnvelope> =
            operations.into_iter().map(|op| ConfidenceEnvelope::pending(op, origin)).collect();
        let table = self.threshold_table();
        let coordinator = PassCoordinator::new(self.calculator.as_ref(),
                                               &table,
                                               self.build.as_ref(),
                                               self.config.multi_pass.max_passes,
                                               self.operation_timeout);
        let known: HashSet<String> = known_ids.into_iter().collect();
        let mut outcome = coordinator.run(envelopes, auto_execute, known).await?;
        if let Some(reason) = outcome.interrupted.as_ref().filter(|_| !keep_unprocessed) {
            for env in outcome.envelopes.iter_mut().filter(|e| e.status == EnvelopeStatus::Pending) {
                env.error = Some(format!("not processed: scoring interrupted: {reason}"));
                env.set_status(EnvelopeStatus::Failed);
            }
        }

        let mut evicted = Vec::new();
        if outcome.envelopes.iter().any(|e| e.status == EnvelopeStatus::Queued) {
            let mut queue = lock(&self.queue);
            // ids ya asignados en este lote: dos operaciones iguales del mismo
            // lote son dos ítems
            let mut claimed = HashSet::new();
            for env in outcome.envelopes.iter_mut().filter(|e| e.status == EnvelopeStatus::Queued) {
                let existing = queue.find_pending(&env.fingerprint, env.origin, &claimed)
                                    .map(|i| i.review_id.clone());
                let review_id = match existing {
                    Some(review_id) => {
                        debug!("operation already awaiting review review_id={review_id} method={}", env.method);
                        review_id
                    }
                    None => {
                        let (item, dropped) = queue.enqueue(env.clone());
                        evicted.extend(dropped);
                        item.review_id
                    }
                };
                claimed.insert(review_id.clone());
                env.review_id = Some(review_id);
            }
            self.persist_queue(&queue);
        }
        self.record_lapsed("evicted (queue full)", evicted);
        for env in &outcome.envelopes {
            self.envelopes.insert(env.operation_id, env.clone());
        }

        let report = BatchReport::from_envelopes(description,
                                                 outcome.envelopes,
                                                 outcome.passes,
                                                 outcome.interrupted,
                                                 started);
        info!("batch processed description={:?} total={} executed={} failed={} queued={}",
              report.description, report.total, report.executed, report.failed, report.queued);
        Ok(report)
    }

    /// Resuelve un ítem de revisión. `Approve` ejecuta los parámetros
    /// originales, `ApproveModified` los de `modified_params` y `Reject` deja
    /// la operación como fallida sin ejecutarla. La decisión alimenta el
    /// aprendizaje de umbrales del método.
    pub async fn submit_review(&self,
                               review_id: &str,
                               decision: ReviewDecision,
                               modified_params: Option<Value>,
                               notes: Option<String>)
                               -> Result<ReviewOutcome, PipelineError> {
        if decision == ReviewDecision::ApproveModified && modified_params.is_none() {
            return Err(PipelineError::InvalidDecision("ApproveModified requires modifiedParams".into()));
        }
        let mut item = {
            let mut queue = lock(&self.queue);
            let item = queue.take(review_id)
                            .ok_or_else(|| PipelineError::ReviewNotFound(review_id.to_string()))?;
            self.persist_queue(&queue);
            item
        };
        item.decision = Some(decision);
        item.notes = notes;
        item.modified_params = modified_params.filter(|_| decision == ReviewDecision::ApproveModified);

        let original_confidence = item.envelope.confidence;
        if let Some(params) = &item.modified_params {
            item.envelope.params = params.clone();
        }
        let mut executed = false;
        match decision {
            ReviewDecision::Reject => {
                item.envelope.error = Some(match item.notes.as_deref() {
                                               Some(n) => format!("rejected by reviewer: {n}"),
                                               None => "rejected by reviewer".to_string(),
                                           });
                item.envelope.set_status(EnvelopeStatus::Failed);
            }
            ReviewDecision::Approve | ReviewDecision::ApproveModified => {
                executed = true;
                self.execute_envelope(&mut item.envelope).await;
            }
        }

        let envelope = &item.envelope;
        let record = FeedbackRecord { review_id: review_id.to_string(),
                                      method: envelope.method.clone(),
                                      decision,
                                      original_confidence,
                                      notes: item.notes.clone(),
                                      modified_params: item.modified_params.clone(),
                                      timestamp: Utc::now() };
        let threshold_adjustment = {
            let mut learner = lock(&self.learner);
            let adjustment = learner.record(record);
            if let Err(e) = self.feedback_store.save(learner.records()) {
                error!("feedback persist failed error={e}");
            }
            adjustment
        };
        if let Some(adj) = threshold_adjustment {
            self.thresholds
                .write()
                .unwrap_or_else(|p| p.into_inner())
                .set_adjustment(&envelope.method, adj);
            info!("threshold adjusted method={} adjustment={adj:.2}", envelope.method);
        }
        self.envelopes.insert(envelope.operation_id, envelope.clone());

        let created = envelope.created_ids();
        let success = match decision {
            ReviewDecision::Reject => true,
            _ => envelope.status != EnvelopeStatus::Failed,
        };
        info!("review resolved review_id={review_id} decision={decision} success={success} created={}",
              created.len());
        let error = if executed { envelope.error.clone() } else { None };
        let origin = envelope.origin;
        Ok(ReviewOutcome { review_id: review_id.to_string(),
                           decision,
                           executed,
                           success,
                           created_ids: created,
                           error,
                           origin,
                           notes: item.notes.clone(),
                           item,
                           threshold_adjustment })
    }

    async fn execute_envelope(&self, envelope: &mut ConfidenceEnvelope) {
        match call_with_timeout(self.build.as_ref(), &envelope.method, &envelope.params, self.operation_timeout).await {
            Ok(result) => {
                let status = if created_ids(&result).is_empty() {
                    EnvelopeStatus::Executed
                } else {
                    EnvelopeStatus::Verified
                };
                envelope.result = Some(result);
                envelope.error = None;
                envelope.set_status(status);
            }
            Err(e) => {
                envelope.result = None;
                envelope.error = Some(e.to_string());
                envelope.set_status(EnvelopeStatus::Failed);
            }
        }
    }

    /// Ítems pendientes (tras purgar los caducados), del más antiguo al más
    /// reciente.
    pub fn pending_reviews(&self) -> Vec<ReviewItem> {
        self.purge_expired();
        lock(&self.queue).pending()
    }

    pub fn review(&self, review_id: &str) -> Option<ReviewItem> {
        lock(&self.queue).get(review_id).cloned()
    }

    pub fn queue_stats(&self) -> QueueStats {
        self.purge_expired();
        lock(&self.queue).stats()
    }

    pub fn feedback_stats(&self) -> FeedbackStats {
        let table = self.threshold_table();
        let learner = lock(&self.learner);
        let methods = learner.stats()
                             .iter()
                             .map(|(method, stats)| {
                                 (method.clone(),
                                  MethodFeedback { stats: stats.clone(),
                                                   approval_rate: stats.approval_rate(),
                                                   thresholds: table.thresholds_for(method) })
                             })
                             .collect();
        FeedbackStats { total_records: learner.records().len(),
                        min_samples_to_learn: self.config.feedback.min_samples_to_learn,
                        max_adjustment: self.config.feedback.max_adjustment,
                        methods }
    }

    pub fn envelope(&self, operation_id: &Uuid) -> Option<ConfidenceEnvelope> {
        self.envelopes.get(operation_id).map(|e| e.value().clone())
    }

    /// Elimina los ítems caducados y los devuelve.
    pub fn purge_expired(&self) -> Vec<ReviewItem> {
        let expired = {
            let mut queue = lock(&self.queue);
            let expired = queue.purge_expired(Utc::now());
            if !expired.is_empty() {
                self.persist_queue(&queue);
            }
            expired
        };
        self.record_lapsed("expired", expired.clone());
        expired
    }

    /// Retira de la cola, sin decisión, ítems que su fase ya no espera.
    pub fn withdraw_reviews(&self, review_ids: &[String]) -> Vec<ReviewItem> {
        let mut queue = lock(&self.queue);
        let withdrawn = queue.withdraw(review_ids);
        if !withdrawn.is_empty() {
            info!("review items withdrawn count={}", withdrawn.len());
            self.persist_queue(&queue);
        }
        withdrawn
    }

    /// Drena los ítems caducados o expulsados cuya fase de origen todavía
    /// los cuenta como pendientes.
    pub fn take_lapsed(&self) -> Vec<ReviewItem> {
        std::mem::take(&mut *lock(&self.lapsed))
    }

    fn record_lapsed(&self, reason: &str, items: Vec<ReviewItem>) {
        for item in &items {
            log_lapsed(reason, item);
        }
        lock(&self.lapsed).extend(items.into_iter().filter(|i| i.envelope.origin.is_some()));
    }

    /// Guarda la cola completa. Se llama con el lock de la cola tomado para
    /// que las escrituras sigan el orden de las mutaciones.
    fn persist_queue(&self, queue: &ReviewQueueManager) {
        if let Err(e) = self.review_store.save(&queue.pending()) {
            error!("review queue persist failed error={e}");
        }
    }
}
