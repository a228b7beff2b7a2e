//! bim-confidence: pipeline de confianza para operaciones de construcción.
//!
//! Puntúa cada operación propuesta, la ejecuta cuando alcanza el umbral del
//! pase en curso, reintenta las diferidas con umbrales relajados y deja en una
//! cola de revisión humana lo que nunca lo alcanza. Las decisiones de revisión
//! ajustan los umbrales por método.
pub mod calculator;
pub mod cips;
pub mod config;
pub mod envelope;
pub mod errors;
pub mod feedback;
pub mod gate;
pub mod passes;
pub mod review;
pub mod store;
pub mod thresholds;

pub use calculator::{ConfidenceCalculator, ConfidenceScore, HeuristicCalculator, ScoringContext};
pub use cips::{BatchReport, CipsOrchestrator, ConfidenceAssessment, FeedbackStats, MethodFeedback, Recommendation,
               ReviewOutcome};
pub use config::{ConfidenceConfig, FeedbackConfig, MultiPassConfig, ReviewQueueConfig, Thresholds};
pub use envelope::{ConfidenceEnvelope, EnvelopeStatus};
pub use errors::{ConfigError, PipelineError, StoreError};
pub use feedback::{FeedbackLearner, FeedbackRecord, MethodStats};
pub use passes::{PassCoordinator, PassOutcome, PassSummary};
pub use review::{QueueStats, ReviewDecision, ReviewItem, ReviewQueueManager};
pub use store::{FeedbackStore, InMemoryFeedbackStore, InMemoryReviewStore, ReviewStore};
pub use thresholds::{clears, effective_threshold, ThresholdTable};
