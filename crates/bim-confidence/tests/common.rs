#![allow(dead_code)]
//! Dobles de prueba del pipeline de confianza.

use async_trait::async_trait;
use bim_confidence::{ConfidenceCalculator, ConfidenceConfig, ConfidenceScore, PipelineError, ScoringContext};
use bim_core::{AtomicOperation, BuildExecutor, ExecutorError};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Crea un elemento por llamada; `slow` nunca termina a tiempo y `fail`
/// siempre falla.
#[derive(Default)]
pub struct RecordingBuild {
    pub calls: AtomicUsize,
}

impl RecordingBuild {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BuildExecutor for RecordingBuild {
    async fn execute(&self, method: &str, _params: &Value) -> Result<Map<String, Value>, ExecutorError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        match method {
            "slow" => {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(Map::new())
            }
            "fail" => Err(ExecutorError::Failed("element rejected by model".into())),
            _ => {
                let mut m = Map::new();
                m.insert("elementId".into(), json!(format!("el-{n}")));
                Ok(m)
            }
        }
    }
}

/// Devuelve siempre la misma confianza.
pub struct FixedCalculator(pub f64);

impl ConfidenceCalculator for FixedCalculator {
    fn score(&self, _method: &str, _params: &Value, _ctx: &ScoringContext) -> Result<ConfidenceScore, PipelineError> {
        Ok(ConfidenceScore { value: self.0,
                             factors: BTreeMap::from([("fixed".to_string(), self.0)]) })
    }
}

/// Falla para un método concreto.
pub struct FailingCalculator(pub &'static str);

impl ConfidenceCalculator for FailingCalculator {
    fn score(&self, method: &str, _params: &Value, _ctx: &ScoringContext) -> Result<ConfidenceScore, PipelineError> {
        if method == self.0 {
            return Err(PipelineError::Scorer(format!("no model for {method}")));
        }
        Ok(ConfidenceScore { value: 1.0,
                             factors: BTreeMap::new() })
    }
}

pub fn ops(methods: &[&str]) -> Vec<AtomicOperation> {
    methods.iter().map(|m| AtomicOperation::new(m, json!({}))).collect()
}

pub fn learning_config(min_samples: usize) -> ConfidenceConfig {
    let mut config = ConfidenceConfig::default();
    config.feedback.min_samples_to_learn = min_samples;
    config
}

/// Confía plenamente en `sure` y poco en el resto durante el primer pase;
/// desde el segundo pase siempre falla.
pub struct SecondPassFailure(pub &'static str);

impl ConfidenceCalculator for SecondPassFailure {
    fn score(&self, method: &str, _params: &Value, ctx: &ScoringContext) -> Result<ConfidenceScore, PipelineError> {
        if ctx.pass > 1 {
            return Err(PipelineError::Scorer(format!("model unloaded before pass {}", ctx.pass)));
        }
        let value = if method == self.0 { 1.0 } else { 0.5 };
        Ok(ConfidenceScore { value,
                             factors: BTreeMap::new() })
    }
}
