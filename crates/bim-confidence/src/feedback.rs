//! Aprendizaje a partir de las decisiones de revisión.
//!
//! Cada decisión se registra por método. Alcanzado `min_samples` registros, la
//! tasa de aprobación mueve el ajuste del método en pasos de
//! [`ADJUSTMENT_STEP`]: hacia abajo si las aprobaciones dominan (≥ 80 %),
//! hacia arriba si dominan los rechazos (aprobación ≤ 50 %). El ajuste
//! acumulado nunca supera `max_adjustment` en valor absoluto.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::review::ReviewDecision;

pub const ADJUSTMENT_STEP: f64 = 0.02;
pub const LOWER_WHEN_APPROVAL_AT_LEAST: f64 = 0.80;
pub const RAISE_WHEN_APPROVAL_AT_MOST: f64 = 0.50;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackRecord {
    pub review_id: String,
    pub method: String,
    pub decision: ReviewDecision,
    pub original_confidence: f64,
    #[serde(default)]
    pub notes: Option<String>,
    /// Parámetros corregidos por el revisor (`ApproveModified`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_params: Option<Value>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodStats {
    pub approved: u64,
    pub rejected: u64,
    pub modified: u64,
    pub total: u64,
    pub average_confidence: f64,
    /// Ajuste acumulado aplicado a los umbrales del método.
    pub adjustment: f64,
}

impl MethodStats {
    /// Aprobaciones (incluidas las modificadas) sobre el total.
    pub fn approval_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            (self.approved + self.modified) as f64 / self.total as f64
        }
    }
}

#[derive(Debug, Clone)]
pub struct FeedbackLearner {
    records: Vec<FeedbackRecord>,
    stats: BTreeMap<String, MethodStats>,
    min_samples: usize,
    max_adjustment: f64,
}

impl FeedbackLearner {
    pub fn new(min_samples: usize, max_adjustment: f64) -> Self {
        Self { records: Vec::new(),
               stats: BTreeMap::new(),
               min_samples,
               max_adjustment: max_adjustment.abs() }
    }

    /// Reconstruye estadísticas y ajustes re-aplicando el historial en orden.
    pub fn replay(&mut self, records: Vec<FeedbackRecord>) {
        for record in records {
            self.record(record);
        }
    }

    /// Registra una decisión. Devuelve el nuevo ajuste del método si cambió.
    pub fn record(&mut self, record: FeedbackRecord) -> Option<f64> {
        let stats = self.stats.entry(record.method.clone()).or_default();
        match record.decision {
            ReviewDecision::Approve => stats.approved += 1,
            ReviewDecision::Reject => stats.rejected += 1,
            ReviewDecision::ApproveModified => stats.modified += 1,
        }
        stats.total += 1;
        stats.average_confidence += (record.original_confidence - stats.average_confidence) / stats.total as f64;
        self.records.push(record);

        if (stats.total as usize) < self.min_samples {
            return None;
        }
        let rate = stats.approval_rate();
        let step = if rate >= LOWER_WHEN_APPROVAL_AT_LEAST {
            -ADJUSTMENT_STEP
        } else if rate <= RAISE_WHEN_APPROVAL_AT_MOST {
            ADJUSTMENT_STEP
        } else {
            return None;
        };
        let next = (stats.adjustment + step).clamp(-self.max_adjustment, self.max_adjustment);
        if (next - stats.adjustment).abs() < f64::EPSILON {
            return None;
        }
        stats.adjustment = next;
        Some(next)
    }

    pub fn stats(&self) -> &BTreeMap<String, MethodStats> {
        &self.stats
    }

    pub fn adjustment(&self, method: &str) -> f64 {
        self.stats.get(method).map(|s| s.adjustment).unwrap_or(0.0)
    }

    pub fn records(&self) -> &[FeedbackRecord] {
        &self.records
    }
}
