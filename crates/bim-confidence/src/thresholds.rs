//! Umbrales efectivos por método y pase.
use std::collections::BTreeMap;

use crate::config::{ConfidenceConfig, Thresholds};

/// Ningún umbral efectivo (ni ajustado por feedback) baja de este valor.
pub const MIN_THRESHOLD: f64 = 0.3;
pub const MAX_THRESHOLD: f64 = 1.0;
/// Tolerancia de las comparaciones score/umbral.
pub const COMPARISON_TOLERANCE: f64 = 1e-9;

/// Umbral efectivo del pase `pass` (≥ 1):
/// base del pase − (pass − 1) × boost, con piso en `MIN_THRESHOLD`.
pub fn effective_threshold(thresholds: &Thresholds, pass: u32, boost_per_pass: f64) -> f64 {
    let pass = pass.max(1);
    let base = thresholds.base_for_pass(pass);
    (base - f64::from(pass - 1) * boost_per_pass).max(MIN_THRESHOLD)
}

/// `true` si `score` alcanza `threshold` (con tolerancia).
pub fn clears(score: f64, threshold: f64) -> bool {
    score + COMPARISON_TOLERANCE >= threshold
}

/// Tabla de umbrales: configuración global, overrides por método y ajustes
/// aprendidos del feedback.
#[derive(Debug, Clone)]
pub struct ThresholdTable {
    defaults: Thresholds,
    overrides: BTreeMap<String, Thresholds>,
    adjustments: BTreeMap<String, f64>,
    boost_per_pass: f64,
}

impl ThresholdTable {
    pub fn from_config(config: &ConfidenceConfig) -> Self {
        Self { defaults: config.thresholds,
               overrides: config.method_thresholds.clone(),
               adjustments: BTreeMap::new(),
               boost_per_pass: config.multi_pass.context_boost_per_pass }
    }

    /// Umbrales vigentes de `method`: configurados más el ajuste aprendido,
    /// recortados a [`MIN_THRESHOLD`, `MAX_THRESHOLD`] cuando hay ajuste.
    pub fn thresholds_for(&self, method: &str) -> Thresholds {
        let base = self.overrides.get(method).copied().unwrap_or(self.defaults);
        match self.adjustments.get(method) {
            Some(adj) if *adj != 0.0 => {
                let shift = |v: f64| (v + adj).clamp(MIN_THRESHOLD, MAX_THRESHOLD);
                Thresholds { high: shift(base.high),
                             medium: shift(base.medium),
                             low: shift(base.low) }
            }
            _ => base,
        }
    }

    pub fn effective(&self, method: &str, pass: u32) -> f64 {
        effective_threshold(&self.thresholds_for(method), pass, self.boost_per_pass)
    }

    pub fn adjustment(&self, method: &str) -> f64 {
        self.adjustments.get(method).copied().unwrap_or(0.0)
    }

    pub fn set_adjustment(&mut self, method: &str, adjustment: f64) {
        self.adjustments.insert(method.to_string(), adjustment);
    }

    pub fn adjustments(&self) -> &BTreeMap<String, f64> {
        &self.adjustments
    }
}
