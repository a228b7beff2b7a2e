//! Configuración del pipeline de confianza.
//!
//! El formato en disco usa claves PascalCase:
//!
//! ```json
//! {
//!   "Enabled": true,
//!   "Thresholds": { "High": 0.85, "Medium": 0.60, "Low": 0.40 },
//!   "MethodThresholds": { "createRoof": { "High": 0.9, "Medium": 0.7, "Low": 0.5 } },
//!   "MultiPass": { "MaxPasses": 3, "ContextBoostPerPass": 0.10 },
//!   "ReviewQueue": { "Path": "reviews.json", "MaxSize": 500, "ExpireHours": 72 },
//!   "Feedback": { "Path": "feedback.json", "MinSamplesToLearn": 10, "MaxAdjustment": 0.15 }
//! }
//! ```
//!
//! Todas las secciones son opcionales; lo ausente toma los valores por defecto.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::errors::ConfigError;

/// Umbrales de confianza de un método (o los globales).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Thresholds {
    pub high: f64,
    pub medium: f64,
    pub low: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self { high: 0.85,
               medium: 0.60,
               low: 0.40 }
    }
}

impl Thresholds {
    /// `High ≥ Medium ≥ Low`, todos en [0, 1].
    pub fn validate(&self, label: &str) -> Result<(), ConfigError> {
        for (name, v) in [("High", self.high), ("Medium", self.medium), ("Low", self.low)] {
            if !(0.0..=1.0).contains(&v) {
                return Err(ConfigError::Invalid(format!("{label}.{name} must be within [0, 1], got {v}")));
            }
        }
        if self.high < self.medium || self.medium < self.low {
            return Err(ConfigError::Invalid(format!("{label} must satisfy High >= Medium >= Low")));
        }
        Ok(())
    }

    /// Umbral base del pase `pass` (1 = High, 2 = Medium, 3+ = Low).
    pub fn base_for_pass(&self, pass: u32) -> f64 {
        match pass {
            0 | 1 => self.high,
            2 => self.medium,
            _ => self.low,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct MultiPassConfig {
    pub max_passes: u32,
    pub context_boost_per_pass: f64,
}

impl Default for MultiPassConfig {
    fn default() -> Self {
        Self { max_passes: 3,
               context_boost_per_pass: 0.10 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ReviewQueueConfig {
    pub path: Option<String>,
    pub max_size: usize,
    pub expire_hours: u32,
}

impl Default for ReviewQueueConfig {
    fn default() -> Self {
        Self { path: None,
               max_size: 500,
               expire_hours: 72 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct FeedbackConfig {
    pub path: Option<String>,
    pub min_samples_to_learn: usize,
    pub max_adjustment: f64,
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self { path: None,
               min_samples_to_learn: 10,
               max_adjustment: 0.15 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ConfidenceConfig {
    pub enabled: bool,
    pub thresholds: Thresholds,
    /// Umbrales específicos por método (sustituyen a los globales).
    pub method_thresholds: BTreeMap<String, Thresholds>,
    pub multi_pass: MultiPassConfig,
    pub review_queue: ReviewQueueConfig,
    pub feedback: FeedbackConfig,
}

impl Default for ConfidenceConfig {
    fn default() -> Self {
        Self { enabled: true,
               thresholds: Thresholds::default(),
               method_thresholds: BTreeMap::new(),
               multi_pass: MultiPassConfig::default(),
               review_queue: ReviewQueueConfig::default(),
               feedback: FeedbackConfig::default() }
    }
}

impl ConfidenceConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.thresholds.validate("Thresholds")?;
        for (method, t) in &self.method_thresholds {
            t.validate(&format!("MethodThresholds.{method}"))?;
        }
        if self.multi_pass.max_passes < 1 {
            return Err(ConfigError::Invalid("MultiPass.MaxPasses must be >= 1".into()));
        }
        if !(0.0..=1.0).contains(&self.multi_pass.context_boost_per_pass) {
            return Err(ConfigError::Invalid("MultiPass.ContextBoostPerPass must be within [0, 1]".into()));
        }
        if self.review_queue.max_size == 0 {
            return Err(ConfigError::Invalid("ReviewQueue.MaxSize must be >= 1".into()));
        }
        if !(0.0..=1.0).contains(&self.feedback.max_adjustment) {
            return Err(ConfigError::Invalid("Feedback.MaxAdjustment must be within [0, 1]".into()));
        }
        Ok(())
    }

    /// Decodifica y valida una configuración JSON.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: ConfidenceConfig = serde_json::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io(format!("{}: {e}", path.display())))?;
        Self::from_json_str(&text)
    }

    /// Umbrales configurados para `method` (sin ajustes de feedback).
    pub fn thresholds_for(&self, method: &str) -> Thresholds {
        self.method_thresholds.get(method).copied().unwrap_or(self.thresholds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let c = ConfidenceConfig::from_json_str(r#"{"MultiPass": {"MaxPasses": 5}, "Thresholds": {"High": 0.9, "Medium": 0.6, "Low": 0.4}}"#)
            .unwrap();
        assert_eq!(c.multi_pass.max_passes, 5);
        assert_eq!(c.multi_pass.context_boost_per_pass, 0.10);
        assert_eq!(c.review_queue.max_size, 500);
        assert_eq!(c.thresholds.high, 0.9);
        assert!(c.enabled);
    }

    #[test]
    fn rejects_unordered_thresholds_and_zero_passes() {
        assert!(ConfidenceConfig::from_json_str(r#"{"Thresholds": {"High": 0.5, "Medium": 0.6, "Low": 0.4}}"#).is_err());
        assert!(ConfidenceConfig::from_json_str(r#"{"MultiPass": {"MaxPasses": 0}}"#).is_err());
        assert!(matches!(ConfidenceConfig::from_json_str("{"), Err(ConfigError::Parse(_))));
    }
}
