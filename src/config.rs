//! Configuración central de la aplicación.
//! Carga variables de entorno (.env) y el archivo JSON de confianza, y expone
//! una estructura inmutable con todo lo que necesita el `BuildService`.
use bim_confidence::ConfidenceConfig;
use bim_core::constants::DEFAULT_OPERATION_TIMEOUT_MS;
use bim_persistence::config::{env_parse, env_string};
use bim_persistence::{init_dotenv, StorageConfig};
use log::info;
use std::path::Path;
use std::time::Duration;

use crate::errors::ApiError;

pub const CONFIG_PATH_VAR: &str = "BIMFLOW_CONFIG";
pub const OPERATION_TIMEOUT_VAR: &str = "BIMFLOW_OPERATION_TIMEOUT_MS";
pub const CONFIDENCE_ENABLED_VAR: &str = "BIMFLOW_CONFIDENCE_ENABLED";

/// Configuración global de la aplicación.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// Umbrales, pases, cola y feedback del pipeline de confianza.
    pub confidence: ConfidenceConfig,
    /// Rutas de los stores JSON (sin rutas = sólo memoria).
    pub storage: StorageConfig,
    /// Plazo de cada llamada al ejecutor de construcción.
    pub operation_timeout: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self { confidence: ConfidenceConfig::default(),
               storage: StorageConfig::default(),
               operation_timeout: Duration::from_millis(DEFAULT_OPERATION_TIMEOUT_MS) }
    }
}

impl AppConfig {
    /// Lee `.env` y las variables `BIMFLOW_*`.
    ///
    /// `BIMFLOW_CONFIG` apunta a un JSON con la `ConfidenceConfig`; las rutas
    /// de stores del entorno tienen prioridad sobre las del archivo.
    pub fn from_env() -> Result<Self, ApiError> {
        init_dotenv();
        let confidence = match env_string(CONFIG_PATH_VAR) {
            Some(path) => ConfidenceConfig::from_file(Path::new(&path))?,
            None => ConfidenceConfig::default(),
        };
        let mut config = Self::from_confidence(confidence)?;
        if let Some(enabled) = env_parse::<bool>(CONFIDENCE_ENABLED_VAR)? {
            config.confidence.enabled = enabled;
        }
        if let Some(ms) = env_parse::<u64>(OPERATION_TIMEOUT_VAR)? {
            if ms == 0 {
                return Err(ApiError::Validation(format!("{OPERATION_TIMEOUT_VAR} must be > 0")));
            }
            config.operation_timeout = Duration::from_millis(ms);
        }
        config.storage = StorageConfig::from_env().or_paths(config.confidence.review_queue.path.as_deref(),
                                                            config.confidence.feedback.path.as_deref());
        info!("app config loaded confidence_enabled={} timeout_ms={} review_queue_path={:?} feedback_path={:?}",
              config.confidence.enabled,
              config.operation_timeout.as_millis(),
              config.storage.review_queue_path,
              config.storage.feedback_path);
        Ok(config)
    }

    /// Configuración a partir de una `ConfidenceConfig` ya cargada; toma las
    /// rutas de stores del propio archivo.
    pub fn from_confidence(confidence: ConfidenceConfig) -> Result<Self, ApiError> {
        confidence.validate()?;
        let storage = StorageConfig::default().or_paths(confidence.review_queue.path.as_deref(),
                                                        confidence.feedback.path.as_deref());
        Ok(Self { confidence,
                  storage,
                  ..Self::default() })
    }

    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confidence_file_paths_become_storage_paths() {
        let text = r#"{"ReviewQueue": {"Path": "/tmp/q.json"}, "Feedback": {"Path": "/tmp/f.json"}}"#;
        let confidence = ConfidenceConfig::from_json_str(text).unwrap();
        let config = AppConfig::from_confidence(confidence).unwrap();
        assert_eq!(config.storage.review_queue_path.as_deref(), Some(Path::new("/tmp/q.json")));
        assert_eq!(config.storage.feedback_path.as_deref(), Some(Path::new("/tmp/f.json")));
    }

    #[test]
    fn invalid_thresholds_are_rejected() {
        let mut confidence = ConfidenceConfig::default();
        confidence.thresholds.low = 0.9;
        let err = AppConfig::from_confidence(confidence).unwrap_err();
        assert_eq!(err.error_kind(), crate::errors::ErrorKind::Validation);
    }
}
