//! Cálculo de confianza de una operación propuesta.
//!
//! `HeuristicCalculator` combina multiplicativamente cuatro factores en
//! [0, 1]:
//! - `method`: confianza a priori del método (desconocido = 0.5);
//! - `completeness`: 0.5 por cada parámetro requerido ausente;
//! - `geometry`: penaliza segmentos de longitud nula, contornos con menos de
//!   tres puntos y coordenadas no numéricas;
//! - `context`: ids referenciados (`levelId`, `wallId`, ...) que no existen en
//!   el workflow ni fueron creados en pases anteriores.
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};

use crate::errors::PipelineError;

/// Contexto de scoring de un pase.
#[derive(Debug, Clone, Default)]
pub struct ScoringContext {
    pub pass: u32,
    /// Ids existentes (registro del workflow + creados en pases anteriores).
    pub known_ids: HashSet<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConfidenceScore {
    pub value: f64,
    pub factors: BTreeMap<String, f64>,
}

pub trait ConfidenceCalculator: Send + Sync {
    /// Puntúa `method(params)`. Un `Err` es un fallo interno del pipeline
    /// (p. ej. parámetros con forma no soportada).
    fn score(&self, method: &str, params: &Value, ctx: &ScoringContext) -> Result<ConfidenceScore, PipelineError>;
}

const UNKNOWN_METHOD_PRIOR: f64 = 0.5;
const MISSING_PARAM_FACTOR: f64 = 0.5;
const UNKNOWN_REFERENCE_FACTOR: f64 = 0.7;

/// (método, prior, parámetros requeridos)
const METHOD_TABLE: &[(&str, f64, &[&str])] = &[("getLevels", 1.0, &[]),
                                                 ("getViews", 1.0, &[]),
                                                 ("createLevel", 0.95, &["name", "elevation"]),
                                                 ("createGrid", 0.92, &["name", "start", "end"]),
                                                 ("createWall", 0.92, &["start", "end", "levelId", "height"]),
                                                 ("createFloor", 0.9, &["boundary", "levelId"]),
                                                 ("placeDoor", 0.88, &["wallId", "location", "levelId"]),
                                                 ("placeWindow", 0.88, &["wallId", "location", "levelId"]),
                                                 ("createRoof", 0.8, &["boundary", "levelId"]),
                                                 ("createRoom", 0.9, &["name", "levelId", "location"]),
                                                 ("createStairs", 0.75, &["baseLevelId", "topLevelId", "location"]),
                                                 ("createFloorPlan", 0.95, &["levelId", "name"]),
                                                 ("createSheet", 0.92, &["viewId", "name"])];

const NO_PARAMS: &[&str] = &[];

const REFERENCE_KEYS: &[&str] = &["levelId", "wallId", "viewId", "baseLevelId", "topLevelId"];

#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicCalculator;

impl HeuristicCalculator {
    pub fn new() -> Self {
        Self
    }

    fn method_entry(method: &str) -> Option<(f64, &'static [&'static str])> {
        METHOD_TABLE.iter().find(|(m, _, _)| *m == method).map(|(_, prior, req)| (*prior, *req))
    }

    fn geometry_factor(params: &Map<String, Value>) -> f64 {
        let mut factor: f64 = 1.0;
        for key in ["start", "end", "location"] {
            if let Some(v) = params.get(key) {
                if point(v).is_none() {
                    factor = factor.min(0.4);
                }
            }
        }
        if let (Some(a), Some(b)) = (params.get("start").and_then(point), params.get("end").and_then(point)) {
            if (a.0 - b.0).abs() < 1e-6 && (a.1 - b.1).abs() < 1e-6 {
                factor = factor.min(0.4);
            }
        }
        if let Some(boundary) = params.get("boundary") {
            let ok = boundary.as_array()
                             .map(|pts| pts.len() >= 3 && pts.iter().all(|p| point(p).is_some()))
                             .unwrap_or(false);
            if !ok {
                factor = factor.min(0.3);
            }
        }
        for key in ["height", "elevation", "sillHeight"] {
            if let Some(v) = params.get(key) {
                match v.as_f64() {
                    Some(n) if n.is_finite() && (key == "elevation" || n > 0.0) => {}
                    _ => factor = factor.min(0.4),
                }
            }
        }
        factor
    }

    fn context_factor(params: &Map<String, Value>, ctx: &ScoringContext) -> f64 {
        let unknown = REFERENCE_KEYS.iter()
                                    .filter_map(|k| params.get(*k))
                                    .filter(|v| match reference(v) {
                                        Some(id) => !ctx.known_ids.contains(&id),
                                        None => true,
                                    })
                                    .count();
        UNKNOWN_REFERENCE_FACTOR.powi(unknown as i32)
    }
}

fn point(v: &Value) -> Option<(f64, f64)> {
    let x = v.get("x")?.as_f64()?;
    let y = v.get("y")?.as_f64()?;
    Some((x, y))
}

fn reference(v: &Value) -> Option<String> {
    match v {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

impl ConfidenceCalculator for HeuristicCalculator {
    fn score(&self, method: &str, params: &Value, ctx: &ScoringContext) -> Result<ConfidenceScore, PipelineError> {
        let params = match params {
            Value::Object(map) => map.clone(),
            Value::Null => Map::new(),
            other => {
                return Err(PipelineError::InvalidParams { method: method.to_string(),
                                                          reason: format!("expected an object, got {other}") })
            }
        };
        if method.trim().is_empty() {
            return Err(PipelineError::InvalidParams { method: method.to_string(),
                                                      reason: "method name is empty".into() });
        }

        let (prior, required) = Self::method_entry(method).unwrap_or((UNKNOWN_METHOD_PRIOR, NO_PARAMS));
        let missing = required.iter().filter(|k| params.get(**k).map_or(true, Value::is_null)).count();
        let completeness = MISSING_PARAM_FACTOR.powi(missing as i32);
        let geometry = Self::geometry_factor(&params);
        let context = Self::context_factor(&params, ctx);

        let value = (prior * completeness * geometry * context).clamp(0.0, 1.0);
        let factors = BTreeMap::from([("method".to_string(), prior),
                                      ("completeness".to_string(), completeness),
                                      ("geometry".to_string(), geometry),
                                      ("context".to_string(), context)]);
        Ok(ConfidenceScore { value, factors })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx(known: &[&str]) -> ScoringContext {
        ScoringContext { pass: 1,
                         known_ids: known.iter().map(|s| s.to_string()).collect() }
    }

    #[test]
    fn well_formed_wall_on_known_level_scores_high() {
        let params = json!({"start": {"x": 0.0, "y": 0.0}, "end": {"x": 10.0, "y": 0.0}, "levelId": "L1", "height": 3.0});
        let s = HeuristicCalculator.score("createWall", &params, &ctx(&["L1"])).unwrap();
        assert!((s.value - 0.92).abs() < 1e-9);
        // referencia desconocida
        let s2 = HeuristicCalculator.score("createWall", &params, &ctx(&[])).unwrap();
        assert!((s2.value - 0.92 * 0.7).abs() < 1e-9);
    }

    #[test]
    fn missing_params_and_degenerate_geometry_lower_the_score() {
        let zero = json!({"start": {"x": 1.0, "y": 1.0}, "end": {"x": 1.0, "y": 1.0}, "levelId": "L1", "height": 3.0});
        let s = HeuristicCalculator.score("createWall", &zero, &ctx(&["L1"])).unwrap();
        assert_eq!(s.factors["geometry"], 0.4);
        let missing = json!({"levelId": "L1"});
        let s = HeuristicCalculator.score("createFloor", &missing, &ctx(&["L1"])).unwrap();
        assert_eq!(s.factors["completeness"], 0.5);
    }

    #[test]
    fn non_object_params_are_a_pipeline_error() {
        let err = HeuristicCalculator.score("createWall", &json!([1, 2]), &ctx(&[])).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidParams { .. }));
    }
}
