//! Modelo de construcción simulado en memoria.
//!
//! Implementa el ejecutor opaco para los 13 métodos estándar: valida los
//! parámetros requeridos, comprueba que los ids referenciados existan y
//! devuelve `elementId` para cada elemento creado. Permite inyectar fallos y
//! latencia por método para ejercitar timeouts y fases fallidas.
use async_trait::async_trait;
use bim_core::{BuildExecutor, ExecutorError};
use indexmap::IndexMap;
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ElementCategory {
    Level,
    Grid,
    Wall,
    Floor,
    Door,
    Window,
    Roof,
    Room,
    Stairs,
    View,
    Sheet,
}

impl ElementCategory {
    fn prefix(&self) -> &'static str {
        match self {
            ElementCategory::Level => "LVL",
            ElementCategory::Grid => "GRD",
            ElementCategory::Wall => "WAL",
            ElementCategory::Floor => "FLR",
            ElementCategory::Door => "DOR",
            ElementCategory::Window => "WIN",
            ElementCategory::Roof => "ROF",
            ElementCategory::Room => "RM",
            ElementCategory::Stairs => "STR",
            ElementCategory::View => "VW",
            ElementCategory::Sheet => "SHT",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelElement {
    pub id: String,
    pub category: ElementCategory,
    pub name: Option<String>,
    pub params: Value,
}

/// (método, categoría creada, parámetros requeridos, parámetros que
/// referencian elementos existentes)
const CREATE_METHODS: &[(&str, ElementCategory, &[&str], &[&str])] =
    &[("createLevel", ElementCategory::Level, &["name", "elevation"], &[]),
      ("createGrid", ElementCategory::Grid, &["name", "start", "end"], &[]),
      ("createWall", ElementCategory::Wall, &["start", "end", "levelId", "height"], &["levelId"]),
      ("createFloor", ElementCategory::Floor, &["boundary", "levelId"], &["levelId"]),
      ("placeDoor", ElementCategory::Door, &["wallId", "location", "levelId"], &["wallId", "levelId"]),
      ("placeWindow", ElementCategory::Window, &["wallId", "location", "levelId"], &["wallId", "levelId"]),
      ("createRoof", ElementCategory::Roof, &["boundary", "levelId"], &["levelId"]),
      ("createRoom", ElementCategory::Room, &["name", "levelId", "location"], &["levelId"]),
      ("createStairs", ElementCategory::Stairs, &["baseLevelId", "topLevelId", "location"], &["baseLevelId", "topLevelId"]),
      ("createFloorPlan", ElementCategory::View, &["levelId", "name"], &["levelId"]),
      ("createSheet", ElementCategory::Sheet, &["viewId", "name"], &["viewId"])];

#[derive(Debug, Default)]
struct ModelState {
    elements: IndexMap<String, ModelElement>,
    next_id: u64,
}

impl ModelState {
    fn insert(&mut self, category: ElementCategory, name: Option<String>, params: Value) -> String {
        self.next_id += 1;
        let id = format!("{}-{}", category.prefix(), self.next_id);
        self.elements.insert(id.clone(),
                             ModelElement { id: id.clone(),
                                            category,
                                            name,
                                            params });
        id
    }

    fn listing(&self, category: ElementCategory) -> Vec<Value> {
        self.elements
            .values()
            .filter(|e| e.category == category)
            .map(|e| {
                let mut entry = json!({"id": e.id, "name": e.name});
                if let Some(elevation) = e.params.get("elevation") {
                    entry["elevation"] = elevation.clone();
                }
                if let Some(level) = e.params.get("levelId") {
                    entry["levelId"] = level.clone();
                }
                entry
            })
            .collect()
    }
}

#[derive(Debug, Default)]
pub struct InMemoryBuildModel {
    state: Mutex<ModelState>,
    failing: Mutex<HashSet<String>>,
    latency: Mutex<HashMap<String, Duration>>,
    calls: AtomicUsize,
}

impl InMemoryBuildModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hace fallar toda llamada a `method`.
    pub fn fail_method(&self, method: &str) {
        self.failing.lock().unwrap_or_else(|p| p.into_inner()).insert(method.to_string());
    }

    pub fn recover_method(&self, method: &str) {
        self.failing.lock().unwrap_or_else(|p| p.into_inner()).remove(method);
    }

    /// Retrasa cada llamada a `method`.
    pub fn delay_method(&self, method: &str, delay: Duration) {
        self.latency.lock().unwrap_or_else(|p| p.into_inner()).insert(method.to_string(), delay);
    }

    /// Registra un nivel preexistente (visible para `getLevels`).
    pub fn seed_level(&self, name: &str, elevation: f64) -> String {
        self.lock_state()
            .insert(ElementCategory::Level, Some(name.to_string()), json!({"name": name, "elevation": elevation}))
    }

    /// Registra una vista preexistente (visible para `getViews`).
    pub fn seed_view(&self, name: &str) -> String {
        self.lock_state().insert(ElementCategory::View, Some(name.to_string()), json!({"name": name}))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn element(&self, id: &str) -> Option<ModelElement> {
        self.lock_state().elements.get(id).cloned()
    }

    pub fn elements_of(&self, category: ElementCategory) -> Vec<ModelElement> {
        self.lock_state().elements.values().filter(|e| e.category == category).cloned().collect()
    }

    pub fn element_count(&self) -> usize {
        self.lock_state().elements.len()
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, ModelState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn create(&self, method: &str, params: &Value) -> Result<Map<String, Value>, ExecutorError> {
        let (_, category, required, references) = CREATE_METHODS.iter()
                                                                .find(|(m, ..)| *m == method)
                                                                .ok_or_else(|| ExecutorError::UnknownMethod(method.to_string()))?;
        let obj = params.as_object().ok_or_else(|| ExecutorError::InvalidParams { method: method.to_string(),
                                                                                  reason: "params must be an object".into() })?;
        if let Some(missing) = required.iter().find(|k| obj.get(**k).map_or(true, Value::is_null)) {
            return Err(ExecutorError::InvalidParams { method: method.to_string(),
                                                      reason: format!("missing '{missing}'") });
        }

        let mut state = self.lock_state();
        for key in *references {
            let id = obj.get(*key).and_then(Value::as_str).unwrap_or_default();
            if !state.elements.contains_key(id) {
                return Err(ExecutorError::ElementNotFound(format!("{key}={id}")));
            }
        }
        let name = obj.get("name").and_then(Value::as_str).map(str::to_string);
        let id = state.insert(*category, name, params.clone());
        debug!("model element created method={method} id={id}");

        let mut result = Map::new();
        result.insert("elementId".into(), json!(id));
        Ok(result)
    }
}

#[async_trait]
impl BuildExecutor for InMemoryBuildModel {
    async fn execute(&self, method: &str, params: &Value) -> Result<Map<String, Value>, ExecutorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.latency.lock().unwrap_or_else(|p| p.into_inner()).get(method).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.lock().unwrap_or_else(|p| p.into_inner()).contains(method) {
            return Err(ExecutorError::Failed(format!("{method} rejected by model")));
        }
        match method {
            "getLevels" => {
                let mut result = Map::new();
                result.insert("levels".into(), Value::Array(self.lock_state().listing(ElementCategory::Level)));
                Ok(result)
            }
            "getViews" => {
                let mut result = Map::new();
                result.insert("views".into(), Value::Array(self.lock_state().listing(ElementCategory::View)));
                Ok(result)
            }
            _ => self.create(method, params),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn creates_elements_and_checks_references() {
        let model = InMemoryBuildModel::new();
        let level = model.execute("createLevel", &json!({"name": "Level 1", "elevation": 0.0})).await.unwrap();
        let level_id = level["elementId"].as_str().unwrap().to_string();
        assert!(level_id.starts_with("LVL-"));

        let wall = json!({"start": {"x": 0, "y": 0}, "end": {"x": 1, "y": 0}, "levelId": level_id, "height": 3.0});
        assert!(model.execute("createWall", &wall).await.is_ok());

        let orphan = json!({"start": {"x": 0, "y": 0}, "end": {"x": 1, "y": 0}, "levelId": "LVL-99", "height": 3.0});
        let err = model.execute("createWall", &orphan).await.unwrap_err();
        assert!(matches!(err, ExecutorError::ElementNotFound(_)));
        assert_eq!(model.element_count(), 2);
    }

    #[tokio::test]
    async fn rejects_unknown_methods_and_missing_params() {
        let model = InMemoryBuildModel::new();
        assert!(matches!(model.execute("explode", &json!({})).await, Err(ExecutorError::UnknownMethod(_))));
        assert!(matches!(model.execute("createGrid", &json!({"name": "A"})).await,
                         Err(ExecutorError::InvalidParams { .. })));
    }

    #[tokio::test]
    async fn lists_seeded_levels_and_injects_failures() {
        let model = InMemoryBuildModel::new();
        let id = model.seed_level("Level 1", 0.0);
        let res = model.execute("getLevels", &json!({})).await.unwrap();
        assert_eq!(res["levels"][0]["id"], json!(id));
        assert_eq!(res["levels"][0]["name"], json!("Level 1"));

        model.fail_method("getLevels");
        assert!(model.execute("getLevels", &json!({})).await.is_err());
        model.recover_method("getLevels");
        assert!(model.execute("getLevels", &json!({})).await.is_ok());
    }
}
