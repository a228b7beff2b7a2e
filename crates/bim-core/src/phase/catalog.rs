//! Catálogo ordenado de fases y resolución de dependencias.
//!
//! El orden declarado del catálogo ya es un orden topológico válido del grafo
//! de dependencias: `PhaseCatalog::new` lo verifica y rechaza catálogos que lo
//! violen. La búsqueda de la siguiente fase es un recorrido lineal, no un
//! ordenamiento topológico general.
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::{PhaseDefinition, PhaseId};
use crate::errors::CoreEngineError;
use crate::model::WorkflowState;

#[derive(Debug, Clone)]
pub struct PhaseCatalog {
    phases: Vec<PhaseDefinition>,
}

/// Arista dependencia -> dependiente.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyEdge {
    pub from: PhaseId,
    pub to: PhaseId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyNode {
    pub id: PhaseId,
    pub name: String,
    pub is_optional: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyGraph {
    pub nodes: Vec<DependencyNode>,
    pub edges: Vec<DependencyEdge>,
}

impl PhaseCatalog {
    /// Construye el catálogo verificando el contrato de orden.
    ///
    /// # Errores
    /// `CoreEngineError::InvalidCatalog` si el catálogo está vacío, repite id
    /// o nombre, declara un bucket vacío, o alguna dependencia es
    /// desconocida, es la propia fase o aparece más adelante en el orden.
    pub fn new(phases: Vec<PhaseDefinition>) -> Result<Self, CoreEngineError> {
        if phases.is_empty() {
            return Err(CoreEngineError::InvalidCatalog("catalog is empty".into()));
        }
        let mut seen_ids: HashSet<PhaseId> = HashSet::new();
        let mut seen_names: HashSet<String> = HashSet::new();
        for def in &phases {
            for dep in &def.dependencies {
                if *dep == def.id {
                    return Err(CoreEngineError::InvalidCatalog(format!("phase '{}' depends on itself", def.name)));
                }
                if !seen_ids.contains(dep) {
                    let reason = if phases.iter().any(|p| p.id == *dep) {
                        "is declared later in the catalog"
                    } else {
                        "is unknown"
                    };
                    return Err(CoreEngineError::InvalidCatalog(format!("dependency {dep} of phase '{}' {reason}",
                                                                       def.name)));
                }
            }
            if !seen_ids.insert(def.id) {
                return Err(CoreEngineError::InvalidCatalog(format!("duplicate phase id {}", def.id)));
            }
            if !seen_names.insert(def.name.to_lowercase()) {
                return Err(CoreEngineError::InvalidCatalog(format!("duplicate phase name '{}'", def.name)));
            }
            if def.registry_bucket.trim().is_empty() {
                return Err(CoreEngineError::InvalidCatalog(format!("phase '{}' declares no registry bucket", def.name)));
            }
        }
        Ok(Self { phases })
    }

    pub fn phases(&self) -> &[PhaseDefinition] {
        &self.phases
    }

    pub fn len(&self) -> usize {
        self.phases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phases.is_empty()
    }

    pub fn get(&self, id: PhaseId) -> Option<&PhaseDefinition> {
        self.phases.iter().find(|p| p.id == id)
    }

    /// Búsqueda por nombre sin distinguir mayúsculas.
    pub fn by_name(&self, name: &str) -> Option<&PhaseDefinition> {
        self.phases.iter().find(|p| p.name.eq_ignore_ascii_case(name.trim()))
    }

    /// Resuelve una referencia de fase: id numérico o nombre.
    pub fn resolve(&self, key: &str) -> Option<&PhaseDefinition> {
        match key.trim().parse::<u32>() {
            Ok(n) => self.get(PhaseId(n)),
            Err(_) => self.by_name(key),
        }
    }

    /// `false` si la fase es opcional y el workflow omite opcionales.
    pub fn is_relevant(&self, def: &PhaseDefinition, state: &WorkflowState) -> bool {
        !(def.optional && state.config.skip_optional)
    }

    /// Dependencias de `def` que todavía no están completadas u omitidas. Una
    /// dependencia opcional irrelevante para el workflow cuenta como satisfecha.
    pub fn unsatisfied_dependencies<'a>(&'a self,
                                        def: &PhaseDefinition,
                                        state: &WorkflowState)
                                        -> Vec<&'a PhaseDefinition> {
        def.dependencies
           .iter()
           .filter_map(|dep| self.get(*dep))
           .filter(|dep| self.is_relevant(dep, state) && !state.status_of(dep.id).satisfies_dependency())
           .collect()
    }

    /// Primera fase, en orden declarado, pendiente, relevante y con todas sus
    /// dependencias satisfechas.
    pub fn next_eligible(&self, state: &WorkflowState) -> Option<&PhaseDefinition> {
        self.next_eligible_excluding(state, &HashSet::new())
    }

    /// Variante de [`PhaseCatalog::next_eligible`] que ignora las fases de
    /// `exclude` (las ya intentadas en una misma corrida).
    pub fn next_eligible_excluding(&self,
                                   state: &WorkflowState,
                                   exclude: &HashSet<PhaseId>)
                                   -> Option<&PhaseDefinition> {
        self.phases.iter().find(|def| {
                              !exclude.contains(&def.id)
                              && self.is_relevant(def, state)
                              && state.status_of(def.id).is_pending()
                              && self.unsatisfied_dependencies(def, state).is_empty()
                          })
    }

    /// Fases que dependen directamente de `id`.
    pub fn dependents_of(&self, id: PhaseId) -> Vec<&PhaseDefinition> {
        self.phases.iter().filter(|p| p.dependencies.contains(&id)).collect()
    }

    pub fn dependency_graph(&self) -> DependencyGraph {
        let nodes = self.phases
                        .iter()
                        .map(|p| DependencyNode { id: p.id,
                                                  name: p.name.clone(),
                                                  is_optional: p.optional })
                        .collect();
        let edges = self.phases
                        .iter()
                        .flat_map(|p| p.dependencies.iter().map(move |d| DependencyEdge { from: *d, to: p.id }))
                        .collect();
        DependencyGraph { nodes, edges }
    }

    /// Comprueba que cada dependencia aparece antes que su dependiente.
    pub fn is_topologically_sorted(&self) -> bool {
        self.phases.iter().enumerate().all(|(i, p)| {
                                          p.dependencies
                                           .iter()
                                           .all(|d| self.phases[..i].iter().any(|earlier| earlier.id == *d))
                                      })
    }
}
