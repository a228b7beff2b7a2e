use serde::{Deserialize, Serialize};
use std::fmt;

/// Identificador numérico de fase. El orden del catálogo (no el valor del id)
/// define el orden topológico.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhaseId(pub u32);

impl fmt::Display for PhaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for PhaseId {
    fn from(v: u32) -> Self {
        PhaseId(v)
    }
}

/// Definición inmutable de una fase.
///
/// `required_inputs` nombra campos del programa o buckets del registro que
/// deben existir y no estar vacíos antes de ejecutar. `registry_bucket` es el
/// bucket donde se acumulan los ids creados por la fase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseDefinition {
    pub id: PhaseId,
    pub name: String,
    pub description: String,
    pub required_inputs: Vec<String>,
    pub outputs: Vec<String>,
    pub dependencies: Vec<PhaseId>,
    pub optional: bool,
    pub registry_bucket: String,
}

impl PhaseDefinition {
    pub fn new(id: u32, name: &str, registry_bucket: &str) -> Self {
        Self { id: PhaseId(id),
               name: name.to_string(),
               description: String::new(),
               required_inputs: Vec::new(),
               outputs: vec![registry_bucket.to_string()],
               dependencies: Vec::new(),
               optional: false,
               registry_bucket: registry_bucket.to_string() }
    }

    pub fn describe(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn depends_on(mut self, deps: &[u32]) -> Self {
        self.dependencies = deps.iter().copied().map(PhaseId).collect();
        self
    }

    pub fn requires(mut self, inputs: &[&str]) -> Self {
        self.required_inputs = inputs.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn produces(mut self, outputs: &[&str]) -> Self {
        self.outputs = outputs.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }
}
