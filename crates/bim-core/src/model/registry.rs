use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

/// Registro de elementos creados: bucket -> conjunto ordenado de ids.
///
/// Sólo crece. `merge` devuelve cuántos ids eran nuevos, que es lo que suma
/// al total de elementos del workflow. Además guarda, por bucket, el id
/// asociado a cada clave estable (`slot`) de las operaciones que la declaran.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registry {
    buckets: IndexMap<String, IndexSet<String>>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    slots: IndexMap<String, IndexMap<String, String>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn merge<I, S>(&mut self, bucket: &str, ids: I) -> usize
        where I: IntoIterator<Item = S>,
              S: Into<String>
    {
        let set = self.buckets.entry(bucket.to_string()).or_default();
        let mut added = 0;
        for id in ids {
            if set.insert(id.into()) {
                added += 1;
            }
        }
        added
    }

    /// Asocia `slot` a `id` dentro de `bucket`. Un re-intento de la fase
    /// sobrescribe la asociación anterior.
    pub fn bind_slot(&mut self, bucket: &str, slot: &str, id: &str) {
        self.slots
            .entry(bucket.to_string())
            .or_default()
            .insert(slot.to_string(), id.to_string());
    }

    pub fn slot_id(&self, bucket: &str, slot: &str) -> Option<&str> {
        self.slots.get(bucket).and_then(|s| s.get(slot)).map(String::as_str)
    }

    pub fn ids(&self, bucket: &str) -> Vec<String> {
        self.buckets.get(bucket).map(|s| s.iter().cloned().collect()).unwrap_or_default()
    }

    pub fn count(&self, bucket: &str) -> usize {
        self.buckets.get(bucket).map(IndexSet::len).unwrap_or(0)
    }

    pub fn contains(&self, bucket: &str, id: &str) -> bool {
        self.buckets.get(bucket).is_some_and(|s| s.contains(id))
    }

    /// Conteo por bucket, en orden de creación de los buckets.
    pub fn counts(&self) -> IndexMap<String, usize> {
        self.buckets.iter().map(|(k, v)| (k.clone(), v.len())).collect()
    }

    pub fn total(&self) -> usize {
        self.buckets.values().map(IndexSet::len).sum()
    }

    /// Todos los ids, bucket por bucket.
    pub fn all_ids(&self) -> Vec<String> {
        self.buckets.values().flat_map(|s| s.iter().cloned()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}
