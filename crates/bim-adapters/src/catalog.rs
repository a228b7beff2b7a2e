//! Catálogo estándar de fases de construcción.
//!
//! El orden declarado es un orden topológico válido: cada fase sólo depende
//! de fases anteriores. El bucket de cada definición es el destino en el
//! registro de los ids que crea.
use bim_core::{CoreEngineError, PhaseCatalog};

use crate::phases::StandardPhase;

pub const LEVELS_BUCKET: &str = "levels";
pub const GRIDS_BUCKET: &str = "grids";
pub const WALLS_BUCKET: &str = "walls";
pub const FLOORS_BUCKET: &str = "floors";
pub const DOORS_BUCKET: &str = "doors";
pub const WINDOWS_BUCKET: &str = "windows";
pub const ROOFS_BUCKET: &str = "roofs";
pub const ROOMS_BUCKET: &str = "rooms";
pub const STAIRS_BUCKET: &str = "stairs";
pub const VIEWS_BUCKET: &str = "views";
pub const SHEETS_BUCKET: &str = "sheets";

/// Las 12 fases estándar, de Levels a Sheets.
pub fn standard_catalog() -> Result<PhaseCatalog, CoreEngineError> {
    PhaseCatalog::new(StandardPhase::ALL.iter().map(StandardPhase::definition).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bim_core::PhaseId;

    #[test]
    fn standard_catalog_is_valid_and_ordered() {
        let catalog = standard_catalog().unwrap();
        assert_eq!(catalog.len(), 12);
        assert!(catalog.is_topologically_sorted());
        let names: Vec<&str> = catalog.phases().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names,
                   vec!["Levels",
                        "Grids",
                        "ExteriorWalls",
                        "InteriorWalls",
                        "Floors",
                        "Doors",
                        "Windows",
                        "Roof",
                        "Rooms",
                        "Stairs",
                        "Views",
                        "Sheets"]);
    }

    #[test]
    fn dependencies_and_optional_flags_match_table() {
        let catalog = standard_catalog().unwrap();
        let deps = |id: u32| -> Vec<u32> { catalog.get(PhaseId(id)).unwrap().dependencies.iter().map(|d| d.0).collect() };
        assert_eq!(deps(4), vec![0, 2]);
        assert_eq!(deps(7), vec![0, 2]);
        assert_eq!(deps(8), vec![4]);
        assert_eq!(deps(11), vec![10]);
        let optional: Vec<u32> = catalog.phases().iter().filter(|p| p.optional).map(|p| p.id.0).collect();
        assert_eq!(optional, vec![1, 3, 9, 10, 11]);
        assert_eq!(catalog.get(PhaseId(3)).unwrap().registry_bucket, WALLS_BUCKET);
        assert_eq!(catalog.by_name("roof").map(|p| p.id), Some(PhaseId(7)));
    }
}
