// program.rs
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

use crate::geometry::{closed_edges, signed_area, vertex_centroid, Point2, COORD_TOLERANCE};
use crate::DomainError;

/// Límite superior razonable de plantas para un programa de edificación.
pub const MAX_STORIES: u32 = 200;

/// Tipología del edificio. Influye en valores por defecto de algunas fases
/// (p. ej. densidad de ventanas), nunca en el orden de ejecución.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BuildingType {
    Residential,
    Office,
    Retail,
    Industrial,
    Institutional,
    MixedUse,
}

impl BuildingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildingType::Residential => "residential",
            BuildingType::Office => "office",
            BuildingType::Retail => "retail",
            BuildingType::Industrial => "industrial",
            BuildingType::Institutional => "institutional",
            BuildingType::MixedUse => "mixed-use",
        }
    }

    /// Ventanas por tramo de muro exterior y planta.
    pub fn windows_per_wall(&self) -> u32 {
        match self {
            BuildingType::Office | BuildingType::Institutional => 2,
            BuildingType::Industrial => 0,
            _ => 1,
        }
    }
}

impl FromStr for BuildingType {
    type Err = DomainError;

    /// Acepta variantes de mayúsculas/minúsculas y separadores (`MixedUse`,
    /// `mixed_use`, `mixed-use`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s.chars()
                                  .filter(|c| !matches!(c, '-' | '_' | ' '))
                                  .flat_map(|c| c.to_lowercase())
                                  .collect();
        match normalized.as_str() {
            "residential" | "house" | "apartment" => Ok(BuildingType::Residential),
            "office" | "commercial" => Ok(BuildingType::Office),
            "retail" => Ok(BuildingType::Retail),
            "industrial" | "warehouse" => Ok(BuildingType::Industrial),
            "institutional" | "school" | "hospital" => Ok(BuildingType::Institutional),
            "mixeduse" => Ok(BuildingType::MixedUse),
            "" => Err(DomainError::ValidationError("buildingType es requerido".to_string())),
            other => Err(DomainError::ValidationError(format!("buildingType desconocido: {other}"))),
        }
    }
}

impl fmt::Display for BuildingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Espacio solicitado por el programa.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSpec {
    pub name: String,
    #[serde(default)]
    pub number: Option<String>,
    /// Índice de planta (0 = planta baja).
    #[serde(default)]
    pub level: u32,
    /// Punto de colocación; si falta se usa el centroide de la huella.
    #[serde(default)]
    pub location: Option<Point2>,
}

/// Programa de edificación: snapshot inmutable de la solicitud de
/// construcción. Se valida una sola vez al crear el workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildProgram {
    pub building_type: BuildingType,
    pub number_of_stories: u32,
    pub floor_to_floor_height: f64,
    pub footprint: Vec<Point2>,
    #[serde(default)]
    pub rooms: Vec<RoomSpec>,
}

impl BuildProgram {
    /// Construye y valida un programa.
    ///
    /// # Errores
    /// Retorna `DomainError::ValidationError` si alguna regla del programa no
    /// se cumple (ver [`BuildProgram::validate`]).
    pub fn new(building_type: BuildingType,
               number_of_stories: u32,
               floor_to_floor_height: f64,
               footprint: Vec<Point2>,
               rooms: Vec<RoomSpec>)
               -> Result<Self, DomainError> {
        let program = BuildProgram { building_type,
                                     number_of_stories,
                                     floor_to_floor_height,
                                     footprint,
                                     rooms };
        program.validate()?;
        Ok(program)
    }

    /// Reglas del programa:
    /// - entre 1 y `MAX_STORIES` plantas;
    /// - altura entre plantas finita y positiva;
    /// - huella de al menos 3 vértices finitos, sin vértices consecutivos
    ///   repetidos y con área no nula;
    /// - cada espacio con nombre y planta existente.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.number_of_stories == 0 || self.number_of_stories > MAX_STORIES {
            return Err(DomainError::ValidationError(format!("numberOfStories debe estar entre 1 y {MAX_STORIES}")));
        }
        if !self.floor_to_floor_height.is_finite() || self.floor_to_floor_height <= 0.0 {
            return Err(DomainError::ValidationError("floorToFloorHeight debe ser positivo".to_string()));
        }
        if self.footprint.len() < 3 {
            return Err(DomainError::ValidationError(format!("footprint requiere al menos 3 puntos (recibidos {})",
                                                            self.footprint.len())));
        }
        if let Some(p) = self.footprint.iter().find(|p| !p.is_finite()) {
            return Err(DomainError::ValidationError(format!("footprint contiene un punto no finito: {p}")));
        }
        for (a, b) in closed_edges(&self.footprint) {
            if a.approx_eq(&b) {
                return Err(DomainError::ValidationError(format!("footprint contiene vértices consecutivos repetidos: {a}")));
            }
        }
        if signed_area(&self.footprint).abs() < COORD_TOLERANCE {
            return Err(DomainError::ValidationError("footprint tiene área nula".to_string()));
        }
        for room in &self.rooms {
            if room.name.trim().is_empty() {
                return Err(DomainError::ValidationError("cada room requiere un nombre".to_string()));
            }
            if room.level >= self.number_of_stories {
                return Err(DomainError::ValidationError(format!("room '{}' referencia la planta {} inexistente",
                                                                room.name, room.level)));
            }
        }
        Ok(())
    }

    /// Decodifica y valida un programa desde su snapshot JSON neutral.
    pub fn from_value(value: &serde_json::Value) -> Result<Self, DomainError> {
        let program: BuildProgram = serde_json::from_value(value.clone())?;
        program.validate()?;
        Ok(program)
    }

    /// Snapshot JSON neutral (lo que guarda el estado del workflow).
    pub fn to_value(&self) -> Result<serde_json::Value, DomainError> {
        Ok(serde_json::to_value(self)?)
    }

    /// Aristas de la huella (muros exteriores por planta).
    pub fn footprint_edges(&self) -> Vec<(Point2, Point2)> {
        closed_edges(&self.footprint)
    }

    /// Centroide de vértices de la huella.
    pub fn footprint_centroid(&self) -> Point2 {
        vertex_centroid(&self.footprint).unwrap_or(Point2::new(0.0, 0.0))
    }

    /// Cota de la planta `story` (0 = planta baja).
    pub fn elevation_of(&self, story: u32) -> f64 {
        story as f64 * self.floor_to_floor_height
    }

    /// Nombre estándar del nivel de la planta `story`.
    pub fn level_name(story: u32) -> String {
        format!("Level {}", story + 1)
    }

    /// Nombre del nivel de cubierta (por encima de la última planta).
    pub fn roof_level_name() -> &'static str {
        "Roof"
    }

    /// Hash sha256 del programa serializado; identifica la solicitud de
    /// construcción en el estado y en los eventos.
    pub fn program_hash(&self) -> String {
        let mut hasher = Sha256::new();
        // El orden de campos de la serialización derivada es estable.
        hasher.update(serde_json::to_string(self).unwrap_or_default().as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

impl fmt::Display for BuildProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f,
               "BuildProgram(type: {}, stories: {}, footprint: {} pts, rooms: {})",
               self.building_type,
               self.number_of_stories,
               self.footprint.len(),
               self.rooms.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rect() -> Vec<Point2> {
        vec![Point2::new(0.0, 0.0), Point2::new(40.0, 0.0), Point2::new(40.0, 30.0), Point2::new(0.0, 30.0)]
    }

    #[test]
    fn test_program_creation() -> Result<(), DomainError> {
        let p = BuildProgram::new(BuildingType::Office, 2, 12.0, rect(), vec![])?;
        assert_eq!(p.footprint_edges().len(), 4);
        assert_eq!(p.elevation_of(1), 12.0);
        assert!(p.footprint_centroid().approx_eq(&Point2::new(20.0, 15.0)));
        Ok(())
    }

    #[test]
    fn test_program_rejects_short_footprint() {
        let err = BuildProgram::new(BuildingType::Office, 1, 10.0, rect()[..2].to_vec(), vec![]).unwrap_err();
        assert!(err.to_string().contains("al menos 3 puntos"));
    }

    #[test]
    fn test_program_rejects_zero_stories_and_bad_height() {
        assert!(BuildProgram::new(BuildingType::Retail, 0, 10.0, rect(), vec![]).is_err());
        assert!(BuildProgram::new(BuildingType::Retail, 1, 0.0, rect(), vec![]).is_err());
        assert!(BuildProgram::new(BuildingType::Retail, 1, f64::NAN, rect(), vec![]).is_err());
    }

    #[test]
    fn test_program_rejects_degenerate_footprint() {
        let line = vec![Point2::new(0.0, 0.0), Point2::new(5.0, 0.0), Point2::new(10.0, 0.0)];
        assert!(BuildProgram::new(BuildingType::Retail, 1, 10.0, line, vec![]).is_err());
        let dup = vec![Point2::new(0.0, 0.0), Point2::new(0.0, 0.0), Point2::new(10.0, 10.0)];
        assert!(BuildProgram::new(BuildingType::Retail, 1, 10.0, dup, vec![]).is_err());
    }

    #[test]
    fn test_room_level_must_exist() {
        let rooms = vec![RoomSpec { name: "Lobby".into(),
                                    number: None,
                                    level: 1,
                                    location: None }];
        assert!(BuildProgram::new(BuildingType::Office, 1, 10.0, rect(), rooms).is_err());
    }

    #[test]
    fn test_building_type_parsing() {
        assert_eq!("MixedUse".parse::<BuildingType>().unwrap(), BuildingType::MixedUse);
        assert_eq!("mixed_use".parse::<BuildingType>().unwrap(), BuildingType::MixedUse);
        assert_eq!("Office".parse::<BuildingType>().unwrap(), BuildingType::Office);
        assert!("spaceship".parse::<BuildingType>().is_err());
    }

    #[test]
    fn test_value_roundtrip_and_hash() -> Result<(), DomainError> {
        let p = BuildProgram::new(BuildingType::Residential, 1, 10.0, rect(), vec![])?;
        let v = p.to_value()?;
        assert_eq!(v["buildingType"], json!("residential"));
        let back = BuildProgram::from_value(&v)?;
        assert_eq!(back, p);
        assert_eq!(back.program_hash(), p.program_hash());
        Ok(())
    }
}
