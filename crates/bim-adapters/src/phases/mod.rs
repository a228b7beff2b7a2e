//! Ejecutores de las fases estándar.
//!
//! `StandardPhase` es un conjunto cerrado: cada variante sabe su definición de
//! catálogo y cómo traducir el programa en operaciones atómicas. Levels y
//! Views devuelven una lista vacía de operaciones y sobreescriben `execute`:
//! primero consultan lo existente en el modelo y sólo crean lo que falta, por
//! lo que nunca pasan por el gate de confianza.
mod discovery;
mod plan;

use async_trait::async_trait;
use bim_core::{AtomicOperation, BuildExecutor, CoreEngineError, PhaseContext, PhaseDefinition, PhaseExecutor, PhaseId,
               PhaseOutput};
use std::sync::Arc;

use crate::catalog::{DOORS_BUCKET, FLOORS_BUCKET, GRIDS_BUCKET, LEVELS_BUCKET, ROOFS_BUCKET, ROOMS_BUCKET,
                     SHEETS_BUCKET, STAIRS_BUCKET, VIEWS_BUCKET, WALLS_BUCKET, WINDOWS_BUCKET};

pub use discovery::floor_plan_name;
pub use plan::{decode_program, exterior_wall_id, exterior_wall_slot, level_id, roof_level_id};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StandardPhase {
    Levels,
    Grids,
    ExteriorWalls,
    InteriorWalls,
    Floors,
    Doors,
    Windows,
    Roof,
    Rooms,
    Stairs,
    Views,
    Sheets,
}

impl StandardPhase {
    pub const ALL: [StandardPhase; 12] = [StandardPhase::Levels,
                                          StandardPhase::Grids,
                                          StandardPhase::ExteriorWalls,
                                          StandardPhase::InteriorWalls,
                                          StandardPhase::Floors,
                                          StandardPhase::Doors,
                                          StandardPhase::Windows,
                                          StandardPhase::Roof,
                                          StandardPhase::Rooms,
                                          StandardPhase::Stairs,
                                          StandardPhase::Views,
                                          StandardPhase::Sheets];

    pub fn id(&self) -> PhaseId {
        PhaseId(*self as u32)
    }

    pub fn name(&self) -> &'static str {
        match self {
            StandardPhase::Levels => "Levels",
            StandardPhase::Grids => "Grids",
            StandardPhase::ExteriorWalls => "ExteriorWalls",
            StandardPhase::InteriorWalls => "InteriorWalls",
            StandardPhase::Floors => "Floors",
            StandardPhase::Doors => "Doors",
            StandardPhase::Windows => "Windows",
            StandardPhase::Roof => "Roof",
            StandardPhase::Rooms => "Rooms",
            StandardPhase::Stairs => "Stairs",
            StandardPhase::Views => "Views",
            StandardPhase::Sheets => "Sheets",
        }
    }

    pub fn from_id(id: PhaseId) -> Option<Self> {
        Self::ALL.get(id.0 as usize).copied()
    }

    /// `true` para las fases que siempre ejecutan directo.
    pub fn is_direct_only(&self) -> bool {
        matches!(self, StandardPhase::Levels | StandardPhase::Views)
    }

    pub fn bucket(&self) -> &'static str {
        match self {
            StandardPhase::Levels => LEVELS_BUCKET,
            StandardPhase::Grids => GRIDS_BUCKET,
            StandardPhase::ExteriorWalls | StandardPhase::InteriorWalls => WALLS_BUCKET,
            StandardPhase::Floors => FLOORS_BUCKET,
            StandardPhase::Doors => DOORS_BUCKET,
            StandardPhase::Windows => WINDOWS_BUCKET,
            StandardPhase::Roof => ROOFS_BUCKET,
            StandardPhase::Rooms => ROOMS_BUCKET,
            StandardPhase::Stairs => STAIRS_BUCKET,
            StandardPhase::Views => VIEWS_BUCKET,
            StandardPhase::Sheets => SHEETS_BUCKET,
        }
    }

    fn description(&self) -> &'static str {
        match self {
            StandardPhase::Levels => "Create one level per story plus the roof level",
            StandardPhase::Grids => "Grid lines along the footprint edges",
            StandardPhase::ExteriorWalls => "Exterior walls on every footprint edge and story",
            StandardPhase::InteriorWalls => "Partition walls on stories with several rooms",
            StandardPhase::Floors => "Floor slab per story",
            StandardPhase::Doors => "One access door per story",
            StandardPhase::Windows => "Windows on exterior walls by building type",
            StandardPhase::Roof => "Roof over the footprint",
            StandardPhase::Rooms => "Rooms requested by the program",
            StandardPhase::Stairs => "Stair run between consecutive stories",
            StandardPhase::Views => "Floor plan view per story",
            StandardPhase::Sheets => "One sheet per plan view",
        }
    }

    pub fn definition(&self) -> PhaseDefinition {
        let def = PhaseDefinition::new(self.id().0, self.name(), self.bucket()).describe(self.description());
        match self {
            StandardPhase::Levels => def.requires(&["numberOfStories", "floorToFloorHeight"]),
            StandardPhase::Grids => def.depends_on(&[0]).requires(&["footprint", LEVELS_BUCKET]).optional(),
            StandardPhase::ExteriorWalls => def.depends_on(&[0]).requires(&["footprint", LEVELS_BUCKET]),
            StandardPhase::InteriorWalls => def.depends_on(&[2]).requires(&[WALLS_BUCKET, LEVELS_BUCKET]).optional(),
            StandardPhase::Floors => def.depends_on(&[0, 2]).requires(&["footprint", LEVELS_BUCKET]),
            StandardPhase::Doors => def.depends_on(&[2]).requires(&[WALLS_BUCKET, LEVELS_BUCKET]),
            StandardPhase::Windows => def.depends_on(&[2]).requires(&[WALLS_BUCKET, LEVELS_BUCKET]),
            StandardPhase::Roof => def.depends_on(&[0, 2]).requires(&["footprint", LEVELS_BUCKET]),
            StandardPhase::Rooms => def.depends_on(&[4]).requires(&[LEVELS_BUCKET]),
            StandardPhase::Stairs => def.depends_on(&[4]).requires(&[LEVELS_BUCKET, FLOORS_BUCKET]).optional(),
            StandardPhase::Views => def.depends_on(&[0]).requires(&[LEVELS_BUCKET]).optional(),
            StandardPhase::Sheets => def.depends_on(&[10]).requires(&[VIEWS_BUCKET]).optional(),
        }
    }

    /// Un ejecutor por fase del catálogo estándar.
    pub fn executors() -> Vec<Arc<dyn PhaseExecutor>> {
        Self::ALL.iter().map(|p| Arc::new(*p) as Arc<dyn PhaseExecutor>).collect()
    }
}

#[async_trait]
impl PhaseExecutor for StandardPhase {
    fn phase_id(&self) -> PhaseId {
        self.id()
    }

    fn operations(&self, ctx: &PhaseContext) -> Result<Vec<AtomicOperation>, CoreEngineError> {
        let program = decode_program(ctx)?;
        match self {
            StandardPhase::Levels | StandardPhase::Views => Ok(Vec::new()),
            StandardPhase::Grids => Ok(plan::grids(&program)),
            StandardPhase::ExteriorWalls => plan::exterior_walls(ctx, &program),
            StandardPhase::InteriorWalls => plan::interior_walls(ctx, &program),
            StandardPhase::Floors => plan::floors(ctx, &program),
            StandardPhase::Doors => plan::doors(ctx, &program),
            StandardPhase::Windows => plan::windows(ctx, &program),
            StandardPhase::Roof => plan::roof(ctx, &program),
            StandardPhase::Rooms => plan::rooms(ctx, &program),
            StandardPhase::Stairs => plan::stairs(ctx, &program),
            StandardPhase::Sheets => Ok(plan::sheets(ctx)),
        }
    }

    async fn execute(&self, ctx: &PhaseContext, build: &dyn BuildExecutor) -> Result<PhaseOutput, CoreEngineError> {
        match self {
            StandardPhase::Levels => discovery::levels(ctx, build).await,
            StandardPhase::Views => discovery::views(ctx, build).await,
            _ => {
                let operations = self.operations(ctx)?;
                bim_core::phase::execute_operations_direct(build, &operations, ctx.operation_timeout).await
            }
        }
    }
}
