//! Traducción del programa a operaciones atómicas por fase.
//!
//! El bucket `levels` lo llena una fase de descubrimiento siempre directa: una
//! entrada por planta en orden y después la cubierta, así que se lee por
//! posición. Los muros exteriores pueden entrar al registro en cualquier orden
//! (aprobaciones de revisión); cada uno declara la clave
//! [`exterior_wall_slot`] y se busca por ella.
use bim_core::{AtomicOperation, CoreEngineError, PhaseContext};
use bim_domain::{BuildProgram, Point2};
use serde_json::{json, Value};

use crate::catalog::{LEVELS_BUCKET, VIEWS_BUCKET, WALLS_BUCKET};

pub const DOOR_WIDTH: f64 = 3.0;
pub const DOOR_HEIGHT: f64 = 7.0;
pub const WINDOW_SILL_HEIGHT: f64 = 3.0;
pub const ROOF_SLOPE: f64 = 0.0;

pub fn decode_program(ctx: &PhaseContext) -> Result<BuildProgram, CoreEngineError> {
    BuildProgram::from_value(&ctx.program).map_err(|e| CoreEngineError::Validation(e.to_string()))
}

pub(crate) fn pt(p: &Point2) -> Value {
    json!({"x": p.x, "y": p.y})
}

/// Punto a fracción `t` del segmento `a`-`b`.
fn lerp(a: &Point2, b: &Point2, t: f64) -> Point2 {
    Point2::new(a.x + (b.x - a.x) * t, a.y + (b.y - a.y) * t)
}

/// Id del nivel de la planta `story`.
pub fn level_id(ctx: &PhaseContext, story: u32) -> Result<String, CoreEngineError> {
    ctx.bucket_ids(LEVELS_BUCKET)
       .get(story as usize)
       .cloned()
       .ok_or_else(|| CoreEngineError::Validation(format!("level for story {} is not registered", story + 1)))
}

/// Id del nivel de cubierta; sin él, el de la última planta.
pub fn roof_level_id(ctx: &PhaseContext, program: &BuildProgram) -> Result<String, CoreEngineError> {
    match ctx.bucket_ids(LEVELS_BUCKET).get(program.number_of_stories as usize) {
        Some(id) => Ok(id.clone()),
        None => level_id(ctx, program.number_of_stories - 1),
    }
}

/// Clave del muro exterior de la arista `edge` en la planta `story`.
pub fn exterior_wall_slot(story: u32, edge: usize) -> String {
    format!("exterior/{story}/{edge}")
}

/// Id del muro exterior de la arista `edge` en la planta `story`.
pub fn exterior_wall_id(ctx: &PhaseContext, story: u32, edge: usize) -> Result<String, CoreEngineError> {
    ctx.registry
       .slot_id(WALLS_BUCKET, &exterior_wall_slot(story, edge))
       .map(str::to_string)
       .ok_or_else(|| {
           CoreEngineError::Validation(format!("exterior wall {} of story {} is not registered", edge + 1, story + 1))
       })
}

/// Etiqueta de eje: A..Z, luego AA, AB, ...
fn grid_label(index: usize) -> String {
    let letter = |i: usize| char::from(b'A' + (i % 26) as u8);
    if index < 26 {
        letter(index).to_string()
    } else {
        format!("{}{}", letter(index / 26 - 1), letter(index))
    }
}

pub(crate) fn grids(program: &BuildProgram) -> Vec<AtomicOperation> {
    program.footprint_edges()
           .iter()
           .enumerate()
           .map(|(i, (a, b))| {
               let name = grid_label(i);
               AtomicOperation::new("createGrid", json!({"name": name, "start": pt(a), "end": pt(b)}))
                   .with_description(format!("Grid {name}"))
           })
           .collect()
}

pub(crate) fn exterior_walls(ctx: &PhaseContext, program: &BuildProgram) -> Result<Vec<AtomicOperation>, CoreEngineError> {
    let edges = program.footprint_edges();
    let mut ops = Vec::with_capacity(edges.len() * program.number_of_stories as usize);
    for story in 0..program.number_of_stories {
        let level = level_id(ctx, story)?;
        for (i, (a, b)) in edges.iter().enumerate() {
            let params = json!({
                "start": pt(a),
                "end": pt(b),
                "levelId": level,
                "height": program.floor_to_floor_height,
                "structural": true,
                "exterior": true
            });
            let description = format!("Exterior wall {} on {}", i + 1, BuildProgram::level_name(story));
            ops.push(AtomicOperation::new("createWall", params).with_description(description)
                                                               .with_slot(exterior_wall_slot(story, i)));
        }
    }
    Ok(ops)
}

/// Un tabique por planta con dos o más espacios, entre los puntos medios de
/// la primera arista y de la arista opuesta.
pub(crate) fn interior_walls(ctx: &PhaseContext, program: &BuildProgram) -> Result<Vec<AtomicOperation>, CoreEngineError> {
    let edges = program.footprint_edges();
    let (a0, b0) = edges[0];
    let (a1, b1) = edges[edges.len() / 2];
    let start = a0.midpoint(&b0);
    let end = a1.midpoint(&b1);
    let mut ops = Vec::new();
    for story in 0..program.number_of_stories {
        if program.rooms.iter().filter(|r| r.level == story).count() < 2 {
            continue;
        }
        let params = json!({
            "start": pt(&start),
            "end": pt(&end),
            "levelId": level_id(ctx, story)?,
            "height": program.floor_to_floor_height,
            "structural": false,
            "exterior": false
        });
        ops.push(AtomicOperation::new("createWall", params).with_description(format!("Partition on {}",
                                                                                      BuildProgram::level_name(story))));
    }
    Ok(ops)
}

pub(crate) fn floors(ctx: &PhaseContext, program: &BuildProgram) -> Result<Vec<AtomicOperation>, CoreEngineError> {
    let boundary: Vec<Value> = program.footprint.iter().map(pt).collect();
    let mut ops = Vec::with_capacity(program.number_of_stories as usize);
    for story in 0..program.number_of_stories {
        let params = json!({"boundary": boundary, "levelId": level_id(ctx, story)?});
        ops.push(AtomicOperation::new("createFloor", params).with_description(format!("Floor of {}",
                                                                                       BuildProgram::level_name(story))));
    }
    Ok(ops)
}

pub(crate) fn doors(ctx: &PhaseContext, program: &BuildProgram) -> Result<Vec<AtomicOperation>, CoreEngineError> {
    let (a, b) = program.footprint_edges()[0];
    let location = a.midpoint(&b);
    let mut ops = Vec::new();
    for story in 0..program.number_of_stories {
        let params = json!({
            "wallId": exterior_wall_id(ctx, story, 0)?,
            "location": pt(&location),
            "levelId": level_id(ctx, story)?,
            "width": DOOR_WIDTH,
            "height": DOOR_HEIGHT
        });
        ops.push(AtomicOperation::new("placeDoor", params).with_description(format!("Access door on {}",
                                                                                     BuildProgram::level_name(story))));
    }
    Ok(ops)
}

/// `windows_per_wall` ventanas repartidas uniformemente en cada muro
/// exterior, salvo en el muro de la puerta de acceso.
pub(crate) fn windows(ctx: &PhaseContext, program: &BuildProgram) -> Result<Vec<AtomicOperation>, CoreEngineError> {
    let per_wall = program.building_type.windows_per_wall();
    let edges = program.footprint_edges();
    let mut ops = Vec::new();
    for story in 0..program.number_of_stories {
        let level = level_id(ctx, story)?;
        for (edge, (a, b)) in edges.iter().enumerate().skip(1) {
            let wall = exterior_wall_id(ctx, story, edge)?;
            for k in 0..per_wall {
                let t = f64::from(k + 1) / f64::from(per_wall + 1);
                let params = json!({
                    "wallId": wall,
                    "location": pt(&lerp(a, b, t)),
                    "levelId": level,
                    "sillHeight": WINDOW_SILL_HEIGHT
                });
                ops.push(AtomicOperation::new("placeWindow", params));
            }
        }
    }
    Ok(ops)
}

pub(crate) fn roof(ctx: &PhaseContext, program: &BuildProgram) -> Result<Vec<AtomicOperation>, CoreEngineError> {
    let boundary: Vec<Value> = program.footprint.iter().map(pt).collect();
    let params = json!({
        "boundary": boundary,
        "levelId": roof_level_id(ctx, program)?,
        "slope": ROOF_SLOPE
    });
    Ok(vec![AtomicOperation::new("createRoof", params).with_description("Roof")])
}

pub(crate) fn rooms(ctx: &PhaseContext, program: &BuildProgram) -> Result<Vec<AtomicOperation>, CoreEngineError> {
    let centroid = program.footprint_centroid();
    let mut ops = Vec::with_capacity(program.rooms.len());
    for room in &program.rooms {
        let mut params = json!({
            "name": room.name,
            "levelId": level_id(ctx, room.level)?,
            "location": pt(&room.location.unwrap_or(centroid))
        });
        if let Some(number) = &room.number {
            params["number"] = json!(number);
        }
        ops.push(AtomicOperation::new("createRoom", params).with_description(format!("Room {}", room.name)));
    }
    Ok(ops)
}

/// Un tramo de escalera entre cada par de plantas consecutivas.
pub(crate) fn stairs(ctx: &PhaseContext, program: &BuildProgram) -> Result<Vec<AtomicOperation>, CoreEngineError> {
    let location = program.footprint_centroid();
    let mut ops = Vec::new();
    for top in 1..program.number_of_stories {
        let params = json!({
            "baseLevelId": level_id(ctx, top - 1)?,
            "topLevelId": level_id(ctx, top)?,
            "location": pt(&location)
        });
        ops.push(AtomicOperation::new("createStairs", params).with_description(format!("Stairs to {}",
                                                                                        BuildProgram::level_name(top))));
    }
    Ok(ops)
}

pub(crate) fn sheets(ctx: &PhaseContext) -> Vec<AtomicOperation> {
    ctx.bucket_ids(VIEWS_BUCKET)
       .into_iter()
       .enumerate()
       .map(|(i, view)| {
           let number = format!("A{}", 101 + i);
           let params = json!({"viewId": view, "name": format!("{number} - Floor Plan"), "number": number});
           AtomicOperation::new("createSheet", params)
       })
       .collect()
}
