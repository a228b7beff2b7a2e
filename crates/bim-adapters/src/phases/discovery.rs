//! Fases de descubrimiento: consultan lo que ya existe en el modelo y sólo
//! crean lo que falta. Los nombres se comparan sin distinguir mayúsculas.
use bim_core::phase::{call_with_timeout, created_ids};
use bim_core::{BuildExecutor, CoreEngineError, ExecutorError, PhaseContext, PhaseOutput};
use bim_domain::BuildProgram;
use indexmap::IndexMap;
use log::{debug, info};
use serde_json::{json, Value};
use std::time::Duration;

use super::plan::{decode_program, level_id};

/// Nombre del plano de planta de la planta `story`.
pub fn floor_plan_name(story: u32) -> String {
    format!("{} - Floor Plan", BuildProgram::level_name(story))
}

fn executor_error(method: &str, e: ExecutorError) -> CoreEngineError {
    CoreEngineError::Executor(format!("{method} failed: {e}"))
}

/// `nombre en minúsculas → id` de los elementos listados bajo `key`.
async fn existing_by_name(build: &dyn BuildExecutor,
                          method: &str,
                          key: &str,
                          timeout: Duration)
                          -> Result<IndexMap<String, String>, CoreEngineError> {
    let result = call_with_timeout(build, method, &json!({}), timeout).await
                                                                      .map_err(|e| executor_error(method, e))?;
    let mut found = IndexMap::new();
    for item in result.get(key).and_then(Value::as_array).into_iter().flatten() {
        let name = item.get("name").and_then(Value::as_str);
        let id = match item.get("id") {
            Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        };
        if let (Some(name), Some(id)) = (name, id) {
            found.entry(name.to_lowercase()).or_insert(id);
        }
    }
    Ok(found)
}

/// Crea un elemento y exige que el resultado informe su id.
async fn create_one(build: &dyn BuildExecutor,
                    method: &str,
                    params: Value,
                    timeout: Duration)
                    -> Result<String, CoreEngineError> {
    let result = call_with_timeout(build, method, &params, timeout).await
                                                                   .map_err(|e| executor_error(method, e))?;
    created_ids(&result).into_iter()
                        .next()
                        .ok_or_else(|| CoreEngineError::Executor(format!("{method} returned no element id")))
}

/// Niveles de cada planta y de cubierta, en ese orden.
pub(super) async fn levels(ctx: &PhaseContext, build: &dyn BuildExecutor) -> Result<PhaseOutput, CoreEngineError> {
    let program = decode_program(ctx)?;
    let existing = existing_by_name(build, "getLevels", "levels", ctx.operation_timeout).await?;

    let mut wanted: Vec<(String, f64)> =
        (0..program.number_of_stories).map(|s| (BuildProgram::level_name(s), program.elevation_of(s)))
                                      .collect();
    wanted.push((BuildProgram::roof_level_name().to_string(), program.elevation_of(program.number_of_stories)));

    let mut output = PhaseOutput::default();
    let mut reused = 0;
    for (name, elevation) in wanted {
        if let Some(id) = existing.get(&name.to_lowercase()) {
            debug!("level reused name={name} id={id}");
            output.created_ids.push(id.clone());
            reused += 1;
            continue;
        }
        let params = json!({"name": name, "elevation": elevation});
        output.created_ids.push(create_one(build, "createLevel", params, ctx.operation_timeout).await?);
    }
    info!("levels resolved workflow_id={} total={} reused={reused}",
          ctx.workflow_id,
          output.created_ids.len());
    Ok(output)
}

/// Un plano de planta por planta.
pub(super) async fn views(ctx: &PhaseContext, build: &dyn BuildExecutor) -> Result<PhaseOutput, CoreEngineError> {
    let program = decode_program(ctx)?;
    let existing = existing_by_name(build, "getViews", "views", ctx.operation_timeout).await?;

    let mut output = PhaseOutput::default();
    for story in 0..program.number_of_stories {
        let name = floor_plan_name(story);
        if let Some(id) = existing.get(&name.to_lowercase()) {
            debug!("view reused name={name} id={id}");
            output.created_ids.push(id.clone());
            continue;
        }
        let params = json!({"levelId": level_id(ctx, story)?, "name": name});
        output.created_ids.push(create_one(build, "createFloorPlan", params, ctx.operation_timeout).await?);
    }
    Ok(output)
}
