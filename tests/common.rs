#![allow(dead_code)]

use bimflow_rust::{AppConfig, BuildService};
use bim_adapters::InMemoryBuildModel;
use serde_json::{json, Value};
use std::sync::Arc;

pub fn service() -> (BuildService, Arc<InMemoryBuildModel>) {
    BuildService::in_memory(AppConfig::default()).unwrap()
}

pub fn box_program(stories: u32) -> Value {
    json!({
        "buildingType": "residential",
        "numberOfStories": stories,
        "floorToFloorHeight": 10.0,
        "footprint": [{"x": 0.0, "y": 0.0}, {"x": 40.0, "y": 0.0}, {"x": 40.0, "y": 30.0}, {"x": 0.0, "y": 30.0}],
        "rooms": []
    })
}

/// Programa con flags de workflow añadidos.
pub fn program_with(stories: u32, flags: Value) -> Value {
    let mut program = box_program(stories);
    if let (Value::Object(target), Value::Object(extra)) = (&mut program, flags) {
        target.extend(extra);
    }
    program
}

pub async fn create(service: &BuildService, params: Value) -> String {
    let res = service.dispatch("createWorkflow", &params).await;
    assert_eq!(res["success"], json!(true), "{res}");
    res["workflowId"].as_str().unwrap().to_string()
}
