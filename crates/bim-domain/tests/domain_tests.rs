use bim_domain::{BuildProgram, BuildingType, DomainError, Point2};
use serde_json::json;

#[test]
fn test_program_from_request_json() {
    // Forma del request tal como llega desde la API (camelCase)
    let v = json!({
        "buildingType": "office",
        "numberOfStories": 3,
        "floorToFloorHeight": 13.5,
        "footprint": [{"x": 0.0, "y": 0.0}, {"x": 60.0, "y": 0.0}, {"x": 60.0, "y": 40.0}, {"x": 0.0, "y": 40.0}],
        "rooms": [{"name": "Lobby", "level": 0}, {"name": "Open Office", "number": "201", "level": 1}]
    });
    let p = BuildProgram::from_value(&v).expect("valid program");
    assert_eq!(p.building_type, BuildingType::Office);
    assert_eq!(p.rooms.len(), 2);
    assert_eq!(p.rooms[1].number.as_deref(), Some("201"));
    assert_eq!(p.elevation_of(2), 27.0);
}

#[test]
fn test_program_from_json_rejects_invalid() {
    let v = json!({
        "buildingType": "office",
        "numberOfStories": 1,
        "floorToFloorHeight": 10.0,
        "footprint": [{"x": 0.0, "y": 0.0}]
    });
    let err = BuildProgram::from_value(&v).unwrap_err();
    assert!(matches!(err, DomainError::ValidationError(_)));

    // tipo de dato incorrecto -> error de serialización
    let bad = json!({"buildingType": 3});
    assert!(matches!(BuildProgram::from_value(&bad), Err(DomainError::SerializationError(_))));
}

#[test]
fn test_program_hash_changes_with_content() {
    let fp = vec![Point2::new(0.0, 0.0), Point2::new(10.0, 0.0), Point2::new(10.0, 10.0)];
    let a = BuildProgram::new(BuildingType::Residential, 1, 10.0, fp.clone(), vec![]).unwrap();
    let b = BuildProgram::new(BuildingType::Residential, 2, 10.0, fp, vec![]).unwrap();
    assert_ne!(a.program_hash(), b.program_hash());
    assert_eq!(BuildProgram::level_name(0), "Level 1");
}
