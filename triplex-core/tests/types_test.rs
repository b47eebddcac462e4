use std::collections::HashMap;
use triplex_core::entity::{Direction, Entity, Relationship};
use triplex_core::filter::FilterExpr;
use triplex_core::scalar::{FieldType, Scalar};

#[test]
fn entity_carries_metadata_and_type() {
    let mut metadata = HashMap::new();
    metadata.insert("category".to_string(), Scalar::String("tech".to_string()));

    let entity = Entity::new("e1".to_string(), vec![1.0, 0.0, 0.0], 1_700_000_000_000)
        .with_metadata(metadata)
        .with_type("article");

    assert_eq!(entity.dim(), 3);
    assert_eq!(entity.entity_type.as_deref(), Some("article"));
    assert_eq!(
        entity.metadata.get("category"),
        Some(&Scalar::String("tech".to_string()))
    );
}

#[test]
fn relationship_defaults_to_full_weight() {
    let rel = Relationship::new("r1".to_string(), "a".to_string(), "b".to_string(), "cites");
    assert_eq!(rel.weight, 1.0);
    assert_eq!(rel.relation_type, "cites");
}

#[test]
fn direction_variants_are_distinct() {
    assert_ne!(Direction::In, Direction::Out);
    assert_ne!(Direction::Out, Direction::Both);
}

#[test]
fn filter_expr_composition_round_trips_through_json() {
    let expr = FilterExpr::all_of(vec![
        FilterExpr::equals("category", Scalar::String("tech".to_string())),
        FilterExpr::GreaterOrEqual {
            field: "rating".to_string(),
            value: Scalar::Float64(4.0),
        },
    ]);

    let json = serde_json::to_string(&expr).unwrap();
    let parsed: FilterExpr = serde_json::from_str(&json).unwrap();
    let mut fields = parsed.fields();
    fields.sort();
    assert_eq!(fields, vec!["category", "rating"]);
}

#[test]
fn scalar_type_tag_is_stable() {
    assert_eq!(Scalar::Int64(5).type_tag(), FieldType::Number);
    assert_eq!(Scalar::String("x".into()).type_tag(), FieldType::String);
}
