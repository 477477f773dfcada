//! Integration tests for model definition analysis.
//!
//! These tests verify the end-to-end behavior of:
//! - Primary key synthesis and conflicts
//! - Role classification of fields
//! - Inheritance and field order
//! - Table naming
//! - Computed field resolution at first record construction

use std::sync::Arc;

use modeldb::{Field, FieldType, ModelDBError, ModelDefinition, ModelError, Record};
use serde_json::json;

fn names(definition: &ModelDefinition) -> Vec<&str> {
    definition.fields().iter().map(Field::name).collect()
}

fn model_err(err: ModelDBError) -> ModelError {
    match err {
        ModelDBError::Model(err) => err,
        other => panic!("Expected model error, got: {:?}", other),
    }
}

// ============================================================================
// Primary Key Tests
// ============================================================================

#[test]
fn test_id_synthesized_without_primary() {
    let alpha = ModelDefinition::builder("Alpha")
        .field("f", Field::string())
        .build()
        .unwrap();

    let id = alpha.field("id").expect("id should be synthesized");
    assert!(id.is_primary());
    assert!(!id.is_required());
    assert_eq!(alpha.primary().name(), "id");
    assert!(alpha.required().all(|field| field.name() != "id"));
}

#[test]
fn test_multiple_primary_rejected() {
    let err = ModelDefinition::builder("Gamma")
        .field("a", Field::string().primary())
        .field("b", Field::string().primary())
        .build()
        .unwrap_err();

    let err = model_err(err);
    assert!(err.is_definition());
    assert_eq!(err.model(), "Gamma");
    assert_eq!(
        err.to_string(),
        "Model Gamma has multiple primary fields: [\"a\", \"b\"]"
    );
}

#[test]
fn test_primary_implies_required() {
    let user = ModelDefinition::builder("User")
        .field("email", Field::string().primary().optional())
        .build()
        .unwrap();

    assert!(user.primary().is_required());
}

// ============================================================================
// Classification Tests
// ============================================================================

#[test]
fn test_model_fields_always_required() {
    let beta = ModelDefinition::builder("Beta")
        .field("field", Field::string())
        .build()
        .unwrap();

    let alpha = ModelDefinition::builder("Alpha")
        .field("beta", Field::model(&beta).optional())
        .field("owner", Field::model(&beta).related().optional())
        .build()
        .unwrap();

    assert!(alpha.field("beta").unwrap().is_required());
    assert!(alpha.field("owner").unwrap().is_required());
    assert_eq!(alpha.nested().map(Field::name).collect::<Vec<_>>(), vec!["beta"]);
    assert_eq!(alpha.related().map(Field::name).collect::<Vec<_>>(), vec!["owner"]);
}

#[test]
fn test_nested_field_type_points_to_definition() {
    let beta = ModelDefinition::builder("Beta")
        .field("field", Field::string())
        .build()
        .unwrap();
    let alpha = ModelDefinition::builder("Alpha")
        .field("beta", Field::model(&beta))
        .build()
        .unwrap();

    match alpha.field("beta").unwrap().field_type() {
        FieldType::Model(definition) => assert!(Arc::ptr_eq(definition, &beta)),
        other => panic!("Expected model type, got: {:?}", other),
    }
}

#[test]
fn test_field_display() {
    let alpha = ModelDefinition::builder("Alpha")
        .field("email", Field::string().required().indexed())
        .build()
        .unwrap();

    let shown = alpha.field("email").unwrap().to_string();
    assert!(shown.starts_with("<Field name:email type:string"));
    assert!(shown.contains("required:true"));
    assert!(shown.contains("indexed:true"));
}

// ============================================================================
// Inheritance Tests
// ============================================================================

#[test]
fn test_base_fields_first_then_declaration_order() {
    let timestamped = ModelDefinition::builder("Timestamped")
        .field("created", Field::integer())
        .field("updated", Field::integer())
        .build()
        .unwrap();

    let post = ModelDefinition::builder("BlogPost")
        .extends(&timestamped)
        .field("title", Field::string().required())
        .field("body", Field::string())
        .build()
        .unwrap();

    assert_eq!(names(&post), vec!["created", "updated", "title", "body", "id"]);
    assert_eq!(post.table(), "blog_posts");
}

#[test]
fn test_inherited_computed_method() {
    let named = ModelDefinition::builder("Named")
        .field("first", Field::string())
        .field("label", Field::string().computed_method("describe"))
        .method("describe", |record: &Record| {
            json!(format!(
                "{}!",
                record.value("first").and_then(|v| v.as_str()).unwrap_or_default()
            ))
        })
        .build()
        .unwrap();

    let person = ModelDefinition::builder("Person")
        .extends(&named)
        .build()
        .unwrap();

    let record = Record::with(&person, None, [("first", "Ada")]).unwrap();
    assert_eq!(record.serialize(false).unwrap()["label"], json!("Ada!"));
}

// ============================================================================
// Table Naming Tests
// ============================================================================

#[test]
fn test_table_names() {
    let cases = [
        ("User", "users"),
        ("Category", "categories"),
        ("Address", "addresses"),
        ("Box", "boxes"),
        ("OrderItem", "order_items"),
        ("Day", "days"),
        ("Person", "people"),
        ("Sheep", "sheep"),
    ];

    for (model, table) in cases {
        let definition = ModelDefinition::builder(model).build().unwrap();
        assert_eq!(definition.table(), table, "table name of {}", model);
    }
}

// ============================================================================
// Computed Resolution Tests
// ============================================================================

#[test]
fn test_missing_method_fails_construction() {
    let alpha = ModelDefinition::builder("Alpha")
        .field("label", Field::string().computed_method("nope"))
        .build()
        .expect("resolution happens at construction, not definition");

    let err = model_err(Record::new(&alpha).unwrap_err());
    assert_eq!(
        err,
        ModelError::MissingMethods {
            model: "Alpha".into(),
            methods: vec!["nope".into()],
        }
    );
    assert!(err.is_resolution());
}

#[test]
fn test_method_naming_plain_field_fails_construction() {
    let alpha = ModelDefinition::builder("Alpha")
        .field("title", Field::string())
        .field("label", Field::string().computed_method("title"))
        .build()
        .unwrap();

    let err = model_err(Record::new(&alpha).unwrap_err());
    assert_eq!(
        err,
        ModelError::InvalidComputed {
            model: "Alpha".into(),
            fields: vec!["label".into()],
        }
    );
}

#[test]
fn test_resolution_failure_repeats_on_every_construction() {
    let alpha = ModelDefinition::builder("Alpha")
        .field("label", Field::string().computed_method("nope"))
        .build()
        .unwrap();

    let first = model_err(Record::new(&alpha).unwrap_err());
    let second = model_err(Record::from_map(&alpha, Default::default()).unwrap_err());
    assert_eq!(first, second);
}

#[test]
fn test_concurrent_construction_shares_definition() {
    let alpha = ModelDefinition::builder("Alpha")
        .field("n", Field::integer())
        .field("double", Field::integer().computed_method("double"))
        .method("double", |record: &Record| {
            json!(record.value("n").and_then(|v| v.as_i64()).unwrap_or(0) * 2)
        })
        .build()
        .unwrap();

    let handles: Vec<_> = (0..8)
        .map(|n| {
            let alpha = Arc::clone(&alpha);
            std::thread::spawn(move || {
                let record = Record::with(&alpha, None, [("n", n)]).unwrap();
                record.serialize(false).unwrap()["double"].clone()
            })
        })
        .collect();

    let mut results: Vec<i64> = handles
        .into_iter()
        .map(|handle| handle.join().unwrap().as_i64().unwrap())
        .collect();
    results.sort_unstable();
    assert_eq!(results, vec![0, 2, 4, 6, 8, 10, 12, 14]);
}
