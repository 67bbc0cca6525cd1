//! Validator idempotence and cross-field invariants over realistic filter
//! documents

use std::sync::Arc;

use serde_json::json;

use nlquery::filter::{legal_operators, FilterValidator, Operator};
use nlquery::schema::{FieldSpec, NormalizedType};
use nlquery::{FieldMap, ValidationKind};

fn field_map() -> Arc<FieldMap> {
    let mut map = FieldMap::new();
    map.insert(
        "card_type".to_string(),
        FieldSpec::enumeration(vec![json!("GOLD"), json!("SILVER"), json!("BLACK")])
            .with_exact_match(true),
    );
    map.insert(
        "transaction.amount".to_string(),
        FieldSpec::scalar(NormalizedType::Number),
    );
    map.insert(
        "transaction.timestamp".to_string(),
        FieldSpec::scalar(NormalizedType::Date),
    );
    map.insert(
        "transaction.receiver.name".to_string(),
        FieldSpec::scalar(NormalizedType::String).with_exact_match(true),
    );
    map.insert(
        "transaction.tags".to_string(),
        FieldSpec::array(NormalizedType::String),
    );
    Arc::new(map)
}

fn validator() -> FilterValidator {
    FilterValidator::new(field_map())
}

#[test]
fn accepted_documents_reach_a_fixed_point() {
    let documents = [
        json!({
            "filters": [{
                "conditions": [
                    {"field": "card_type", "operator": "is", "value": "GOLD"},
                    {"field": "transaction.amount", "operator": "between", "value": [10, 500]}
                ],
                "sort": [{"field": "transaction.amount", "order": "desc"}],
                "limit": 20
            }]
        }),
        json!({
            "filters": [{
                "conditions": [],
                "group_by": ["transaction.timestamp"],
                "interval": "week",
                "aggregations": [
                    {"field": "transaction.amount", "type": "sum",
                     "having_operator": ">=", "having_value": 100}
                ]
            }]
        }),
        json!({
            "filters": [
                {"conditions": [{"field": "transaction.tags", "operator": "exists", "value": true}]},
                {"conditions": [{"field": "transaction.receiver.name", "operator": "contains", "value": "coffee"}]}
            ]
        }),
    ];

    let v = validator();
    for document in documents {
        let once = v.validate(&document).unwrap();
        let canonical = serde_json::to_value(&once.ir).unwrap();
        let twice = v.validate(&canonical).unwrap();
        assert_eq!(once.ir, twice.ir, "validator must be idempotent");
        assert!(twice.warnings.is_empty(), "canonical form re-validates cleanly");
    }
}

#[test]
fn every_accepted_reference_is_schema_backed() {
    let document = json!({
        "filters": [{
            "conditions": [
                {"field": "null", "operator": "is", "value": "ignored"},
                {"field": "card_type", "operator": "notin", "value": ["BLACK"]}
            ],
            "group_by": ["card_type", "transaction.timestamp", "card_type"],
            "interval": "day",
            "sort": [
                {"field": "transaction.amount"},
                {"field": "not.a.field"}
            ],
            "aggregations": [{"field": "transaction.amount", "type": "max"}]
        }]
    });

    let map = field_map();
    let validated = FilterValidator::new(Arc::clone(&map)).validate(&document).unwrap();

    for slice in &validated.ir.slices {
        for condition in &slice.conditions {
            let spec = map.get(&condition.field).expect("field must be in schema");
            assert!(
                legal_operators(spec.field_type).contains(&condition.operator),
                "operator must be legal for its field type"
            );
            if condition.operator == Operator::Between {
                let pair = condition.value.as_array().unwrap();
                assert_eq!(pair.len(), 2);
            }
        }
        for field in slice.group_by.as_deref().unwrap_or(&[]) {
            assert!(map.contains_key(field));
        }
        for key in slice.sort.as_deref().unwrap_or(&[]) {
            assert!(map.contains_key(&key.field));
        }
    }

    // duplicates removed, first occurrence kept
    assert_eq!(
        validated.ir.slices[0].group_by,
        Some(vec![
            "card_type".to_string(),
            "transaction.timestamp".to_string()
        ])
    );
}

#[test]
fn rejections_carry_json_pointers() {
    let cases = [
        (
            json!({"filters": [{"conditions": [
                {"field": "ghost", "operator": "is", "value": 1}
            ]}]}),
            ValidationKind::UnknownField,
            "/filters/0/conditions/0/field",
        ),
        (
            json!({"filters": [{"conditions": [
                {"field": "transaction.tags", "operator": "contains", "value": "x"}
            ]}]}),
            ValidationKind::IllegalOperator,
            "/filters/0/conditions/0/operator",
        ),
        (
            json!({"filters": [{"conditions": [
                {"field": "transaction.amount", "operator": "isin", "value": []}
            ]}]}),
            ValidationKind::BadValueShape,
            "/filters/0/conditions/0/value",
        ),
        (
            json!({"filters": [{"conditions": [
                {"field": "card_type", "operator": "isin", "value": ["PLATINUM"]}
            ]}]}),
            ValidationKind::BadEnumValue,
            "/filters/0/conditions/0/value",
        ),
        (
            json!({"filters": [{
                "conditions": [],
                "group_by": ["card_type"],
                "aggregations": [{"field": "transaction.amount", "type": "sum",
                                  "having_value": 3}]
            }]}),
            ValidationKind::BadHaving,
            "/filters/0/aggregations/0",
        ),
    ];

    let v = validator();
    for (document, expected_kind, expected_path) in cases {
        let err = v.validate(&document).unwrap_err();
        match err {
            nlquery::QueryBuilderError::Validation { kind, path, .. } => {
                assert_eq!(kind, expected_kind);
                assert_eq!(path, expected_path);
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }
}

#[test]
fn empty_filters_document_is_rejected() {
    let err = validator().validate(&json!({"filters": []})).unwrap_err();
    assert_eq!(err.validation_kind(), Some(ValidationKind::BadValueShape));

    let err = validator().validate(&json!({"slices": []})).unwrap_err();
    assert_eq!(err.validation_kind(), Some(ValidationKind::BadValueShape));
}

#[test]
fn array_and_object_fields_admit_only_exists() {
    let ok = json!({"filters": [{"conditions": [
        {"field": "transaction.tags", "operator": "exists", "value": false}
    ]}]});
    assert!(validator().validate(&ok).is_ok());

    for operator in ["is", "isin", "between", "<"] {
        let bad = json!({"filters": [{"conditions": [
            {"field": "transaction.tags", "operator": operator, "value": 1}
        ]}]});
        let err = validator().validate(&bad).unwrap_err();
        assert_eq!(
            err.validation_kind(),
            Some(ValidationKind::IllegalOperator),
            "operator {} must be illegal on arrays",
            operator
        );
    }
}
