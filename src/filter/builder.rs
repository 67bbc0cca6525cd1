//! Filter schema builder: derives the per-field rules of the IR from a
//! field map, producing the validator and the companion prompt descriptor

use std::sync::Arc;

use crate::error::{QueryBuilderError, QueryBuilderResult};
use crate::schema::{FieldMap, NormalizedType};
use super::ir::Operator;
use super::prompt::{FieldPrompt, PromptDescriptor};
use super::validator::FilterValidator;

/// Operators legal for each normalized type (closed rule set)
pub fn legal_operators(field_type: NormalizedType) -> &'static [Operator] {
    use Operator::*;
    match field_type {
        NormalizedType::String => &[Is, Different, Contains, IsIn, NotIn, Exists],
        NormalizedType::Number => &[LessThan, GreaterThan, Is, Different, Between, IsIn, NotIn, Exists],
        NormalizedType::Date => &[LessThan, GreaterThan, Is, Different, Between, Exists],
        NormalizedType::Boolean => &[Is, Different, Exists],
        NormalizedType::Enum => &[Is, Different, IsIn, NotIn, Exists],
        NormalizedType::Array | NormalizedType::Object => &[Exists],
    }
}

/// Builds the validator and prompt descriptor for one field map
///
/// The descriptor is consumed by the prompt generator; the validator is the
/// source of truth.
#[derive(Debug)]
pub struct FilterSchemaBuilder {
    field_map: Arc<FieldMap>,
}

impl FilterSchemaBuilder {
    /// Fails with a schema error when the field map is empty: there is
    /// nothing an IR could legally reference.
    pub fn new(field_map: Arc<FieldMap>) -> QueryBuilderResult<Self> {
        if field_map.is_empty() {
            return Err(QueryBuilderError::schema(
                "cannot build a filter schema from an empty field map",
            ));
        }
        Ok(Self { field_map })
    }

    pub fn field_map(&self) -> &Arc<FieldMap> {
        &self.field_map
    }

    pub fn validator(&self) -> FilterValidator {
        FilterValidator::new(Arc::clone(&self.field_map))
    }

    pub fn prompt_descriptor(&self) -> PromptDescriptor {
        let fields = self
            .field_map
            .iter()
            .map(|(path, spec)| FieldPrompt {
                path: path.clone(),
                field_type: spec.field_type,
                operators: legal_operators(spec.field_type).to_vec(),
                values: spec.values.clone(),
                item_type: spec.item_type,
            })
            .collect();
        PromptDescriptor { fields }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldSpec;
    use serde_json::json;

    #[test]
    fn test_legality_table() {
        assert!(legal_operators(NormalizedType::String).contains(&Operator::Contains));
        assert!(!legal_operators(NormalizedType::Number).contains(&Operator::Contains));
        assert!(legal_operators(NormalizedType::Date).contains(&Operator::Between));
        assert!(!legal_operators(NormalizedType::Date).contains(&Operator::IsIn));
        assert!(!legal_operators(NormalizedType::Boolean).contains(&Operator::LessThan));
        assert_eq!(legal_operators(NormalizedType::Object), &[Operator::Exists]);
    }

    #[test]
    fn test_refuses_empty_field_map() {
        let err = FilterSchemaBuilder::new(Arc::new(FieldMap::new())).unwrap_err();
        assert!(matches!(err, QueryBuilderError::Schema { .. }));
    }

    #[test]
    fn test_descriptor_lists_enum_values() {
        let mut map = FieldMap::new();
        map.insert(
            "card_type".to_string(),
            FieldSpec::enumeration(vec![json!("GOLD")]),
        );
        let builder = FilterSchemaBuilder::new(Arc::new(map)).unwrap();
        let descriptor = builder.prompt_descriptor();
        assert_eq!(descriptor.fields.len(), 1);
        assert_eq!(descriptor.fields[0].values, Some(vec![json!("GOLD")]));
        assert!(descriptor.fields[0].operators.contains(&Operator::IsIn));
    }
}
