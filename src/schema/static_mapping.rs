//! Field-map construction from a search-backend mapping document, plus an
//! extractor that serves a caller-supplied mapping in place of a live
//! backend

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use tracing::warn;

use crate::error::{QueryBuilderError, QueryBuilderResult};
use super::extractor::SchemaExtractor;
use super::field_map::{FieldMap, FieldSpec};
use super::types::{normalize_search_type, NormalizedType};

/// Flatten a search-backend `properties` tree into a field map
///
/// Object subtrees contribute only their leaves; `nested` subtrees
/// contribute an array-of-object entry for the parent plus the element
/// leaves. Malformed or unrecognized entries are skipped with a warning.
pub fn field_map_from_properties(properties: &Value) -> FieldMap {
    let mut map = FieldMap::new();
    walk_properties(properties, "", &mut map);
    map
}

fn walk_properties(properties: &Value, prefix: &str, map: &mut FieldMap) {
    let Some(entries) = properties.as_object() else {
        warn!(path = %prefix, "mapping properties is not an object, skipping subtree");
        return;
    };

    for (name, props) in entries {
        let path = if prefix.is_empty() {
            name.clone()
        } else {
            format!("{}.{}", prefix, name)
        };

        let Some(props_obj) = props.as_object() else {
            warn!(field = %path, "malformed mapping entry, skipping");
            continue;
        };

        let backend_type = props_obj
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or("object");

        if let Some(children) = props_obj.get("properties") {
            if backend_type == "nested" {
                map.insert(path.clone(), FieldSpec::array(NormalizedType::Object));
            }
            walk_properties(children, &path, map);
            continue;
        }

        match normalize_search_type(backend_type) {
            Some(NormalizedType::Array) => {
                // nested without an element schema
                map.insert(path, FieldSpec::array(NormalizedType::Object));
            }
            Some(normalized) => {
                let exact = normalized == NormalizedType::String;
                map.insert(path, FieldSpec::scalar(normalized).with_exact_match(exact));
            }
            None => {
                warn!(field = %path, backend_type = %backend_type, "unrecognized mapping type, skipping");
            }
        }
    }
}

/// Extractor over a user-supplied mapping document
///
/// Serves the REST surface's schema-upload path: the caller provides the
/// `properties` tree and optional enum value sets, and no backend is
/// contacted.
pub struct StaticMappingExtractor {
    properties: Value,
    enums: HashMap<String, Vec<Value>>,
}

impl StaticMappingExtractor {
    pub fn new(properties: Value, enums: HashMap<String, Vec<Value>>) -> Self {
        Self { properties, enums }
    }
}

#[async_trait]
impl SchemaExtractor for StaticMappingExtractor {
    async fn extract(&self) -> QueryBuilderResult<FieldMap> {
        if !self.properties.is_object() {
            return Err(QueryBuilderError::schema(
                "supplied mapping document has no properties object",
            ));
        }
        let mut map = field_map_from_properties(&self.properties);
        for (field, values) in &self.enums {
            if let Some(spec) = map.get_mut(field) {
                spec.promote_to_enum(values.clone());
            }
        }
        Ok(map)
    }

    async fn distinct(&self, field: &str, limit: usize) -> QueryBuilderResult<Vec<Value>> {
        let mut values = self.enums.get(field).cloned().unwrap_or_default();
        values.truncate(limit);
        Ok(values)
    }
}
