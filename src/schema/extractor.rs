//! Schema extraction: the backend contract and the caching catalog that
//! applies category promotion and ignore lists on top of it

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{OnceCell, RwLock};
use tracing::warn;

use crate::error::QueryBuilderResult;
use super::field_map::FieldMap;

/// Backend contract for schema discovery
///
/// Implementations produce a flattened `FieldMap` and serve distinct-value
/// lookups for category fields.
#[async_trait]
pub trait SchemaExtractor: Send + Sync {
    /// Extract the flattened field map from the backend
    async fn extract(&self) -> QueryBuilderResult<FieldMap>;

    /// Distinct values observed for a field, bounded to `limit`
    async fn distinct(&self, field: &str, limit: usize) -> QueryBuilderResult<Vec<Value>>;
}

/// Caching front for a schema extractor
///
/// The field map and distinct sets are populated once per catalog and then
/// treated as immutable; concurrent readers share them without re-extracting.
pub struct SchemaCatalog {
    extractor: Arc<dyn SchemaExtractor>,
    category_fields: Vec<String>,
    fields_to_ignore: Vec<String>,
    distinct_limit: usize,
    field_map: OnceCell<FieldMap>,
    distinct_cache: RwLock<HashMap<String, Vec<Value>>>,
}

impl SchemaCatalog {
    pub fn new(
        extractor: Arc<dyn SchemaExtractor>,
        category_fields: Vec<String>,
        fields_to_ignore: Vec<String>,
        distinct_limit: usize,
    ) -> Self {
        Self {
            extractor,
            category_fields,
            fields_to_ignore,
            distinct_limit,
            field_map: OnceCell::new(),
            distinct_cache: RwLock::new(HashMap::new()),
        }
    }

    /// The normalized field map, extracted on first access and cached
    pub async fn field_map(&self) -> QueryBuilderResult<&FieldMap> {
        self.field_map
            .get_or_try_init(|| self.build_field_map())
            .await
    }

    async fn build_field_map(&self) -> QueryBuilderResult<FieldMap> {
        let mut map = self.extractor.extract().await?;

        map.retain(|path, _| !self.is_ignored(path));

        for field in &self.category_fields {
            let Some(spec) = map.get_mut(field) else {
                warn!(field = %field, "category field not present in extracted schema");
                continue;
            };
            match self.distinct_values(field).await {
                Ok(values) if !values.is_empty() => spec.promote_to_enum(values),
                Ok(_) => warn!(field = %field, "no distinct values found, keeping original type"),
                Err(e) => warn!(field = %field, error = %e, "distinct lookup failed, keeping original type"),
            }
        }

        Ok(map)
    }

    /// Distinct values for a field, served from cache after the first call
    pub async fn distinct_values(&self, field: &str) -> QueryBuilderResult<Vec<Value>> {
        if let Some(values) = self.distinct_cache.read().await.get(field) {
            return Ok(values.clone());
        }
        let values = self.extractor.distinct(field, self.distinct_limit).await?;
        self.distinct_cache
            .write()
            .await
            .insert(field.to_string(), values.clone());
        Ok(values)
    }

    /// A field is ignored when its full path or leaf name is listed
    fn is_ignored(&self, path: &str) -> bool {
        let leaf = path.rsplit('.').next().unwrap_or(path);
        self.fields_to_ignore
            .iter()
            .any(|ignored| ignored == path || ignored == leaf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::field_map::FieldSpec;
    use crate::schema::types::NormalizedType;
    use serde_json::json;

    /// In-memory extractor used across the crate's tests
    pub(crate) struct FixtureExtractor {
        pub map: FieldMap,
        pub distinct: HashMap<String, Vec<Value>>,
    }

    #[async_trait]
    impl SchemaExtractor for FixtureExtractor {
        async fn extract(&self) -> QueryBuilderResult<FieldMap> {
            Ok(self.map.clone())
        }

        async fn distinct(&self, field: &str, limit: usize) -> QueryBuilderResult<Vec<Value>> {
            let mut values = self.distinct.get(field).cloned().unwrap_or_default();
            values.truncate(limit);
            Ok(values)
        }
    }

    fn fixture() -> SchemaCatalog {
        let mut map = FieldMap::new();
        map.insert(
            "card_type".to_string(),
            FieldSpec::scalar(NormalizedType::String).with_exact_match(true),
        );
        map.insert(
            "transaction.amount".to_string(),
            FieldSpec::scalar(NormalizedType::Number),
        );
        map.insert(
            "internal.debug".to_string(),
            FieldSpec::scalar(NormalizedType::String),
        );
        let mut distinct = HashMap::new();
        distinct.insert(
            "card_type".to_string(),
            vec![json!("GOLD"), json!("SILVER")],
        );
        SchemaCatalog::new(
            Arc::new(FixtureExtractor { map, distinct }),
            vec!["card_type".to_string()],
            vec!["debug".to_string()],
            100,
        )
    }

    #[tokio::test]
    async fn test_category_promotion_and_ignore_list() {
        let catalog = fixture();
        let map = catalog.field_map().await.unwrap();

        let card = map.get("card_type").unwrap();
        assert_eq!(card.field_type, NormalizedType::Enum);
        assert_eq!(card.values, Some(vec![json!("GOLD"), json!("SILVER")]));
        assert!(card.exact_match_capable);

        assert!(!map.contains_key("internal.debug"));
        assert!(map.contains_key("transaction.amount"));
    }

    #[tokio::test]
    async fn test_field_map_is_cached() {
        let catalog = fixture();
        let first = catalog.field_map().await.unwrap() as *const FieldMap;
        let second = catalog.field_map().await.unwrap() as *const FieldMap;
        assert_eq!(first, second);
    }
}
