//! Document-store backend: schema inference by sampling documents and
//! pipeline execution over the driver

use async_trait::async_trait;
use futures::future::join_all;
use futures::stream::TryStreamExt;
use mongodb::bson::{doc, Bson, Document};
use mongodb::options::FindOptions;
use mongodb::{Client, Collection};
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::error::{QueryBuilderError, QueryBuilderResult};
use crate::execution::{QueryExecutor, QueryResult};
use crate::schema::{FieldMap, FieldSpec, NormalizedType, SchemaExtractor};
use crate::translate::Plan;

/// Open the collection handle used by both the extractor and the executor
pub async fn document_collection(
    uri: &str,
    database: &str,
    collection: &str,
) -> QueryBuilderResult<Collection<Document>> {
    let client = Client::with_uri_str(uri)
        .await
        .map_err(|e| QueryBuilderError::backend(format!("document store connect failed: {}", e)))?;
    Ok(client.database(database).collection(collection))
}

/// Schema extractor that samples documents and elects a modal type per path
pub struct DocumentSchemaExtractor {
    collection: Collection<Document>,
    sample_size: usize,
    iso_date: Regex,
}

/// Per-path observation counters collected while walking sampled documents
#[derive(Default)]
struct TypeCounter {
    counts: HashMap<NormalizedType, usize>,
    item_type: Option<NormalizedType>,
}

impl TypeCounter {
    fn observe(&mut self, tag: NormalizedType) {
        *self.counts.entry(tag).or_insert(0) += 1;
    }

    /// Modal election; container observations outrank scalars, scalar ties
    /// break by a fixed priority so the result is deterministic
    fn elect(&self) -> Option<(NormalizedType, Option<NormalizedType>)> {
        if self.counts.contains_key(&NormalizedType::Array) {
            return Some((NormalizedType::Array, self.item_type.or(Some(NormalizedType::String))));
        }
        if self.counts.contains_key(&NormalizedType::Object) {
            return Some((NormalizedType::Object, None));
        }
        const PRIORITY: [NormalizedType; 4] = [
            NormalizedType::Date,
            NormalizedType::Number,
            NormalizedType::Boolean,
            NormalizedType::String,
        ];
        PRIORITY
            .iter()
            .filter_map(|tag| self.counts.get(tag).map(|n| (*tag, *n)))
            .max_by_key(|(tag, n)| (*n, PRIORITY.iter().rev().position(|p| p == tag)))
            .map(|(tag, _)| (tag, None))
    }
}

impl DocumentSchemaExtractor {
    pub fn new(collection: Collection<Document>, sample_size: usize) -> Self {
        Self {
            collection,
            sample_size,
            iso_date: Regex::new(r"^\d{4}-\d{2}-\d{2}(T\d{2}:\d{2}:\d{2}(\.\d+)?Z?)?$")
                .expect("static pattern"),
        }
    }

    fn scalar_tag(&self, value: &Bson) -> Option<NormalizedType> {
        match value {
            Bson::Double(_) | Bson::Int32(_) | Bson::Int64(_) | Bson::Decimal128(_) => {
                Some(NormalizedType::Number)
            }
            Bson::Boolean(_) => Some(NormalizedType::Boolean),
            Bson::DateTime(_) | Bson::Timestamp(_) => Some(NormalizedType::Date),
            Bson::String(s) => {
                if self.iso_date.is_match(s) {
                    Some(NormalizedType::Date)
                } else {
                    Some(NormalizedType::String)
                }
            }
            Bson::ObjectId(_) => Some(NormalizedType::String),
            Bson::Null | Bson::Undefined => None,
            _ => Some(NormalizedType::String),
        }
    }

    fn collect(&self, document: &Document, prefix: &str, counters: &mut HashMap<String, TypeCounter>) {
        for (key, value) in document {
            // driver-internal fields, including the object id
            if key.starts_with('_') {
                continue;
            }
            let path = if prefix.is_empty() {
                key.clone()
            } else {
                format!("{}.{}", prefix, key)
            };

            match value {
                Bson::Document(nested) => {
                    counters.entry(path.clone()).or_default().observe(NormalizedType::Object);
                    self.collect(nested, &path, counters);
                }
                Bson::Array(items) => {
                    let counter = counters.entry(path.clone()).or_default();
                    counter.observe(NormalizedType::Array);
                    if counter.item_type.is_none() {
                        counter.item_type = items.first().and_then(|item| match item {
                            Bson::Document(_) => Some(NormalizedType::Object),
                            Bson::Array(_) => Some(NormalizedType::Array),
                            other => self.scalar_tag(other),
                        });
                    }
                    // element schemas of object arrays contribute leaves too
                    for item in items.iter().take(10) {
                        if let Bson::Document(nested) = item {
                            self.collect(nested, &path, counters);
                        }
                    }
                }
                other => {
                    if let Some(tag) = self.scalar_tag(other) {
                        counters.entry(path).or_default().observe(tag);
                    }
                }
            }
        }
    }
}

#[async_trait]
impl SchemaExtractor for DocumentSchemaExtractor {
    async fn extract(&self) -> QueryBuilderResult<FieldMap> {
        let sample = doc! {"$sample": {"size": self.sample_size as i64}};
        let cursor = self
            .collection
            .aggregate([sample], None)
            .await
            .map_err(|e| QueryBuilderError::schema(format!("sampling failed: {}", e)))?;
        let documents: Vec<Document> = cursor
            .try_collect()
            .await
            .map_err(|e| QueryBuilderError::schema(format!("sampling cursor failed: {}", e)))?;

        debug!(sampled = documents.len(), "inferring schema from sampled documents");

        let mut counters: HashMap<String, TypeCounter> = HashMap::new();
        for document in &documents {
            self.collect(document, "", &mut counters);
        }

        let mut map = FieldMap::new();
        for (path, counter) in counters {
            let Some((field_type, item_type)) = counter.elect() else {
                warn!(field = %path, "only null values observed, skipping field");
                continue;
            };
            let spec = match field_type {
                NormalizedType::Array => {
                    FieldSpec::array(item_type.unwrap_or(NormalizedType::String))
                }
                other => FieldSpec::scalar(other),
            };
            map.insert(path, spec);
        }

        // Only leaves appear: drop plain-object parents that have children,
        // keeping array parents
        let parents: Vec<String> = map
            .iter()
            .filter(|(path, spec)| {
                spec.field_type == NormalizedType::Object
                    && map.keys().any(|other| {
                        other.len() > path.len() + 1 && other.starts_with(&format!("{}.", path))
                    })
            })
            .map(|(path, _)| path.clone())
            .collect();
        for parent in parents {
            map.remove(&parent);
        }

        Ok(map)
    }

    async fn distinct(&self, field: &str, limit: usize) -> QueryBuilderResult<Vec<Value>> {
        let values = self
            .collection
            .distinct(field, None, None)
            .await
            .map_err(|e| {
                QueryBuilderError::backend(format!("distinct on '{}' failed: {}", field, e))
            })?;
        Ok(values
            .into_iter()
            .filter(|v| !matches!(v, Bson::Null))
            .take(limit)
            .map(Value::from)
            .collect())
    }
}

/// Executor running aggregation pipelines against the collection
pub struct DocumentExecutor {
    collection: Collection<Document>,
}

impl DocumentExecutor {
    pub fn new(collection: Collection<Document>) -> Self {
        Self { collection }
    }

    async fn run_pipeline(&self, stages: &[Value]) -> Result<Vec<Document>, String> {
        if stages.is_empty() {
            let options = FindOptions::builder().limit(100).build();
            let cursor = self
                .collection
                .find(doc! {}, options)
                .await
                .map_err(|e| format!("find failed: {}", e))?;
            return cursor
                .try_collect()
                .await
                .map_err(|e| format!("find cursor failed: {}", e));
        }

        let mut pipeline = Vec::with_capacity(stages.len());
        for stage in stages {
            pipeline.push(
                mongodb::bson::to_document(stage)
                    .map_err(|e| format!("stage is not a valid document: {}", e))?,
            );
        }
        let cursor = self
            .collection
            .aggregate(pipeline, None)
            .await
            .map_err(|e| format!("aggregation failed: {}", e))?;
        cursor
            .try_collect()
            .await
            .map_err(|e| format!("aggregation cursor failed: {}", e))
    }

    async fn execute_single(&self, plan: &Plan) -> QueryResult {
        let stages: Vec<Value> = plan
            .get("pipeline")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        match self.run_pipeline(&stages).await {
            Ok(documents) => documents_to_result(documents),
            Err(message) => {
                warn!(error = %message, "plan execution failed");
                QueryResult::failure(message)
            }
        }
    }
}

fn documents_to_result(documents: Vec<Document>) -> QueryResult {
    let values: Vec<Value> = documents
        .into_iter()
        .map(|mut document| {
            // object ids are not JSON; render them as hex strings
            if let Ok(oid) = document.get_object_id("_id") {
                document.insert("_id", oid.to_hex());
            }
            serde_json::to_value(&document).unwrap_or(Value::Null)
        })
        .collect();
    QueryResult {
        total_hits: values.len() as u64,
        documents: values,
        aggregations: None,
        success: true,
        error: None,
        metadata: serde_json::Map::new(),
    }
}

#[async_trait]
impl QueryExecutor for DocumentExecutor {
    async fn execute(&self, plans: &[Plan]) -> QueryBuilderResult<Vec<QueryResult>> {
        let results = join_all(plans.iter().map(|plan| self.execute_single(plan))).await;
        Ok(results)
    }

    async fn execute_raw(&self, plan: &Plan, size: u64) -> QueryBuilderResult<QueryResult> {
        if plan.get("pipeline").is_some() {
            return Ok(self.execute_single(plan).await);
        }
        if let Some(filter) = plan.get("filter") {
            let filter_doc = mongodb::bson::to_document(filter)
                .map_err(|e| QueryBuilderError::backend(format!("invalid raw filter: {}", e)))?;
            let options = FindOptions::builder().limit(size as i64).build();
            let result = async {
                let cursor = self
                    .collection
                    .find(filter_doc, options)
                    .await
                    .map_err(|e| format!("find failed: {}", e))?;
                cursor
                    .try_collect::<Vec<Document>>()
                    .await
                    .map_err(|e| format!("find cursor failed: {}", e))
            }
            .await;
            return Ok(match result {
                Ok(documents) => documents_to_result(documents),
                Err(message) => QueryResult::failure(message),
            });
        }
        // no pipeline, no filter: return a capped scan
        Ok(self.execute_single(&serde_json::json!({"pipeline": []})).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counter_with(observations: &[(NormalizedType, usize)]) -> TypeCounter {
        let mut counter = TypeCounter::default();
        for (tag, n) in observations {
            for _ in 0..*n {
                counter.observe(*tag);
            }
        }
        counter
    }

    #[test]
    fn test_modal_election_picks_majority() {
        let counter = counter_with(&[(NormalizedType::Number, 8), (NormalizedType::String, 2)]);
        assert_eq!(counter.elect(), Some((NormalizedType::Number, None)));
    }

    #[test]
    fn test_container_observation_wins() {
        let counter = counter_with(&[(NormalizedType::String, 10), (NormalizedType::Object, 1)]);
        assert_eq!(counter.elect(), Some((NormalizedType::Object, None)));
    }

    #[test]
    fn test_empty_counter_elects_nothing() {
        assert_eq!(TypeCounter::default().elect(), None);
    }
}
