//! Search-engine backend: schema extraction from the index mapping and
//! plan execution over the JSON search API

use anyhow::Context;
use async_trait::async_trait;
use futures::future::join_all;
use reqwest::Client;
use serde_json::{json, Value};
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::error::{QueryBuilderError, QueryBuilderResult};
use crate::execution::{QueryExecutor, QueryResult};
use crate::schema::{field_map_from_properties, FieldMap, SchemaExtractor};
use crate::translate::Plan;

/// Schema extractor reading the index's mapping document
pub struct SearchSchemaExtractor {
    base_url: String,
    index: String,
    client: Client,
    properties: OnceCell<Value>,
}

impl SearchSchemaExtractor {
    pub fn new(base_url: impl Into<String>, index: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            index: index.into(),
            client: Client::new(),
            properties: OnceCell::new(),
        }
    }

    /// The raw `properties` tree, fetched once and cached
    async fn properties(&self) -> QueryBuilderResult<&Value> {
        self.properties
            .get_or_try_init(|| async {
                self.fetch_properties()
                    .await
                    .map_err(|e| QueryBuilderError::schema(format!("{:#}", e)))
            })
            .await
    }

    async fn fetch_properties(&self) -> anyhow::Result<Value> {
        let url = format!("{}/{}/_mapping", self.base_url, self.index);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("mapping request failed")?;
        anyhow::ensure!(
            response.status().is_success(),
            "mapping request for '{}' returned {}",
            self.index,
            response.status()
        );
        let body: Value = response
            .json()
            .await
            .context("mapping response not JSON")?;

        // The mapping may come back keyed by the concrete index name behind
        // an alias; fall back to the first entry.
        let index_mapping = body
            .get(&self.index)
            .or_else(|| body.as_object().and_then(|o| o.values().next()))
            .with_context(|| format!("no mapping returned for '{}'", self.index))?;
        Ok(index_mapping
            .pointer("/mappings/properties")
            .cloned()
            .unwrap_or_else(|| json!({})))
    }

    async fn fetch_distinct(&self, agg_field: &str, limit: usize) -> anyhow::Result<Vec<Value>> {
        let query = json!({
            "size": 0,
            "aggs": {
                "distinct_values": {
                    "terms": {"field": agg_field, "size": limit}
                }
            }
        });
        let url = format!("{}/{}/_search", self.base_url, self.index);
        let response = self
            .client
            .post(&url)
            .json(&query)
            .send()
            .await
            .context("distinct request failed")?;
        anyhow::ensure!(
            response.status().is_success(),
            "distinct query returned {}",
            response.status()
        );
        let body: Value = response
            .json()
            .await
            .context("distinct response not JSON")?;

        let buckets = body
            .pointer("/aggregations/distinct_values/buckets")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        Ok(buckets
            .into_iter()
            .filter_map(|bucket| bucket.get("key").cloned())
            .collect())
    }

    /// Declared mapping type of a dotted path, when present
    fn declared_type(properties: &Value, field: &str) -> Option<String> {
        let mut node = properties;
        let mut parts = field.split('.').peekable();
        while let Some(part) = parts.next() {
            node = node.get(part)?;
            if parts.peek().is_some() {
                node = node.get("properties")?;
            }
        }
        node.get("type").and_then(Value::as_str).map(String::from)
    }
}

#[async_trait]
impl SchemaExtractor for SearchSchemaExtractor {
    async fn extract(&self) -> QueryBuilderResult<FieldMap> {
        let properties = self.properties().await?;
        Ok(field_map_from_properties(properties))
    }

    async fn distinct(&self, field: &str, limit: usize) -> QueryBuilderResult<Vec<Value>> {
        let properties = self.properties().await?;
        // Terms aggregations on analyzed text need the keyword variant
        let agg_field = match Self::declared_type(properties, field).as_deref() {
            Some("text") => format!("{}.keyword", field),
            _ => field.to_string(),
        };
        self.fetch_distinct(&agg_field, limit)
            .await
            .map_err(|e| QueryBuilderError::backend(format!("distinct on '{}': {:#}", field, e)))
    }
}

/// Executor posting plans to the search API
pub struct SearchExecutor {
    base_url: String,
    index: String,
    client: Client,
}

impl SearchExecutor {
    pub fn new(base_url: impl Into<String>, index: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            index: index.into(),
            client: Client::new(),
        }
    }

    async fn execute_single(&self, plan: &Plan) -> QueryResult {
        let url = format!("{}/{}/_search", self.base_url, self.index);
        debug!(index = %self.index, "executing search plan");

        let response = match self.client.post(&url).json(plan).send().await {
            Ok(r) => r,
            Err(e) => return QueryResult::failure(format!("search request failed: {}", e)),
        };
        let status = response.status();
        let body: Value = match response.json().await {
            Ok(b) => b,
            Err(e) => return QueryResult::failure(format!("search response not JSON: {}", e)),
        };
        if !status.is_success() {
            let reason = body
                .pointer("/error/reason")
                .and_then(Value::as_str)
                .unwrap_or("search request rejected");
            warn!(index = %self.index, status = %status, reason = %reason, "plan execution failed");
            return QueryResult::failure(format!("{} ({})", reason, status));
        }

        // hits.total is an object on current versions, a bare number on
        // older ones
        let total_hits = body
            .pointer("/hits/total/value")
            .and_then(Value::as_u64)
            .or_else(|| body.pointer("/hits/total").and_then(Value::as_u64))
            .unwrap_or(0);
        let documents = body
            .pointer("/hits/hits")
            .and_then(Value::as_array)
            .map(|hits| {
                hits.iter()
                    .filter_map(|hit| hit.get("_source").cloned())
                    .collect()
            })
            .unwrap_or_default();
        let aggregations = body.get("aggregations").cloned();

        QueryResult {
            total_hits,
            documents,
            aggregations,
            success: true,
            error: None,
            metadata: serde_json::Map::new(),
        }
    }
}

#[async_trait]
impl QueryExecutor for SearchExecutor {
    async fn execute(&self, plans: &[Plan]) -> QueryBuilderResult<Vec<QueryResult>> {
        // Slices are independent; run them concurrently and reassemble in
        // slice order
        let results = join_all(plans.iter().map(|plan| self.execute_single(plan))).await;
        Ok(results)
    }

    async fn execute_raw(&self, plan: &Plan, size: u64) -> QueryBuilderResult<QueryResult> {
        let mut plan = plan.clone();
        if let Some(obj) = plan.as_object_mut() {
            obj.entry("size".to_string()).or_insert(json!(size));
        }
        Ok(self.execute_single(&plan).await)
    }
}
