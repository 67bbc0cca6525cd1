//! Query execution contract and the uniform result record

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::QueryBuilderResult;
use crate::translate::Plan;

/// Uniform result for one executed plan
///
/// Per-slice failures are carried inside the record (`success = false` with
/// the backend message) so that the other slices of a comparison query can
/// still be returned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    pub total_hits: u64,
    pub documents: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aggregations: Option<Value>,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl QueryResult {
    pub fn empty() -> Self {
        Self {
            total_hits: 0,
            documents: Vec::new(),
            aggregations: None,
            success: true,
            error: None,
            metadata: Map::new(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            total_hits: 0,
            documents: Vec::new(),
            aggregations: None,
            success: false,
            error: Some(message.into()),
            metadata: Map::new(),
        }
    }
}

/// Runs backend plans and returns uniform results
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Execute one plan per slice; results come back in slice order.
    /// A failing slice yields a failure record, not an error.
    async fn execute(&self, plans: &[Plan]) -> QueryBuilderResult<Vec<QueryResult>>;

    /// Execute a raw backend-native plan, capping the result count
    async fn execute_raw(&self, plan: &Plan, size: u64) -> QueryBuilderResult<QueryResult>;
}
