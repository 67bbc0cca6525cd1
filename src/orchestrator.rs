//! Orchestrator: wires schema extraction, filter validation, translation,
//! and execution behind one synchronous entry point
//!
//! The orchestrator is an explicit value holding its collaborators and
//! caches; there is no process-wide state. Schema artifacts are built once
//! per instance and reused across calls.

use serde::Serialize;
use serde_json::{json, Map, Value};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

use crate::backend::{
    document_collection, DocumentExecutor, DocumentSchemaExtractor, SearchExecutor,
    SearchSchemaExtractor,
};
use crate::config::{BackendKind, QueryBuilderConfig};
use crate::error::{QueryBuilderError, QueryBuilderResult, Stage};
use crate::execution::{QueryExecutor, QueryResult};
use crate::filter::{FilterIR, FilterSchemaBuilder};
use crate::llm::{LlmClient, LlmQueryParser};
use crate::schema::{FieldMap, SchemaCatalog, SchemaExtractor, StaticMappingExtractor};
use crate::translate::{DocumentTranslator, Plan, QueryTranslator, SearchTranslator};

/// Record returned by one orchestrator call
#[derive(Debug, Clone, Serialize)]
pub struct QueryOutcome {
    pub natural_language_query: String,
    pub extracted_filters: FilterIR,
    pub database_queries: Vec<Plan>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<QueryResult>>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

/// Main entry point for database-agnostic query building
pub struct QueryOrchestrator {
    catalog: SchemaCatalog,
    translator: Arc<dyn QueryTranslator>,
    executor: Option<Arc<dyn QueryExecutor>>,
    llm: Option<Arc<dyn LlmQueryParser>>,
    deadline_budget: Option<Duration>,
    schema_builder: tokio::sync::OnceCell<FilterSchemaBuilder>,
}

impl QueryOrchestrator {
    pub fn new(
        catalog: SchemaCatalog,
        translator: Arc<dyn QueryTranslator>,
        executor: Option<Arc<dyn QueryExecutor>>,
        llm: Option<Arc<dyn LlmQueryParser>>,
        deadline_budget: Option<Duration>,
    ) -> Self {
        Self {
            catalog,
            translator,
            executor,
            llm,
            deadline_budget,
            schema_builder: tokio::sync::OnceCell::new(),
        }
    }

    /// Orchestrator for the search-engine backend
    pub fn for_search(config: &QueryBuilderConfig) -> Self {
        let extractor: Arc<dyn SchemaExtractor> = Arc::new(SearchSchemaExtractor::new(
            config.connection_url.clone(),
            config.index_or_collection.clone(),
        ));
        let executor: Arc<dyn QueryExecutor> = Arc::new(SearchExecutor::new(
            config.connection_url.clone(),
            config.index_or_collection.clone(),
        ));
        Self::new(
            Self::catalog_from_config(extractor, config),
            Arc::new(SearchTranslator::new(config.bucket_size, config.top_hits_size)),
            Some(executor),
            Self::llm_from_config(config),
            config.deadline_ms.map(Duration::from_millis),
        )
    }

    /// Orchestrator for the document-store backend
    pub async fn for_document(config: &QueryBuilderConfig) -> QueryBuilderResult<Self> {
        let database = config.database.as_deref().ok_or_else(|| {
            QueryBuilderError::backend("document backend requires a database name")
        })?;
        let collection = document_collection(
            &config.connection_url,
            database,
            &config.index_or_collection,
        )
        .await?;
        let extractor: Arc<dyn SchemaExtractor> = Arc::new(DocumentSchemaExtractor::new(
            collection.clone(),
            config.sample_size,
        ));
        let executor: Arc<dyn QueryExecutor> = Arc::new(DocumentExecutor::new(collection));
        Ok(Self::new(
            Self::catalog_from_config(extractor, config),
            Arc::new(DocumentTranslator::new()),
            Some(executor),
            Self::llm_from_config(config),
            config.deadline_ms.map(Duration::from_millis),
        ))
    }

    /// Orchestrator over a user-supplied mapping document; plans are built
    /// but never executed
    pub fn for_static_mapping(
        properties: Value,
        enums: std::collections::HashMap<String, Vec<Value>>,
        config: &QueryBuilderConfig,
    ) -> Self {
        let category_fields: Vec<String> = enums.keys().cloned().collect();
        let extractor: Arc<dyn SchemaExtractor> =
            Arc::new(StaticMappingExtractor::new(properties, enums));
        let translator: Arc<dyn QueryTranslator> = match config.backend {
            BackendKind::Search => Arc::new(SearchTranslator::new(
                config.bucket_size,
                config.top_hits_size,
            )),
            BackendKind::Doc => Arc::new(DocumentTranslator::new()),
        };
        Self::new(
            SchemaCatalog::new(
                extractor,
                category_fields,
                config.fields_to_ignore.clone(),
                config.bucket_size,
            ),
            translator,
            None,
            Self::llm_from_config(config),
            config.deadline_ms.map(Duration::from_millis),
        )
    }

    fn catalog_from_config(
        extractor: Arc<dyn SchemaExtractor>,
        config: &QueryBuilderConfig,
    ) -> SchemaCatalog {
        SchemaCatalog::new(
            extractor,
            config.category_fields.clone(),
            config.fields_to_ignore.clone(),
            config.bucket_size,
        )
    }

    fn llm_from_config(config: &QueryBuilderConfig) -> Option<Arc<dyn LlmQueryParser>> {
        config
            .llm
            .as_ref()
            .map(|llm| Arc::new(LlmClient::new(llm)) as Arc<dyn LlmQueryParser>)
    }

    /// The extracted field map (cached after the first call)
    pub async fn field_map(&self) -> QueryBuilderResult<&FieldMap> {
        self.catalog.field_map().await
    }

    async fn schema_builder(&self) -> QueryBuilderResult<&FilterSchemaBuilder> {
        self.schema_builder
            .get_or_try_init(|| async {
                let field_map = self.catalog.field_map().await?.clone();
                FilterSchemaBuilder::new(Arc::new(field_map))
            })
            .await
    }

    /// Convert a natural-language question into backend plans, optionally
    /// executing them
    pub async fn query(&self, natural_language: &str, execute: bool) -> QueryBuilderResult<QueryOutcome> {
        let deadline = self.deadline_budget.map(|budget| Instant::now() + budget);

        let builder = with_deadline(deadline, Stage::SchemaExtraction, self.schema_builder()).await?;
        let validator = builder.validator();
        let descriptor = builder.prompt_descriptor();
        let field_map = Arc::clone(builder.field_map());

        let llm = self
            .llm
            .as_ref()
            .ok_or_else(|| QueryBuilderError::llm("no LLM configured for natural-language parsing"))?;
        let raw_filters = with_deadline(
            deadline,
            Stage::LlmParsing,
            llm.parse_filters(&descriptor.system_prompt(), natural_language),
        )
        .await?;

        let validated = validator.validate(&raw_filters)?;
        let plans = self.translator.translate(&validated.ir, &field_map)?;
        info!(
            slices = validated.ir.slices.len(),
            warnings = validated.warnings.len(),
            "query translated"
        );

        let mut metadata = Map::new();
        if !validated.warnings.is_empty() {
            metadata.insert("warnings".to_string(), json!(validated.warnings));
        }

        let results = if execute {
            let executor = self.executor.as_ref().ok_or_else(|| {
                QueryBuilderError::backend("no executor configured for this orchestrator")
            })?;
            let mut results =
                with_deadline(deadline, Stage::Execution, executor.execute(&plans)).await?;
            for result in &mut results {
                if !validated.warnings.is_empty() {
                    result
                        .metadata
                        .insert("warnings".to_string(), json!(validated.warnings));
                }
            }
            Some(results)
        } else {
            None
        };

        Ok(QueryOutcome {
            natural_language_query: natural_language.to_string(),
            extracted_filters: validated.ir,
            database_queries: plans,
            results,
            metadata,
        })
    }

    /// Escape hatch: execute a backend-native plan directly, skipping
    /// schema-driven parsing, validation, and translation
    pub async fn query_raw(&self, plan: &Plan, size: u64) -> QueryBuilderResult<QueryResult> {
        let executor = self.executor.as_ref().ok_or_else(|| {
            QueryBuilderError::backend("no executor configured for this orchestrator")
        })?;
        let deadline = self.deadline_budget.map(|budget| Instant::now() + budget);
        with_deadline(deadline, Stage::Execution, executor.execute_raw(plan, size)).await
    }

    /// Validate and translate an already-extracted filter document without
    /// calling the LLM
    pub async fn translate_filters(&self, document: &Value) -> QueryBuilderResult<(FilterIR, Vec<Plan>, Vec<String>)> {
        let builder = self.schema_builder().await?;
        let validated = builder.validator().validate(document)?;
        let plans = self
            .translator
            .translate(&validated.ir, builder.field_map())?;
        Ok((validated.ir, plans, validated.warnings))
    }
}

/// Run a stage under the orchestrator's remaining deadline budget
async fn with_deadline<T>(
    deadline: Option<Instant>,
    stage: Stage,
    fut: impl Future<Output = QueryBuilderResult<T>>,
) -> QueryBuilderResult<T> {
    match deadline {
        None => fut.await,
        Some(deadline) => {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(QueryBuilderError::timeout(stage));
            }
            tokio::time::timeout(remaining, fut)
                .await
                .map_err(|_| QueryBuilderError::timeout(stage))?
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldSpec, NormalizedType};
    use async_trait::async_trait;

    struct FixtureExtractor(FieldMap);

    #[async_trait]
    impl SchemaExtractor for FixtureExtractor {
        async fn extract(&self) -> QueryBuilderResult<FieldMap> {
            Ok(self.0.clone())
        }

        async fn distinct(&self, _field: &str, _limit: usize) -> QueryBuilderResult<Vec<Value>> {
            Ok(Vec::new())
        }
    }

    struct CannedParser(Value);

    #[async_trait]
    impl LlmQueryParser for CannedParser {
        async fn parse_filters(&self, _system: &str, _input: &str) -> QueryBuilderResult<Value> {
            Ok(self.0.clone())
        }
    }

    struct RecordingExecutor;

    #[async_trait]
    impl QueryExecutor for RecordingExecutor {
        async fn execute(&self, plans: &[Plan]) -> QueryBuilderResult<Vec<QueryResult>> {
            Ok(plans.iter().map(|_| QueryResult::empty()).collect())
        }

        async fn execute_raw(&self, _plan: &Plan, _size: u64) -> QueryBuilderResult<QueryResult> {
            Ok(QueryResult::empty())
        }
    }

    fn fixture_map() -> FieldMap {
        let mut map = FieldMap::new();
        map.insert(
            "card_type".to_string(),
            FieldSpec::enumeration(vec![json!("GOLD"), json!("SILVER")]).with_exact_match(true),
        );
        map.insert(
            "transaction.amount".to_string(),
            FieldSpec::scalar(NormalizedType::Number),
        );
        map
    }

    fn orchestrator(parsed: Value) -> QueryOrchestrator {
        let catalog = SchemaCatalog::new(
            Arc::new(FixtureExtractor(fixture_map())),
            Vec::new(),
            Vec::new(),
            100,
        );
        QueryOrchestrator::new(
            catalog,
            Arc::new(SearchTranslator::default()),
            Some(Arc::new(RecordingExecutor)),
            Some(Arc::new(CannedParser(parsed))),
            None,
        )
    }

    #[tokio::test]
    async fn test_query_returns_plans_without_executing() {
        let orchestrator = orchestrator(json!({
            "filters": [{
                "conditions": [
                    {"field": "card_type", "operator": "is", "value": "GOLD"}
                ]
            }]
        }));
        let outcome = orchestrator.query("gold card transactions", false).await.unwrap();
        assert_eq!(outcome.database_queries.len(), 1);
        assert!(outcome.results.is_none());
    }

    #[tokio::test]
    async fn test_query_executes_one_result_per_slice() {
        let orchestrator = orchestrator(json!({
            "filters": [
                {"conditions": [{"field": "card_type", "operator": "is", "value": "GOLD"}]},
                {"conditions": [{"field": "card_type", "operator": "is", "value": "SILVER"}]}
            ]
        }));
        let outcome = orchestrator.query("compare gold and silver", true).await.unwrap();
        assert_eq!(outcome.results.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_warnings_surface_in_metadata() {
        let orchestrator = orchestrator(json!({
            "filters": [{
                "conditions": [],
                "aggregations": [{"field": "transaction.amount", "type": "sum"}]
            }]
        }));
        let outcome = orchestrator.query("sum of everything", true).await.unwrap();
        assert!(outcome.metadata.contains_key("warnings"));
        let results = outcome.results.unwrap();
        assert!(results[0].metadata.contains_key("warnings"));
    }

    #[tokio::test]
    async fn test_empty_field_map_is_schema_error() {
        let catalog = SchemaCatalog::new(
            Arc::new(FixtureExtractor(FieldMap::new())),
            Vec::new(),
            Vec::new(),
            100,
        );
        let orchestrator = QueryOrchestrator::new(
            catalog,
            Arc::new(SearchTranslator::default()),
            None,
            Some(Arc::new(CannedParser(json!({"filters": []})))),
            None,
        );
        let err = orchestrator.query("anything", false).await.unwrap_err();
        assert!(matches!(err, QueryBuilderError::Schema { .. }));
    }

    #[tokio::test]
    async fn test_exhausted_budget_times_out() {
        struct SlowParser;

        #[async_trait]
        impl LlmQueryParser for SlowParser {
            async fn parse_filters(&self, _s: &str, _i: &str) -> QueryBuilderResult<Value> {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(json!({"filters": []}))
            }
        }

        let catalog = SchemaCatalog::new(
            Arc::new(FixtureExtractor(fixture_map())),
            Vec::new(),
            Vec::new(),
            100,
        );
        let orchestrator = QueryOrchestrator::new(
            catalog,
            Arc::new(SearchTranslator::default()),
            None,
            Some(Arc::new(SlowParser)),
            Some(Duration::from_millis(50)),
        );
        let err = orchestrator.query("anything", false).await.unwrap_err();
        assert!(matches!(
            err,
            QueryBuilderError::Timeout {
                stage: Stage::LlmParsing
            }
        ));
    }
}
