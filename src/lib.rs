//! # nlquery
//!
//! A natural-language-to-database query builder.
//!
//! The pipeline infers a normalized schema from a backing store, hands an
//! external LLM a typed filter schema to populate, validates the result
//! into a canonical filter IR, and deterministically compiles that IR into
//! backend-native plans for two targets: a search-engine JSON DSL and a
//! document-store aggregation pipeline.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use nlquery::{QueryBuilderConfig, QueryOrchestrator};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let mut config = QueryBuilderConfig::default();
//! config.connection_url = "http://localhost:9200".to_string();
//! config.index_or_collection = "transactions".to_string();
//! config.category_fields = vec!["card_type".to_string()];
//!
//! let orchestrator = QueryOrchestrator::for_search(&config);
//! let outcome = orchestrator
//!     .query("compare gold and silver card spending last year", false)
//!     .await?;
//!
//! println!("{} plans", outcome.database_queries.len());
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod config;
pub mod error;
pub mod execution;
pub mod filter;
pub mod llm;
pub mod orchestrator;
pub mod schema;
pub mod translate;
pub mod web;

// Public API - main types users need
pub use config::{BackendKind, LlmConfig, QueryBuilderConfig};
pub use error::{QueryBuilderError, QueryBuilderResult, Stage, ValidationKind};
pub use execution::{QueryExecutor, QueryResult};
pub use filter::{FilterIR, FilterSchemaBuilder, FilterValidator, ValidatedFilters};
pub use orchestrator::{QueryOrchestrator, QueryOutcome};
pub use schema::{FieldMap, FieldSpec, NormalizedType, SchemaCatalog, SchemaExtractor};
pub use translate::{DocumentTranslator, Plan, QueryTranslator, SearchTranslator};
