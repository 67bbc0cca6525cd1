//! REST surface: natural-language query conversion over HTTP
//!
//! Two endpoints: one backed by the configured live backend, one accepting
//! a caller-supplied mapping document in place of a backend.

use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::error;

use crate::config::{BackendKind, QueryBuilderConfig};
use crate::error::QueryBuilderError;
use crate::orchestrator::{QueryOrchestrator, QueryOutcome};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    config: Arc<QueryBuilderConfig>,
    orchestrator: Arc<QueryOrchestrator>,
}

/// Start the web server
pub async fn start_server(
    config: QueryBuilderConfig,
    port: u16,
) -> Result<(), Box<dyn std::error::Error>> {
    let orchestrator = match config.backend {
        BackendKind::Search => QueryOrchestrator::for_search(&config),
        BackendKind::Doc => QueryOrchestrator::for_document(&config).await?,
    };
    let state = AppState {
        config: Arc::new(config),
        orchestrator: Arc::new(orchestrator),
    };

    let app = Router::new()
        .route("/api/query", post(convert_query))
        .route("/api/schema/query", post(convert_query_with_mapping))
        .route("/api/schema", get(get_schema))
        .route("/api/health", get(health_check))
        .layer(CorsLayer::permissive())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    tracing::info!(port = port, "query builder API listening");
    axum::serve(listener, app).await?;
    Ok(())
}

#[derive(Deserialize)]
struct QueryApiRequest {
    user_input: String,
    category_fields: Option<Vec<String>>,
    fields_to_ignore: Option<Vec<String>>,
    #[serde(default)]
    execute: bool,
}

#[derive(Deserialize)]
struct MappingQueryRequest {
    user_input: String,
    /// Search-backend style `properties` tree
    mapping: Value,
    /// Optional enum value sets keyed by field path
    #[serde(default)]
    enums: HashMap<String, Vec<Value>>,
}

#[derive(Serialize)]
struct ApiError {
    error: String,
}

type ApiResult = Result<Json<QueryOutcome>, (StatusCode, Json<ApiError>)>;

async fn convert_query(
    State(state): State<AppState>,
    Json(request): Json<QueryApiRequest>,
) -> ApiResult {
    // Per-request schema overrides get a fresh orchestrator; the shared one
    // keeps its caches otherwise
    let outcome = if request.category_fields.is_some() || request.fields_to_ignore.is_some() {
        let mut config = (*state.config).clone();
        if let Some(fields) = request.category_fields {
            config.category_fields = fields;
        }
        if let Some(fields) = request.fields_to_ignore {
            config.fields_to_ignore = fields;
        }
        let orchestrator = match config.backend {
            BackendKind::Search => QueryOrchestrator::for_search(&config),
            BackendKind::Doc => QueryOrchestrator::for_document(&config)
                .await
                .map_err(into_response)?,
        };
        orchestrator.query(&request.user_input, request.execute).await
    } else {
        state
            .orchestrator
            .query(&request.user_input, request.execute)
            .await
    };

    outcome.map(Json).map_err(into_response)
}

async fn convert_query_with_mapping(
    State(state): State<AppState>,
    Json(request): Json<MappingQueryRequest>,
) -> ApiResult {
    let orchestrator =
        QueryOrchestrator::for_static_mapping(request.mapping, request.enums, &state.config);
    // No backend to execute against; plans only
    orchestrator
        .query(&request.user_input, false)
        .await
        .map(Json)
        .map_err(into_response)
}

async fn get_schema(State(state): State<AppState>) -> Result<Json<Value>, (StatusCode, Json<ApiError>)> {
    state
        .orchestrator
        .field_map()
        .await
        .map(|map| Json(json!(map)))
        .map_err(into_response)
}

async fn health_check() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

fn into_response(err: QueryBuilderError) -> (StatusCode, Json<ApiError>) {
    error!(error = %err, "request failed");
    let status = match &err {
        QueryBuilderError::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        QueryBuilderError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        QueryBuilderError::Schema { .. } | QueryBuilderError::Backend { .. } => {
            StatusCode::BAD_GATEWAY
        }
        QueryBuilderError::Llm { .. } => StatusCode::BAD_GATEWAY,
        QueryBuilderError::Translation { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ApiError {
            error: err.to_string(),
        }),
    )
}
