use std::env;

use nlquery::web::start_server;
use nlquery::{BackendKind, QueryBuilderConfig, QueryOrchestrator};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "nlquery=info".into()),
        )
        .init();

    let config = config_from_env();
    let args: Vec<String> = env::args().collect();

    match args.get(1).map(String::as_str) {
        Some("serve") | None => {
            let port = env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080);
            start_server(config, port).await?;
        }
        Some("schema") => {
            let orchestrator = match config.backend {
                BackendKind::Search => QueryOrchestrator::for_search(&config),
                BackendKind::Doc => QueryOrchestrator::for_document(&config).await?,
            };
            let field_map = orchestrator.field_map().await?;
            println!("{}", serde_json::to_string_pretty(field_map)?);
        }
        Some(other) => {
            eprintln!("unknown command '{}'", other);
            eprintln!("usage: nlquery [serve|schema]");
            std::process::exit(2);
        }
    }

    Ok(())
}

/// Minimal environment-driven configuration; anything richer belongs to the
/// deployment layer
fn config_from_env() -> QueryBuilderConfig {
    let mut config = QueryBuilderConfig::default();
    if let Ok(backend) = env::var("NLQUERY_BACKEND") {
        if backend == "doc" {
            config.backend = BackendKind::Doc;
        }
    }
    if let Ok(url) = env::var("NLQUERY_URL") {
        config.connection_url = url;
    }
    if let Ok(target) = env::var("NLQUERY_TARGET") {
        config.index_or_collection = target;
    }
    if let Ok(database) = env::var("NLQUERY_DATABASE") {
        config.database = Some(database);
    }
    if let Ok(fields) = env::var("NLQUERY_CATEGORY_FIELDS") {
        config.category_fields = fields.split(',').map(str::to_string).collect();
    }
    if let Ok(fields) = env::var("NLQUERY_IGNORE_FIELDS") {
        config.fields_to_ignore = fields.split(',').map(str::to_string).collect();
    }
    if let (Ok(model), Ok(api_key)) = (env::var("NLQUERY_LLM_MODEL"), env::var("NLQUERY_LLM_KEY")) {
        config.llm = Some(nlquery::LlmConfig {
            model,
            api_key,
            base_url: env::var("NLQUERY_LLM_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
            temperature: 0.0,
        });
    }
    config
}
