use copilot_ai::traits::retrieval;
use domain::gateway::openai::OpenAiClient;
use domain::gateway::retrieval::RetrievalClient;
use domain::insight::{Engine, GenerationPolicy, RetrievalPolicy};
use log::*;
use service::{config::Config, logging::Logger};
use std::sync::Arc;
use web::AppState;

#[tokio::main]
async fn main() {
    let config = Config::new();
    Logger::init_logger(&config);

    info!("Starting the meeting copilot backend");

    let db = match service::init_database(&config).await {
        Ok(db) => Arc::new(db),
        Err(e) => {
            error!("Failed to establish database connection: {e}");
            std::process::exit(1);
        }
    };

    let Some(api_key) = config.openai_api_key() else {
        error!("OPENAI_API_KEY is not set; transcription and generation are unavailable");
        std::process::exit(1);
    };

    let openai = match OpenAiClient::new(
        &api_key,
        config.openai_base_url(),
        config.generation_model(),
        config.transcription_model(),
    ) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            error!("Failed to build OpenAI client: {e}");
            std::process::exit(1);
        }
    };

    // Retrieval is optional context enrichment; a missing or broken sidecar
    // never keeps the backend from starting
    let retrieval: Option<Arc<dyn retrieval::Provider>> = match config.retrieval_base_url() {
        Some(base_url) => match RetrievalClient::new(&base_url) {
            Ok(client) => Some(Arc::new(client)),
            Err(e) => {
                warn!("Failed to build retrieval client, continuing without context: {e}");
                None
            }
        },
        None => None,
    };

    let insight_engine = Arc::new(Engine::new(
        openai.clone(),
        retrieval.clone(),
        GenerationPolicy {
            max_tokens: config.generation_max_tokens,
            temperature: config.generation_temperature,
        },
        RetrievalPolicy {
            max_results: config.retrieval_max_results,
            threshold: config.retrieval_threshold,
        },
    ));

    let app_state = AppState::new(config, &db, insight_engine, openai, retrieval);

    if let Err(e) = web::init_server(app_state).await {
        error!("Server failed to start: {e}");
        std::process::exit(1);
    }
}
