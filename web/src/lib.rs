use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderName, HeaderValue, Method};
use copilot_ai::traits::{retrieval, transcription};
use domain::insight::Engine;
use log::*;
use sea_orm::DatabaseConnection;
use service::config::Config;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

mod controller;
mod extractors;
mod params;
mod router;

pub mod error;

pub use error::Error;

/// Web-level state shared with every request handler. Needs to implement
/// Clone to be able to be passed into Router as State.
#[derive(Clone)]
pub struct AppState {
    pub database_connection: Arc<DatabaseConnection>,
    pub config: Config,
    pub insight_engine: Arc<Engine>,
    pub transcription: Arc<dyn transcription::Provider>,
    pub retrieval: Option<Arc<dyn retrieval::Provider>>,
}

impl AppState {
    pub fn new(
        config: Config,
        db: &Arc<DatabaseConnection>,
        insight_engine: Arc<Engine>,
        transcription: Arc<dyn transcription::Provider>,
        retrieval: Option<Arc<dyn retrieval::Provider>>,
    ) -> Self {
        Self {
            database_connection: Arc::clone(db),
            config,
            insight_engine,
            transcription,
            retrieval,
        }
    }

    pub fn db_conn_ref(&self) -> &DatabaseConnection {
        self.database_connection.as_ref()
    }
}

pub async fn init_server(app_state: AppState) -> std::io::Result<()> {
    let host = app_state
        .config
        .interface
        .clone()
        .unwrap_or_else(|| "127.0.0.1".to_string());
    let port = app_state.config.port;
    let listen_address = format!("{host}:{port}");

    let cors = cors_layer(&app_state.config);
    let router = router::define_routes(app_state).layer(cors);

    info!("Server starting, listening on {listen_address}");

    let listener = tokio::net::TcpListener::bind(&listen_address).await?;
    axum::serve(listener, router).await
}

fn cors_layer(config: &Config) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers([
            CONTENT_TYPE,
            HeaderName::from_static("x-version"),
        ])
}
