use crate::{controller::health_check_controller, params, AppState};
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post, put},
    Router,
};

use crate::controller::{
    document_controller, ingest_controller, insight_controller, session_controller,
};

use utoipa::OpenApi;
use utoipa_rapidoc::RapiDoc;

// Audio chunks are around a minute long; leave generous headroom over the
// axum default body limit.
const MAX_CHUNK_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

// This is the global definition of our OpenAPI spec. To be a part
// of the rendered spec, a path and schema must be listed here.
#[derive(OpenApi)]
#[openapi(
        info(
            title = "Copilot Platform API"
        ),
        paths(
            session_controller::create,
            session_controller::index,
            session_controller::read,
            session_controller::resume,
            session_controller::end,
            document_controller::update,
            ingest_controller::audio_chunk,
            insight_controller::ensure,
            health_check_controller::health_check,
        ),
        components(
            schemas(
                domain::sessions::Model,
                domain::snippets::Model,
                domain::insights::Model,
                domain::users::Model,
                domain::session::SessionSummary,
                session_controller::SessionWithDocument,
                params::session::CreateParams,
                params::document::UpdateParams,
                params::insight::EnsureParams,
                params::ingest::ChunkUploadParams,
            )
        ),
        tags(
            (name = "copilot_platform", description = "Meeting Copilot Session Insight API")
        )
    )]
struct ApiDoc;

pub fn define_routes(app_state: AppState) -> Router {
    Router::new()
        .merge(session_routes(app_state.clone()))
        .merge(ingest_routes(app_state.clone()))
        .merge(insight_routes(app_state))
        .merge(health_routes())
        .merge(RapiDoc::with_openapi("/api-docs/openapi2.json", ApiDoc::openapi()).path("/rapidoc"))
}

fn session_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/sessions", post(session_controller::create))
        .route("/sessions", get(session_controller::index))
        .route("/sessions/{id}", get(session_controller::read))
        .route("/sessions/{id}/resume", post(session_controller::resume))
        .route("/sessions/{id}/end", post(session_controller::end))
        .route(
            "/sessions/{id}/document",
            put(document_controller::update),
        )
        .with_state(app_state)
}

fn ingest_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/ingest/audio-chunk", post(ingest_controller::audio_chunk))
        .layer(DefaultBodyLimit::max(MAX_CHUNK_UPLOAD_BYTES))
        .with_state(app_state)
}

fn insight_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/insight/for-session", post(insight_controller::ensure))
        .with_state(app_state)
}

fn health_routes() -> Router {
    Router::new().route("/health_check", get(health_check_controller::health_check))
}
