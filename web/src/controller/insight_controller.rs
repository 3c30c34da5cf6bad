use crate::controller::ApiResponse;
use crate::extractors::compare_api_version::CompareApiVersion;
use crate::params::insight::EnsureParams;
use crate::{AppState, Error};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use domain::insight::InsightOutcome;
use domain::insights;
use service::config::ApiVersion;

use log::*;

/// POST bring a Session's insight document up to date and return it.
///
/// Responds 200 with the document when one is available (even a stale one
/// that simply had nothing new to merge), and 202 with no document for a
/// session that has no transcribed audio yet. Provider failures surface as
/// errors; clients keep their last good document and retry on the next poll.
#[utoipa::path(
    post,
    path = "/insight/for-session",
    params(ApiVersion),
    request_body = EnsureParams,
    responses(
        (status = 200, description = "Document is up to date", body = insights::Model),
        (status = 202, description = "No transcribed audio yet; retry on the next poll"),
        (status = 404, description = "Session not found"),
        (status = 502, description = "A provider call failed"),
        (status = 405, description = "Method not allowed")
    )
)]
pub async fn ensure(
    CompareApiVersion(_v): CompareApiVersion,
    State(app_state): State<AppState>,
    Json(params): Json<EnsureParams>,
) -> Result<Response, Error> {
    debug!("POST ensure insight for Session: {}", params.session_id);

    let outcome = app_state
        .insight_engine
        .ensure_insight(app_state.db_conn_ref(), params.session_id)
        .await?;

    match outcome {
        InsightOutcome::Ready(document) => Ok((
            StatusCode::OK,
            Json(ApiResponse::new(StatusCode::OK.into(), document)),
        )
            .into_response()),
        InsightOutcome::NotReady => Ok((
            StatusCode::ACCEPTED,
            Json(ApiResponse::<()>::no_content(StatusCode::ACCEPTED.into())),
        )
            .into_response()),
    }
}
