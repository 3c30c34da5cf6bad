use crate::controller::ApiResponse;
use crate::extractors::compare_api_version::CompareApiVersion;
use crate::params::document::UpdateParams;
use crate::{AppState, Error};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use domain::{insight as InsightApi, insights, Id};
use service::config::ApiVersion;

use log::*;

/// PUT replace a Session's insight document with human-edited content
#[utoipa::path(
    put,
    path = "/sessions/{id}/document",
    params(
        ApiVersion,
        ("id" = Id, Path, description = "Session id whose document to update")
    ),
    request_body = UpdateParams,
    responses(
        (status = 200, description = "Successfully recorded the edited document", body = insights::Model),
        (status = 404, description = "Session not found"),
        (status = 422, description = "Unprocessable Entity"),
        (status = 405, description = "Method not allowed")
    )
)]
pub async fn update(
    CompareApiVersion(_v): CompareApiVersion,
    State(app_state): State<AppState>,
    Path(session_id): Path<Id>,
    Json(params): Json<UpdateParams>,
) -> Result<impl IntoResponse, Error> {
    debug!("PUT document for Session: {}", session_id);

    let document =
        InsightApi::record_document_edit(app_state.db_conn_ref(), session_id, params.content)
            .await?;

    Ok(Json(ApiResponse::new(StatusCode::OK.into(), document)))
}
