use crate::controller::ApiResponse;
use crate::extractors::compare_api_version::CompareApiVersion;
use crate::params::session::{CreateParams, IndexParams};
use crate::{AppState, Error};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use domain::session::SessionSummary;
use domain::{
    session as SessionApi,
    sessions::{self, Model},
    Id,
};
use serde::Serialize;
use service::config::ApiVersion;
use utoipa::ToSchema;

use log::*;

/// A session joined with its current insight document, if one exists yet.
#[derive(Debug, Serialize, ToSchema)]
pub(crate) struct SessionWithDocument {
    #[serde(flatten)]
    session: Model,
    #[serde(skip_serializing_if = "Option::is_none")]
    document: Option<domain::insights::Model>,
}

/// POST create a new meeting Session
#[utoipa::path(
    post,
    path = "/sessions",
    params(ApiVersion),
    request_body = CreateParams,
    responses(
        (status = 201, description = "Successfully created a new Session", body = sessions::Model),
        (status = 422, description = "Unprocessable Entity"),
        (status = 405, description = "Method not allowed")
    )
)]
pub async fn create(
    CompareApiVersion(_v): CompareApiVersion,
    State(app_state): State<AppState>,
    params: Option<Json<CreateParams>>,
) -> Result<impl IntoResponse, Error> {
    debug!("POST Create a new Session");

    let user_id = params.and_then(|Json(params)| params.user_id);
    let session = SessionApi::create(app_state.db_conn_ref(), user_id).await?;

    debug!("New Session: {:?}", session);

    Ok(Json(ApiResponse::new(StatusCode::CREATED.into(), session)))
}

/// GET all Sessions for a user, newest first, with document previews
#[utoipa::path(
    get,
    path = "/sessions",
    params(
        ApiVersion,
        ("user_id" = Option<Id>, Query, description = "Filter by session owner")
    ),
    responses(
        (status = 200, description = "Successfully retrieved all Sessions", body = [SessionSummary]),
        (status = 405, description = "Method not allowed")
    )
)]
pub async fn index(
    CompareApiVersion(_v): CompareApiVersion,
    State(app_state): State<AppState>,
    Query(params): Query<IndexParams>,
) -> Result<impl IntoResponse, Error> {
    debug!("GET all Sessions");

    let summaries = SessionApi::list_with_previews(app_state.db_conn_ref(), params.user_id).await?;

    Ok(Json(ApiResponse::new(StatusCode::OK.into(), summaries)))
}

/// GET a Session by its id, with its current document
#[utoipa::path(
    get,
    path = "/sessions/{id}",
    params(
        ApiVersion,
        ("id" = Id, Path, description = "Session id to retrieve")
    ),
    responses(
        (status = 200, description = "Successfully retrieved the Session", body = SessionWithDocument),
        (status = 404, description = "Session not found"),
        (status = 405, description = "Method not allowed")
    )
)]
pub async fn read(
    CompareApiVersion(_v): CompareApiVersion,
    State(app_state): State<AppState>,
    Path(id): Path<Id>,
) -> Result<impl IntoResponse, Error> {
    debug!("GET Session by id: {}", id);

    let (session, document) = SessionApi::find_with_document(app_state.db_conn_ref(), id).await?;

    Ok(Json(ApiResponse::new(
        StatusCode::OK.into(),
        SessionWithDocument { session, document },
    )))
}

/// POST resume a previously ended Session
#[utoipa::path(
    post,
    path = "/sessions/{id}/resume",
    params(
        ApiVersion,
        ("id" = Id, Path, description = "Session id to resume")
    ),
    responses(
        (status = 200, description = "Successfully resumed the Session", body = sessions::Model),
        (status = 404, description = "Session not found"),
        (status = 405, description = "Method not allowed")
    )
)]
pub async fn resume(
    CompareApiVersion(_v): CompareApiVersion,
    State(app_state): State<AppState>,
    Path(id): Path<Id>,
) -> Result<impl IntoResponse, Error> {
    debug!("POST Resume Session: {}", id);

    let session = SessionApi::resume(app_state.db_conn_ref(), id).await?;

    Ok(Json(ApiResponse::new(StatusCode::OK.into(), session)))
}

/// POST end an active Session
#[utoipa::path(
    post,
    path = "/sessions/{id}/end",
    params(
        ApiVersion,
        ("id" = Id, Path, description = "Session id to end")
    ),
    responses(
        (status = 200, description = "Successfully ended the Session", body = sessions::Model),
        (status = 404, description = "Session not found"),
        (status = 405, description = "Method not allowed")
    )
)]
pub async fn end(
    CompareApiVersion(_v): CompareApiVersion,
    State(app_state): State<AppState>,
    Path(id): Path<Id>,
) -> Result<impl IntoResponse, Error> {
    debug!("POST End Session: {}", id);

    let session = SessionApi::end(app_state.db_conn_ref(), id).await?;

    Ok(Json(ApiResponse::new(StatusCode::OK.into(), session)))
}
