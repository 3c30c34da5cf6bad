use crate::controller::ApiResponse;
use crate::extractors::compare_api_version::CompareApiVersion;
use crate::params::ingest::ChunkUploadParams;
use crate::{AppState, Error};
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use domain::error::{DomainErrorKind, EntityErrorKind, Error as DomainError, InternalErrorKind};
use domain::{snippet as SnippetApi, snippets, Id};
use service::config::ApiVersion;

use log::*;

const DEFAULT_AUDIO_FORMAT: &str = "webm";

/// POST upload one captured audio chunk for a Session.
///
/// The chunk is acknowledged as soon as its snippet record exists;
/// transcription runs afterwards and failures leave the snippet
/// untranscribed rather than failing the upload.
#[utoipa::path(
    post,
    path = "/ingest/audio-chunk",
    params(ApiVersion),
    request_body(content = ChunkUploadParams, content_type = "multipart/form-data"),
    responses(
        (status = 202, description = "Chunk accepted for transcription", body = snippets::Model),
        (status = 404, description = "Session not found"),
        (status = 422, description = "Unprocessable Entity"),
        (status = 405, description = "Method not allowed")
    )
)]
pub async fn audio_chunk(
    CompareApiVersion(_v): CompareApiVersion,
    State(app_state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Response, Error> {
    let mut session_id: Option<Id> = None;
    let mut captured_at: Option<DateTime<Utc>> = None;
    let mut duration_seconds: Option<i32> = None;
    let mut audio: Option<Vec<u8>> = None;
    let mut format = DEFAULT_AUDIO_FORMAT.to_string();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| invalid_upload(format!("malformed multipart body: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "session_id" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| invalid_upload(format!("unreadable session_id: {e}")))?;
                session_id = Some(
                    Id::parse_str(&text)
                        .map_err(|_| invalid_upload(format!("invalid session_id: {text}")))?,
                );
            }
            "captured_at" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| invalid_upload(format!("unreadable captured_at: {e}")))?;
                captured_at = Some(
                    DateTime::parse_from_rfc3339(&text)
                        .map_err(|_| invalid_upload(format!("invalid captured_at: {text}")))?
                        .with_timezone(&Utc),
                );
            }
            "duration_seconds" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| invalid_upload(format!("unreadable duration_seconds: {e}")))?;
                duration_seconds = Some(
                    text.parse()
                        .map_err(|_| invalid_upload(format!("invalid duration_seconds: {text}")))?,
                );
            }
            "file" => {
                if let Some(extension) = field
                    .file_name()
                    .and_then(|file_name| file_name.rsplit('.').next())
                {
                    format = extension.to_lowercase();
                }
                audio = Some(
                    field
                        .bytes()
                        .await
                        .map_err(|e| invalid_upload(format!("unreadable audio payload: {e}")))?
                        .to_vec(),
                );
            }
            _ => {}
        }
    }

    let session_id = session_id.ok_or_else(|| invalid_upload("missing session_id field"))?;
    let audio = audio.ok_or_else(|| invalid_upload("missing file field"))?;
    let captured_at = captured_at.unwrap_or_else(Utc::now);
    let duration_seconds =
        duration_seconds.unwrap_or(app_state.config.chunk_duration_seconds as i32);

    let snippet = SnippetApi::ingest_chunk(
        app_state.db_conn_ref(),
        session_id,
        captured_at,
        duration_seconds,
    )
    .await?;

    // Acknowledge the upload now; transcription and indexing happen out of
    // band
    let db = app_state.database_connection.clone();
    let transcription = app_state.transcription.clone();
    let retrieval = app_state.retrieval.clone();
    let snippet_id = snippet.id;
    tokio::spawn(async move {
        if let Err(err) = SnippetApi::process_transcription(
            db.as_ref(),
            transcription.as_ref(),
            retrieval.as_deref(),
            snippet_id,
            audio,
            &format,
        )
        .await
        {
            error!("Transcription of snippet {snippet_id} failed: {err}");
        }
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(ApiResponse::new(StatusCode::ACCEPTED.into(), snippet)),
    )
        .into_response())
}

fn invalid_upload(message: impl Into<String>) -> DomainError {
    warn!("Rejected audio chunk upload: {}", message.into());
    DomainError {
        source: None,
        error_kind: DomainErrorKind::Internal(InternalErrorKind::Entity(EntityErrorKind::Invalid)),
    }
}
