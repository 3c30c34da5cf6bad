use domain::Id;
use serde::Deserialize;
use utoipa::ToSchema;

/// Multipart form fields accepted by the audio chunk upload endpoint. This
/// type documents the form shape; the handler parses the parts by hand.
#[derive(Debug, Deserialize, ToSchema)]
pub(crate) struct ChunkUploadParams {
    pub(crate) session_id: Id,
    /// RFC 3339 capture timestamp; defaults to the time of upload.
    pub(crate) captured_at: Option<String>,
    /// Chunk length in seconds; defaults to the configured chunk duration.
    pub(crate) duration_seconds: Option<i32>,
    /// The audio payload.
    #[schema(value_type = String, format = Binary)]
    pub(crate) file: String,
}
