use std::error::Error as StdError;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use domain::error::{
    DomainErrorKind, EntityErrorKind, Error as DomainError, ExternalErrorKind, InternalErrorKind,
};

pub type Result<T> = core::result::Result<T, Error>;

/// Web-layer wrapper around the domain error tree. Its only job is to turn
/// an `error_kind` into the HTTP status the client should see; the wrapped
/// error itself never reaches the response body.
#[derive(Debug)]
pub struct Error(DomainError);

impl StdError for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> core::result::Result<(), std::fmt::Error> {
        write!(fmt, "{self:?}")
    }
}

impl Error {
    fn status_code(&self) -> StatusCode {
        match &self.0.error_kind {
            DomainErrorKind::Internal(internal) => match internal {
                InternalErrorKind::Entity(entity) => match entity {
                    EntityErrorKind::NotFound => StatusCode::NOT_FOUND,
                    EntityErrorKind::Invalid => StatusCode::UNPROCESSABLE_ENTITY,
                    EntityErrorKind::DbTransaction | EntityErrorKind::Other(_) => {
                        StatusCode::INTERNAL_SERVER_ERROR
                    }
                },
                InternalErrorKind::Config | InternalErrorKind::Other(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            // Failures of external collaborators (transcription, retrieval,
            // generation) are upstream failures from the client's perspective
            DomainErrorKind::External(external) => match external {
                ExternalErrorKind::Network | ExternalErrorKind::Other(_) => StatusCode::BAD_GATEWAY,
            },
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let reason = status.canonical_reason().unwrap_or("UNKNOWN");
        (status, reason).into_response()
    }
}

impl<E> From<E> for Error
where
    E: Into<DomainError>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
