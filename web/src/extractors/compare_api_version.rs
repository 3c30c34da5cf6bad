//! Rejects requests whose declared API version is missing or unsupported.

use crate::extractors::RejectionType;
use axum::extract::FromRequestParts;
use axum::http::{request::Parts, StatusCode};
use semver::Version;
use service::config::ApiVersion;

pub(crate) struct CompareApiVersion(pub Version);

impl<S> FromRequestParts<S> for CompareApiVersion
where
    S: Send + Sync,
{
    type Rejection = RejectionType;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = parts.headers.get(ApiVersion::field_name()).ok_or((
            StatusCode::BAD_REQUEST,
            format!("Missing required header: {}", ApiVersion::field_name()),
        ))?;

        let version_str = header.to_str().map_err(|_| {
            (
                StatusCode::BAD_REQUEST,
                format!("Invalid {} header value", ApiVersion::field_name()),
            )
        })?;

        if !ApiVersion::versions().contains(&version_str) {
            return Err((
                StatusCode::BAD_REQUEST,
                format!("Unsupported API version: {version_str}"),
            ));
        }

        let version = Version::parse(version_str).map_err(|_| {
            (
                StatusCode::BAD_REQUEST,
                format!("Malformed API version: {version_str}"),
            )
        })?;

        Ok(CompareApiVersion(version))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(header: Option<&str>) -> Result<CompareApiVersion, RejectionType> {
        let mut builder = Request::builder().uri("/sessions");
        if let Some(value) = header {
            builder = builder.header(ApiVersion::field_name(), value);
        }
        let (mut parts, _) = builder.body(()).unwrap().into_parts();

        CompareApiVersion::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn accepts_a_supported_version() {
        let extracted = extract(Some(ApiVersion::default_version())).await;
        assert!(extracted.is_ok());
    }

    #[tokio::test]
    async fn rejects_a_missing_header() {
        let err = extract(None).await.err().unwrap();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn rejects_an_unsupported_version() {
        let err = extract(Some("9.9.9")).await.err().unwrap();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);
        assert!(err.1.contains("9.9.9"));
    }
}
