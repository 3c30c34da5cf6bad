use serde::Deserialize;
use utoipa::ToSchema;

#[derive(Debug, Deserialize, ToSchema)]
pub(crate) struct UpdateParams {
    /// The full replacement content of the session's insight document.
    pub(crate) content: String,
}
