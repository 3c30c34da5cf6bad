use domain::Id;
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Deserialize, IntoParams)]
pub(crate) struct IndexParams {
    /// Owner of the sessions to list; the shared default user when omitted.
    pub(crate) user_id: Option<Id>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub(crate) struct CreateParams {
    /// Owner of the new session; the shared default user when omitted.
    pub(crate) user_id: Option<Id>,
}
