//! Session lifecycle operations.

use crate::error::Error;
use crate::{insights, sessions, Id};
use entity_api::{insight, session, user};
use log::*;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use utoipa::ToSchema;

pub use entity_api::session::{end, find_by_id, resume};

const PREVIEW_MAX_CHARS: usize = 100;

/// A session row enriched with a short preview of its current document,
/// as returned by the session list endpoint.
#[derive(Debug, Serialize, ToSchema)]
pub struct SessionSummary {
    #[serde(flatten)]
    pub session: sessions::Model,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_preview: Option<String>,
    pub is_active: bool,
}

/// Creates a session for the given user, falling back to the shared default
/// user when no id is supplied (desktop clients run without accounts).
pub async fn create(db: &DatabaseConnection, user_id: Option<Id>) -> Result<sessions::Model, Error> {
    let owner_id = match user_id {
        Some(id) => user::find_by_id(db, id).await?.id,
        None => user::find_or_create_default(db).await?.id,
    };

    let session = session::create(db, owner_id).await?;
    info!("Created new meeting session: {}", session.id);

    Ok(session)
}

/// Returns a session together with its current document, if one exists yet.
pub async fn find_with_document(
    db: &DatabaseConnection,
    id: Id,
) -> Result<(sessions::Model, Option<insights::Model>), Error> {
    let session = session::find_by_id(db, id).await?;
    let document = insight::find_current_by_session(db, id).await?;

    Ok((session, document))
}

/// Lists a user's sessions, newest first, each with a first-line preview of
/// its current document.
pub async fn list_with_previews(
    db: &DatabaseConnection,
    user_id: Option<Id>,
) -> Result<Vec<SessionSummary>, Error> {
    let owner_id = match user_id {
        Some(id) => id,
        None => user::find_or_create_default(db).await?.id,
    };

    let sessions = session::find_by_user(db, owner_id).await?;

    let mut summaries = Vec::with_capacity(sessions.len());
    for session in sessions {
        let document_preview = insight::find_current_by_session(db, session.id)
            .await?
            .map(|document| preview_of(&document.content));
        let is_active = session.is_active();

        summaries.push(SessionSummary {
            session,
            document_preview,
            is_active,
        });
    }

    Ok(summaries)
}

fn preview_of(content: &str) -> String {
    let first_line = content.lines().next().unwrap_or_default();
    first_line.chars().take(PREVIEW_MAX_CHARS).collect()
}
