//! Store operations for the per-session insight document.

use super::error::Error;
use entity::insights::{ActiveModel, Column, Entity, Model};
use entity::Id;
use log::*;
use sea_orm::{
    entity::prelude::*, ActiveValue::Set, DatabaseConnection, QueryOrder, QuerySelect,
    TryIntoModel,
};

/// Finds the current document for a session: the most recently updated row.
/// Older rows are tolerated as history but never selected.
pub async fn find_current_by_session(
    db: &DatabaseConnection,
    session_id: Id,
) -> Result<Option<Model>, Error> {
    Ok(Entity::find()
        .filter(Column::SessionId.eq(session_id))
        .order_by_desc(Column::UpdatedAt)
        .limit(1)
        .one(db)
        .await?)
}

/// Writes a regenerated document: updates the current row's content and
/// bullets in place, or inserts a new row when the session has no document
/// yet. `generated_through` becomes llm_updated_at; callers pass the last
/// modification time of the transcripts they merged, not the write time, so
/// that a transcript landing mid-regeneration still reads as newer.
pub async fn upsert_generated(
    db: &DatabaseConnection,
    session_id: Id,
    content: String,
    bullets: Vec<String>,
    generated_through: DateTimeWithTimeZone,
) -> Result<Model, Error> {
    let now = chrono::Utc::now();
    let bullets_json = serde_json::json!(bullets);

    match find_current_by_session(db, session_id).await? {
        Some(existing) => {
            debug!("Updating generated document for session: {session_id}");

            let active_model = ActiveModel {
                id: Set(existing.id),
                session_id: Set(existing.session_id),
                content: Set(content),
                bullets: Set(bullets_json),
                llm_updated_at: Set(Some(generated_through)),
                user_edited_at: Set(existing.user_edited_at),
                created_at: Set(existing.created_at),
                updated_at: Set(now.into()),
            };

            Ok(active_model.update(db).await?.try_into_model()?)
        }
        None => {
            debug!("Creating first generated document for session: {session_id}");

            let active_model = ActiveModel {
                session_id: Set(session_id),
                content: Set(content),
                bullets: Set(bullets_json),
                llm_updated_at: Set(Some(generated_through)),
                user_edited_at: Set(None),
                created_at: Set(now.into()),
                updated_at: Set(now.into()),
                ..Default::default()
            };

            Ok(active_model.save(db).await?.try_into_model()?)
        }
    }
}

/// Records a human edit: replaces the content and stamps user_edited_at,
/// independent of LLM state. Creates the document with empty bullets when
/// none exists; once a human has edited, content is authoritative.
pub async fn record_human_edit(
    db: &DatabaseConnection,
    session_id: Id,
    content: String,
) -> Result<Model, Error> {
    let now = chrono::Utc::now();

    match find_current_by_session(db, session_id).await? {
        Some(existing) => {
            debug!("Recording human edit for session: {session_id}");

            let active_model = ActiveModel {
                id: Set(existing.id),
                session_id: Set(existing.session_id),
                content: Set(content),
                bullets: Set(existing.bullets),
                llm_updated_at: Set(existing.llm_updated_at),
                user_edited_at: Set(Some(now.into())),
                created_at: Set(existing.created_at),
                updated_at: Set(now.into()),
            };

            Ok(active_model.update(db).await?.try_into_model()?)
        }
        None => {
            debug!("Creating human-edited document for session: {session_id}");

            let active_model = ActiveModel {
                session_id: Set(session_id),
                content: Set(content),
                bullets: Set(serde_json::json!([])),
                llm_updated_at: Set(None),
                user_edited_at: Set(Some(now.into())),
                created_at: Set(now.into()),
                updated_at: Set(now.into()),
                ..Default::default()
            };

            Ok(active_model.save(db).await?.try_into_model()?)
        }
    }
}
