//! Append-only store operations for audio snippets and their transcripts.

use super::error::{EntityApiErrorKind, Error};
use entity::snippets::{ActiveModel, Column, Entity, Model};
use entity::Id;
use log::*;
use sea_orm::{
    entity::prelude::*, ActiveValue::Set, DatabaseConnection, QueryOrder, TryIntoModel,
};

/// Appends a snippet record for a freshly captured audio chunk. The
/// transcript stays null until transcription completes.
pub async fn create(
    db: &DatabaseConnection,
    session_id: Id,
    captured_at: chrono::DateTime<chrono::Utc>,
    duration_seconds: i32,
) -> Result<Model, Error> {
    debug!("Appending snippet for session: {session_id}, captured_at: {captured_at}");

    let now = chrono::Utc::now();

    let active_model = ActiveModel {
        session_id: Set(session_id),
        captured_at: Set(captured_at.into()),
        duration_seconds: Set(duration_seconds),
        transcript: Set(None),
        language: Set(None),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
        ..Default::default()
    };

    Ok(active_model.save(db).await?.try_into_model()?)
}

/// Sets the transcript for a snippet once transcription has completed.
/// Bumps updated_at, which is what marks the snippet as new material for
/// the next document regeneration.
pub async fn update_transcript(
    db: &DatabaseConnection,
    id: Id,
    transcript: String,
    language: Option<String>,
) -> Result<Model, Error> {
    let result = Entity::find_by_id(id).one(db).await?;

    match result {
        Some(existing) => {
            debug!("Recording transcript for snippet: {id}");

            let now = chrono::Utc::now();

            let active_model = ActiveModel {
                id: Set(existing.id),
                session_id: Set(existing.session_id),
                captured_at: Set(existing.captured_at),
                duration_seconds: Set(existing.duration_seconds),
                transcript: Set(Some(transcript)),
                language: Set(language),
                created_at: Set(existing.created_at),
                updated_at: Set(now.into()),
            };

            Ok(active_model.update(db).await?.try_into_model()?)
        }
        None => Err(Error {
            source: None,
            error_kind: EntityApiErrorKind::RecordNotFound,
        }),
    }
}

pub async fn find_by_id(db: &DatabaseConnection, id: Id) -> Result<Model, Error> {
    Entity::find_by_id(id).one(db).await?.ok_or_else(|| Error {
        source: None,
        error_kind: EntityApiErrorKind::RecordNotFound,
    })
}

/// Finds all transcribed snippets for a session, ordered by capture time
/// ascending. When `since` is given, only snippets whose store-side
/// updated_at is strictly after it are returned. Snippets still waiting on
/// transcription are always excluded.
pub async fn find_transcribed_by_session(
    db: &DatabaseConnection,
    session_id: Id,
    since: Option<chrono::DateTime<chrono::FixedOffset>>,
) -> Result<Vec<Model>, Error> {
    let mut query = Entity::find()
        .filter(Column::SessionId.eq(session_id))
        .filter(Column::Transcript.is_not_null());

    if let Some(since) = since {
        query = query.filter(Column::UpdatedAt.gt(since));
    }

    Ok(query.order_by_asc(Column::CapturedAt).all(db).await?)
}

#[cfg(test)]
// We need to gate seaORM's mock feature behind conditional compilation because
// the feature removes the Clone trait implementation from seaORM's DatabaseConnection.
// see https://github.com/SeaQL/sea-orm/issues/830
#[cfg(feature = "mock")]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase, Transaction};

    #[tokio::test]
    async fn create_returns_a_new_snippet_model() -> Result<(), Error> {
        let now = chrono::Utc::now();

        let snippet_model = Model {
            id: Id::new_v4(),
            session_id: Id::new_v4(),
            captured_at: now.into(),
            duration_seconds: 60,
            transcript: None,
            language: None,
            created_at: now.into(),
            updated_at: now.into(),
        };

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results(vec![vec![snippet_model.clone()]])
            .into_connection();

        let snippet = create(&db, snippet_model.session_id, now, 60).await?;

        assert_eq!(snippet.id, snippet_model.id);
        assert!(snippet.transcript.is_none());

        Ok(())
    }

    #[tokio::test]
    async fn find_transcribed_by_session_without_since_selects_all_transcribed(
    ) -> Result<(), Error> {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();

        let session_id = Id::new_v4();
        let _ = find_transcribed_by_session(&db, session_id, None).await;

        assert_eq!(
            db.into_transaction_log(),
            [Transaction::from_sql_and_values(
                DatabaseBackend::Postgres,
                r#"SELECT "snippets"."id", "snippets"."session_id", "snippets"."captured_at", "snippets"."duration_seconds", "snippets"."transcript", "snippets"."language", "snippets"."created_at", "snippets"."updated_at" FROM "copilot_platform"."snippets" WHERE "snippets"."session_id" = $1 AND "snippets"."transcript" IS NOT NULL ORDER BY "snippets"."captured_at" ASC"#,
                [session_id.into()]
            )]
        );

        Ok(())
    }

    #[tokio::test]
    async fn find_transcribed_by_session_with_since_filters_on_updated_at() -> Result<(), Error> {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();

        let session_id = Id::new_v4();
        let since: chrono::DateTime<chrono::FixedOffset> = chrono::Utc::now().into();
        let _ = find_transcribed_by_session(&db, session_id, Some(since)).await;

        assert_eq!(
            db.into_transaction_log(),
            [Transaction::from_sql_and_values(
                DatabaseBackend::Postgres,
                r#"SELECT "snippets"."id", "snippets"."session_id", "snippets"."captured_at", "snippets"."duration_seconds", "snippets"."transcript", "snippets"."language", "snippets"."created_at", "snippets"."updated_at" FROM "copilot_platform"."snippets" WHERE "snippets"."session_id" = $1 AND "snippets"."transcript" IS NOT NULL AND "snippets"."updated_at" > $2 ORDER BY "snippets"."captured_at" ASC"#,
                [session_id.into(), since.into()]
            )]
        );

        Ok(())
    }

    #[tokio::test]
    async fn update_transcript_returns_record_not_found_for_missing_snippet() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results(vec![Vec::<Model>::new()])
            .into_connection();

        let result = update_transcript(&db, Id::new_v4(), "hello".to_string(), None).await;

        assert_eq!(
            result.unwrap_err().error_kind,
            EntityApiErrorKind::RecordNotFound
        );
    }
}
