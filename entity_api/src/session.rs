//! Store operations for meeting sessions.

use super::error::{EntityApiErrorKind, Error};
use entity::sessions::{ActiveModel, Column, Entity, Model};
use entity::Id;
use log::*;
use sea_orm::{
    entity::prelude::*, ActiveValue::Set, DatabaseConnection, QueryOrder, TryIntoModel,
};

pub async fn create(db: &DatabaseConnection, user_id: Id) -> Result<Model, Error> {
    debug!("Creating new session for user: {user_id}");

    let now = chrono::Utc::now();

    let active_model = ActiveModel {
        user_id: Set(user_id),
        name: Set(None),
        started_at: Set(now.into()),
        ended_at: Set(None),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
        ..Default::default()
    };

    Ok(active_model.save(db).await?.try_into_model()?)
}

pub async fn find_by_id(db: &DatabaseConnection, id: Id) -> Result<Model, Error> {
    Entity::find_by_id(id).one(db).await?.ok_or_else(|| Error {
        source: None,
        error_kind: EntityApiErrorKind::RecordNotFound,
    })
}

/// All sessions owned by a user, newest first.
pub async fn find_by_user(db: &DatabaseConnection, user_id: Id) -> Result<Vec<Model>, Error> {
    Ok(Entity::find()
        .filter(Column::UserId.eq(user_id))
        .order_by_desc(Column::StartedAt)
        .all(db)
        .await?)
}

/// Marks a session as ended. Ending an already-ended session is a no-op
/// rewrite of the same state.
pub async fn end(db: &DatabaseConnection, id: Id) -> Result<Model, Error> {
    let existing = find_by_id(db, id).await?;
    let now = chrono::Utc::now();

    set_ended_at(db, existing, Some(now.into())).await
}

/// Clears ended_at so a previously ended session accepts new chunks again.
pub async fn resume(db: &DatabaseConnection, id: Id) -> Result<Model, Error> {
    let existing = find_by_id(db, id).await?;

    set_ended_at(db, existing, None).await
}

/// Assigns the one-time generated name. Callers are expected to check that
/// no name exists yet; an existing name is never overwritten here.
pub async fn assign_name(db: &DatabaseConnection, id: Id, name: String) -> Result<Model, Error> {
    let existing = find_by_id(db, id).await?;

    if existing.name.is_some() {
        return Ok(existing);
    }

    debug!("Assigning name to session {id}: {name}");

    let now = chrono::Utc::now();

    let active_model = ActiveModel {
        id: Set(existing.id),
        user_id: Set(existing.user_id),
        name: Set(Some(name)),
        started_at: Set(existing.started_at),
        ended_at: Set(existing.ended_at),
        created_at: Set(existing.created_at),
        updated_at: Set(now.into()),
    };

    Ok(active_model.update(db).await?.try_into_model()?)
}

async fn set_ended_at(
    db: &DatabaseConnection,
    existing: Model,
    ended_at: Option<DateTimeWithTimeZone>,
) -> Result<Model, Error> {
    let now = chrono::Utc::now();

    let active_model = ActiveModel {
        id: Set(existing.id),
        user_id: Set(existing.user_id),
        name: Set(existing.name),
        started_at: Set(existing.started_at),
        ended_at: Set(ended_at),
        created_at: Set(existing.created_at),
        updated_at: Set(now.into()),
    };

    Ok(active_model.update(db).await?.try_into_model()?)
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
    async fn create_returns_a_new_session_model() -> Result<(), Error> {
        let now = chrono::Utc::now();

        let session_model = Model {
            id: Id::new_v4(),
            user_id: Id::new_v4(),
            name: None,
            started_at: now.into(),
            ended_at: None,
            created_at: now.into(),
            updated_at: now.into(),
        };

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results(vec![vec![session_model.clone()]])
            .into_connection();

        let session = create(&db, session_model.user_id).await?;

        assert_eq!(session.id, session_model.id);
        assert!(session.is_active());

        Ok(())
    }

    #[tokio::test]
    async fn find_by_id_returns_a_single_record() -> Result<(), Error> {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();

        let session_id = Id::new_v4();
        let _ = find_by_id(&db, session_id).await;

        assert_eq!(
            db.into_transaction_log(),
            [Transaction::from_sql_and_values(
                DatabaseBackend::Postgres,
                r#"SELECT "sessions"."id", "sessions"."user_id", "sessions"."name", "sessions"."started_at", "sessions"."ended_at", "sessions"."created_at", "sessions"."updated_at" FROM "copilot_platform"."sessions" WHERE "sessions"."id" = $1 LIMIT $2"#,
                [session_id.into(), sea_orm::Value::BigUnsigned(Some(1))]
            )]
        );

        Ok(())
    }

    #[tokio::test]
    async fn assign_name_leaves_an_existing_name_untouched() -> Result<(), Error> {
        let now = chrono::Utc::now();

        let named = Model {
            id: Id::new_v4(),
            user_id: Id::new_v4(),
            name: Some("Quarterly planning".to_string()),
            started_at: now.into(),
            ended_at: None,
            created_at: now.into(),
            updated_at: now.into(),
        };

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results(vec![vec![named.clone()]])
            .into_connection();

        let session = assign_name(&db, named.id, "Something else".to_string()).await?;

        assert_eq!(session.name.as_deref(), Some("Quarterly planning"));
        // Only the lookup ran; no UPDATE was issued
        assert_eq!(db.into_transaction_log().len(), 1);

        Ok(())
    }
}
