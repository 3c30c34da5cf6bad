//! Store operations for users.

use super::error::{EntityApiErrorKind, Error};
use entity::users::{ActiveModel, Entity, Model};
use entity::Id;
use log::*;
use sea_orm::{entity::prelude::*, ActiveValue::Set, DatabaseConnection, QuerySelect, TryIntoModel};

pub async fn find_by_id(db: &DatabaseConnection, id: Id) -> Result<Model, Error> {
    Entity::find_by_id(id).one(db).await?.ok_or_else(|| Error {
        source: None,
        error_kind: EntityApiErrorKind::RecordNotFound,
    })
}

/// Returns any existing user, or creates an anonymous default one. Desktop
/// clients run without accounts, so every session still needs an owner row.
pub async fn find_or_create_default(db: &DatabaseConnection) -> Result<Model, Error> {
    if let Some(existing) = Entity::find().limit(1).one(db).await? {
        return Ok(existing);
    }

    debug!("No users found; creating the default user");

    let now = chrono::Utc::now();

    let active_model = ActiveModel {
        email: Set(None),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
        ..Default::default()
    };

    Ok(active_model.save(db).await?.try_into_model()?)
}
