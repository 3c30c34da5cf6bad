//! SeaORM Entity for the sessions table.
//! One continuous (possibly paused and resumed) listening period owned by a user.

use crate::Id;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[schema(as = entity::sessions::Model)]
#[sea_orm(schema_name = "copilot_platform", table_name = "sessions")]
pub struct Model {
    #[serde(skip_deserializing)]
    #[sea_orm(primary_key)]
    pub id: Id,

    #[schema(value_type = Uuid)]
    pub user_id: Id,

    /// Short human-readable name, generated once from the earliest transcripts
    pub name: Option<String>,

    #[schema(value_type = String, format = DateTime)]
    pub started_at: DateTimeWithTimeZone,

    /// Null while the session is active; cleared again when the session is resumed
    #[schema(value_type = Option<String>, format = DateTime)]
    pub ended_at: Option<DateTimeWithTimeZone>,

    #[serde(skip_deserializing)]
    #[schema(value_type = String, format = DateTime)]
    pub created_at: DateTimeWithTimeZone,

    #[serde(skip_deserializing)]
    #[schema(value_type = String, format = DateTime)]
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::UserId",
        to = "super::users::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Users,

    #[sea_orm(has_many = "super::snippets::Entity")]
    Snippets,

    #[sea_orm(has_many = "super::insights::Entity")]
    Insights,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Users.def()
    }
}

impl Related<super::snippets::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Snippets.def()
    }
}

impl Related<super::insights::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Insights.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// A session is active until it has been explicitly ended.
    pub fn is_active(&self) -> bool {
        self.ended_at.is_none()
    }
}
