//! SeaORM Entity for the snippets table.
//! One captured audio segment and its eventual transcript.

use crate::Id;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[schema(as = entity::snippets::Model)]
#[sea_orm(schema_name = "copilot_platform", table_name = "snippets")]
pub struct Model {
    #[serde(skip_deserializing)]
    #[sea_orm(primary_key)]
    pub id: Id,

    #[schema(value_type = Uuid)]
    pub session_id: Id,

    /// Client-side capture timestamp of the audio chunk
    #[schema(value_type = String, format = DateTime)]
    pub captured_at: DateTimeWithTimeZone,

    /// Chunk length in seconds
    pub duration_seconds: i32,

    /// Null until transcription completes; stays null if transcription fails
    #[sea_orm(column_type = "Text", nullable)]
    pub transcript: Option<String>,

    /// Language detected by the transcription provider, when reported
    pub language: Option<String>,

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
        belongs_to = "super::sessions::Entity",
        from = "Column::SessionId",
        to = "super::sessions::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Sessions,
}

impl Related<super::sessions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Sessions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
