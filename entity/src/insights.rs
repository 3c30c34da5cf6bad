//! SeaORM Entity for the insights table.
//! The single evolving text document summarizing a session. The current
//! document for a session is the most recently updated row; historical rows
//! are tolerated but never selected.

use crate::Id;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[schema(as = entity::insights::Model)]
#[sea_orm(schema_name = "copilot_platform", table_name = "insights")]
pub struct Model {
    #[serde(skip_deserializing)]
    #[sea_orm(primary_key)]
    pub id: Id,

    #[schema(value_type = Uuid)]
    pub session_id: Id,

    /// The canonical, displayable document state
    #[sea_orm(column_type = "Text")]
    pub content: String,

    /// Short derived bullet list for display; content is authoritative
    #[schema(value_type = Vec<String>)]
    pub bullets: Json,

    /// Last time the document was regenerated by the model
    #[schema(value_type = Option<String>, format = DateTime)]
    pub llm_updated_at: Option<DateTimeWithTimeZone>,

    /// Last time a human replaced the content by hand. When this is newer
    /// than llm_updated_at the document is user-owned pending merge and must
    /// not be silently overwritten.
    #[schema(value_type = Option<String>, format = DateTime)]
    pub user_edited_at: Option<DateTimeWithTimeZone>,

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

impl Model {
    /// Deserializes the bullets JSON column into a list of strings.
    pub fn bullet_list(&self) -> Vec<String> {
        serde_json::from_value(self.bullets.clone()).unwrap_or_default()
    }
}
