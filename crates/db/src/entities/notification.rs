//! Notification entity.

use flock_common::{AppError, AppResult};
use sea_orm::entity::prelude::*;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "notification")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// The user receiving the notification
    #[sea_orm(indexed)]
    pub user_id: String,

    /// Replace-on-add key; at most one live row per (user, name)
    #[sea_orm(indexed)]
    pub name: String,

    /// Unix seconds with sub-second precision
    #[sea_orm(indexed)]
    pub timestamp: f64,

    /// JSON-encoded payload
    #[sea_orm(column_type = "Text")]
    pub payload_json: String,
}

impl Model {
    /// Decode the stored payload.
    ///
    /// Only the notification service writes this column, so a decode failure
    /// means the row is corrupt and is reported as [`AppError::Serialization`].
    pub fn get_data(&self) -> AppResult<serde_json::Value> {
        self.get_data_as()
    }

    /// Decode the stored payload into a concrete type.
    pub fn get_data_as<T: DeserializeOwned>(&self) -> AppResult<T> {
        serde_json::from_str(&self.payload_json).map_err(|e| {
            AppError::Serialization(format!("notification {} payload: {e}", self.id))
        })
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    User,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
