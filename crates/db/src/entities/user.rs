//! User entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "user")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    #[sea_orm(unique, indexed)]
    pub username: String,

    #[sea_orm(unique, indexed)]
    pub email: String,

    /// Argon2 PHC string; NULL until a password is set
    #[sea_orm(nullable)]
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,

    /// Profile description
    #[sea_orm(nullable)]
    pub about_me: Option<String>,

    /// Last request seen from this user
    #[sea_orm(nullable)]
    pub last_seen: Option<DateTimeWithTimeZone>,

    /// Last visit to the messages page; later messages are unread
    #[sea_orm(nullable)]
    pub last_message_read_time: Option<DateTimeWithTimeZone>,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::post::Entity")]
    Posts,

    #[sea_orm(has_many = "super::notification::Entity")]
    Notifications,
}

impl Related<super::post::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Posts.def()
    }
}

impl Related<super::notification::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Notifications.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
