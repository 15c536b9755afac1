//! Post entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::indexable::{IndexKey, Indexable, SearchableEntity};

/// Maximum post body length, in characters.
pub const MAX_BODY_LENGTH: usize = 140;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "post")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Author user ID
    #[sea_orm(indexed)]
    pub user_id: String,

    /// Post text, searchable
    pub body: String,

    #[sea_orm(indexed)]
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    Author,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Author.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl SearchableEntity for Entity {
    const INDEX: &'static str = "post";

    fn id_column() -> Column {
        Column::Id
    }
}

impl Indexable for Model {
    fn index_key(&self) -> IndexKey {
        IndexKey::new(Entity::INDEX, &self.id)
    }

    fn index_fields(&self) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert("body".to_string(), Value::String(self.body.clone()));
        fields
    }
}
