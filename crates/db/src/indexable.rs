//! Search index capability traits.
//!
//! A model opts into external-index mirroring by implementing [`Indexable`];
//! its entity implements [`SearchableEntity`] so that whole tables can be
//! searched and rebuilt.

use std::fmt;

use sea_orm::EntityTrait;
use serde_json::{Map, Value};

/// Identity of a document in the external index.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IndexKey {
    /// Index (entity type) name, e.g. `"post"`.
    pub index: &'static str,
    /// Primary key of the row.
    pub id: String,
}

impl IndexKey {
    /// Build a key for `id` in `index`.
    #[must_use]
    pub fn new(index: &'static str, id: &str) -> Self {
        Self {
            index,
            id: id.to_string(),
        }
    }
}

impl fmt::Display for IndexKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.index, self.id)
    }
}

/// A persisted value that is mirrored into the search index.
pub trait Indexable {
    /// Key of the document this value maps to.
    fn index_key(&self) -> IndexKey;

    /// Searchable fields, keyed by field name.
    fn index_fields(&self) -> Map<String, Value>;
}

/// An entity whose rows are [`Indexable`].
pub trait SearchableEntity: EntityTrait {
    /// Index name shared by every row of this entity.
    const INDEX: &'static str;

    /// Primary key column, used to fetch search hits in rank order.
    fn id_column() -> Self::Column;
}
