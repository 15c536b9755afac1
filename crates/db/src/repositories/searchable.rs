//! Generic reads over searchable entities.

use std::marker::PhantomData;
use std::sync::Arc;

use crate::indexable::{Indexable, SearchableEntity};
use flock_common::{AppError, AppResult};
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, Order, PaginatorTrait, QueryFilter,
    QueryOrder, QueryTrait, Select,
    sea_query::{CaseStatement, SimpleExpr},
};
use tracing::debug;

/// Repository for the rows of one searchable entity.
#[derive(Clone)]
pub struct SearchableRepository<E> {
    db: Arc<DatabaseConnection>,
    _entity: PhantomData<E>,
}

impl<E> SearchableRepository<E>
where
    E: SearchableEntity,
    E::Model: Indexable + Sync,
{
    /// Create a new repository for entity `E`.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            db,
            _entity: PhantomData,
        }
    }

    /// Select exactly the rows with the given ids, ordered as `ids` is.
    ///
    /// The order comes from a `CASE id WHEN .. THEN rank` clause so the
    /// ranking supplied by the index survives the fetch.
    #[must_use]
    pub fn ranked_query(ids: &[String]) -> Select<E> {
        let id_column = E::id_column();
        let rank = ids
            .iter()
            .enumerate()
            .fold(CaseStatement::new(), |case, (position, id)| {
                case.case(id_column.eq(id.as_str()), position as i64)
            })
            .finally(ids.len() as i64);

        E::find()
            .filter(id_column.is_in(ids.iter().map(String::as_str)))
            .order_by(SimpleExpr::Case(Box::new(rank)), Order::Asc)
    }

    /// Fetch the rows with the given ids, preserving the order of `ids`.
    /// Ids with no row are skipped.
    pub async fn find_ranked(&self, ids: &[String]) -> AppResult<Vec<E::Model>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }

        debug!(
            index = E::INDEX,
            sql = %Self::ranked_sql(self.db.get_database_backend(), ids),
            "Fetching ranked rows"
        );
        Self::ranked_query(ids)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Fetch one batch of rows in primary-key order. `batch` is 0-based.
    pub async fn fetch_batch(&self, batch: u64, batch_size: u64) -> AppResult<Vec<E::Model>> {
        E::find()
            .order_by_asc(E::id_column())
            .paginate(self.db.as_ref(), batch_size)
            .fetch_page(batch)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Count every row of the entity.
    pub async fn count(&self) -> AppResult<u64> {
        E::find()
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// SQL of [`Self::ranked_query`] for the given backend.
    #[must_use]
    pub fn ranked_sql(backend: sea_orm::DatabaseBackend, ids: &[String]) -> String {
        Self::ranked_query(ids).build(backend).to_string()
    }
}
