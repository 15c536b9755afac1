//! Search index synchronization and search.
//!
//! Writes to searchable rows are mirrored into a [`SearchIndex`] only once
//! the transaction that made them has committed. A unit of work opened with
//! [`SearchService::begin`] carries an [`IndexSyncObserver`]: it snapshots
//! the unit's change set right before the commit and replays it against the
//! index right after. A rolled back unit never reaches the index.
//!
//! Queries go to the index for ranked ids, then to the database for the
//! rows, keeping the index order.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use flock_common::{AppError, AppResult, config::SearchConfig};
use flock_db::{
    ChangeSet, CommitObserver, Indexable, SearchableEntity, UnitOfWork,
    repositories::SearchableRepository,
};
use sea_orm::DatabaseConnection;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::services::search_index::SearchIndex;

/// Run an index call under `limit`, folding a timeout into an error.
async fn with_timeout<T>(
    limit: Duration,
    what: &str,
    call: impl Future<Output = AppResult<T>>,
) -> AppResult<T> {
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(AppError::ExternalService(format!(
            "{what} timed out after {}ms",
            limit.as_millis()
        ))),
    }
}

/// Commit observer that mirrors a unit's searchable changes into an index.
///
/// One observer belongs to one unit of work. Between `before_commit` and
/// `after_commit` it holds the staged change set; rollback drops it.
pub struct IndexSyncObserver {
    index: Arc<dyn SearchIndex>,
    timeout: Duration,
    pending: Mutex<Option<ChangeSet>>,
}

impl IndexSyncObserver {
    /// Create an observer writing to `index`.
    #[must_use]
    pub fn new(index: Arc<dyn SearchIndex>, timeout: Duration) -> Self {
        Self {
            index,
            timeout,
            pending: Mutex::new(None),
        }
    }

    /// Whether a change set is staged and waiting for the commit.
    pub async fn is_staging(&self) -> bool {
        self.pending.lock().await.is_some()
    }
}

#[async_trait]
impl CommitObserver for IndexSyncObserver {
    fn name(&self) -> &'static str {
        "search_index"
    }

    async fn before_commit(&self, changes: &ChangeSet) -> AppResult<()> {
        *self.pending.lock().await = Some(changes.clone());
        Ok(())
    }

    async fn after_commit(&self) -> AppResult<()> {
        let Some(changes) = self.pending.lock().await.take() else {
            return Ok(());
        };
        if changes.is_empty() {
            return Ok(());
        }

        let mut failures = 0usize;

        for staged in changes.added().iter().chain(changes.modified()) {
            let call = self.index.add_to_index(&staged.key, &staged.fields);
            if let Err(e) = with_timeout(self.timeout, "add_to_index", call).await {
                failures += 1;
                warn!(key = %staged.key, backend = self.index.name(), error = %e, "Failed to index document");
            }
        }

        for staged in changes.deleted() {
            let call = self.index.remove_from_index(&staged.key);
            if let Err(e) = with_timeout(self.timeout, "remove_from_index", call).await {
                failures += 1;
                warn!(key = %staged.key, backend = self.index.name(), error = %e, "Failed to remove document from index");
            }
        }

        debug!(
            added = changes.added().len(),
            modified = changes.modified().len(),
            deleted = changes.deleted().len(),
            failures,
            "Search index synchronized"
        );

        if failures > 0 {
            return Err(AppError::ExternalService(format!(
                "{failures} of {} index updates failed",
                changes.len()
            )));
        }
        Ok(())
    }

    async fn after_rollback(&self) {
        if let Some(changes) = self.pending.lock().await.take() {
            debug!(discarded = changes.len(), "Discarded staged index changes");
        }
    }
}

/// Search service: index-backed queries, reindexing, and the units of work
/// that keep the index in sync.
#[derive(Clone)]
pub struct SearchService {
    db: Arc<DatabaseConnection>,
    index: Arc<dyn SearchIndex>,
    config: SearchConfig,
}

impl SearchService {
    /// Create a new search service.
    #[must_use]
    pub fn new(
        db: Arc<DatabaseConnection>,
        index: Arc<dyn SearchIndex>,
        config: SearchConfig,
    ) -> Self {
        Self { db, index, config }
    }

    /// The index backend.
    #[must_use]
    pub fn index(&self) -> &Arc<dyn SearchIndex> {
        &self.index
    }

    /// A fresh observer for one unit of work.
    #[must_use]
    pub fn observer(&self) -> Arc<IndexSyncObserver> {
        Arc::new(IndexSyncObserver::new(
            self.index.clone(),
            self.config.timeout(),
        ))
    }

    /// Begin a unit of work whose committed changes reach the index.
    pub async fn begin(&self) -> AppResult<UnitOfWork> {
        let mut uow = UnitOfWork::begin(self.db.as_ref()).await?;
        uow.register(self.observer());
        Ok(uow)
    }

    /// Search the rows of `E` matching `expression`.
    ///
    /// Returns one page of rows in rank order and the total number of
    /// matches. `page` is 1-based. Ids the index returns for rows that no
    /// longer exist are skipped.
    pub async fn search<E>(
        &self,
        expression: &str,
        page: u64,
        per_page: u64,
    ) -> AppResult<(Vec<E::Model>, u64)>
    where
        E: SearchableEntity,
        E::Model: Indexable + Sync,
    {
        if page == 0 || per_page == 0 {
            return Err(AppError::Validation(
                "page and per_page must be at least 1".to_string(),
            ));
        }

        let call = self.index.query_index(E::INDEX, expression, page, per_page);
        let hits = with_timeout(self.config.timeout(), "query_index", call)
            .await
            .map_err(|e| {
                warn!(index = E::INDEX, backend = self.index.name(), error = %e, "Search query failed");
                AppError::SearchUnavailable(e.to_string())
            })?;

        if hits.total == 0 {
            return Ok((vec![], 0));
        }

        let rows = SearchableRepository::<E>::new(self.db.clone())
            .find_ranked(&hits.ids)
            .await?;

        Ok((rows, hits.total))
    }

    /// Push every persisted row of `E` into the index. Returns the number
    /// of rows indexed.
    pub async fn reindex<E>(&self) -> AppResult<u64>
    where
        E: SearchableEntity,
        E::Model: Indexable + Sync,
    {
        let repo = SearchableRepository::<E>::new(self.db.clone());
        let batch_size = self.config.reindex_batch_size.max(1);
        let mut indexed = 0u64;

        for batch in 0.. {
            let rows = repo.fetch_batch(batch, batch_size).await?;
            if rows.is_empty() {
                break;
            }

            for row in &rows {
                let key = row.index_key();
                let fields = row.index_fields();
                with_timeout(
                    self.config.timeout(),
                    "add_to_index",
                    self.index.add_to_index(&key, &fields),
                )
                .await?;
            }

            indexed += rows.len() as u64;
            debug!(index = E::INDEX, batch, indexed, "Reindexed batch");

            if (rows.len() as u64) < batch_size {
                break;
            }
        }

        info!(index = E::INDEX, indexed, backend = self.index.name(), "Reindex complete");
        Ok(indexed)
    }
}
