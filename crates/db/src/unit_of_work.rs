//! Transaction scope with commit observers.
//!
//! A [`UnitOfWork`] wraps one database transaction. Repository writes made
//! through it record the searchable rows they touch in a [`ChangeSet`].
//! Observers registered on the unit see that change set right before the
//! commit and are told once the commit is durable. Nothing is registered
//! globally: each unit carries its own observers and drops them with it.

use std::sync::Arc;

use async_trait::async_trait;
use flock_common::{AppError, AppResult};
use sea_orm::{DatabaseConnection, DatabaseTransaction, TransactionTrait};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::indexable::{IndexKey, Indexable};

/// Snapshot of one searchable row as it was when it was written.
#[derive(Clone, Debug, PartialEq)]
pub struct StagedEntity {
    /// Document key.
    pub key: IndexKey,
    /// Searchable fields at write time.
    pub fields: Map<String, Value>,
}

impl StagedEntity {
    /// Snapshot an indexable value.
    #[must_use]
    pub fn of<T: Indexable + ?Sized>(entity: &T) -> Self {
        Self {
            key: entity.index_key(),
            fields: entity.index_fields(),
        }
    }
}

/// Searchable rows added, modified and deleted within one unit of work.
///
/// Each key appears in at most one of the three lists:
/// - modifying a row added in the same unit refreshes the added snapshot;
/// - deleting a row added in the same unit forgets it entirely;
/// - deleting a modified row moves it to the deleted list.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChangeSet {
    added: Vec<StagedEntity>,
    modified: Vec<StagedEntity>,
    deleted: Vec<StagedEntity>,
}

impl ChangeSet {
    /// Rows inserted in this unit.
    #[must_use]
    pub fn added(&self) -> &[StagedEntity] {
        &self.added
    }

    /// Rows updated in this unit that existed before it.
    #[must_use]
    pub fn modified(&self) -> &[StagedEntity] {
        &self.modified
    }

    /// Rows deleted in this unit that existed before it.
    #[must_use]
    pub fn deleted(&self) -> &[StagedEntity] {
        &self.deleted
    }

    /// Total number of tracked rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.added.len() + self.modified.len() + self.deleted.len()
    }

    /// Whether nothing searchable was touched.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Record an insert.
    pub fn record_added(&mut self, staged: StagedEntity) {
        Self::upsert(&mut self.added, staged);
    }

    /// Record an update.
    pub fn record_modified(&mut self, staged: StagedEntity) {
        if let Some(existing) = self.added.iter_mut().find(|s| s.key == staged.key) {
            *existing = staged;
            return;
        }
        Self::upsert(&mut self.modified, staged);
    }

    /// Record a delete.
    pub fn record_deleted(&mut self, staged: StagedEntity) {
        let before = self.added.len();
        self.added.retain(|s| s.key != staged.key);
        if self.added.len() != before {
            return;
        }
        self.modified.retain(|s| s.key != staged.key);
        Self::upsert(&mut self.deleted, staged);
    }

    fn upsert(list: &mut Vec<StagedEntity>, staged: StagedEntity) {
        match list.iter_mut().find(|s| s.key == staged.key) {
            Some(existing) => *existing = staged,
            None => list.push(staged),
        }
    }
}

/// Callback invoked at the commit boundary of a [`UnitOfWork`].
#[async_trait]
pub trait CommitObserver: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &'static str;

    /// Called right before the transaction commits. Returning an error
    /// aborts the commit and rolls the transaction back.
    async fn before_commit(&self, changes: &ChangeSet) -> AppResult<()>;

    /// Called after the transaction has durably committed. Errors are
    /// logged and counted; the commit itself stands.
    async fn after_commit(&self) -> AppResult<()>;

    /// Called when the transaction was rolled back instead of committed.
    async fn after_rollback(&self) {}
}

/// Result of a successful commit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CommitOutcome {
    /// Number of searchable rows that were staged.
    pub changes: usize,
    /// Number of observers whose `after_commit` failed.
    pub observer_failures: usize,
}

/// One database transaction plus the observers interested in its commit.
pub struct UnitOfWork {
    txn: DatabaseTransaction,
    changes: ChangeSet,
    observers: Vec<Arc<dyn CommitObserver>>,
}

impl UnitOfWork {
    /// Begin a new transaction.
    pub async fn begin(db: &DatabaseConnection) -> AppResult<Self> {
        let txn = db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(Self {
            txn,
            changes: ChangeSet::default(),
            observers: Vec::new(),
        })
    }

    /// Register an observer for this transaction only.
    pub fn register(&mut self, observer: Arc<dyn CommitObserver>) {
        self.observers.push(observer);
    }

    /// The transaction to run statements on.
    #[must_use]
    pub const fn connection(&self) -> &DatabaseTransaction {
        &self.txn
    }

    /// Searchable changes staged so far.
    #[must_use]
    pub const fn pending(&self) -> &ChangeSet {
        &self.changes
    }

    /// Record that `entity` was inserted.
    pub fn track_added<T: Indexable + ?Sized>(&mut self, entity: &T) {
        self.changes.record_added(StagedEntity::of(entity));
    }

    /// Record that `entity` was updated.
    pub fn track_modified<T: Indexable + ?Sized>(&mut self, entity: &T) {
        self.changes.record_modified(StagedEntity::of(entity));
    }

    /// Record that `entity` was deleted.
    pub fn track_deleted<T: Indexable + ?Sized>(&mut self, entity: &T) {
        self.changes.record_deleted(StagedEntity::of(entity));
    }

    /// Commit the transaction, running observers around it.
    pub async fn commit(self) -> AppResult<CommitOutcome> {
        let Self {
            txn,
            changes,
            observers,
        } = self;

        for observer in &observers {
            if let Err(e) = observer.before_commit(&changes).await {
                warn!(observer = observer.name(), error = %e, "Pre-commit observer failed, rolling back");
                let rollback = txn.rollback().await;
                notify_rollback(&observers).await;
                rollback.map_err(|e| AppError::Database(e.to_string()))?;
                return Err(e);
            }
        }

        if let Err(e) = txn.commit().await {
            notify_rollback(&observers).await;
            return Err(AppError::Database(e.to_string()));
        }

        debug!(
            added = changes.added().len(),
            modified = changes.modified().len(),
            deleted = changes.deleted().len(),
            "Transaction committed"
        );

        let mut observer_failures = 0;
        for observer in &observers {
            if let Err(e) = observer.after_commit().await {
                observer_failures += 1;
                warn!(observer = observer.name(), error = %e, "Post-commit observer failed");
            }
        }

        Ok(CommitOutcome {
            changes: changes.len(),
            observer_failures,
        })
    }

    /// Roll the transaction back. Observers never see the staged changes.
    pub async fn rollback(self) -> AppResult<()> {
        let result = self.txn.rollback().await;
        notify_rollback(&self.observers).await;
        debug!(discarded = self.changes.len(), "Transaction rolled back");
        result.map_err(|e| AppError::Database(e.to_string()))
    }
}

async fn notify_rollback(observers: &[Arc<dyn CommitObserver>]) {
    for observer in observers {
        observer.after_rollback().await;
    }
}
