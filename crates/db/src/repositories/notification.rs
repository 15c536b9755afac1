//! Notification repository.

use std::sync::Arc;

use crate::entities::{Notification, notification};
use crate::unit_of_work::UnitOfWork;
use flock_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder,
};

/// Notification repository for database operations.
#[derive(Clone)]
pub struct NotificationRepository {
    db: Arc<DatabaseConnection>,
}

impl NotificationRepository {
    /// Create a new notification repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Create a new notification.
    pub async fn create(
        &self,
        uow: &UnitOfWork,
        model: notification::ActiveModel,
    ) -> AppResult<notification::Model> {
        model
            .insert(uow.connection())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Delete every notification of a user with the given name.
    pub async fn delete_by_name(
        &self,
        uow: &UnitOfWork,
        user_id: &str,
        name: &str,
    ) -> AppResult<u64> {
        let result = Notification::delete_many()
            .filter(notification::Column::UserId.eq(user_id))
            .filter(notification::Column::Name.eq(name))
            .exec(uow.connection())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected)
    }

    /// Find the live notifications of a user with the given name.
    pub async fn find_by_name(
        &self,
        user_id: &str,
        name: &str,
    ) -> AppResult<Vec<notification::Model>> {
        Notification::find()
            .filter(notification::Column::UserId.eq(user_id))
            .filter(notification::Column::Name.eq(name))
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Notifications of a user newer than `since`, oldest first.
    pub async fn find_since(
        &self,
        user_id: &str,
        since: f64,
    ) -> AppResult<Vec<notification::Model>> {
        Notification::find()
            .filter(notification::Column::UserId.eq(user_id))
            .filter(notification::Column::Timestamp.gt(since))
            .order_by_asc(notification::Column::Timestamp)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Count notifications of a user.
    pub async fn count_for_user(&self, user_id: &str) -> AppResult<u64> {
        Notification::find()
            .filter(notification::Column::UserId.eq(user_id))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
