//! Following repository (the `followers` junction table).

use std::sync::Arc;

use crate::entities::{Following, following};
use crate::unit_of_work::UnitOfWork;
use flock_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
};

/// Following repository for database operations.
#[derive(Clone)]
pub struct FollowingRepository {
    db: Arc<DatabaseConnection>,
}

impl FollowingRepository {
    /// Create a new following repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a following relationship by follower and followed user.
    pub async fn find_by_pair(
        &self,
        follower_id: &str,
        followed_id: &str,
    ) -> AppResult<Option<following::Model>> {
        find_pair(self.db.as_ref(), follower_id, followed_id).await
    }

    /// Check if a user is following another user.
    pub async fn is_following(&self, follower_id: &str, followed_id: &str) -> AppResult<bool> {
        Ok(self.find_by_pair(follower_id, followed_id).await?.is_some())
    }

    /// Check if a user is following another user, seeing the unit's own
    /// uncommitted writes.
    pub async fn is_following_in(
        &self,
        uow: &UnitOfWork,
        follower_id: &str,
        followed_id: &str,
    ) -> AppResult<bool> {
        Ok(find_pair(uow.connection(), follower_id, followed_id)
            .await?
            .is_some())
    }

    /// Create a new following relationship.
    pub async fn create(
        &self,
        uow: &UnitOfWork,
        model: following::ActiveModel,
    ) -> AppResult<following::Model> {
        model
            .insert(uow.connection())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Delete a following relationship by pair. Returns whether an edge
    /// was removed.
    pub async fn delete_by_pair(
        &self,
        uow: &UnitOfWork,
        follower_id: &str,
        followed_id: &str,
    ) -> AppResult<bool> {
        let result = Following::delete_many()
            .filter(following::Column::FollowerId.eq(follower_id))
            .filter(following::Column::FollowedId.eq(followed_id))
            .exec(uow.connection())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected > 0)
    }

    /// IDs of every user that a user follows.
    pub async fn followed_ids(&self, user_id: &str) -> AppResult<Vec<String>> {
        Following::find()
            .filter(following::Column::FollowerId.eq(user_id))
            .select_only()
            .column(following::Column::FollowedId)
            .into_tuple::<String>()
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get users that a user is following (paginated, newest first).
    pub async fn find_following(
        &self,
        user_id: &str,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<following::Model>> {
        Following::find()
            .filter(following::Column::FollowerId.eq(user_id))
            .order_by_desc(following::Column::CreatedAt)
            .order_by_desc(following::Column::Id)
            .limit(limit)
            .offset(offset)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get users that are following a user (paginated, newest first).
    pub async fn find_followers(
        &self,
        user_id: &str,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<following::Model>> {
        Following::find()
            .filter(following::Column::FollowedId.eq(user_id))
            .order_by_desc(following::Column::CreatedAt)
            .order_by_desc(following::Column::Id)
            .limit(limit)
            .offset(offset)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Count followers of a user.
    pub async fn count_followers(&self, user_id: &str) -> AppResult<u64> {
        Following::find()
            .filter(following::Column::FollowedId.eq(user_id))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Count following of a user.
    pub async fn count_following(&self, user_id: &str) -> AppResult<u64> {
        Following::find()
            .filter(following::Column::FollowerId.eq(user_id))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

async fn find_pair<C: ConnectionTrait>(
    conn: &C,
    follower_id: &str,
    followed_id: &str,
) -> AppResult<Option<following::Model>> {
    Following::find()
        .filter(following::Column::FollowerId.eq(follower_id))
        .filter(following::Column::FollowedId.eq(followed_id))
        .one(conn)
        .await
        .map_err(|e| AppError::Database(e.to_string()))
}
