//! Post repository.

use std::sync::Arc;

use crate::entities::{Post, following, post};
use crate::unit_of_work::UnitOfWork;
use flock_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, ModelTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Select, sea_query::Query,
};

/// Post repository for database operations.
#[derive(Clone)]
pub struct PostRepository {
    db: Arc<DatabaseConnection>,
}

impl PostRepository {
    /// Create a new post repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a post by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<post::Model>> {
        Post::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find a post by ID inside a unit of work.
    pub async fn find_by_id_in(
        &self,
        uow: &UnitOfWork,
        id: &str,
    ) -> AppResult<Option<post::Model>> {
        Post::find_by_id(id)
            .one(uow.connection())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find a post by ID, returning an error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<post::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::PostNotFound(id.to_string()))
    }

    /// Get posts by a user (paginated, newest first).
    pub async fn find_by_user(
        &self,
        user_id: &str,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<post::Model>> {
        Post::find()
            .filter(post::Column::UserId.eq(user_id))
            .order_by_desc(post::Column::CreatedAt)
            .order_by_desc(post::Column::Id)
            .limit(limit)
            .offset(offset)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Insert a post and stage it for indexing.
    pub async fn create(
        &self,
        uow: &mut UnitOfWork,
        model: post::ActiveModel,
    ) -> AppResult<post::Model> {
        let created = model
            .insert(uow.connection())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        uow.track_added(&created);
        Ok(created)
    }

    /// Update a post and stage the new body for indexing.
    pub async fn update(
        &self,
        uow: &mut UnitOfWork,
        model: post::ActiveModel,
    ) -> AppResult<post::Model> {
        let updated = model
            .update(uow.connection())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        uow.track_modified(&updated);
        Ok(updated)
    }

    /// Delete a post and stage its removal from the index.
    /// Returns whether a row was deleted.
    pub async fn delete(&self, uow: &mut UnitOfWork, id: &str) -> AppResult<bool> {
        let Some(existing) = Post::find_by_id(id)
            .one(uow.connection())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
        else {
            return Ok(false);
        };

        existing
            .clone()
            .delete(uow.connection())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        uow.track_deleted(&existing);
        Ok(true)
    }

    /// The home timeline of `viewer_id` as a single query: posts whose author
    /// the viewer follows plus the viewer's own posts, newest first.
    ///
    /// The followed authors come from a semi-join against the `followers`
    /// table, so every post appears at most once and pagination applies to
    /// one global order. Equal timestamps fall back to id order, which is
    /// insertion order for ULIDs.
    #[must_use]
    pub fn followed_posts_query(viewer_id: &str) -> Select<Post> {
        let followed_authors = Query::select()
            .column(following::Column::FollowedId)
            .from(following::Entity)
            .and_where(following::Column::FollowerId.eq(viewer_id))
            .to_owned();

        Post::find()
            .filter(
                Condition::any()
                    .add(post::Column::UserId.in_subquery(followed_authors))
                    .add(post::Column::UserId.eq(viewer_id)),
            )
            .order_by_desc(post::Column::CreatedAt)
            .order_by_desc(post::Column::Id)
    }

    /// Get the home timeline of a user (paginated).
    pub async fn find_followed_posts(
        &self,
        viewer_id: &str,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<post::Model>> {
        Self::followed_posts_query(viewer_id)
            .limit(limit)
            .offset(offset)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Count the posts on a user's home timeline.
    pub async fn count_followed_posts(&self, viewer_id: &str) -> AppResult<u64> {
        Self::followed_posts_query(viewer_id)
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
