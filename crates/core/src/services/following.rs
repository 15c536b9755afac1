//! Following service.

use flock_common::{AppResult, IdGenerator};
use flock_db::{UnitOfWork, entities::following, repositories::FollowingRepository};
use sea_orm::Set;
use tracing::debug;

/// Following service for business logic.
///
/// Writes happen inside the caller's [`UnitOfWork`]; nothing here commits.
#[derive(Clone)]
pub struct FollowingService {
    following_repo: FollowingRepository,
    id_gen: IdGenerator,
}

impl FollowingService {
    /// Create a new following service.
    #[must_use]
    pub const fn new(following_repo: FollowingRepository) -> Self {
        Self {
            following_repo,
            id_gen: IdGenerator::new(),
        }
    }

    /// Follow a user. Returns whether a new edge was created.
    ///
    /// Following someone already followed, or following yourself, changes
    /// nothing and returns `false`.
    pub async fn follow(
        &self,
        uow: &UnitOfWork,
        follower_id: &str,
        followee_id: &str,
    ) -> AppResult<bool> {
        if follower_id == followee_id {
            return Ok(false);
        }

        if self
            .following_repo
            .is_following_in(uow, follower_id, followee_id)
            .await?
        {
            return Ok(false);
        }

        let model = following::ActiveModel {
            id: Set(self.id_gen.generate()),
            follower_id: Set(follower_id.to_string()),
            followed_id: Set(followee_id.to_string()),
            created_at: Set(chrono::Utc::now().into()),
        };
        self.following_repo.create(uow, model).await?;

        debug!(follower_id, followee_id, "Followed user");
        Ok(true)
    }

    /// Unfollow a user. Returns whether an edge was removed.
    pub async fn unfollow(
        &self,
        uow: &UnitOfWork,
        follower_id: &str,
        followee_id: &str,
    ) -> AppResult<bool> {
        if follower_id == followee_id {
            return Ok(false);
        }

        let removed = self
            .following_repo
            .delete_by_pair(uow, follower_id, followee_id)
            .await?;

        if removed {
            debug!(follower_id, followee_id, "Unfollowed user");
        }
        Ok(removed)
    }

    /// Check whether `follower_id` follows `followee_id`.
    pub async fn is_following(&self, follower_id: &str, followee_id: &str) -> AppResult<bool> {
        self.following_repo
            .is_following(follower_id, followee_id)
            .await
    }

    /// IDs of every user that a user follows.
    pub async fn followed_ids(&self, user_id: &str) -> AppResult<Vec<String>> {
        self.following_repo.followed_ids(user_id).await
    }

    /// Followers of a user (paginated, newest first).
    pub async fn get_followers(
        &self,
        user_id: &str,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<following::Model>> {
        self.following_repo
            .find_followers(user_id, limit, offset)
            .await
    }

    /// Users a user follows (paginated, newest first).
    pub async fn get_following(
        &self,
        user_id: &str,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<following::Model>> {
        self.following_repo
            .find_following(user_id, limit, offset)
            .await
    }

    /// Number of followers of a user.
    pub async fn count_followers(&self, user_id: &str) -> AppResult<u64> {
        self.following_repo.count_followers(user_id).await
    }

    /// Number of users a user follows.
    pub async fn count_following(&self, user_id: &str) -> AppResult<u64> {
        self.following_repo.count_following(user_id).await
    }
}
