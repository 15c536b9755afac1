//! Timeline service.

use flock_common::AppResult;
use flock_db::{entities::post, repositories::PostRepository};

/// Largest page a timeline read may ask for.
pub const MAX_TIMELINE_LIMIT: u64 = 100;

/// Assembles home timelines.
#[derive(Clone)]
pub struct TimelineService {
    post_repo: PostRepository,
}

impl TimelineService {
    /// Create a new timeline service.
    #[must_use]
    pub const fn new(post_repo: PostRepository) -> Self {
        Self { post_repo }
    }

    /// Posts by the viewer and by everyone the viewer follows, newest
    /// first. Posts with the same timestamp are ordered by id, newest
    /// first. `limit` is capped at [`MAX_TIMELINE_LIMIT`].
    pub async fn followed_posts(
        &self,
        viewer_id: &str,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<post::Model>> {
        if limit == 0 {
            return Ok(vec![]);
        }

        self.post_repo
            .find_followed_posts(viewer_id, limit.min(MAX_TIMELINE_LIMIT), offset)
            .await
    }

    /// Number of posts on the viewer's timeline.
    pub async fn count_followed_posts(&self, viewer_id: &str) -> AppResult<u64> {
        self.post_repo.count_followed_posts(viewer_id).await
    }

    /// A user's own posts, newest first.
    pub async fn user_posts(
        &self,
        user_id: &str,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<post::Model>> {
        self.post_repo.find_by_user(user_id, limit, offset).await
    }
}
