//! Post service.

use chrono::Utc;
use flock_common::{AppError, AppResult, IdGenerator};
use flock_db::{
    UnitOfWork,
    entities::post::{self, MAX_BODY_LENGTH},
    repositories::PostRepository,
};
use sea_orm::{IntoActiveModel, Set};
use tracing::debug;

/// Post service for business logic.
///
/// Writes are staged on the unit of work so that a search observer
/// registered on it can mirror them once the unit commits.
#[derive(Clone)]
pub struct PostService {
    post_repo: PostRepository,
    id_gen: IdGenerator,
}

fn validate_body(body: &str) -> AppResult<&str> {
    let body = body.trim();
    if body.is_empty() {
        return Err(AppError::Validation("post body is required".to_string()));
    }
    if body.chars().count() > MAX_BODY_LENGTH {
        return Err(AppError::Validation(format!(
            "post body must be at most {MAX_BODY_LENGTH} characters"
        )));
    }
    Ok(body)
}

impl PostService {
    /// Create a new post service.
    #[must_use]
    pub const fn new(post_repo: PostRepository) -> Self {
        Self {
            post_repo,
            id_gen: IdGenerator::new(),
        }
    }

    /// Publish a post.
    pub async fn create(
        &self,
        uow: &mut UnitOfWork,
        user_id: &str,
        body: &str,
    ) -> AppResult<post::Model> {
        let body = validate_body(body)?;

        let model = post::ActiveModel {
            id: Set(self.id_gen.generate()),
            user_id: Set(user_id.to_string()),
            body: Set(body.to_string()),
            created_at: Set(Utc::now().into()),
        };

        let post = self.post_repo.create(uow, model).await?;
        debug!(post_id = %post.id, user_id, "Created post");
        Ok(post)
    }

    /// Replace the body of a post owned by `user_id`.
    pub async fn edit(
        &self,
        uow: &mut UnitOfWork,
        user_id: &str,
        post_id: &str,
        body: &str,
    ) -> AppResult<post::Model> {
        let body = validate_body(body)?;

        let post = self
            .post_repo
            .find_by_id_in(uow, post_id)
            .await?
            .filter(|p| p.user_id == user_id)
            .ok_or_else(|| AppError::PostNotFound(post_id.to_string()))?;

        let mut active = post.into_active_model();
        active.body = Set(body.to_string());

        self.post_repo.update(uow, active).await
    }

    /// Delete a post owned by `user_id`. Returns whether it existed.
    pub async fn delete(
        &self,
        uow: &mut UnitOfWork,
        user_id: &str,
        post_id: &str,
    ) -> AppResult<bool> {
        let owned = self
            .post_repo
            .find_by_id_in(uow, post_id)
            .await?
            .is_some_and(|p| p.user_id == user_id);
        if !owned {
            return Ok(false);
        }

        self.post_repo.delete(uow, post_id).await
    }

    /// Get a post by ID.
    pub async fn get(&self, post_id: &str) -> AppResult<post::Model> {
        self.post_repo.get_by_id(post_id).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase};
    use std::sync::Arc;

    fn create_test_post(id: &str, user_id: &str, body: &str) -> post::Model {
        post::Model {
            id: id.to_string(),
            user_id: user_id.to_string(),
            body: body.to_string(),
            created_at: Utc::now().into(),
        }
    }

    fn service() -> PostService {
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection());
        PostService::new(PostRepository::new(db))
    }

    #[test]
    fn test_validate_body() {
        assert_eq!(validate_body("  hi  ").unwrap(), "hi");
        assert!(validate_body("   ").is_err());
        assert!(validate_body(&"é".repeat(MAX_BODY_LENGTH)).is_ok());
        assert!(matches!(
            validate_body(&"x".repeat(MAX_BODY_LENGTH + 1)),
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_create_stages_post() {
        let stored = create_test_post("p1", "user1", "hello");
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[stored]])
            .into_connection();
        let mut uow = UnitOfWork::begin(&db).await.unwrap();

        let post = service().create(&mut uow, "user1", "hello").await.unwrap();

        assert_eq!(post.body, "hello");
        assert_eq!(uow.pending().added().len(), 1);
    }

    #[tokio::test]
    async fn test_edit_someone_elses_post_is_not_found() {
        let stored = create_test_post("p1", "user2", "theirs");
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[stored]])
            .into_connection();
        let mut uow = UnitOfWork::begin(&db).await.unwrap();

        let result = service().edit(&mut uow, "user1", "p1", "mine now").await;

        assert!(matches!(result, Err(AppError::PostNotFound(_))));
        assert!(uow.pending().is_empty());
    }

    #[tokio::test]
    async fn test_delete_missing_post_is_false() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<post::Model>::new()])
            .into_connection();
        let mut uow = UnitOfWork::begin(&db).await.unwrap();

        assert!(!service().delete(&mut uow, "user1", "p1").await.unwrap());
    }
}
