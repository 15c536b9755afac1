//! User repository.

use std::sync::Arc;

use crate::entities::{Post, User, post, user};
use crate::unit_of_work::UnitOfWork;
use flock_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
};

/// User repository for database operations.
#[derive(Clone)]
pub struct UserRepository {
    db: Arc<DatabaseConnection>,
}

impl UserRepository {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a user by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<user::Model>> {
        User::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find a user by ID, returning an error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<user::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::UserNotFound(id.to_string()))
    }

    /// Find a user by ID inside a unit of work.
    pub async fn get_by_id_in(&self, uow: &UnitOfWork, id: &str) -> AppResult<user::Model> {
        User::find_by_id(id)
            .one(uow.connection())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
            .ok_or_else(|| AppError::UserNotFound(id.to_string()))
    }

    /// Find a user by username.
    pub async fn find_by_username(&self, username: &str) -> AppResult<Option<user::Model>> {
        find_by_column(self.db.as_ref(), user::Column::Username, username).await
    }

    /// Find a user by email.
    pub async fn find_by_email(&self, email: &str) -> AppResult<Option<user::Model>> {
        find_by_column(self.db.as_ref(), user::Column::Email, email).await
    }

    /// Whether a username or email is already registered, checked inside a
    /// unit of work.
    pub async fn identity_taken(
        &self,
        uow: &UnitOfWork,
        username: &str,
        email: &str,
    ) -> AppResult<bool> {
        let conn = uow.connection();
        Ok(find_by_column(conn, user::Column::Username, username)
            .await?
            .is_some()
            || find_by_column(conn, user::Column::Email, email)
                .await?
                .is_some())
    }

    /// Create a new user.
    pub async fn create(
        &self,
        uow: &UnitOfWork,
        model: user::ActiveModel,
    ) -> AppResult<user::Model> {
        model
            .insert(uow.connection())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Update a user.
    pub async fn update(
        &self,
        uow: &UnitOfWork,
        model: user::ActiveModel,
    ) -> AppResult<user::Model> {
        model
            .update(uow.connection())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Delete a user. Follow edges, posts, messages and notifications go
    /// with it through `ON DELETE CASCADE`; the cascaded posts are staged
    /// as deleted so they also leave the search index.
    pub async fn delete(&self, uow: &mut UnitOfWork, id: &str) -> AppResult<bool> {
        let posts = Post::find()
            .filter(post::Column::UserId.eq(id))
            .all(uow.connection())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let result = User::delete_by_id(id)
            .exec(uow.connection())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        if result.rows_affected == 0 {
            return Ok(false);
        }

        for post in &posts {
            uow.track_deleted(post);
        }
        Ok(true)
    }
}

async fn find_by_column<C: ConnectionTrait>(
    conn: &C,
    column: user::Column,
    value: &str,
) -> AppResult<Option<user::Model>> {
    User::find()
        .filter(column.eq(value))
        .one(conn)
        .await
        .map_err(|e| AppError::Database(e.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    fn create_test_user(id: &str, username: &str) -> user::Model {
        user::Model {
            id: id.to_string(),
            username: username.to_string(),
            email: format!("{username}@example.com"),
            password_hash: None,
            about_me: None,
            last_seen: None,
            last_message_read_time: None,
            created_at: Utc::now().into(),
        }
    }

    #[tokio::test]
    async fn test_find_by_id_found() {
        let user = create_test_user("user1", "alice");

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[user.clone()]])
                .into_connection(),
        );

        let repo = UserRepository::new(db);
        let result = repo.find_by_id("user1").await.unwrap();

        assert_eq!(result.unwrap().username, "alice");
    }

    #[tokio::test]
    async fn test_get_by_id_not_found_returns_error() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<user::Model>::new()])
                .into_connection(),
        );

        let repo = UserRepository::new(db);
        let result = repo.get_by_id("ghost").await;

        match result {
            Err(AppError::UserNotFound(id)) => assert_eq!(id, "ghost"),
            _ => panic!("Expected UserNotFound error"),
        }
    }

    #[tokio::test]
    async fn test_find_by_email() {
        let user = create_test_user("user1", "alice");

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[user]])
                .into_connection(),
        );

        let repo = UserRepository::new(db);
        let result = repo.find_by_email("alice@example.com").await.unwrap();

        assert_eq!(result.unwrap().id, "user1");
    }

    #[tokio::test]
    async fn test_delete_stages_cascaded_posts() {
        let post = post::Model {
            id: "post1".to_string(),
            user_id: "user1".to_string(),
            body: "gone soon".to_string(),
            created_at: Utc::now().into(),
        };
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[post]])
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }])
            .into_connection();

        let repo = UserRepository::new(Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres).into_connection(),
        ));
        let mut uow = UnitOfWork::begin(&db).await.unwrap();

        assert!(repo.delete(&mut uow, "user1").await.unwrap());
        assert_eq!(uow.pending().deleted().len(), 1);
        assert_eq!(uow.pending().deleted()[0].key.id, "post1");
    }
}
