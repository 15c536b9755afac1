//! Test utilities for database operations.
//!
//! Provides a migrated database for behavioural tests and a few fixture
//! helpers. By default the database is an in-memory SQLite instance; set
//! `TEST_DATABASE_URL` to run against another server instead.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ConnectOptions, Database, DatabaseConnection, DbErr, EntityTrait, Set,
};
use sea_orm_migration::MigratorTrait;
use tracing::info;

use crate::entities::{Following, Message, Notification, Post, User, following, post, user};
use crate::migrations::Migrator;

/// In-memory SQLite URL used when `TEST_DATABASE_URL` is unset.
pub const SQLITE_MEMORY_URL: &str = "sqlite::memory:";

/// A migrated test database.
pub struct TestDatabase {
    /// Database connection.
    pub conn: Arc<DatabaseConnection>,
}

impl TestDatabase {
    /// Connect to the test database and run migrations.
    pub async fn new() -> Result<Self, DbErr> {
        let url =
            std::env::var("TEST_DATABASE_URL").unwrap_or_else(|_| SQLITE_MEMORY_URL.to_string());
        Self::with_url(&url).await
    }

    /// Connect to `url` and run migrations.
    ///
    /// An in-memory SQLite database lives as long as its connection, so
    /// the pool is pinned to exactly one connection in that case.
    pub async fn with_url(url: &str) -> Result<Self, DbErr> {
        let mut opt = ConnectOptions::new(url);
        if url.starts_with("sqlite") && url.contains(":memory:") {
            opt.max_connections(1).min_connections(1);
        }
        opt.acquire_timeout(Duration::from_secs(5)).sqlx_logging(false);

        let conn = Database::connect(opt).await?;
        Migrator::up(&conn, None).await?;

        info!(url = %url, "Connected to migrated test database");

        Ok(Self {
            conn: Arc::new(conn),
        })
    }

    /// Get the database connection.
    #[must_use]
    pub fn connection(&self) -> &DatabaseConnection {
        self.conn.as_ref()
    }

    /// Shared handle to the connection, as repositories take it.
    #[must_use]
    pub fn shared(&self) -> Arc<DatabaseConnection> {
        self.conn.clone()
    }

    /// Delete every row, children first.
    pub async fn cleanup(&self) -> Result<(), DbErr> {
        let db = self.connection();
        Notification::delete_many().exec(db).await?;
        Message::delete_many().exec(db).await?;
        Post::delete_many().exec(db).await?;
        Following::delete_many().exec(db).await?;
        User::delete_many().exec(db).await?;

        info!("Cleaned up test database");
        Ok(())
    }

    /// Insert a user directly, outside any unit of work.
    pub async fn insert_user(&self, id: &str, username: &str) -> Result<user::Model, DbErr> {
        user::ActiveModel {
            id: Set(id.to_string()),
            username: Set(username.to_string()),
            email: Set(format!("{username}@example.com")),
            password_hash: Set(None),
            about_me: Set(None),
            last_seen: Set(None),
            last_message_read_time: Set(None),
            created_at: Set(Utc::now().into()),
        }
        .insert(self.connection())
        .await
    }

    /// Insert a post with an explicit creation time.
    pub async fn insert_post(
        &self,
        id: &str,
        user_id: &str,
        body: &str,
        created_at: DateTime<Utc>,
    ) -> Result<post::Model, DbErr> {
        post::ActiveModel {
            id: Set(id.to_string()),
            user_id: Set(user_id.to_string()),
            body: Set(body.to_string()),
            created_at: Set(created_at.into()),
        }
        .insert(self.connection())
        .await
    }

    /// Insert a follow edge.
    pub async fn insert_follow(
        &self,
        follower_id: &str,
        followed_id: &str,
    ) -> Result<following::Model, DbErr> {
        following::ActiveModel {
            id: Set(format!("{follower_id}->{followed_id}")),
            follower_id: Set(follower_id.to_string()),
            followed_id: Set(followed_id.to_string()),
            created_at: Set(Utc::now().into()),
        }
        .insert(self.connection())
        .await
    }
}
