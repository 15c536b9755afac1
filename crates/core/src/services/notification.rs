//! Notification service.
//!
//! Notifications are named. Adding one replaces any live notification of
//! the same name for the same user, so each name holds only its latest
//! payload (an unread counter, a task's progress).

use chrono::{DateTime, Utc};
use flock_common::{AppResult, IdGenerator};
use flock_db::{UnitOfWork, entities::notification, repositories::NotificationRepository};
use sea_orm::Set;
use serde::Serialize;
use tracing::debug;

/// Unix seconds with sub-second precision.
#[must_use]
pub fn unix_seconds(at: DateTime<Utc>) -> f64 {
    at.timestamp_micros() as f64 / 1_000_000.0
}

/// Notification service for business logic.
#[derive(Clone)]
pub struct NotificationService {
    notification_repo: NotificationRepository,
    id_gen: IdGenerator,
}

impl NotificationService {
    /// Create a new notification service.
    #[must_use]
    pub const fn new(notification_repo: NotificationRepository) -> Self {
        Self {
            notification_repo,
            id_gen: IdGenerator::new(),
        }
    }

    /// Add a notification named `name` for a user, replacing any previous
    /// one with that name.
    pub async fn add_notification<T: Serialize + ?Sized>(
        &self,
        uow: &UnitOfWork,
        user_id: &str,
        name: &str,
        data: &T,
    ) -> AppResult<notification::Model> {
        let payload_json = serde_json::to_string(data)?;

        let replaced = self
            .notification_repo
            .delete_by_name(uow, user_id, name)
            .await?;

        let model = notification::ActiveModel {
            id: Set(self.id_gen.generate()),
            user_id: Set(user_id.to_string()),
            name: Set(name.to_string()),
            timestamp: Set(unix_seconds(Utc::now())),
            payload_json: Set(payload_json),
        };
        let created = self.notification_repo.create(uow, model).await?;

        debug!(user_id, name, replaced, "Added notification");
        Ok(created)
    }

    /// Notifications of a user newer than `since` (Unix seconds), oldest
    /// first.
    pub async fn notifications_since(
        &self,
        user_id: &str,
        since: f64,
    ) -> AppResult<Vec<notification::Model>> {
        self.notification_repo.find_since(user_id, since).await
    }

    /// The live notification of a user with the given name, if any.
    pub async fn get_by_name(
        &self,
        user_id: &str,
        name: &str,
    ) -> AppResult<Option<notification::Model>> {
        Ok(self
            .notification_repo
            .find_by_name(user_id, name)
            .await?
            .into_iter()
            .next())
    }

    /// Number of live notifications of a user.
    pub async fn count(&self, user_id: &str) -> AppResult<u64> {
        self.notification_repo.count_for_user(user_id).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};
    use serde_json::json;
    use std::sync::Arc;

    fn create_test_notification(name: &str, payload: &str) -> notification::Model {
        notification::Model {
            id: "n1".to_string(),
            user_id: "user1".to_string(),
            name: name.to_string(),
            timestamp: 1_700_000_000.5,
            payload_json: payload.to_string(),
        }
    }

    #[test]
    fn test_unix_seconds_keeps_fraction() {
        let at = Utc.timestamp_opt(1_700_000_000, 250_000_000).unwrap();
        assert_eq!(unix_seconds(at), 1_700_000_000.25);
    }

    #[tokio::test]
    async fn test_add_notification_deletes_then_inserts() {
        let stored = create_test_notification("unread_message_count", "3");
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }])
            .append_query_results([[stored]])
            .into_connection();
        let repo_db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection());
        let service = NotificationService::new(NotificationRepository::new(repo_db));

        let uow = UnitOfWork::begin(&db).await.unwrap();
        let created = service
            .add_notification(&uow, "user1", "unread_message_count", &3)
            .await
            .unwrap();
        uow.commit().await.unwrap();

        assert_eq!(created.get_data().unwrap(), json!(3));

        let statements = format!("{:?}", db.into_transaction_log());
        let delete_at = statements.find("DELETE FROM").unwrap();
        let insert_at = statements.find("INSERT INTO").unwrap();
        assert!(delete_at < insert_at);
    }

    #[tokio::test]
    async fn test_get_by_name_returns_latest() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[create_test_notification("task", r#"{"a":2}"#)]])
                .into_connection(),
        );
        let service = NotificationService::new(NotificationRepository::new(db));

        let found = service.get_by_name("user1", "task").await.unwrap().unwrap();

        assert_eq!(found.get_data().unwrap(), json!({"a": 2}));
    }
}
