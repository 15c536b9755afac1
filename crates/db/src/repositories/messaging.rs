//! Direct message repository.

use crate::entities::message::{self, ActiveModel, Column, Entity as Message};
use crate::unit_of_work::UnitOfWork;
use flock_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, prelude::DateTimeWithTimeZone,
};
use std::sync::Arc;

/// Repository for direct message operations.
#[derive(Clone)]
pub struct MessagingRepository {
    db: Arc<DatabaseConnection>,
}

impl MessagingRepository {
    /// Create a new messaging repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Create a new message.
    pub async fn create(&self, uow: &UnitOfWork, model: ActiveModel) -> AppResult<message::Model> {
        model
            .insert(uow.connection())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find a message by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<message::Model>> {
        Message::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Messages received by a user (paginated, newest first).
    pub async fn find_received(
        &self,
        user_id: &str,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<message::Model>> {
        Message::find()
            .filter(Column::RecipientId.eq(user_id))
            .order_by_desc(Column::CreatedAt)
            .order_by_desc(Column::Id)
            .limit(limit)
            .offset(offset)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Messages sent by a user (paginated, newest first).
    pub async fn find_sent(
        &self,
        user_id: &str,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<message::Model>> {
        Message::find()
            .filter(Column::SenderId.eq(user_id))
            .order_by_desc(Column::CreatedAt)
            .order_by_desc(Column::Id)
            .limit(limit)
            .offset(offset)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Count messages received by a user after `since` (all of them when
    /// `since` is `None`).
    pub async fn count_received_since(
        &self,
        user_id: &str,
        since: Option<DateTimeWithTimeZone>,
    ) -> AppResult<u64> {
        count_received_since(self.db.as_ref(), user_id, since).await
    }

    /// Same as [`Self::count_received_since`], seeing the unit's own writes.
    pub async fn count_received_since_in(
        &self,
        uow: &UnitOfWork,
        user_id: &str,
        since: Option<DateTimeWithTimeZone>,
    ) -> AppResult<u64> {
        count_received_since(uow.connection(), user_id, since).await
    }
}

async fn count_received_since<C: ConnectionTrait>(
    conn: &C,
    user_id: &str,
    since: Option<DateTimeWithTimeZone>,
) -> AppResult<u64> {
    let mut query = Message::find().filter(Column::RecipientId.eq(user_id));
    if let Some(since) = since {
        query = query.filter(Column::CreatedAt.gt(since));
    }

    query
        .count(conn)
        .await
        .map_err(|e| AppError::Database(e.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn create_test_message(id: &str, sender: &str, recipient: &str) -> message::Model {
        message::Model {
            id: id.to_string(),
            sender_id: sender.to_string(),
            recipient_id: recipient.to_string(),
            body: "psst".to_string(),
            created_at: Utc::now().into(),
        }
    }

    #[tokio::test]
    async fn test_find_received() {
        let m1 = create_test_message("m1", "user2", "user1");
        let m2 = create_test_message("m2", "user3", "user1");

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[m1, m2]])
                .into_connection(),
        );

        let repo = MessagingRepository::new(db);
        let result = repo.find_received("user1", 10, 0).await.unwrap();

        assert_eq!(result.len(), 2);
        assert!(result.iter().all(|m| m.recipient_id == "user1"));
    }

    #[tokio::test]
    async fn test_find_by_id_not_found() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<message::Model>::new()])
                .into_connection(),
        );

        let repo = MessagingRepository::new(db);
        assert!(repo.find_by_id("missing").await.unwrap().is_none());
    }
}
