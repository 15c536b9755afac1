//! Messaging service for direct messages.

use chrono::Utc;
use flock_common::{AppError, AppResult, IdGenerator};
use flock_db::{
    UnitOfWork,
    entities::message,
    repositories::{MessagingRepository, UserRepository},
};
use sea_orm::{IntoActiveModel, Set};
use tracing::debug;

use crate::services::notification::NotificationService;

/// Name of the notification holding a user's unread message count.
pub const UNREAD_MESSAGE_COUNT: &str = "unread_message_count";

/// Maximum message body length, in characters.
pub const MAX_MESSAGE_LENGTH: usize = 140;

/// Messaging service.
#[derive(Clone)]
pub struct MessagingService {
    messaging_repo: MessagingRepository,
    user_repo: UserRepository,
    notification_service: NotificationService,
    id_gen: IdGenerator,
}

impl MessagingService {
    /// Create a new messaging service.
    #[must_use]
    pub const fn new(
        messaging_repo: MessagingRepository,
        user_repo: UserRepository,
        notification_service: NotificationService,
    ) -> Self {
        Self {
            messaging_repo,
            user_repo,
            notification_service,
            id_gen: IdGenerator::new(),
        }
    }

    /// Send a message and refresh the recipient's unread count.
    pub async fn send(
        &self,
        uow: &UnitOfWork,
        sender_id: &str,
        recipient_id: &str,
        body: &str,
    ) -> AppResult<message::Model> {
        let body = body.trim();
        if body.is_empty() || body.chars().count() > MAX_MESSAGE_LENGTH {
            return Err(AppError::Validation(format!(
                "message body must be 1 to {MAX_MESSAGE_LENGTH} characters"
            )));
        }

        let recipient = self.user_repo.get_by_id_in(uow, recipient_id).await?;

        let model = message::ActiveModel {
            id: Set(self.id_gen.generate()),
            sender_id: Set(sender_id.to_string()),
            recipient_id: Set(recipient.id.clone()),
            body: Set(body.to_string()),
            created_at: Set(Utc::now().into()),
        };
        let message = self.messaging_repo.create(uow, model).await?;

        let unread = self
            .messaging_repo
            .count_received_since_in(uow, &recipient.id, recipient.last_message_read_time)
            .await?;
        self.notification_service
            .add_notification(uow, &recipient.id, UNREAD_MESSAGE_COUNT, &unread)
            .await?;

        debug!(message_id = %message.id, sender_id, recipient_id, unread, "Sent message");
        Ok(message)
    }

    /// Number of messages a user received since they last read their
    /// messages.
    pub async fn new_messages(&self, user_id: &str) -> AppResult<u64> {
        let user = self.user_repo.get_by_id(user_id).await?;
        self.messaging_repo
            .count_received_since(&user.id, user.last_message_read_time)
            .await
    }

    /// Mark every received message as read.
    pub async fn mark_messages_read(&self, uow: &UnitOfWork, user_id: &str) -> AppResult<()> {
        let user = self.user_repo.get_by_id_in(uow, user_id).await?;
        let mut active = user.into_active_model();
        active.last_message_read_time = Set(Some(Utc::now().into()));
        self.user_repo.update(uow, active).await?;

        self.notification_service
            .add_notification(uow, user_id, UNREAD_MESSAGE_COUNT, &0)
            .await?;
        Ok(())
    }

    /// Messages received by a user, newest first.
    pub async fn messages_received(
        &self,
        user_id: &str,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<message::Model>> {
        self.messaging_repo
            .find_received(user_id, limit, offset)
            .await
    }

    /// Messages sent by a user, newest first.
    pub async fn messages_sent(
        &self,
        user_id: &str,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<message::Model>> {
        self.messaging_repo.find_sent(user_id, limit, offset).await
    }
}
