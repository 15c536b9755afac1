//! Database repositories.

pub mod following;
pub mod messaging;
pub mod notification;
pub mod post;
pub mod searchable;
pub mod user;

pub use following::FollowingRepository;
pub use messaging::MessagingRepository;
pub use notification::NotificationRepository;
pub use post::PostRepository;
pub use searchable::SearchableRepository;
pub use user::UserRepository;
