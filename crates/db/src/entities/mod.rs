//! Database entities.

pub mod following;
pub mod message;
pub mod notification;
pub mod post;
pub mod user;

pub use following::Entity as Following;
pub use message::Entity as Message;
pub use notification::Entity as Notification;
pub use post::Entity as Post;
pub use user::Entity as User;
