//! Business logic services.

#![allow(missing_docs)]

pub mod following;
pub mod messaging;
pub mod notification;
pub mod post;
pub mod search;
pub mod search_index;
pub mod timeline;
pub mod user;

pub use following::FollowingService;
pub use messaging::{MessagingService, UNREAD_MESSAGE_COUNT};
pub use notification::NotificationService;
pub use post::PostService;
pub use search::{IndexSyncObserver, SearchService};
pub use search_index::{
    IndexHits, MemorySearchIndex, NoOpSearchIndex, SearchIndex, build_search_index,
};
#[cfg(feature = "meilisearch")]
pub use search_index::MeilisearchIndex;
pub use timeline::TimelineService;
pub use user::{RegisterInput, UpdateProfileInput, UserService};
