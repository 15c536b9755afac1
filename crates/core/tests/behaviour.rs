//! End-to-end behaviour of the services against a migrated database.
//!
//! Runs on in-memory SQLite unless `TEST_DATABASE_URL` says otherwise.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use flock_common::config::{AuthConfig, SearchConfig};
use flock_core::{
    FollowingService, MemorySearchIndex, MessagingService, NotificationService, PostService,
    RegisterInput, SearchService, TimelineService, UNREAD_MESSAGE_COUNT, UserService,
};
use flock_db::entities::Post;
use flock_db::repositories::{
    FollowingRepository, MessagingRepository, NotificationRepository, PostRepository,
    UserRepository,
};
use flock_db::test_utils::TestDatabase;
use flock_db::{IndexKey, UnitOfWork};
use serde_json::json;

struct World {
    db: TestDatabase,
    index: MemorySearchIndex,
    search: SearchService,
    following: FollowingService,
    posts: PostService,
    timeline: TimelineService,
    notifications: NotificationService,
    messaging: MessagingService,
    users: UserService,
}

impl World {
    async fn new() -> Self {
        let db = TestDatabase::new().await.expect("Failed to connect");
        db.cleanup().await.unwrap();
        let conn = db.shared();

        let index = MemorySearchIndex::new();
        let search = SearchService::new(
            conn.clone(),
            Arc::new(index.clone()),
            SearchConfig {
                reindex_batch_size: 2,
                ..SearchConfig::default()
            },
        );
        let notifications = NotificationService::new(NotificationRepository::new(conn.clone()));

        Self {
            following: FollowingService::new(FollowingRepository::new(conn.clone())),
            posts: PostService::new(PostRepository::new(conn.clone())),
            timeline: TimelineService::new(PostRepository::new(conn.clone())),
            messaging: MessagingService::new(
                MessagingRepository::new(conn.clone()),
                UserRepository::new(conn.clone()),
                notifications.clone(),
            ),
            users: UserService::new(
                UserRepository::new(conn),
                &AuthConfig {
                    secret_key: "behaviour-secret".to_string(),
                    reset_token_ttl_secs: 600,
                },
            ),
            notifications,
            search,
            index,
            db,
        }
    }

    async fn with_users(names: &[(&str, &str)]) -> Self {
        let world = Self::new().await;
        for (id, name) in names {
            world.db.insert_user(id, name).await.unwrap();
        }
        world
    }

    async fn unit(&self) -> UnitOfWork {
        UnitOfWork::begin(self.db.connection()).await.unwrap()
    }
}

fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

#[tokio::test]
async fn test_follow_twice_leaves_one_edge() {
    let world = World::with_users(&[("a", "alice"), ("b", "bob")]).await;

    let uow = world.unit().await;
    assert!(world.following.follow(&uow, "a", "b").await.unwrap());
    assert!(!world.following.follow(&uow, "a", "b").await.unwrap());
    uow.commit().await.unwrap();

    assert!(world.following.is_following("a", "b").await.unwrap());
    assert!(!world.following.is_following("b", "a").await.unwrap());
    assert_eq!(world.following.count_following("a").await.unwrap(), 1);
    assert_eq!(world.following.count_followers("b").await.unwrap(), 1);
}

#[tokio::test]
async fn test_self_follow_and_missing_unfollow_change_nothing() {
    let world = World::with_users(&[("a", "alice"), ("b", "bob")]).await;

    let uow = world.unit().await;
    assert!(!world.following.follow(&uow, "a", "a").await.unwrap());
    assert!(!world.following.unfollow(&uow, "a", "b").await.unwrap());
    uow.commit().await.unwrap();

    assert_eq!(world.following.count_following("a").await.unwrap(), 0);
}

#[tokio::test]
async fn test_uncommitted_follow_is_discarded() {
    let world = World::with_users(&[("a", "alice"), ("b", "bob")]).await;

    let uow = world.unit().await;
    world.following.follow(&uow, "a", "b").await.unwrap();
    uow.rollback().await.unwrap();

    assert!(!world.following.is_following("a", "b").await.unwrap());
}

#[tokio::test]
async fn test_unfollow_removes_followed_posts_from_timeline() {
    let world = World::with_users(&[("a", "alice"), ("b", "bob")]).await;
    world.db.insert_post("p1", "b", "hi", at(1)).await.unwrap();

    let uow = world.unit().await;
    world.following.follow(&uow, "a", "b").await.unwrap();
    uow.commit().await.unwrap();
    assert_eq!(world.timeline.followed_posts("a", 10, 0).await.unwrap().len(), 1);

    let uow = world.unit().await;
    assert!(world.following.unfollow(&uow, "a", "b").await.unwrap());
    uow.commit().await.unwrap();
    assert!(world.timeline.followed_posts("a", 10, 0).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_timeline_puts_newest_first() {
    let world = World::with_users(&[("a", "alice"), ("b", "bob")]).await;
    world.db.insert_follow("a", "b").await.unwrap();
    world.db.insert_post("hi", "b", "hi", at(1)).await.unwrap();
    world.db.insert_post("yo", "a", "yo", at(2)).await.unwrap();

    let bodies: Vec<String> = world
        .timeline
        .followed_posts("a", 10, 0)
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.body)
        .collect();

    assert_eq!(bodies, vec!["yo", "hi"]);
}

#[tokio::test]
async fn test_timeline_contains_exactly_own_and_followed_posts() {
    let world =
        World::with_users(&[("v", "viewer"), ("f1", "friend"), ("f2", "pal"), ("s", "stranger")])
            .await;
    world.db.insert_follow("v", "f1").await.unwrap();
    world.db.insert_follow("v", "f2").await.unwrap();
    world.db.insert_follow("s", "v").await.unwrap();

    let mut expected = Vec::new();
    for (i, author) in ["v", "f1", "f2", "s", "f1", "v"].iter().enumerate() {
        let id = format!("p{i}");
        world
            .db
            .insert_post(&id, author, "x", at(i as i64 * 10))
            .await
            .unwrap();
        if *author != "s" {
            expected.push(id);
        }
    }
    expected.reverse();

    let ids: Vec<String> = world
        .timeline
        .followed_posts("v", 10, 0)
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.id)
        .collect();

    assert_eq!(ids, expected);
    assert_eq!(world.timeline.count_followed_posts("v").await.unwrap(), 5);
}

#[tokio::test]
async fn test_timeline_edge_cases() {
    let world = World::with_users(&[("a", "alice"), ("b", "bob"), ("c", "carol")]).await;
    world.db.insert_post("own", "a", "mine", at(1)).await.unwrap();
    world.db.insert_follow("b", "a").await.unwrap();

    let a: Vec<_> = world.timeline.followed_posts("a", 10, 0).await.unwrap();
    let b: Vec<_> = world.timeline.followed_posts("b", 10, 0).await.unwrap();
    let c: Vec<_> = world.timeline.followed_posts("c", 10, 0).await.unwrap();

    assert_eq!(a.len(), 1);
    assert_eq!(b[0].id, "own");
    assert!(c.is_empty());
}

#[tokio::test]
async fn test_timeline_pages_do_not_overlap() {
    let world = World::with_users(&[("a", "alice"), ("b", "bob")]).await;
    world.db.insert_follow("a", "b").await.unwrap();
    for i in 0..7 {
        let author = if i % 2 == 0 { "a" } else { "b" };
        world
            .db
            .insert_post(&format!("p{i}"), author, "x", at(i))
            .await
            .unwrap();
    }

    let mut seen = Vec::new();
    for page in 0..3 {
        let posts = world.timeline.followed_posts("a", 3, page * 3).await.unwrap();
        seen.extend(posts.into_iter().map(|p| p.id));
    }

    assert_eq!(seen, vec!["p6", "p5", "p4", "p3", "p2", "p1", "p0"]);
}

#[tokio::test]
async fn test_add_notification_replaces_by_name() {
    let world = World::with_users(&[("u", "user")]).await;

    let uow = world.unit().await;
    world
        .notifications
        .add_notification(&uow, "u", "N", &json!({"a": 1}))
        .await
        .unwrap();
    world
        .notifications
        .add_notification(&uow, "u", "N", &json!({"a": 2}))
        .await
        .unwrap();
    world
        .notifications
        .add_notification(&uow, "u", "other", &json!(null))
        .await
        .unwrap();
    uow.commit().await.unwrap();

    let n = world.notifications.get_by_name("u", "N").await.unwrap().unwrap();
    assert_eq!(n.get_data().unwrap(), json!({"a": 2}));
    assert_eq!(world.notifications.count("u").await.unwrap(), 2);
}

#[tokio::test]
async fn test_notifications_since_is_ascending() {
    let world = World::with_users(&[("u", "user")]).await;
    let before = flock_core::notification::unix_seconds(Utc::now() - Duration::seconds(1));

    let uow = world.unit().await;
    world.notifications.add_notification(&uow, "u", "first", &1).await.unwrap();
    world.notifications.add_notification(&uow, "u", "second", &2).await.unwrap();
    uow.commit().await.unwrap();

    let feed = world.notifications.notifications_since("u", before).await.unwrap();
    assert_eq!(feed.len(), 2);
    assert!(feed[0].timestamp <= feed[1].timestamp);

    let later = world
        .notifications
        .notifications_since("u", feed[1].timestamp + 1.0)
        .await
        .unwrap();
    assert!(later.is_empty());
}

#[tokio::test]
async fn test_committed_post_is_searchable() {
    let world = World::with_users(&[("a", "alice")]).await;

    let mut uow = world.search.begin().await.unwrap();
    let post = world.posts.create(&mut uow, "a", "hello world").await.unwrap();
    let outcome = uow.commit().await.unwrap();

    assert_eq!(outcome.changes, 1);
    assert_eq!(outcome.observer_failures, 0);
    assert_eq!(world.index.len("post").await, 1);

    let (rows, total) = world.search.search::<Post>("hello", 1, 10).await.unwrap();
    assert_eq!(total, 1);
    assert_eq!(rows[0].id, post.id);
}

#[tokio::test]
async fn test_rolled_back_post_never_reaches_index() {
    let world = World::with_users(&[("a", "alice")]).await;

    let mut uow = world.search.begin().await.unwrap();
    world.posts.create(&mut uow, "a", "hello world").await.unwrap();
    uow.rollback().await.unwrap();

    assert_eq!(world.index.len("post").await, 0);
    let (rows, total) = world.search.search::<Post>("hello", 1, 10).await.unwrap();
    assert!(rows.is_empty());
    assert_eq!(total, 0);
}

#[tokio::test]
async fn test_edit_and_delete_follow_into_index() {
    let world = World::with_users(&[("a", "alice")]).await;

    let mut uow = world.search.begin().await.unwrap();
    let post = world.posts.create(&mut uow, "a", "first draft").await.unwrap();
    uow.commit().await.unwrap();

    let mut uow = world.search.begin().await.unwrap();
    world
        .posts
        .edit(&mut uow, "a", &post.id, "final words")
        .await
        .unwrap();
    uow.commit().await.unwrap();

    let key = IndexKey::new("post", &post.id);
    assert_eq!(world.index.document(&key).await.unwrap()["body"], "final words");
    assert_eq!(world.search.search::<Post>("draft", 1, 10).await.unwrap().1, 0);

    let mut uow = world.search.begin().await.unwrap();
    assert!(world.posts.delete(&mut uow, "a", &post.id).await.unwrap());
    uow.commit().await.unwrap();

    assert!(world.index.document(&key).await.is_none());
}

#[tokio::test]
async fn test_search_keeps_index_rank_and_pages() {
    let world = World::with_users(&[("a", "alice")]).await;
    world.db.insert_post("p1", "a", "cats", at(1)).await.unwrap();
    world.db.insert_post("p2", "a", "cats and more cats", at(2)).await.unwrap();
    world.db.insert_post("p3", "a", "dogs", at(3)).await.unwrap();
    world.db.insert_post("p4", "a", "cats cats cats", at(4)).await.unwrap();

    assert_eq!(world.search.reindex::<Post>().await.unwrap(), 4);

    let (first, total) = world.search.search::<Post>("cats", 1, 2).await.unwrap();
    let (second, _) = world.search.search::<Post>("cats", 2, 2).await.unwrap();

    assert_eq!(total, 3);
    let ids: Vec<_> = first.iter().chain(&second).map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["p4", "p2", "p1"]);
}

#[tokio::test]
async fn test_search_skips_hits_for_rows_deleted_behind_its_back() {
    let world = World::with_users(&[("a", "alice")]).await;
    world.db.insert_post("p1", "a", "hello", at(1)).await.unwrap();
    world.db.insert_post("p2", "a", "hello hello", at(2)).await.unwrap();
    world.search.reindex::<Post>().await.unwrap();

    let mut uow = world.unit().await;
    PostRepository::new(world.db.shared())
        .delete(&mut uow, "p2")
        .await
        .unwrap();
    uow.commit().await.unwrap();

    let (rows, total) = world.search.search::<Post>("hello", 1, 10).await.unwrap();
    assert_eq!(total, 2);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id, "p1");
}

#[tokio::test]
async fn test_messages_drive_unread_notification() {
    let world = World::with_users(&[("a", "alice"), ("b", "bob")]).await;

    let uow = world.unit().await;
    world.messaging.send(&uow, "a", "b", "psst").await.unwrap();
    world.messaging.send(&uow, "a", "b", "again").await.unwrap();
    uow.commit().await.unwrap();

    assert_eq!(world.messaging.new_messages("b").await.unwrap(), 2);
    let unread = world
        .notifications
        .get_by_name("b", UNREAD_MESSAGE_COUNT)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(unread.get_data_as::<u64>().unwrap(), 2);

    let uow = world.unit().await;
    world.messaging.mark_messages_read(&uow, "b").await.unwrap();
    uow.commit().await.unwrap();

    assert_eq!(world.messaging.new_messages("b").await.unwrap(), 0);
    let unread = world
        .notifications
        .get_by_name("b", UNREAD_MESSAGE_COUNT)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(unread.get_data_as::<u64>().unwrap(), 0);
    assert_eq!(
        world.messaging.messages_received("b", 10, 0).await.unwrap()[0].body,
        "again"
    );
}

#[tokio::test]
async fn test_register_login_and_reset_token() {
    let world = World::new().await;

    let uow = world.unit().await;
    let user = world
        .users
        .register(
            &uow,
            RegisterInput {
                username: "alice".to_string(),
                email: "alice@example.com".to_string(),
                password: "correct horse".to_string(),
            },
        )
        .await
        .unwrap();
    let duplicate = world
        .users
        .register(
            &uow,
            RegisterInput {
                username: "alice".to_string(),
                email: "other@example.com".to_string(),
                password: "correct horse".to_string(),
            },
        )
        .await;
    uow.commit().await.unwrap();

    assert!(matches!(duplicate, Err(flock_common::AppError::Conflict(_))));

    let stored = world.users.get_by_username("alice").await.unwrap();
    assert!(world.users.check_password(&stored, "correct horse"));
    assert!(!world.users.check_password(&stored, "wrong horse"));

    let token = world.users.reset_password_token(&stored).unwrap();
    let verified = world
        .users
        .verify_reset_password_token(&token)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(verified.id, user.id);
}

#[tokio::test]
async fn test_deleting_user_takes_their_content() {
    let world = World::with_users(&[("a", "alice"), ("b", "bob")]).await;
    world.db.insert_follow("a", "b").await.unwrap();
    world.db.insert_post("p1", "b", "bye", at(1)).await.unwrap();

    let mut uow = world.unit().await;
    assert!(world.users.delete(&mut uow, "b").await.unwrap());
    uow.commit().await.unwrap();

    assert!(!world.following.is_following("a", "b").await.unwrap());
    assert!(world.timeline.followed_posts("a", 10, 0).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_deleting_user_removes_their_posts_from_index() {
    let world = World::with_users(&[("a", "alice"), ("b", "bob")]).await;

    let mut uow = world.search.begin().await.unwrap();
    world.posts.create(&mut uow, "b", "hello from bob").await.unwrap();
    world.posts.create(&mut uow, "a", "hello from alice").await.unwrap();
    uow.commit().await.unwrap();
    assert_eq!(world.index.len("post").await, 2);

    let mut uow = world.search.begin().await.unwrap();
    assert!(world.users.delete(&mut uow, "b").await.unwrap());
    uow.commit().await.unwrap();

    assert_eq!(world.index.len("post").await, 1);
    let (rows, total) = world.search.search::<Post>("hello", 1, 10).await.unwrap();
    assert_eq!(total, 1);
    assert_eq!(rows[0].user_id, "a");
}

#[tokio::test]
async fn test_deleting_missing_user_stages_nothing() {
    let world = World::new().await;

    let mut uow = world.unit().await;
    assert!(!world.users.delete(&mut uow, "ghost").await.unwrap());
    assert!(uow.pending().is_empty());
    uow.rollback().await.unwrap();
}
