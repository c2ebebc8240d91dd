//! End-to-end mutation scenarios against an on-disk store.
//!
//! The unit tests in `agora-core` cover each gate with an in-memory store;
//! these run the whole pipeline through a real database file and read the
//! results back through a second connection.

use std::sync::Arc;

use agora_core::slug::DEFAULT_MAX_ATTEMPTS;
use agora_core::{Forum, RecordingNotifier, SlugAllocator, TokenSessionResolver};
use agora_store::SqliteStore;
use agora_types::{
    Action, Field, FormInput, Identity, MutationError, RequestContext, Resource, Store,
};

use crate::common::{Harness, as_user, post_form, topic_form};

#[test]
fn two_users_create_the_same_topic_name() {
    let harness = Harness::new();

    let first = harness
        .forum
        .create_topic(
            &as_user("u1"),
            &topic_form("rust-lang", "A place to discuss Rust"),
        )
        .expect("first topic");
    let second = harness
        .forum
        .create_topic(
            &as_user("u2"),
            &topic_form("rust-lang", "A place to discuss Rust"),
        )
        .expect("second topic");

    assert_eq!(first.slug, "rust-lang");
    assert_eq!(second.slug, "rust-lang-1");
    assert_eq!(first.owner_id.as_str(), "u1");
    assert_eq!(second.owner_id.as_str(), "u2");

    let reopened = harness.reopen();
    assert_eq!(reopened.topic_count().expect("count"), 2);
    let stored = reopened
        .find_topic_by_slug("rust-lang-1")
        .expect("lookup")
        .expect("second topic persisted");
    assert_eq!(stored.id, second.id);
}

#[test]
fn post_lifecycle_with_a_foreign_editor() {
    let harness = Harness::new();
    let topic = harness.topic("u1", "rust-lang");

    let post = harness
        .forum
        .create_post(
            &as_user("u1"),
            "rust-lang",
            &post_form("Hello", "First post content"),
        )
        .expect("create post");
    assert_eq!(post.topic_id, topic.id);

    let err = harness
        .forum
        .update_post(
            &as_user("u2"),
            post.id,
            "rust-lang",
            &post_form("Hijacked", "Somebody else's words"),
        )
        .expect_err("foreign update");
    assert_eq!(
        err,
        MutationError::Forbidden {
            action: Action::Update,
            resource: Resource::Post,
        }
    );

    let stored = harness
        .reopen()
        .find_post_by_id(post.id)
        .expect("lookup")
        .expect("post still there");
    assert_eq!(stored.title, "Hello");
    assert_eq!(stored.content, "First post content");

    let parent = harness
        .forum
        .delete_post(&as_user("u1"), post.id)
        .expect("owner delete");
    assert_eq!(parent, topic.id);
    assert!(
        harness
            .reopen()
            .find_post_by_id(post.id)
            .expect("lookup")
            .is_none()
    );
}

#[test]
fn rejected_input_never_reaches_the_database() {
    let harness = Harness::new();
    harness.topic("u1", "rust-lang");

    for name in ["ab", "Rust", "rust lang"] {
        let err = harness
            .forum
            .create_topic(&as_user("u1"), &topic_form(name, "A place to discuss Rust"))
            .expect_err("invalid name");
        assert!(
            matches!(&err, MutationError::Validation(errors) if errors.contains(Field::Name)),
            "{name}: {err:?}"
        );
    }

    let err = harness
        .forum
        .create_post(
            &as_user("u1"),
            "rust-lang",
            &post_form("Hi", "First post content"),
        )
        .expect_err("short title");
    assert!(matches!(&err, MutationError::Validation(errors) if errors.contains(Field::Title)));

    let reopened = harness.reopen();
    assert_eq!(reopened.topic_count().expect("count"), 1);
    assert_eq!(reopened.post_count().expect("count"), 0);
}

#[test]
fn post_into_a_missing_topic_is_not_found() {
    let harness = Harness::new();

    let err = harness
        .forum
        .create_post(
            &as_user("u1"),
            "no-such-topic",
            &post_form("Hello", "First post content"),
        )
        .expect_err("missing topic");
    assert_eq!(
        err,
        MutationError::NotFound {
            resource: Resource::Topic
        }
    );
    assert_eq!(harness.reopen().post_count().expect("count"), 0);
}

#[test]
fn unchanged_update_is_idempotent() {
    let harness = Harness::new();
    let topic = harness.topic("u1", "rust-lang");

    let slug = harness
        .forum
        .update_topic(
            &as_user("u1"),
            topic.id,
            &topic_form("rust-lang", "A place to discuss Rust"),
        )
        .expect("update");
    assert_eq!(slug, topic.slug);

    let stored = harness
        .reopen()
        .find_topic_by_id(topic.id)
        .expect("lookup")
        .expect("topic");
    assert_eq!(stored.slug, topic.slug);
    assert_eq!(stored.name, topic.name);
    assert_eq!(stored.description, topic.description);
}

#[test]
fn rename_moves_the_topic_and_invalidates_both_paths() {
    let harness = Harness::new();
    let topic = harness.topic("u1", "rust-lang");
    harness.post("u1", "rust-lang");
    harness.notifier.take();

    let slug = harness
        .forum
        .update_topic(
            &as_user("u1"),
            topic.id,
            &FormInput::new().with("name", "rustaceans"),
        )
        .expect("rename");
    assert_eq!(slug, "rustaceans");

    assert_eq!(
        harness.notifier.take(),
        vec!["/", "/topics/rust-lang", "/topics/rustaceans"]
    );

    // Posts follow the topic by id, so the new slug reaches them.
    let moved = harness
        .forum
        .create_post(
            &as_user("u2"),
            "rustaceans",
            &post_form("Second", "Second post content"),
        )
        .expect("post under new slug");
    assert_eq!(moved.topic_id, topic.id);
    assert_eq!(harness.store.posts_for_topic(topic.id).expect("posts").len(), 2);
}

#[test]
fn deleting_a_topic_takes_its_posts_along() {
    let harness = Harness::new();
    let topic = harness.topic("u1", "rust-lang");
    harness.post("u1", "rust-lang");
    harness.post("u2", "rust-lang");

    let err = harness
        .forum
        .delete_topic(&as_user("u2"), topic.id)
        .expect_err("foreign delete");
    assert_eq!(
        err,
        MutationError::Forbidden {
            action: Action::Delete,
            resource: Resource::Topic,
        }
    );

    harness
        .forum
        .delete_topic(&as_user("u1"), topic.id)
        .expect("owner delete");

    let reopened = harness.reopen();
    assert_eq!(reopened.topic_count().expect("count"), 0);
    assert_eq!(reopened.post_count().expect("count"), 0);
}

/// Create `writers` same-named Topics at once, each through its own
/// connection as separate processes would. Returns the resulting slugs.
fn create_concurrently(harness: &Harness, writers: u32, slugs: &SlugAllocator) -> Vec<String> {
    let db_path = harness.db_path().to_path_buf();

    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..writers)
            .map(|n| {
                let db_path = db_path.clone();
                let slugs = slugs.clone();
                scope.spawn(move || {
                    let store = Arc::new(SqliteStore::open(&db_path).expect("open store"));
                    let user = format!("writer-{n}");
                    let sessions = TokenSessionResolver::new()
                        .with_session(user.clone(), Identity::new(user.as_str()));
                    let forum = Forum::new(
                        store,
                        Arc::new(sessions),
                        Arc::new(RecordingNotifier::new()),
                    )
                    .with_slug_allocator(slugs);

                    forum
                        .create_topic(
                            &RequestContext::with_token(user),
                            &topic_form("rust-lang", "A place to discuss Rust"),
                        )
                        .expect("create topic")
                        .slug
                        .into_inner()
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().expect("writer thread"))
            .collect()
    })
}

fn assert_distinct(slugs: &[String]) {
    let mut unique = slugs.to_vec();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), slugs.len(), "duplicate slugs: {slugs:?}");
}

#[test]
fn concurrent_forums_on_one_file_never_share_a_slug() {
    const WRITERS: u32 = 6;

    let harness = Harness::new();
    let slugs = create_concurrently(&harness, WRITERS, &SlugAllocator::new(["topic"], WRITERS));

    assert_distinct(&slugs);
    assert_eq!(
        harness.reopen().topic_count().expect("count"),
        u64::from(WRITERS)
    );
}

#[test]
fn default_retry_bound_covers_as_many_writers_as_attempts() {
    let harness = Harness::new();
    let slugs = create_concurrently(&harness, DEFAULT_MAX_ATTEMPTS, &SlugAllocator::default());

    assert_distinct(&slugs);
    assert_eq!(
        harness.reopen().topic_count().expect("count"),
        u64::from(DEFAULT_MAX_ATTEMPTS)
    );
}
