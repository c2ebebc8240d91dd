//! Capabilities the mutation core consumes but does not implement.
//!
//! Each trait is object safe and synchronous. Implementations are expected to
//! enforce their own timeouts; the core never cancels a call.

use crate::error::StorageError;
use crate::ids::{PostId, TopicId};
use crate::model::{Identity, NewPost, NewTopic, Post, PostChanges, Topic, TopicChanges};

/// Opaque per-request data handed to the [`SessionResolver`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    pub session_token: Option<String>,
}

impl RequestContext {
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            session_token: Some(token.into()),
        }
    }
}

/// Resolves the identity behind a request, if any.
pub trait SessionResolver: Send + Sync {
    fn resolve(&self, request: &RequestContext) -> Option<Identity>;
}

/// Authoritative record store for Topics and Posts.
///
/// Every method is a single-record operation. `insert_topic` and an
/// `update_topic` that changes the slug must fail with
/// [`StorageError::UniqueViolation`] when the slug is already taken.
pub trait Store: Send + Sync {
    fn find_topic_by_slug(&self, slug: &str) -> Result<Option<Topic>, StorageError>;
    fn find_topic_by_id(&self, id: TopicId) -> Result<Option<Topic>, StorageError>;
    fn insert_topic(&self, topic: NewTopic) -> Result<Topic, StorageError>;
    /// Apply the present fields. Returns `None` if the Topic no longer exists.
    fn update_topic(
        &self,
        id: TopicId,
        changes: &TopicChanges,
    ) -> Result<Option<Topic>, StorageError>;
    /// Remove the Topic and its Posts. Returns whether a Topic was removed.
    fn delete_topic(&self, id: TopicId) -> Result<bool, StorageError>;

    fn find_post_by_id(&self, id: PostId) -> Result<Option<Post>, StorageError>;
    fn insert_post(&self, post: NewPost) -> Result<Post, StorageError>;
    /// Apply the present fields. Returns `None` if the Post no longer exists.
    fn update_post(&self, id: PostId, changes: &PostChanges) -> Result<Option<Post>, StorageError>;
    fn delete_post(&self, id: PostId) -> Result<bool, StorageError>;
}

/// Tells the view layer that cached content under a path is stale.
///
/// Best effort: implementations swallow their own failures.
pub trait InvalidationNotifier: Send + Sync {
    fn invalidate(&self, path: &str);
}
