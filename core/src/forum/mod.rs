//! The mutation pipeline.
//!
//! Every operation runs the same stages and stops at the first failure:
//!
//! ```text
//! validate -> session -> load -> not found? -> owner? -> slug -> write -> invalidate
//! ```
//!
//! Validation never touches the store. Records are always re-read from the
//! store before an ownership decision; nothing is cached between requests.
//! Invalidation happens only after a successful write and cannot undo it.

use std::sync::Arc;

use agora_types::{
    Action, FormInput, Identity, InvalidationNotifier, MutationError, MutationResult, NewPost,
    NewTopic, Post, PostChanges, PostId, RequestContext, Resource, SessionResolver, Slug,
    StorageError, Store, Topic, TopicChanges, TopicId,
};

use crate::authorization::{authorize, require_identity};
use crate::paths;
use crate::slug::SlugAllocator;
use crate::validation;

pub struct Forum {
    store: Arc<dyn Store>,
    sessions: Arc<dyn SessionResolver>,
    notifier: Arc<dyn InvalidationNotifier>,
    slugs: SlugAllocator,
}

impl Forum {
    pub fn new(
        store: Arc<dyn Store>,
        sessions: Arc<dyn SessionResolver>,
        notifier: Arc<dyn InvalidationNotifier>,
    ) -> Self {
        Self {
            store,
            sessions,
            notifier,
            slugs: SlugAllocator::default(),
        }
    }

    pub fn with_slug_allocator(mut self, slugs: SlugAllocator) -> Self {
        self.slugs = slugs;
        self
    }

    #[must_use]
    pub fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    /// Create a Topic owned by the caller. Returns the persisted Topic.
    pub fn create_topic(
        &self,
        request: &RequestContext,
        form: &FormInput,
    ) -> MutationResult<Topic> {
        let fields = validation::create_topic(form).map_err(MutationError::Validation)?;
        let identity = self.identity(request)?;

        let topic = self.slugs.claim(self.store(), &fields.name, None, |slug| {
            self.store.insert_topic(NewTopic {
                name: fields.name.clone(),
                slug: slug.clone(),
                description: fields.description.clone(),
                owner_id: identity.id.clone(),
            })
        })?;

        tracing::info!(
            topic_id = %topic.id,
            slug = %topic.slug,
            user_id = %identity.id,
            "Topic created"
        );
        self.notify(&[paths::HOME.to_string()]);
        Ok(topic)
    }

    /// Update the present fields of a Topic the caller owns. Returns the
    /// Topic's slug after the update, which changes when the name does.
    pub fn update_topic(
        &self,
        request: &RequestContext,
        id: TopicId,
        form: &FormInput,
    ) -> MutationResult<Slug> {
        let update = validation::update_topic(form).map_err(MutationError::Validation)?;
        let identity = self.identity(request)?;
        let topic = self.load_topic(id)?;
        authorize(Some(&identity), Some(&topic.owner_id))
            .require(Action::Update, Resource::Topic)?;

        let mut changes = TopicChanges {
            name: update.name,
            slug: None,
            description: update.description,
        };

        let renamed = changes
            .name
            .as_deref()
            .filter(|name| *name != topic.name)
            .map(ToString::to_string);

        let updated = match renamed {
            Some(name) => self.slugs.claim(self.store(), &name, Some(topic.id), |slug| {
                changes.slug = Some(slug.clone());
                self.store.update_topic(topic.id, &changes)
            })?,
            None if changes.is_empty() => Some(topic.clone()),
            None => self.store.update_topic(topic.id, &changes)?,
        };
        let updated = updated.ok_or(MutationError::NotFound {
            resource: Resource::Topic,
        })?;

        tracing::info!(
            topic_id = %updated.id,
            slug = %updated.slug,
            user_id = %identity.id,
            "Topic updated"
        );
        let mut stale = vec![paths::HOME.to_string(), paths::topic_show(&topic.slug)];
        if updated.slug != topic.slug {
            stale.push(paths::topic_show(&updated.slug));
        }
        self.notify(&stale);
        Ok(updated.slug)
    }

    /// Delete a Topic the caller owns, together with its Posts.
    pub fn delete_topic(&self, request: &RequestContext, id: TopicId) -> MutationResult<()> {
        let identity = self.identity(request)?;
        let topic = self.load_topic(id)?;
        authorize(Some(&identity), Some(&topic.owner_id))
            .require(Action::Delete, Resource::Topic)?;

        if !self.store.delete_topic(topic.id)? {
            return Err(MutationError::NotFound {
                resource: Resource::Topic,
            });
        }

        tracing::info!(
            topic_id = %topic.id,
            slug = %topic.slug,
            user_id = %identity.id,
            "Topic deleted"
        );
        self.notify(&[paths::HOME.to_string(), paths::topic_show(&topic.slug)]);
        Ok(())
    }

    /// Create a Post owned by the caller inside the Topic at `topic_slug`.
    pub fn create_post(
        &self,
        request: &RequestContext,
        topic_slug: &str,
        form: &FormInput,
    ) -> MutationResult<Post> {
        let fields = validation::create_post(form).map_err(MutationError::Validation)?;
        let identity = self.identity(request)?;
        let topic = self
            .store
            .find_topic_by_slug(topic_slug)?
            .ok_or(MutationError::NotFound {
                resource: Resource::Topic,
            })?;

        let post = self
            .store
            .insert_post(NewPost {
                title: fields.title,
                content: fields.content,
                owner_id: identity.id.clone(),
                topic_id: topic.id,
            })
            .map_err(|err| match err {
                // The Topic was deleted between lookup and insert.
                StorageError::MissingReference { .. } => MutationError::NotFound {
                    resource: Resource::Topic,
                },
                other => other.into(),
            })?;

        tracing::info!(
            post_id = %post.id,
            topic_id = %topic.id,
            user_id = %identity.id,
            "Post created"
        );
        self.notify(&[paths::topic_show(&topic.slug)]);
        Ok(post)
    }

    /// Update the present fields of a Post the caller owns.
    ///
    /// `topic_slug` must name the Topic the Post belongs to.
    pub fn update_post(
        &self,
        request: &RequestContext,
        id: PostId,
        topic_slug: &str,
        form: &FormInput,
    ) -> MutationResult<Post> {
        let update = validation::update_post(form).map_err(MutationError::Validation)?;
        let identity = self.identity(request)?;
        let post = self.load_post(id)?;
        let in_topic = self
            .store
            .find_topic_by_slug(topic_slug)?
            .is_some_and(|topic| topic.id == post.topic_id);
        if !in_topic {
            return Err(MutationError::NotFound {
                resource: Resource::Post,
            });
        }
        authorize(Some(&identity), Some(&post.owner_id))
            .require(Action::Update, Resource::Post)?;

        let changes = PostChanges {
            title: update.title,
            content: update.content,
        };
        let updated = if changes.is_empty() {
            post
        } else {
            self.store
                .update_post(post.id, &changes)?
                .ok_or(MutationError::NotFound {
                    resource: Resource::Post,
                })?
        };

        tracing::info!(
            post_id = %updated.id,
            topic_id = %updated.topic_id,
            user_id = %identity.id,
            "Post updated"
        );
        self.notify(&[
            paths::post_show(topic_slug, updated.id),
            paths::topic_show(topic_slug),
        ]);
        Ok(updated)
    }

    /// Delete a Post the caller owns. Returns the id of the Topic it belonged to.
    pub fn delete_post(&self, request: &RequestContext, id: PostId) -> MutationResult<TopicId> {
        let identity = self.identity(request)?;
        let post = self.load_post(id)?;
        authorize(Some(&identity), Some(&post.owner_id))
            .require(Action::Delete, Resource::Post)?;

        if !self.store.delete_post(post.id)? {
            return Err(MutationError::NotFound {
                resource: Resource::Post,
            });
        }

        tracing::info!(
            post_id = %post.id,
            topic_id = %post.topic_id,
            user_id = %identity.id,
            "Post deleted"
        );
        match self.store.find_topic_by_id(post.topic_id) {
            Ok(Some(topic)) => self.notify(&[paths::topic_show(&topic.slug)]),
            Ok(None) => {
                tracing::warn!(
                    topic_id = %post.topic_id,
                    "Parent topic gone, nothing to invalidate"
                );
            }
            Err(err) => {
                tracing::warn!(topic_id = %post.topic_id, error = %err, "Skipped invalidation");
            }
        }
        Ok(post.topic_id)
    }

    fn identity(&self, request: &RequestContext) -> MutationResult<Identity> {
        require_identity(self.sessions.resolve(request))
    }

    fn load_topic(&self, id: TopicId) -> MutationResult<Topic> {
        self.store
            .find_topic_by_id(id)?
            .ok_or(MutationError::NotFound {
                resource: Resource::Topic,
            })
    }

    fn load_post(&self, id: PostId) -> MutationResult<Post> {
        self.store
            .find_post_by_id(id)?
            .ok_or(MutationError::NotFound {
                resource: Resource::Post,
            })
    }

    fn notify(&self, stale: &[String]) {
        for path in stale {
            self.notifier.invalidate(path);
        }
    }
}
