//! Core domain types for Agora.
//!
//! This crate contains pure domain types and the capability traits the
//! mutation core consumes. No IO, no async. Everything here can be used from
//! any layer of the application.

#![allow(clippy::missing_errors_doc)] // Result-returning functions are self-explanatory

mod capability;
mod error;
mod form;
mod ids;
mod model;

pub use capability::{InvalidationNotifier, RequestContext, SessionResolver, Store};
pub use error::{Action, MutationError, MutationResult, Resource, StorageError};
pub use form::{Field, FieldErrors, FormErrors, FormInput};
pub use ids::{PostId, Slug, TopicId, UserId};
pub use model::{Identity, NewPost, NewTopic, Post, PostChanges, Topic, TopicChanges};
