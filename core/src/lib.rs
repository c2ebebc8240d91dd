//! Mutation pipeline for Agora.
//!
//! [`Forum`] is the entry point: one method per mutation, each returning a
//! [`MutationResult`](agora_types::MutationResult). The pieces it is built
//! from are public so a presentation layer can reuse them directly:
//!
//! - [`validation`]: field rules for untrusted form input
//! - [`authorization`]: ownership-based access decisions
//! - [`slug`]: unique slug allocation with conflict-triggered retry
//! - [`paths`]: the view paths that get invalidated after a write
//!
//! Storage, sessions, and cache invalidation are capabilities supplied by the
//! caller (see [`agora_types::Store`], [`agora_types::SessionResolver`],
//! [`agora_types::InvalidationNotifier`]).

pub mod authorization;
mod forum;
mod notify;
pub mod paths;
mod session;
pub mod slug;
pub mod validation;

pub use authorization::{Access, authorize};
pub use forum::Forum;
pub use notify::{RecordingNotifier, TracingNotifier};
pub use session::{StaticSessionResolver, TokenSessionResolver};
pub use slug::{SlugAllocator, normalize};
pub use validation::{Schema, Validated, validate};
