//! Persistent storage for Agora Topics and Posts.
//!
//! [`SqliteStore`] is the production implementation of the
//! [`agora_types::Store`] capability.

mod security;
mod sqlite;

pub use sqlite::SqliteStore;
