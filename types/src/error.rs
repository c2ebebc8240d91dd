use std::fmt;

use thiserror::Error;

use crate::form::{FieldErrors, FormErrors};

const UNAUTHENTICATED_MESSAGE: &str = "You must be signed in to do this.";
const STORAGE_FALLBACK_MESSAGE: &str = "Something went wrong";

/// The kind of record a mutation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Topic,
    Post,
}

impl Resource {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Resource::Topic => "topic",
            Resource::Post => "post",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Owner-gated actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Update,
    Delete,
}

impl Action {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Action::Update => "update",
            Action::Delete => "delete",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every way a mutation can fail, as seen by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MutationError {
    #[error("invalid input: {0}")]
    Validation(FieldErrors),
    #[error("not signed in")]
    Unauthenticated,
    #[error("not allowed to {action} this {resource}")]
    Forbidden { action: Action, resource: Resource },
    #[error("{resource} not found")]
    NotFound { resource: Resource },
    #[error("storage failure: {}", .message.as_deref().unwrap_or(STORAGE_FALLBACK_MESSAGE))]
    Storage { message: Option<String> },
}

impl MutationError {
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        let message = message.into();
        MutationError::Storage {
            message: (!message.trim().is_empty()).then_some(message),
        }
    }

    /// Render this failure the way a form displays it.
    #[must_use]
    pub fn form_errors(&self) -> FormErrors {
        match self {
            MutationError::Validation(errors) => FormErrors::from(errors),
            MutationError::Unauthenticated => FormErrors::form(UNAUTHENTICATED_MESSAGE),
            MutationError::Forbidden { action, resource } => {
                FormErrors::form(format!("You are not authorized to {action} this {resource}."))
            }
            MutationError::NotFound { resource } => {
                FormErrors::form(format!("Cannot find {resource}."))
            }
            MutationError::Storage { message } => {
                FormErrors::form(message.as_deref().unwrap_or(STORAGE_FALLBACK_MESSAGE))
            }
        }
    }
}

impl From<StorageError> for MutationError {
    fn from(err: StorageError) -> Self {
        MutationError::storage(err.to_string())
    }
}

/// Uniform outcome of every mutation.
pub type MutationResult<T> = Result<T, MutationError>;

/// Failure reported by a [`Store`](crate::Store) implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// A uniqueness constraint rejected the write.
    #[error("unique constraint failed: {constraint}")]
    UniqueViolation { constraint: String },
    /// A write referenced a record that no longer exists.
    #[error("reference constraint failed: {constraint}")]
    MissingReference { constraint: String },
    #[error("{message}")]
    Backend { message: String },
}

impl StorageError {
    #[must_use]
    pub fn backend(message: impl Into<String>) -> Self {
        StorageError::Backend {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, StorageError::UniqueViolation { .. })
    }
}
