//! Ownership-based access decisions.
//!
//! There is no role or admin override: only the identity that created a
//! record may change or remove it. A missing target is reported as
//! `NotFound` by the caller before any ownership comparison happens.

use agora_types::{Action, Identity, MutationError, MutationResult, Resource, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Unauthenticated,
    Forbidden,
    Permitted,
}

/// Decide access for `identity` against a record owned by `owner`.
///
/// `owner` is `None` for creates: any authenticated identity may create, and
/// becomes the owner of what it creates.
#[must_use]
pub fn authorize(identity: Option<&Identity>, owner: Option<&UserId>) -> Access {
    match (identity, owner) {
        (None, _) => Access::Unauthenticated,
        (Some(_), None) => Access::Permitted,
        (Some(identity), Some(owner)) if identity.id == *owner => Access::Permitted,
        (Some(_), Some(_)) => Access::Forbidden,
    }
}

impl Access {
    pub fn require(self, action: Action, resource: Resource) -> MutationResult<()> {
        match self {
            Access::Permitted => Ok(()),
            Access::Unauthenticated => Err(MutationError::Unauthenticated),
            Access::Forbidden => {
                tracing::warn!(
                    %action,
                    %resource,
                    "Mutation denied: caller does not own the record"
                );
                Err(MutationError::Forbidden { action, resource })
            }
        }
    }
}

/// The signed-in identity, or `Unauthenticated`.
pub fn require_identity(identity: Option<Identity>) -> MutationResult<Identity> {
    match identity {
        Some(identity) => Ok(identity),
        None => {
            tracing::debug!("Mutation rejected: no session");
            Err(MutationError::Unauthenticated)
        }
    }
}
