//! Canonical view paths used as invalidation keys.

use std::fmt::Display;

pub const HOME: &str = "/";

#[must_use]
pub fn topic_show(slug: impl Display) -> String {
    format!("/topics/{slug}")
}

#[must_use]
pub fn post_show(slug: impl Display, post_id: impl Display) -> String {
    format!("/topics/{slug}/posts/{post_id}")
}
