//! Slug allocation for Topics.
//!
//! A slug is derived from the Topic name and must be unique across all
//! Topics. Allocation probes the store for a free candidate, then writes
//! optimistically: the probe and the write are not atomic, so a concurrent
//! writer can claim the same candidate in between. The store's uniqueness
//! constraint rejects the loser, and [`SlugAllocator::claim`] moves on to the
//! next candidate instead of surfacing the conflict.
//!
//! Candidate order for a name normalizing to `base`:
//!
//! ```text
//! base | base-<unix millis> (reserved)  ->  base-1  ->  base-2  ->  ...
//! ```

use chrono::Utc;

use agora_types::{MutationError, MutationResult, Slug, StorageError, Store, TopicId};

pub const DEFAULT_RESERVED_WORDS: &[&str] = &["topic", "admin", "dashboard"];
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

const EXHAUSTED_MESSAGE: &str = "Could not allocate a unique slug for this topic.";

/// Lowercase `name` and collapse each whitespace run into a single dash.
#[must_use]
pub fn normalize(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut in_whitespace = false;
    for ch in name.chars() {
        if ch.is_whitespace() {
            if !in_whitespace {
                out.push('-');
            }
            in_whitespace = true;
        } else {
            in_whitespace = false;
            out.extend(ch.to_lowercase());
        }
    }
    out
}

/// The deterministic, unbounded sequence of slugs tried for one name.
#[derive(Debug, Clone)]
pub struct SlugCandidates {
    base: String,
    first: Option<String>,
    counter: u64,
}

impl SlugCandidates {
    #[must_use]
    pub fn base(&self) -> &str {
        &self.base
    }
}

impl Iterator for SlugCandidates {
    type Item = Slug;

    fn next(&mut self) -> Option<Slug> {
        if let Some(first) = self.first.take() {
            return Some(Slug::new(first));
        }
        self.counter += 1;
        Some(Slug::new(format!("{}-{}", self.base, self.counter)))
    }
}

#[derive(Debug, Clone)]
pub struct SlugAllocator {
    reserved_words: Vec<String>,
    max_attempts: u32,
}

impl Default for SlugAllocator {
    fn default() -> Self {
        Self::new(DEFAULT_RESERVED_WORDS.iter().copied(), DEFAULT_MAX_ATTEMPTS)
    }
}

impl SlugAllocator {
    /// `max_attempts` bounds how many writes may lose a uniqueness race; at least one is made.
    #[must_use]
    pub fn new<I, S>(reserved_words: I, max_attempts: u32) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            reserved_words: reserved_words
                .into_iter()
                .map(|word| normalize(word.as_ref()))
                .collect(),
            max_attempts: max_attempts.max(1),
        }
    }

    /// Replace the reserved words, keeping the attempt bound.
    pub fn with_reserved_words<I, S>(self, reserved_words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::new(reserved_words, self.max_attempts)
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    #[must_use]
    pub fn is_reserved(&self, base: &str) -> bool {
        self.reserved_words.iter().any(|word| word == base)
    }

    #[must_use]
    pub fn candidates(&self, name: &str) -> SlugCandidates {
        self.candidates_at(name, Utc::now().timestamp_millis())
    }

    /// Candidates for `name`, using `timestamp_millis` to disambiguate reserved words.
    #[must_use]
    pub fn candidates_at(&self, name: &str, timestamp_millis: i64) -> SlugCandidates {
        let base = normalize(name);
        let first = if self.is_reserved(&base) {
            format!("{base}-{timestamp_millis}")
        } else {
            base.clone()
        };
        SlugCandidates {
            base,
            first: Some(first),
            counter: 0,
        }
    }

    /// Advance `candidates` to the first slug no other Topic holds.
    ///
    /// A Topic whose id is `exclude` does not count as a collision, so a
    /// Topic never collides with itself on rename.
    pub fn allocate(
        &self,
        store: &dyn Store,
        candidates: &mut SlugCandidates,
        exclude: Option<TopicId>,
    ) -> Result<Slug, StorageError> {
        loop {
            let Some(candidate) = candidates.next() else {
                return Err(StorageError::backend("slug candidates exhausted"));
            };
            match store.find_topic_by_slug(candidate.as_str())? {
                None => return Ok(candidate),
                Some(holder) if Some(holder.id) == exclude => return Ok(candidate),
                Some(_) => {
                    tracing::debug!(slug = %candidate, "Slug taken, probing next candidate");
                }
            }
        }
    }

    /// Allocate a slug for `name` and hand it to `write`, retrying with the
    /// next free candidate whenever `write` loses a uniqueness race.
    ///
    /// Other storage failures are returned as they are. After
    /// `max_attempts` lost races the conflict is reported as a storage error.
    pub fn claim<T>(
        &self,
        store: &dyn Store,
        name: &str,
        exclude: Option<TopicId>,
        mut write: impl FnMut(&Slug) -> Result<T, StorageError>,
    ) -> MutationResult<T> {
        let mut candidates = self.candidates(name);

        for attempt in 1..=self.max_attempts {
            let slug = self.allocate(store, &mut candidates, exclude)?;
            match write(&slug) {
                Ok(written) => return Ok(written),
                Err(err) if err.is_unique_violation() => {
                    tracing::debug!(
                        slug = %slug,
                        attempt,
                        "Slug claimed by a concurrent writer, retrying"
                    );
                }
                Err(err) => return Err(err.into()),
            }
        }

        tracing::warn!(
            base = candidates.base(),
            attempts = self.max_attempts,
            "Gave up allocating a unique slug"
        );
        Err(MutationError::storage(EXHAUSTED_MESSAGE))
    }
}
