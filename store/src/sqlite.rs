//! SQLite implementation of the [`Store`] capability.
//!
//! The `topics.slug` UNIQUE constraint is the final arbiter of slug
//! uniqueness: a concurrent writer that loses the race gets
//! [`StorageError::UniqueViolation`] back and is expected to retry with a new
//! candidate. Posts reference their Topic with `ON DELETE CASCADE`, so
//! removing a Topic never leaves orphaned Posts behind.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, ffi, params};
use uuid::Uuid;

use agora_types::{
    NewPost, NewTopic, Post, PostChanges, PostId, Slug, StorageError, Store, Topic, TopicChanges,
    TopicId, UserId,
};

use crate::security::prepare_db_path;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const TOPIC_COLUMNS: &str = "id, name, slug, description, owner_id, created_at, updated_at";
const POST_COLUMNS: &str = "id, title, content, owner_id, topic_id, created_at, updated_at";

/// Persistent store for Topics and Posts.
pub struct SqliteStore {
    db: Mutex<Connection>,
}

impl SqliteStore {
    const SCHEMA: &'static str = r"
        CREATE TABLE IF NOT EXISTS topics (
            id BLOB PRIMARY KEY,
            name TEXT NOT NULL,
            slug TEXT NOT NULL UNIQUE,
            description TEXT NOT NULL,
            owner_id TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS posts (
            id BLOB PRIMARY KEY,
            title TEXT NOT NULL,
            content TEXT NOT NULL,
            owner_id TEXT NOT NULL,
            topic_id BLOB NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY (topic_id) REFERENCES topics(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_posts_topic
        ON posts(topic_id);
    ";

    /// Open or create the store database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        prepare_db_path(path)?;

        let db = Connection::open(path)
            .with_context(|| format!("Failed to open store at {}", path.display()))?;
        tracing::debug!(path = %path.display(), "Opened topic store");
        Self::initialize(db)
    }

    /// Open an in-memory store (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let db = Connection::open_in_memory().context("Failed to open in-memory store")?;
        Self::initialize(db)
    }

    fn initialize(db: Connection) -> Result<Self> {
        db.busy_timeout(BUSY_TIMEOUT)
            .context("Failed to set store busy timeout")?;
        db.execute_batch(
            "PRAGMA journal_mode=WAL; PRAGMA synchronous=FULL; PRAGMA foreign_keys=ON;",
        )
        .context("Failed to set store pragmas")?;
        db.execute_batch(Self::SCHEMA)
            .context("Failed to create store schema")?;
        Ok(Self { db: Mutex::new(db) })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
        self.db
            .lock()
            .map_err(|_| StorageError::backend("store connection lock poisoned"))
    }

    /// Posts of a Topic, oldest first.
    pub fn posts_for_topic(&self, topic_id: TopicId) -> Result<Vec<Post>, StorageError> {
        let db = self.conn()?;
        let mut stmt = db
            .prepare(&format!(
                "SELECT {POST_COLUMNS} FROM posts WHERE topic_id = ?1 \
                 ORDER BY created_at ASC, rowid ASC"
            ))
            .map_err(storage_error)?;
        let rows = stmt
            .query_map(params![topic_id.value()], post_from_row)
            .map_err(storage_error)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(storage_error)
    }

    pub fn topic_count(&self) -> Result<u64, StorageError> {
        self.count("topics")
    }

    pub fn post_count(&self) -> Result<u64, StorageError> {
        self.count("posts")
    }

    fn count(&self, table: &str) -> Result<u64, StorageError> {
        let db = self.conn()?;
        let count: i64 = db
            .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
            .map_err(storage_error)?;
        Ok(count as u64)
    }

    fn topic_where(
        &self,
        clause: &str,
        param: &dyn rusqlite::ToSql,
    ) -> Result<Option<Topic>, StorageError> {
        let db = self.conn()?;
        db.query_row(
            &format!("SELECT {TOPIC_COLUMNS} FROM topics WHERE {clause}"),
            [param],
            topic_from_row,
        )
        .optional()
        .map_err(storage_error)
    }
}

impl Store for SqliteStore {
    fn find_topic_by_slug(&self, slug: &str) -> Result<Option<Topic>, StorageError> {
        self.topic_where("slug = ?1", &slug)
    }

    fn find_topic_by_id(&self, id: TopicId) -> Result<Option<Topic>, StorageError> {
        self.topic_where("id = ?1", &id.value())
    }

    fn insert_topic(&self, topic: NewTopic) -> Result<Topic, StorageError> {
        let id = TopicId::new();
        let now = Utc::now();
        let db = self.conn()?;
        db.execute(
            "INSERT INTO topics (id, name, slug, description, owner_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
            params![
                id.value(),
                &topic.name,
                topic.slug.as_str(),
                &topic.description,
                topic.owner_id.as_str(),
                now
            ],
        )
        .map_err(storage_error)?;

        Ok(Topic {
            id,
            name: topic.name,
            slug: topic.slug,
            description: topic.description,
            owner_id: topic.owner_id,
            created_at: now,
            updated_at: now,
        })
    }

    fn update_topic(
        &self,
        id: TopicId,
        changes: &TopicChanges,
    ) -> Result<Option<Topic>, StorageError> {
        let db = self.conn()?;
        let changed = db
            .execute(
                "UPDATE topics
                 SET name = COALESCE(?2, name),
                     slug = COALESCE(?3, slug),
                     description = COALESCE(?4, description),
                     updated_at = ?5
                 WHERE id = ?1",
                params![
                    id.value(),
                    changes.name.as_deref(),
                    changes.slug.as_ref().map(Slug::as_str),
                    changes.description.as_deref(),
                    Utc::now()
                ],
            )
            .map_err(storage_error)?;
        if changed == 0 {
            return Ok(None);
        }

        db.query_row(
            &format!("SELECT {TOPIC_COLUMNS} FROM topics WHERE id = ?1"),
            params![id.value()],
            topic_from_row,
        )
        .optional()
        .map_err(storage_error)
    }

    fn delete_topic(&self, id: TopicId) -> Result<bool, StorageError> {
        let db = self.conn()?;
        let removed = db
            .execute("DELETE FROM topics WHERE id = ?1", params![id.value()])
            .map_err(storage_error)?;
        Ok(removed > 0)
    }

    fn find_post_by_id(&self, id: PostId) -> Result<Option<Post>, StorageError> {
        let db = self.conn()?;
        db.query_row(
            &format!("SELECT {POST_COLUMNS} FROM posts WHERE id = ?1"),
            params![id.value()],
            post_from_row,
        )
        .optional()
        .map_err(storage_error)
    }

    fn insert_post(&self, post: NewPost) -> Result<Post, StorageError> {
        let id = PostId::new();
        let now = Utc::now();
        let db = self.conn()?;
        db.execute(
            "INSERT INTO posts (id, title, content, owner_id, topic_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
            params![
                id.value(),
                &post.title,
                &post.content,
                post.owner_id.as_str(),
                post.topic_id.value(),
                now
            ],
        )
        .map_err(storage_error)?;

        Ok(Post {
            id,
            title: post.title,
            content: post.content,
            owner_id: post.owner_id,
            topic_id: post.topic_id,
            created_at: now,
            updated_at: now,
        })
    }

    fn update_post(&self, id: PostId, changes: &PostChanges) -> Result<Option<Post>, StorageError> {
        let db = self.conn()?;
        let changed = db
            .execute(
                "UPDATE posts
                 SET title = COALESCE(?2, title),
                     content = COALESCE(?3, content),
                     updated_at = ?4
                 WHERE id = ?1",
                params![
                    id.value(),
                    changes.title.as_deref(),
                    changes.content.as_deref(),
                    Utc::now()
                ],
            )
            .map_err(storage_error)?;
        if changed == 0 {
            return Ok(None);
        }

        db.query_row(
            &format!("SELECT {POST_COLUMNS} FROM posts WHERE id = ?1"),
            params![id.value()],
            post_from_row,
        )
        .optional()
        .map_err(storage_error)
    }

    fn delete_post(&self, id: PostId) -> Result<bool, StorageError> {
        let db = self.conn()?;
        let removed = db
            .execute("DELETE FROM posts WHERE id = ?1", params![id.value()])
            .map_err(storage_error)?;
        Ok(removed > 0)
    }
}

fn topic_from_row(row: &Row<'_>) -> rusqlite::Result<Topic> {
    let id: Uuid = row.get(0)?;
    let slug: String = row.get(2)?;
    let owner_id: String = row.get(4)?;
    let created_at: DateTime<Utc> = row.get(5)?;
    let updated_at: DateTime<Utc> = row.get(6)?;
    Ok(Topic {
        id: TopicId::from_uuid(id),
        name: row.get(1)?,
        slug: Slug::new(slug),
        description: row.get(3)?,
        owner_id: UserId::new(owner_id),
        created_at,
        updated_at,
    })
}

fn post_from_row(row: &Row<'_>) -> rusqlite::Result<Post> {
    let id: Uuid = row.get(0)?;
    let owner_id: String = row.get(3)?;
    let topic_id: Uuid = row.get(4)?;
    let created_at: DateTime<Utc> = row.get(5)?;
    let updated_at: DateTime<Utc> = row.get(6)?;
    Ok(Post {
        id: PostId::from_uuid(id),
        title: row.get(1)?,
        content: row.get(2)?,
        owner_id: UserId::new(owner_id),
        topic_id: TopicId::from_uuid(topic_id),
        created_at,
        updated_at,
    })
}

/// Classify a driver error by its SQLite extended result code.
fn storage_error(err: rusqlite::Error) -> StorageError {
    if let rusqlite::Error::SqliteFailure(failure, message) = &err {
        let detail = message.clone().unwrap_or_else(|| failure.to_string());
        match failure.extended_code {
            ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                return StorageError::UniqueViolation { constraint: detail };
            }
            ffi::SQLITE_CONSTRAINT_FOREIGNKEY => {
                return StorageError::MissingReference { constraint: detail };
            }
            _ => {}
        }
    }
    tracing::warn!(error = %err, "Store operation failed");
    StorageError::backend(err.to_string())
}
