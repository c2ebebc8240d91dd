//! Shared test utilities and fixtures
//!
//! Common infrastructure for integration tests: a [`Forum`] over an on-disk
//! store, and a runner for the `agora` binary.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use agora_core::{Forum, RecordingNotifier, TokenSessionResolver};
use agora_store::SqliteStore;
use agora_types::{FormInput, Identity, Post, RequestContext, Topic};
use serde_json::Value;
use tempfile::TempDir;

/// A forum backed by a SQLite file in a temp directory.
///
/// Sessions: the tokens `u1` and `u2` resolve to identities of the same id.
pub struct Harness {
    pub forum: Forum,
    pub store: Arc<SqliteStore>,
    pub notifier: Arc<RecordingNotifier>,
    db_path: PathBuf,
    _dir: TempDir,
}

impl Harness {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let db_path = dir.path().join("agora.db");
        let store = Arc::new(SqliteStore::open(&db_path).expect("open store"));
        let notifier = Arc::new(RecordingNotifier::new());
        let sessions = TokenSessionResolver::new()
            .with_session("u1", Identity::new("u1"))
            .with_session("u2", Identity::new("u2"));
        let forum = Forum::new(store.clone(), Arc::new(sessions), notifier.clone());
        Self {
            forum,
            store,
            notifier,
            db_path,
            _dir: dir,
        }
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// A second connection to the same database file.
    pub fn reopen(&self) -> SqliteStore {
        SqliteStore::open(&self.db_path).expect("reopen store")
    }

    pub fn topic(&self, user: &str, name: &str) -> Topic {
        self.forum
            .create_topic(&as_user(user), &topic_form(name, "A place to discuss Rust"))
            .expect("create topic")
    }

    pub fn post(&self, user: &str, topic_slug: &str) -> Post {
        self.forum
            .create_post(
                &as_user(user),
                topic_slug,
                &post_form("Hello", "First post content"),
            )
            .expect("create post")
    }
}

pub fn as_user(user: &str) -> RequestContext {
    RequestContext::with_token(user)
}

pub fn topic_form(name: &str, description: &str) -> FormInput {
    FormInput::new()
        .with("name", name)
        .with("description", description)
}

pub fn post_form(title: &str, content: &str) -> FormInput {
    FormInput::new().with("title", title).with("content", content)
}

/// Result of one `agora` invocation.
#[derive(Debug)]
pub struct CliOutput {
    pub code: Option<i32>,
    pub json: Value,
    pub stderr: String,
}

impl CliOutput {
    pub fn ok(&self) -> &Value {
        assert_eq!(self.code, Some(0), "agora failed: {self:?}");
        &self.json["ok"]
    }

    pub fn errors(&self) -> &Value {
        assert_eq!(self.code, Some(1), "expected a rejected mutation: {self:?}");
        &self.json["errors"]
    }
}

/// Run the binary against `db`. `AGORA_CONFIG` points into `config_dir` so
/// the developer's own config is never read.
pub fn run_cli(config_dir: &Path, db: &Path, args: &[&str]) -> CliOutput {
    let output = Command::new(env!("CARGO_BIN_EXE_agora"))
        .arg("--db")
        .arg(db)
        .args(args)
        .env("AGORA_CONFIG", config_dir.join("config.toml"))
        .env_remove("AGORA_USER")
        .env("RUST_LOG", "off")
        .output()
        .expect("spawn agora");

    let stdout = String::from_utf8_lossy(&output.stdout);
    let json = if stdout.trim().is_empty() {
        Value::Null
    } else {
        serde_json::from_str(stdout.trim()).expect("stdout is JSON")
    };
    CliOutput {
        code: output.status.code(),
        json,
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    }
}
