//! Tests that drive the `agora` binary.

use serde_json::json;
use tempfile::TempDir;

use crate::common::{CliOutput, run_cli};

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("tempdir"),
        }
    }

    fn run(&self, args: &[&str]) -> CliOutput {
        run_cli(self.dir.path(), &self.dir.path().join("agora.db"), args)
    }

    fn create_topic(&self, user: &str, name: &str) -> serde_json::Value {
        self.run(&[
            "--as",
            user,
            "create-topic",
            &format!("name={name}"),
            "description=A place to discuss Rust",
        ])
        .ok()
        .clone()
    }
}

#[test]
fn create_topic_prints_the_topic() {
    let ws = Workspace::new();

    let first = ws.create_topic("u1", "rust-lang");
    let second = ws.create_topic("u2", "rust-lang");

    assert_eq!(first["slug"], "rust-lang");
    assert_eq!(first["owner_id"], "u1");
    assert_eq!(second["slug"], "rust-lang-1");
}

#[test]
fn anonymous_callers_get_a_form_error() {
    let ws = Workspace::new();

    let out = ws.run(&[
        "create-topic",
        "name=rust-lang",
        "description=A place to discuss Rust",
    ]);
    assert_eq!(
        out.errors(),
        &json!({ "_form": ["You must be signed in to do this."] })
    );
}

#[test]
fn validation_errors_are_keyed_by_field() {
    let ws = Workspace::new();

    let out = ws.run(&[
        "--as",
        "u1",
        "create-topic",
        "name=Rust Lang",
        "description=short",
    ]);
    let errors = out.errors();
    assert_eq!(
        errors["name"],
        json!(["Must be lowercase letters or dashes without spaces"])
    );
    assert_eq!(
        errors["description"],
        json!(["String must contain at least 10 character(s)"])
    );
    assert!(errors.get("_form").is_none());
}

#[test]
fn post_round_trip_through_show_topic() {
    let ws = Workspace::new();
    let topic = ws.create_topic("u1", "rust-lang");

    let post = ws
        .run(&[
            "--as",
            "u1",
            "create-post",
            "rust-lang",
            "title=Hello",
            "content=First post content",
        ])
        .ok()
        .clone();
    assert_eq!(post["topic_id"], topic["id"]);
    let post_id = post["id"].as_str().expect("post id");

    let forbidden = ws.run(&[
        "--as",
        "u2",
        "update-post",
        post_id,
        "rust-lang",
        "content=Somebody else's words",
    ]);
    assert_eq!(
        forbidden.errors(),
        &json!({ "_form": ["You are not authorized to update this post."] })
    );

    let shown = ws.run(&["show-topic", "rust-lang"]).ok().clone();
    assert_eq!(shown["topic"]["id"], topic["id"]);
    assert_eq!(shown["posts"][0]["content"], "First post content");

    let deleted = ws
        .run(&["--as", "u1", "delete-post", post_id])
        .ok()
        .clone();
    assert_eq!(deleted["topic_id"], topic["id"]);

    let shown = ws.run(&["show-topic", "rust-lang"]).ok().clone();
    assert_eq!(shown["posts"], json!([]));
}

#[test]
fn rename_reports_the_new_slug() {
    let ws = Workspace::new();
    let topic = ws.create_topic("u1", "rust-lang");
    let id = topic["id"].as_str().expect("topic id");

    let renamed = ws
        .run(&["--as", "u1", "update-topic", id, "name=rustaceans"])
        .ok()
        .clone();
    assert_eq!(renamed, json!({ "slug": "rustaceans" }));

    let missing = ws.run(&["show-topic", "rust-lang"]);
    assert_eq!(missing.errors(), &json!({ "_form": ["Cannot find topic."] }));
}

#[test]
fn malformed_ids_are_not_found() {
    let ws = Workspace::new();

    let out = ws.run(&["--as", "u1", "delete-topic", "not-a-uuid"]);
    assert_eq!(out.errors(), &json!({ "_form": ["Cannot find topic."] }));
}

#[test]
fn usage_errors_exit_with_two() {
    let ws = Workspace::new();

    let out = ws.run(&["frobnicate"]);
    assert_eq!(out.code, Some(2));
    assert!(out.stderr.contains("unknown command: frobnicate"));
    assert!(out.stderr.contains("Usage: agora"));
}

#[test]
fn unusable_store_is_not_a_rejected_mutation() {
    let ws = Workspace::new();
    // A directory cannot be opened as the database file.
    let out = run_cli(ws.dir.path(), ws.dir.path(), &["show-topic", "rust-lang"]);

    assert_eq!(out.code, Some(3));
    assert_eq!(out.json, serde_json::Value::Null);
    assert_eq!(out.stderr.matches("Failed to open store").count(), 1);
}
