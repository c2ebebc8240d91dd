//! Agora CLI - runs one mutation against a local SQLite store.
//!
//! ```text
//! main() -> parse_args() -> Forum::{create,update,delete}_{topic,post}()
//!                                     |
//!                                     v
//!                     {"ok": payload} | {"errors": FormErrors}
//! ```
//!
//! The acting identity comes from `--as` or `AGORA_USER`. Sign-in itself is
//! somebody else's job; this binary only stands in for an identity provider.

mod args;

use std::{
    env,
    io::{Write, stdout},
    path::PathBuf,
    process::ExitCode,
    str::FromStr,
    sync::Arc,
};

use anyhow::{Context, Result};
use serde_json::{Value, json};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use agora_config::AgoraConfig;
use agora_core::{Forum, SlugAllocator, StaticSessionResolver, TracingNotifier};
use agora_store::SqliteStore;
use agora_types::{
    Identity, MutationError, MutationResult, PostId, RequestContext, Resource, Store, TopicId,
};

use args::{Command, Invocation, USAGE, parse_args};

const USER_ENV_VAR: &str = "AGORA_USER";

const EXIT_MUTATION_FAILED: u8 = 1;
const EXIT_USAGE: u8 = 2;
/// The store or stdout is unusable.
const EXIT_ENVIRONMENT: u8 = 3;

fn main() -> ExitCode {
    let config = match AgoraConfig::load() {
        Ok(config) => config.unwrap_or_default(),
        Err(err) => {
            eprintln!("agora: {err}");
            return ExitCode::from(EXIT_USAGE);
        }
    };
    init_tracing(config.log_filter());

    let invocation = match parse_args(env::args().skip(1)) {
        Ok(invocation) => invocation,
        Err(err) => {
            eprintln!("agora: {err}\n\n{USAGE}");
            return ExitCode::from(EXIT_USAGE);
        }
    };

    match run(&config, invocation) {
        Ok(Ok(payload)) => emit(&json!({ "ok": payload })),
        Ok(Err(err)) => {
            tracing::info!(error = %err, "Mutation rejected");
            emit(&json!({ "errors": err.form_errors() }));
            ExitCode::from(EXIT_MUTATION_FAILED)
        }
        Err(err) => {
            eprintln!("agora: {err:#}");
            ExitCode::from(EXIT_ENVIRONMENT)
        }
    }
}

fn init_tracing(default_filter: &str) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    // stdout carries the JSON result.
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_writer(std::io::stderr),
        )
        .with(env_filter)
        .init();
}

fn emit(value: &Value) -> ExitCode {
    let mut out = stdout().lock();
    match writeln!(out, "{value}") {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("agora: failed to write result: {err}");
            ExitCode::from(EXIT_ENVIRONMENT)
        }
    }
}

/// Outer `Err` is an environment failure (no store), inner is a rejected mutation.
fn run(config: &AgoraConfig, invocation: Invocation) -> Result<MutationResult<Value>> {
    let db_path = resolve_db_path(config, invocation.db)?;
    let store = Arc::new(
        SqliteStore::open(&db_path)
            .with_context(|| format!("Failed to open store at {}", db_path.display()))?,
    );

    let sessions = match acting_user(invocation.user) {
        Some(user) => StaticSessionResolver::signed_in(Identity::new(user)),
        None => StaticSessionResolver::anonymous(),
    };
    let forum = Forum::new(store.clone(), Arc::new(sessions), Arc::new(TracingNotifier))
        .with_slug_allocator(slug_allocator(config));

    let request = RequestContext::anonymous();
    let form = &invocation.form;

    let outcome = match invocation.command {
        Command::CreateTopic => forum.create_topic(&request, form).and_then(to_json),
        Command::UpdateTopic { id } => parse_id::<TopicId>(&id, Resource::Topic)
            .and_then(|id| forum.update_topic(&request, id, form))
            .map(|slug| json!({ "slug": slug })),
        Command::DeleteTopic { id } => parse_id::<TopicId>(&id, Resource::Topic)
            .and_then(|topic_id| forum.delete_topic(&request, topic_id))
            .map(|()| json!({ "deleted": id })),
        Command::CreatePost { topic_slug } => forum
            .create_post(&request, &topic_slug, form)
            .and_then(to_json),
        Command::UpdatePost { id, topic_slug } => parse_id::<PostId>(&id, Resource::Post)
            .and_then(|id| forum.update_post(&request, id, &topic_slug, form))
            .and_then(to_json),
        Command::DeletePost { id } => parse_id::<PostId>(&id, Resource::Post)
            .and_then(|post_id| forum.delete_post(&request, post_id))
            .map(|topic_id| json!({ "deleted": id, "topic_id": topic_id })),
        Command::ShowTopic { slug } => show_topic(&store, &slug),
    };
    Ok(outcome)
}

fn show_topic(store: &SqliteStore, slug: &str) -> MutationResult<Value> {
    let topic = store
        .find_topic_by_slug(slug)?
        .ok_or(MutationError::NotFound {
            resource: Resource::Topic,
        })?;
    let posts = store.posts_for_topic(topic.id)?;
    Ok(json!({ "topic": topic, "posts": posts }))
}

fn slug_allocator(config: &AgoraConfig) -> SlugAllocator {
    let mut slugs = SlugAllocator::default();
    if let Some(words) = config.reserved_words() {
        slugs = slugs.with_reserved_words(words);
    }
    if let Some(attempts) = config.slug_attempts() {
        slugs = slugs.with_max_attempts(attempts);
    }
    slugs
}

fn resolve_db_path(config: &AgoraConfig, flag: Option<PathBuf>) -> Result<PathBuf> {
    flag.or_else(|| config.store_path())
        .context("No store path: pass --db or set a home directory")
}

fn acting_user(flag: Option<String>) -> Option<String> {
    flag.or_else(|| env::var(USER_ENV_VAR).ok())
        .map(|user| user.trim().to_string())
        .filter(|user| !user.is_empty())
}

/// An id that does not parse cannot name an existing record.
fn parse_id<T: FromStr>(raw: &str, resource: Resource) -> MutationResult<T> {
    raw.parse()
        .map_err(|_| MutationError::NotFound { resource })
}

fn to_json<T: serde::Serialize>(value: T) -> MutationResult<Value> {
    serde_json::to_value(value).map_err(|err| MutationError::storage(err.to_string()))
}
