//! Command-line parsing.

use std::path::PathBuf;

use thiserror::Error;

use agora_types::FormInput;

pub const USAGE: &str = "\
Usage: agora [--as USER] [--db PATH] <command> [args] [field=value ...]

Commands:
  create-topic                          name=... description=...
  update-topic <topic-id>               [name=...] [description=...]
  delete-topic <topic-id>
  create-post <topic-slug>              title=... content=...
  update-post <post-id> <topic-slug>    [title=...] [content=...]
  delete-post <post-id>
  show-topic <topic-slug>

The acting identity is taken from --as, else from AGORA_USER.

Exit status: 0 ok, 1 mutation rejected, 2 usage or config error,
3 store unavailable.";

#[derive(Debug, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct UsageError(String);

impl UsageError {
    fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    CreateTopic,
    UpdateTopic { id: String },
    DeleteTopic { id: String },
    CreatePost { topic_slug: String },
    UpdatePost { id: String, topic_slug: String },
    DeletePost { id: String },
    ShowTopic { slug: String },
}

impl Command {
    fn positional_count(name: &str) -> Option<usize> {
        match name {
            "create-topic" => Some(0),
            "update-topic" | "delete-topic" | "create-post" | "delete-post" | "show-topic" => {
                Some(1)
            }
            "update-post" => Some(2),
            _ => None,
        }
    }

    fn build(name: &str, mut positional: Vec<String>) -> Self {
        let mut take = || positional.remove(0);
        match name {
            "update-topic" => Command::UpdateTopic { id: take() },
            "delete-topic" => Command::DeleteTopic { id: take() },
            "create-post" => Command::CreatePost { topic_slug: take() },
            "update-post" => {
                let id = take();
                Command::UpdatePost {
                    id,
                    topic_slug: take(),
                }
            }
            "delete-post" => Command::DeletePost { id: take() },
            "show-topic" => Command::ShowTopic { slug: take() },
            _ => Command::CreateTopic,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub user: Option<String>,
    pub db: Option<PathBuf>,
    pub command: Command,
    pub form: FormInput,
}

pub fn parse_args<I>(args: I) -> Result<Invocation, UsageError>
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter();
    let mut user = None;
    let mut db = None;

    let name = loop {
        let Some(arg) = args.next() else {
            return Err(UsageError::new("missing command"));
        };
        if arg == "--as" {
            user = Some(flag_value(&mut args, "--as")?);
        } else if arg == "--db" {
            db = Some(PathBuf::from(flag_value(&mut args, "--db")?));
        } else if arg.starts_with("--") {
            return Err(UsageError::new(format!("unknown option: {arg}")));
        } else {
            break arg;
        }
    };

    let expected = Command::positional_count(&name)
        .ok_or_else(|| UsageError::new(format!("unknown command: {name}")))?;

    let mut positional = Vec::with_capacity(expected);
    let mut form = FormInput::new();
    for arg in args {
        if let Some((key, value)) = arg.split_once('=') {
            form.insert(key, value);
        } else if positional.len() < expected {
            positional.push(arg);
        } else {
            return Err(UsageError::new(format!("unexpected argument: {arg}")));
        }
    }
    if positional.len() < expected {
        return Err(UsageError::new(format!(
            "{name} expects {expected} argument(s), got {}",
            positional.len()
        )));
    }

    Ok(Invocation {
        user,
        db,
        command: Command::build(&name, positional),
        form,
    })
}

fn flag_value(args: &mut impl Iterator<Item = String>, flag: &str) -> Result<String, UsageError> {
    args.next()
        .ok_or_else(|| UsageError::new(format!("{flag} requires a value")))
}
