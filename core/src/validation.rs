//! Field validation for untrusted form input.
//!
//! Rules are declared once per [`Field`]; a [`Schema`] selects which fields
//! apply and whether they are required. Update schemas treat every field as
//! optional, but a field that is present, even as an empty string, must
//! satisfy the same rule as on create.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

use agora_types::{Field, FieldErrors, FormInput};

static TOPIC_NAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z-]+$").expect("valid topic name regex"));

const TOPIC_NAME_PATTERN_MESSAGE: &str = "Must be lowercase letters or dashes without spaces";
const REQUIRED_MESSAGE: &str = "Required";

/// Which mutation the input is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Schema {
    CreateTopic,
    UpdateTopic,
    CreatePost,
    UpdatePost,
}

impl Schema {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Schema::CreateTopic => "create-topic",
            Schema::UpdateTopic => "update-topic",
            Schema::CreatePost => "create-post",
            Schema::UpdatePost => "update-post",
        }
    }

    #[must_use]
    pub const fn fields(self) -> &'static [Field] {
        match self {
            Schema::CreateTopic | Schema::UpdateTopic => &[Field::Name, Field::Description],
            Schema::CreatePost | Schema::UpdatePost => &[Field::Title, Field::Content],
        }
    }

    #[must_use]
    pub const fn is_update(self) -> bool {
        matches!(self, Schema::UpdateTopic | Schema::UpdatePost)
    }
}

struct FieldRule {
    min_chars: usize,
    pattern: Option<(&'static LazyLock<Regex>, &'static str)>,
}

impl FieldRule {
    fn for_field(field: Field) -> Self {
        match field {
            Field::Name => FieldRule {
                min_chars: 3,
                pattern: Some((&TOPIC_NAME_PATTERN, TOPIC_NAME_PATTERN_MESSAGE)),
            },
            Field::Description | Field::Content => FieldRule {
                min_chars: 10,
                pattern: None,
            },
            Field::Title => FieldRule {
                min_chars: 3,
                pattern: None,
            },
        }
    }

    /// Every violated constraint, in declaration order.
    fn violations(&self, value: &str) -> Vec<String> {
        let mut messages = Vec::new();
        if value.chars().count() < self.min_chars {
            messages.push(format!(
                "String must contain at least {} character(s)",
                self.min_chars
            ));
        }
        if let Some((pattern, message)) = self.pattern
            && !pattern.is_match(value)
        {
            messages.push((*message).to_string());
        }
        messages
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicFields {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopicUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostFields {
    pub title: String,
    pub content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostUpdate {
    pub title: Option<String>,
    pub content: Option<String>,
}

/// Validated input, tagged by schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validated {
    CreateTopic(TopicFields),
    UpdateTopic(TopicUpdate),
    CreatePost(PostFields),
    UpdatePost(PostUpdate),
}

pub fn validate(schema: Schema, input: &FormInput) -> Result<Validated, FieldErrors> {
    Ok(match schema {
        Schema::CreateTopic => Validated::CreateTopic(create_topic(input)?),
        Schema::UpdateTopic => Validated::UpdateTopic(update_topic(input)?),
        Schema::CreatePost => Validated::CreatePost(create_post(input)?),
        Schema::UpdatePost => Validated::UpdatePost(update_post(input)?),
    })
}

pub fn create_topic(input: &FormInput) -> Result<TopicFields, FieldErrors> {
    let mut values = check(Schema::CreateTopic, input)?;
    Ok(TopicFields {
        name: values.remove(&Field::Name).unwrap_or_default(),
        description: values.remove(&Field::Description).unwrap_or_default(),
    })
}

pub fn update_topic(input: &FormInput) -> Result<TopicUpdate, FieldErrors> {
    let mut values = check(Schema::UpdateTopic, input)?;
    Ok(TopicUpdate {
        name: values.remove(&Field::Name),
        description: values.remove(&Field::Description),
    })
}

pub fn create_post(input: &FormInput) -> Result<PostFields, FieldErrors> {
    let mut values = check(Schema::CreatePost, input)?;
    Ok(PostFields {
        title: values.remove(&Field::Title).unwrap_or_default(),
        content: values.remove(&Field::Content).unwrap_or_default(),
    })
}

pub fn update_post(input: &FormInput) -> Result<PostUpdate, FieldErrors> {
    let mut values = check(Schema::UpdatePost, input)?;
    Ok(PostUpdate {
        title: values.remove(&Field::Title),
        content: values.remove(&Field::Content),
    })
}

/// Present, valid values for the schema's fields. Absent optional fields are omitted.
fn check(schema: Schema, input: &FormInput) -> Result<BTreeMap<Field, String>, FieldErrors> {
    let mut errors = FieldErrors::new();
    let mut values = BTreeMap::new();

    for &field in schema.fields() {
        match input.get(field.as_str()) {
            None if schema.is_update() => {}
            None => errors.push(field, REQUIRED_MESSAGE),
            Some(value) => {
                let violations = FieldRule::for_field(field).violations(value);
                if violations.is_empty() {
                    values.insert(field, value.to_string());
                } else {
                    for message in violations {
                        errors.push(field, message);
                    }
                }
            }
        }
    }

    if errors.is_empty() {
        Ok(values)
    } else {
        Err(errors)
    }
}
