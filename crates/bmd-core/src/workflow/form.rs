use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A submitted form value: single inputs carry one string, multi-selects a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    One(String),
    Many(Vec<String>),
}

impl FieldValue {
    pub fn first(&self) -> Option<&str> {
        match self {
            Self::One(v) => Some(v),
            Self::Many(vs) => vs.first().map(String::as_str),
        }
    }

    pub fn all(&self) -> Vec<String> {
        match self {
            Self::One(v) => vec![v.clone()],
            Self::Many(vs) => vs.clone(),
        }
    }
}

/// An uploaded file, already decoded from the transport encoding.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub content: Vec<u8>,
}

/// The inputs of one step as posted by the browser.
#[derive(Debug, Clone, Default)]
pub struct StepSubmission {
    pub fields: BTreeMap<String, FieldValue>,
    pub files: BTreeMap<String, UploadedFile>,
}

impl StepSubmission {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: &str, value: impl Into<String>) -> Self {
        self.fields.insert(name.to_string(), FieldValue::One(value.into()));
        self
    }

    pub fn list(mut self, name: &str, values: &[&str]) -> Self {
        let values = values.iter().map(|v| v.to_string()).collect();
        self.fields.insert(name.to_string(), FieldValue::Many(values));
        self
    }

    pub fn file(mut self, name: &str, filename: &str, content: Vec<u8>) -> Self {
        self.files.insert(
            name.to_string(),
            UploadedFile {
                filename: filename.to_string(),
                content,
            },
        );
        self
    }

    /// First value of `name`, trimmed; `None` when absent or blank.
    pub fn value(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .and_then(FieldValue::first)
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }

    /// Every value posted under `name`, including blanks.
    pub fn values(&self, name: &str) -> Vec<String> {
        self.fields.get(name).map(FieldValue::all).unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Choice {
    pub value: String,
    pub label: String,
}

impl Choice {
    pub fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Choice,
    MultipleChoice,
    Text,
    Textarea,
    Integer,
    File,
}

/// One rendered input of a step.
#[derive(Debug, Clone, Serialize)]
pub struct Field {
    pub name: &'static str,
    pub label: &'static str,
    pub kind: FieldKind,
    pub required: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<Choice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial: Option<FieldValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub help_text: Option<&'static str>,
    /// Sub-flow that creates a new choice inline.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub add_item_url: Option<&'static str>,
}

impl Field {
    pub fn new(name: &'static str, label: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            label,
            kind,
            required: true,
            choices: Vec::new(),
            initial: None,
            help_text: None,
            add_item_url: None,
        }
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn choices(mut self, choices: Vec<Choice>) -> Self {
        self.choices = choices;
        self
    }

    pub fn initial(mut self, initial: Option<FieldValue>) -> Self {
        self.initial = initial;
        self
    }

    pub fn help(mut self, text: &'static str) -> Self {
        self.help_text = Some(text);
        self
    }

    pub fn add_item(mut self, url: &'static str) -> Self {
        self.add_item_url = Some(url);
        self
    }

    /// Whether `value` is one of the selectable (non-placeholder) choices.
    pub fn offers(&self, value: &str) -> bool {
        !value.is_empty() && self.choices.iter().any(|c| c.value == value)
    }
}

/// Validation errors of one step, keyed by field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FieldErrors {
    pub fields: BTreeMap<String, Vec<String>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub non_field: Vec<String>,
}

impl FieldErrors {
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.fields
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn add_non_field(&mut self, message: impl Into<String>) {
        self.non_field.push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.non_field.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.fields.get(field).map(Vec::as_slice)
    }
}

pub(crate) const REQUIRED: &str = "This field is required.";

pub(crate) fn invalid_choice(value: &str) -> String {
    format!("Select a valid choice. {value} is not one of the available choices.")
}
