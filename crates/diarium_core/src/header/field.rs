//! Tagged header values.
//!
//! # Responsibility
//! - Convert raw YAML values into an explicit tagged shape before any
//!   downstream code looks at them.
//!
//! # Invariants
//! - `.` becomes `Sentinel::ThisDocument`; quoted `~` and `??` become
//!   `Sentinel::Unknown`. An unquoted `~` is YAML null and date readers map
//!   it to unknown.
//! - Numbers and booleans become scalars; nothing downstream sees YAML types.

use crate::model::date::{DateRef, THIS_DOCUMENT_SENTINEL, UNKNOWN_SENTINEL};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_yaml::Value;
use std::collections::BTreeMap;

static PACKED_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<head>.*?)\s*\((?P<context>[^()]*)\)\s*$").expect("valid packed regex")
});

/// Date sentinel written as a bare marker in the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sentinel {
    ThisDocument,
    Unknown,
}

impl Sentinel {
    pub fn as_text(self) -> &'static str {
        match self {
            Self::ThisDocument => THIS_DOCUMENT_SENTINEL,
            Self::Unknown => UNKNOWN_SENTINEL,
        }
    }

    pub fn to_date_ref(self) -> DateRef {
        match self {
            Self::ThisDocument => DateRef::ThisDocument,
            Self::Unknown => DateRef::Unknown,
        }
    }
}

/// One header value with its shape made explicit.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Scalar(String),
    Sentinel(Sentinel),
    List(Vec<FieldValue>),
    Record(BTreeMap<String, FieldValue>),
}

impl FieldValue {
    pub fn from_yaml(value: Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(value) => Self::Scalar(value.to_string()),
            Value::Number(value) => Self::Scalar(value.to_string()),
            Value::String(text) => match text.trim() {
                THIS_DOCUMENT_SENTINEL => Self::Sentinel(Sentinel::ThisDocument),
                UNKNOWN_SENTINEL | "??" => Self::Sentinel(Sentinel::Unknown),
                _ => Self::Scalar(text),
            },
            Value::Sequence(items) => Self::List(items.into_iter().map(Self::from_yaml).collect()),
            Value::Mapping(mapping) => Self::Record(
                mapping
                    .into_iter()
                    .filter_map(|(key, value)| {
                        yaml_key(&key).map(|key| (key, Self::from_yaml(value)))
                    })
                    .collect(),
            ),
            Value::Tagged(tagged) => Self::from_yaml(tagged.value),
        }
    }

    /// Coerces scalar-or-list into a list; `Null` becomes empty.
    pub fn into_list(self) -> Vec<FieldValue> {
        match self {
            Self::Null => Vec::new(),
            Self::List(items) => items,
            other => vec![other],
        }
    }

    /// Trimmed text of a scalar or sentinel; `None` for blank or structured
    /// values.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Self::Scalar(text) => {
                let trimmed = text.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            }
            Self::Sentinel(sentinel) => Some(sentinel.as_text().to_string()),
            _ => None,
        }
    }

    /// Text of a scalar or sentinel with its leading indentation kept;
    /// trailing whitespace is dropped. `None` for blank or structured values.
    pub fn as_indented_text(&self) -> Option<String> {
        match self {
            Self::Scalar(text) if !text.trim().is_empty() => Some(text.trim_end().to_string()),
            Self::Sentinel(sentinel) => Some(sentinel.as_text().to_string()),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&BTreeMap<String, FieldValue>> {
        match self {
            Self::Record(map) => Some(map),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Short shape name used in warnings.
    pub fn kind_label(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Scalar(_) => "scalar",
            Self::Sentinel(_) => "sentinel",
            Self::List(_) => "list",
            Self::Record(_) => "record",
        }
    }
}

/// Splits a packed `head (context)` string.
///
/// Text without a trailing parenthesized group is returned unchanged.
pub fn split_packed(text: &str) -> (String, Option<String>) {
    let trimmed = text.trim();
    match PACKED_RE.captures(trimmed) {
        Some(captures) => {
            let head = captures["head"].trim().to_string();
            let context = captures["context"].trim();
            if head.is_empty() {
                return (trimmed.to_string(), None);
            }
            (head, (!context.is_empty()).then(|| context.to_string()))
        }
        None => (trimmed.to_string(), None),
    }
}

fn yaml_key(key: &Value) -> Option<String> {
    match key {
        Value::String(text) => Some(text.trim().to_string()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(value) => Some(value.to_string()),
        _ => None,
    }
}
