//! Front matter splitting and content hashing.
//!
//! # Responsibility
//! - Split raw document text into header fields and body.
//! - Compute the content hash used by change detection.
//!
//! # Invariants
//! - The hash covers the full text (header and body) byte for byte.
//! - The header must be the first block of the document, opened and closed by
//!   a `---` line.

use crate::header::field::FieldValue;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

const DELIMITER: &str = "---";

/// Extraction failure for one document.
#[derive(Debug)]
pub enum HeaderError {
    MissingFrontMatter,
    Yaml(serde_yaml::Error),
    NotAMapping,
    MissingDate,
    InvalidDate(String),
}

impl Display for HeaderError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingFrontMatter => {
                write!(f, "document has no `---` delimited front matter")
            }
            Self::Yaml(err) => write!(f, "malformed header: {err}"),
            Self::NotAMapping => write!(f, "header must be a mapping of fields"),
            Self::MissingDate => write!(f, "header has no `date` field"),
            Self::InvalidDate(value) => {
                write!(f, "header date `{value}` is not a YYYY-MM-DD day")
            }
        }
    }
}

impl Error for HeaderError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Yaml(err) => Some(err),
            _ => None,
        }
    }
}

impl From<serde_yaml::Error> for HeaderError {
    fn from(value: serde_yaml::Error) -> Self {
        Self::Yaml(value)
    }
}

/// Document split into raw tagged fields and body.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDocument {
    pub fields: BTreeMap<String, FieldValue>,
    pub body: String,
    pub content_hash: String,
}

/// Lowercase hex SHA-256 of the full document text.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

/// Returns `(header, body)` slices, or `None` when the text has no front
/// matter.
pub fn split_front_matter(text: &str) -> Option<(&str, &str)> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut lines = text.split_inclusive('\n');
    let first = lines.next()?;
    if first.trim_end() != DELIMITER {
        return None;
    }

    let header_start = first.len();
    let mut offset = header_start;
    for line in lines {
        let trimmed = line.trim_end();
        if trimmed == DELIMITER || trimmed == "..." {
            let body = &text[offset + line.len()..];
            return Some((&text[header_start..offset], body));
        }
        offset += line.len();
    }
    None
}

/// Replaces the front matter of `text` with `header`, keeping the body.
///
/// Text without front matter gets the header prepended.
pub fn replace_front_matter(text: &str, header: &str) -> String {
    let body = split_front_matter(text).map_or(text, |(_, body)| body);
    let mut output = String::with_capacity(header.len() + body.len() + 8);
    output.push_str(DELIMITER);
    output.push('\n');
    output.push_str(header);
    if !header.ends_with('\n') {
        output.push('\n');
    }
    output.push_str(DELIMITER);
    output.push('\n');
    output.push_str(body);
    output
}

/// Splits and tags the header of one document.
pub fn extract(text: &str) -> Result<RawDocument, HeaderError> {
    let (header, body) = split_front_matter(text).ok_or(HeaderError::MissingFrontMatter)?;
    let value: serde_yaml::Value = if header.trim().is_empty() {
        serde_yaml::Value::Mapping(serde_yaml::Mapping::new())
    } else {
        serde_yaml::from_str(header)?
    };
    let fields = match FieldValue::from_yaml(value) {
        FieldValue::Record(fields) => fields,
        _ => return Err(HeaderError::NotAMapping),
    };

    Ok(RawDocument {
        fields,
        body: body.to_string(),
        content_hash: content_hash(text),
    })
}

#[cfg(test)]
mod tests {
    use super::{content_hash, extract, replace_front_matter, split_front_matter, HeaderError};

    #[test]
    fn splits_header_and_body() {
        let text = "---\ndate: 2024-03-10\n---\nBody line.\n";
        let (header, body) = split_front_matter(text).unwrap();
        assert_eq!(header, "date: 2024-03-10\n");
        assert_eq!(body, "Body line.\n");
    }

    #[test]
    fn missing_front_matter_is_an_error() {
        assert!(matches!(
            extract("just text\n"),
            Err(HeaderError::MissingFrontMatter)
        ));
        assert!(matches!(
            extract("---\ndate: 2024-03-10\nno closing line\n"),
            Err(HeaderError::MissingFrontMatter)
        ));
    }

    #[test]
    fn scalar_header_is_not_a_mapping() {
        assert!(matches!(
            extract("---\njust a string\n---\n"),
            Err(HeaderError::NotAMapping)
        ));
    }

    #[test]
    fn hash_changes_with_any_byte() {
        let first = content_hash("---\ndate: 2024-03-10\n---\nA\n");
        let second = content_hash("---\ndate: 2024-03-10\n---\nB\n");
        assert_eq!(first.len(), 64);
        assert_ne!(first, second);
    }

    #[test]
    fn replacing_front_matter_keeps_body() {
        let text = "---\ndate: 2024-03-10\n---\nBody.\n";
        let replaced = replace_front_matter(text, "date: 2024-03-10\nword_count: 1\n");
        assert_eq!(replaced, "---\ndate: 2024-03-10\nword_count: 1\n---\nBody.\n");
    }
}
