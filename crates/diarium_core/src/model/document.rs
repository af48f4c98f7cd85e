//! Document aggregate and header field ownership.
//!
//! # Responsibility
//! - Define the root aggregate stored per imported diary document.
//! - Classify header fields as identity, computed, editable or relation.
//!
//! # Invariants
//! - `date` is a unique natural key across all documents.
//! - Computed fields are derived from the body/graph only; external content
//!   never overwrites them.
//! - Editable fields are optional in updates: `None` means "leave unchanged"
//!   and `Some(None)` clears the stored value.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier for a stored document.
pub type DocumentId = Uuid;

/// Stored document row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    /// Natural key; one document per calendar day.
    pub date: NaiveDate,
    /// Path relative to the batch root, when imported from a file.
    pub source_path: Option<String>,
    /// Computed from the body.
    pub word_count: i64,
    /// SHA-256 of the full source text, lowercase hex.
    pub content_hash: String,
    /// Editable operator annotation.
    pub notes: Option<String>,
    /// Editable operator summary.
    pub summary: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Values for a new document row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDocument {
    pub date: NaiveDate,
    pub source_path: Option<String>,
    pub word_count: i64,
    pub content_hash: String,
}

/// Partial update of operator-editable fields.
///
/// `None` leaves the stored value unchanged; `Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditableFields {
    pub notes: Option<Option<String>>,
    pub summary: Option<Option<String>>,
}

impl EditableFields {
    pub fn is_empty(&self) -> bool {
        self.notes.is_none() && self.summary.is_none()
    }
}

/// How a header field relates to the stored graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldOwnership {
    /// Natural key of the document.
    Identity,
    /// Derived from the body or the relation graph; ignored on import.
    Computed,
    /// Operator-revisable free text; omission leaves the stored value.
    Editable,
    /// Materialized into relation records.
    Relation,
}

/// Header fields in export order.
pub const HEADER_FIELDS: &[(&str, FieldOwnership)] = &[
    ("date", FieldOwnership::Identity),
    ("word_count", FieldOwnership::Computed),
    ("city", FieldOwnership::Relation),
    ("locations", FieldOwnership::Relation),
    ("people", FieldOwnership::Relation),
    ("arcs", FieldOwnership::Relation),
    ("tags", FieldOwnership::Relation),
    ("themes", FieldOwnership::Relation),
    ("scenes", FieldOwnership::Relation),
    ("events", FieldOwnership::Relation),
    ("threads", FieldOwnership::Relation),
    ("references", FieldOwnership::Relation),
    ("poems", FieldOwnership::Relation),
    ("motifs", FieldOwnership::Relation),
    ("summary", FieldOwnership::Editable),
    ("notes", FieldOwnership::Editable),
];

/// Returns the ownership class of a header field, or `None` for unknown keys.
pub fn field_ownership(key: &str) -> Option<FieldOwnership> {
    HEADER_FIELDS
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, ownership)| *ownership)
}

/// Merge semantics for newly parsed relations of an existing document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateMode {
    /// Each relation type is replaced by the new set. Shared entities missing
    /// from the new set are unlinked; owned records are removed.
    #[default]
    FullReplace,
    /// New relations are unioned with the existing ones; nothing is unlinked.
    Incremental,
}

impl UpdateMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FullReplace => "full_replace",
            Self::Incremental => "incremental",
        }
    }
}

/// Counts whitespace-separated words of a document body.
pub fn count_words(body: &str) -> i64 {
    body.split_whitespace().count() as i64
}

#[cfg(test)]
mod tests {
    use super::{count_words, field_ownership, Document, FieldOwnership, UpdateMode};
    use chrono::NaiveDate;
    use uuid::Uuid;

    #[test]
    fn document_serializes_date_and_id_as_text() {
        let document = Document {
            id: Uuid::new_v4(),
            date: NaiveDate::from_ymd_opt(2024, 3, 10).unwrap(),
            source_path: Some("2024/2024-03-10.md".to_string()),
            word_count: 6,
            content_hash: "ab".repeat(32),
            notes: None,
            summary: Some("A slow Sunday.".to_string()),
            created_at: 1_700_000_000_000,
            updated_at: 1_700_000_000_000,
        };

        let json = serde_json::to_value(&document).unwrap();
        assert_eq!(json["id"], document.id.to_string());
        assert_eq!(json["date"], "2024-03-10");
        assert_eq!(json["notes"], serde_json::Value::Null);

        let decoded: Document = serde_json::from_value(json).unwrap();
        assert_eq!(decoded, document);
    }

    #[test]
    fn computed_and_editable_fields_are_classified() {
        assert_eq!(field_ownership("word_count"), Some(FieldOwnership::Computed));
        assert_eq!(field_ownership("notes"), Some(FieldOwnership::Editable));
        assert_eq!(field_ownership("scenes"), Some(FieldOwnership::Relation));
        assert_eq!(field_ownership("mood"), None);
    }

    #[test]
    fn default_update_mode_is_full_replace() {
        assert_eq!(UpdateMode::default(), UpdateMode::FullReplace);
    }

    #[test]
    fn word_count_ignores_extra_whitespace() {
        assert_eq!(count_words("  one two\n\nthree\t"), 3);
        assert_eq!(count_words(""), 0);
    }
}
