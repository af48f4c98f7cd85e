//! Relation records owned by a single document.
//!
//! # Invariants
//! - Scene, event and thread names are unique within their document only.
//! - Every record here is deleted together with its document.

use crate::model::date::{DateRef, DatedContext};
use crate::model::document::DocumentId;
use crate::model::entity::{NamedId, PersonId, PlaceId, WorkId};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// How a citation uses its source work.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CitationMode {
    #[default]
    Direct,
    Paraphrase,
    Visual,
    Thematic,
}

impl CitationMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Paraphrase => "paraphrase",
            Self::Visual => "visual",
            Self::Thematic => "thematic",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "direct" | "quote" => Some(Self::Direct),
            "paraphrase" | "indirect" => Some(Self::Paraphrase),
            "visual" => Some(Self::Visual),
            "thematic" => Some(Self::Thematic),
            _ => None,
        }
    }
}

/// Referenced moment ("scene").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneRecord {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub dates: Vec<DatedContext>,
    pub people: Vec<PersonId>,
    pub places: Vec<PlaceId>,
}

/// Grouping of scenes ("event").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRecord {
    pub id: i64,
    pub name: String,
    pub scene_names: Vec<String>,
}

/// Temporal echo between this document and an earlier moment ("thread").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadRecord {
    pub id: i64,
    pub name: String,
    pub near: DateRef,
    pub far: DateRef,
    /// Date of the document narrating the far moment.
    pub entry: Option<NaiveDate>,
    /// Stored document with the `entry` date, when one has been imported.
    pub entry_document: Option<DocumentId>,
    pub content: Option<String>,
    pub people: Vec<PersonId>,
    pub places: Vec<PlaceId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CitationRecord {
    pub id: i64,
    pub work_id: WorkId,
    pub content: String,
    pub description: Option<String>,
    pub mode: CitationMode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerseInstanceRecord {
    pub id: i64,
    pub verse_id: NamedId,
    pub content: String,
    pub revision_date: NaiveDate,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternOccurrenceRecord {
    pub id: i64,
    pub pattern_id: NamedId,
    pub description: Option<String>,
}

/// Resolved scene ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewScene {
    pub name: String,
    pub description: Option<String>,
    pub dates: Vec<DatedContext>,
    pub people: Vec<PersonId>,
    pub places: Vec<PlaceId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewThread {
    pub name: String,
    pub near: DateRef,
    pub far: DateRef,
    pub entry: Option<NaiveDate>,
    pub content: Option<String>,
    pub people: Vec<PersonId>,
    pub places: Vec<PlaceId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCitation {
    pub work_id: WorkId,
    pub content: String,
    pub description: Option<String>,
    pub mode: CitationMode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewVerseInstance {
    pub verse_id: NamedId,
    pub content: String,
    pub revision_date: NaiveDate,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPatternOccurrence {
    pub pattern_id: NamedId,
    pub description: Option<String>,
}
