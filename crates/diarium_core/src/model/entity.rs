//! Shared identity entities.
//!
//! # Responsibility
//! - Define canonical, deduplicated records referenced by many documents.
//! - Validate identity keys before persistence.
//!
//! # Invariants
//! - Person identity is `(name, last_name)` or `(name, disambiguator)`; a
//!   person with neither is invalid.
//! - Place identity is `(name, region)`.
//! - Named entities (`NamedKind`) and works are unique by name, ignoring case.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type PersonId = i64;
pub type PlaceId = i64;
pub type RegionId = i64;
pub type WorkId = i64;
/// Row id in one of the `NamedKind` tables.
pub type NamedId = i64;

/// Relation category of a person to the author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersonRelation {
    Family,
    Friend,
    Romantic,
    Colleague,
    Acquaintance,
    Professional,
    Public,
    Other,
}

impl PersonRelation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Family => "family",
            Self::Friend => "friend",
            Self::Romantic => "romantic",
            Self::Colleague => "colleague",
            Self::Acquaintance => "acquaintance",
            Self::Professional => "professional",
            Self::Public => "public",
            Self::Other => "other",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "family" => Some(Self::Family),
            "friend" => Some(Self::Friend),
            "romantic" | "partner" => Some(Self::Romantic),
            "colleague" | "coworker" => Some(Self::Colleague),
            "acquaintance" => Some(Self::Acquaintance),
            "professional" => Some(Self::Professional),
            "public" => Some(Self::Public),
            "other" => Some(Self::Other),
            _ => None,
        }
    }
}

/// Canonical person row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Person {
    pub id: PersonId,
    pub name: String,
    pub last_name: Option<String>,
    pub disambiguator: Option<String>,
    pub relation: Option<PersonRelation>,
    pub aliases: Vec<String>,
}

impl Person {
    /// Human-readable identity, e.g. `Dana Ibarra` or `Dana (work)`.
    pub fn display_name(&self) -> String {
        match (&self.last_name, &self.disambiguator) {
            (Some(last), Some(disambiguator)) => {
                format!("{} {} ({})", self.name, last, disambiguator)
            }
            (Some(last), None) => format!("{} {}", self.name, last),
            (None, Some(disambiguator)) => format!("{} ({})", self.name, disambiguator),
            (None, None) => self.name.clone(),
        }
    }
}

/// Values for a new person row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewPerson {
    pub name: String,
    pub last_name: Option<String>,
    pub disambiguator: Option<String>,
    pub relation: Option<PersonRelation>,
}

impl NewPerson {
    /// Validates the identity key.
    pub fn validate(&self) -> Result<(), EntityValidationError> {
        if self.name.trim().is_empty() {
            return Err(EntityValidationError::EmptyName("person"));
        }
        let has_last = self.last_name.as_deref().is_some_and(|v| !v.trim().is_empty());
        let has_disambiguator = self
            .disambiguator
            .as_deref()
            .is_some_and(|v| !v.trim().is_empty());
        if !has_last && !has_disambiguator {
            return Err(EntityValidationError::PersonIdentityIncomplete(
                self.name.clone(),
            ));
        }
        Ok(())
    }
}

/// Region (city) that owns places.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    pub id: RegionId,
    pub name: String,
    pub country: Option<String>,
}

/// Place inside one region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Place {
    pub id: PlaceId,
    pub name: String,
    pub region_id: RegionId,
    pub region_name: String,
}

/// Globally unique label kinds that share the `(id, name)` table shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NamedKind {
    Arc,
    Keyword,
    Concept,
    Pattern,
    Verse,
}

impl NamedKind {
    pub fn table(self) -> &'static str {
        match self {
            Self::Arc => "arcs",
            Self::Keyword => "keywords",
            Self::Concept => "concepts",
            Self::Pattern => "patterns",
            Self::Verse => "verses",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Arc => "arc",
            Self::Keyword => "keyword",
            Self::Concept => "concept",
            Self::Pattern => "pattern",
            Self::Verse => "verse",
        }
    }

    /// Normalizes a label the way it is stored.
    ///
    /// Keywords are lowercase; other kinds keep the author's casing and
    /// compare case-insensitively in storage.
    pub fn normalize(self, value: &str) -> Option<String> {
        let collapsed = value.split_whitespace().collect::<Vec<_>>().join(" ");
        if collapsed.is_empty() {
            return None;
        }
        match self {
            Self::Keyword => Some(collapsed.to_lowercase()),
            _ => Some(collapsed),
        }
    }
}

/// Row of one of the `NamedKind` tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedEntity {
    pub id: NamedId,
    pub kind: NamedKind,
    pub name: String,
}

/// Kind of an external referenced work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkKind {
    Book,
    Article,
    Film,
    Song,
    Poem,
    Podcast,
    Website,
    Other,
}

impl WorkKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Book => "book",
            Self::Article => "article",
            Self::Film => "film",
            Self::Song => "song",
            Self::Poem => "poem",
            Self::Podcast => "podcast",
            Self::Website => "website",
            Self::Other => "other",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "book" | "novel" => Some(Self::Book),
            "article" | "essay" => Some(Self::Article),
            "film" | "movie" => Some(Self::Film),
            "song" | "album" => Some(Self::Song),
            "poem" => Some(Self::Poem),
            "podcast" => Some(Self::Podcast),
            "website" | "web" => Some(Self::Website),
            "other" => Some(Self::Other),
            _ => None,
        }
    }
}

/// External work referenced by citations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalWork {
    pub id: WorkId,
    pub title: String,
    pub author: Option<String>,
    pub kind: Option<WorkKind>,
}

/// Computed appearance summary of a person across documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonSummary {
    pub person_id: PersonId,
    pub document_count: u32,
    pub first_appearance: Option<NaiveDate>,
    pub last_appearance: Option<NaiveDate>,
}

/// Validation failure for an entity identity key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityValidationError {
    EmptyName(&'static str),
    /// Person has neither last name nor disambiguator.
    PersonIdentityIncomplete(String),
    /// Place has no derivable parent region.
    PlaceRegionMissing(String),
}

impl Display for EntityValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyName(kind) => write!(f, "{kind} name cannot be empty"),
            Self::PersonIdentityIncomplete(name) => write!(
                f,
                "person `{name}` needs a last name or a disambiguator to be created"
            ),
            Self::PlaceRegionMissing(name) => {
                write!(f, "place `{name}` has no region to be created under")
            }
        }
    }
}

impl Error for EntityValidationError {}

#[cfg(test)]
mod tests {
    use super::{EntityValidationError, NamedKind, NewPerson, Person, PersonRelation};

    #[test]
    fn person_without_last_name_or_disambiguator_is_invalid() {
        let person = NewPerson {
            name: "Dana".to_string(),
            ..NewPerson::default()
        };
        assert!(matches!(
            person.validate(),
            Err(EntityValidationError::PersonIdentityIncomplete(_))
        ));

        let with_disambiguator = NewPerson {
            name: "Dana".to_string(),
            disambiguator: Some("work".to_string()),
            ..NewPerson::default()
        };
        assert!(with_disambiguator.validate().is_ok());
    }

    #[test]
    fn display_name_reflects_identity_key() {
        let person = Person {
            id: 1,
            name: "Dana".to_string(),
            last_name: Some("Ibarra".to_string()),
            disambiguator: None,
            relation: Some(PersonRelation::Friend),
            aliases: Vec::new(),
        };
        assert_eq!(person.display_name(), "Dana Ibarra");
    }

    #[test]
    fn keywords_normalize_to_lowercase() {
        assert_eq!(
            NamedKind::Keyword.normalize("  Long   Walks "),
            Some("long walks".to_string())
        );
        assert_eq!(
            NamedKind::Arc.normalize("The Move"),
            Some("The Move".to_string())
        );
        assert_eq!(NamedKind::Concept.normalize("   "), None);
    }
}
