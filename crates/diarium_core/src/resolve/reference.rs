//! Normalized entity references.
//!
//! # Responsibility
//! - Strip authoring markers from surface text and apply aliases.
//! - Split person text into given name, family name and disambiguator.
//!
//! # Invariants
//! - Aliases are applied before splitting, so an alias may expand to a full
//!   `Given Family (context)` form.
//! - A `PersonRef` with neither family name nor disambiguator is "bare" and
//!   can only be resolved against existing people.

use crate::header::field::split_packed;
use crate::header::parse::{PersonMention, PersonRecord, PlaceMention, RegionMention};
use crate::model::entity::{NewPerson, PersonRelation};
use crate::resolve::alias::AliasTable;
use once_cell::sync::Lazy;
use regex::Regex;

static WIKI_LINK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[\[([^\]|]+)(?:\|[^\]]*)?\]\]").expect("valid wiki link regex"));
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid ws regex"));

/// Strips `@`/`#` prefixes, `[[...]]` links and `*`/`_` emphasis, then trims
/// and collapses whitespace.
pub fn normalize_surface(text: &str) -> String {
    let unlinked = WIKI_LINK_RE.replace_all(text, "$1");
    let trimmed = unlinked
        .trim()
        .trim_start_matches(['@', '#'])
        .trim_matches(['*', '_'])
        .trim();
    WHITESPACE_RE.replace_all(trimmed, " ").into_owned()
}

/// Person reference after normalization.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PersonRef {
    pub name: String,
    pub last_name: Option<String>,
    pub disambiguator: Option<String>,
    pub relation: Option<PersonRelation>,
    pub aliases: Vec<String>,
}

impl PersonRef {
    pub fn from_mention(mention: &PersonMention, aliases: &AliasTable) -> Option<Self> {
        match mention {
            PersonMention::Text(text) => Self::from_text(text, aliases),
            PersonMention::Record(record) => Self::from_record(record, aliases),
        }
    }

    /// Parses `Given`, `Given Family`, `Given (context)` or
    /// `Given Family (context)`.
    pub fn from_text(text: &str, aliases: &AliasTable) -> Option<Self> {
        let surface = normalize_surface(text);
        let expanded = aliases
            .person(&surface)
            .or_else(|| aliases.person(text))
            .map(normalize_surface)
            .unwrap_or(surface);
        let (head, disambiguator) = split_packed(&expanded);
        let mut parts = head.splitn(2, ' ');
        let name = parts.next()?.trim().to_string();
        if name.is_empty() {
            return None;
        }
        Some(Self {
            name,
            last_name: parts.next().map(str::trim).filter(|v| !v.is_empty()).map(str::to_string),
            disambiguator,
            relation: None,
            aliases: Vec::new(),
        })
    }

    fn from_record(record: &PersonRecord, aliases: &AliasTable) -> Option<Self> {
        let last_name = clean(record.last_name.as_deref());
        let disambiguator = clean(record.disambiguator.as_deref());
        let mut person = if last_name.is_none() && disambiguator.is_none() {
            Self::from_text(&record.name, aliases)?
        } else {
            let name = normalize_surface(&record.name);
            if name.is_empty() {
                return None;
            }
            Self {
                name,
                last_name,
                disambiguator,
                relation: None,
                aliases: Vec::new(),
            }
        };
        person.relation = record.relation;
        person.aliases = record
            .aliases
            .iter()
            .map(|alias| normalize_surface(alias))
            .filter(|alias| !alias.is_empty())
            .collect();
        Some(person)
    }

    pub fn is_bare(&self) -> bool {
        self.last_name.is_none() && self.disambiguator.is_none()
    }

    pub fn to_new_person(&self) -> NewPerson {
        NewPerson {
            name: self.name.clone(),
            last_name: self.last_name.clone(),
            disambiguator: self.disambiguator.clone(),
            relation: self.relation,
        }
    }

    /// Text form used in messages.
    pub fn label(&self) -> String {
        let mut label = self.name.clone();
        if let Some(last) = &self.last_name {
            label.push(' ');
            label.push_str(last);
        }
        if let Some(disambiguator) = &self.disambiguator {
            label.push_str(&format!(" ({disambiguator})"));
        }
        label
    }

    /// Whether two refs name the same identity key, ignoring case.
    pub fn same_identity(&self, other: &PersonRef) -> bool {
        eq_ci(&self.name, &other.name)
            && opt_eq_ci(&self.last_name, &other.last_name)
            && opt_eq_ci(&self.disambiguator, &other.disambiguator)
    }
}

/// Region reference after normalization.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RegionRef {
    pub name: String,
    pub country: Option<String>,
}

impl RegionRef {
    pub fn from_mention(mention: &RegionMention, aliases: &AliasTable) -> Option<Self> {
        let name = canonical_region(&mention.name, aliases)?;
        Some(Self {
            name,
            country: clean(mention.country.as_deref()),
        })
    }
}

/// Place reference after normalization.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PlaceRef {
    pub name: String,
    /// Canonical region name when the mention scoped it.
    pub region: Option<String>,
}

impl PlaceRef {
    pub fn from_mention(mention: &PlaceMention, aliases: &AliasTable) -> Option<Self> {
        let surface = normalize_surface(&mention.name);
        let name = aliases
            .place(&surface)
            .map(normalize_surface)
            .unwrap_or(surface);
        if name.is_empty() {
            return None;
        }
        let region = match mention.region.as_deref() {
            Some(region) => Some(canonical_region(region, aliases)?),
            None => None,
        };
        Some(Self { name, region })
    }

    pub fn label(&self) -> String {
        match &self.region {
            Some(region) => format!("{} ({region})", self.name),
            None => self.name.clone(),
        }
    }
}

/// Canonical region text for a mention.
pub fn canonical_region(text: &str, aliases: &AliasTable) -> Option<String> {
    let surface = normalize_surface(text);
    let name = aliases
        .region(&surface)
        .map(normalize_surface)
        .unwrap_or(surface);
    (!name.is_empty()).then_some(name)
}

/// Canonical label for arcs, tags, themes, works, poems and motifs.
pub fn canonical_label(text: &str) -> Option<String> {
    let label = normalize_surface(text);
    (!label.is_empty()).then_some(label)
}

pub(crate) fn eq_ci(left: &str, right: &str) -> bool {
    left.to_lowercase() == right.to_lowercase()
}

fn opt_eq_ci(left: &Option<String>, right: &Option<String>) -> bool {
    match (left, right) {
        (Some(left), Some(right)) => eq_ci(left, right),
        (None, None) => true,
        _ => false,
    }
}

fn clean(value: Option<&str>) -> Option<String> {
    value
        .map(normalize_surface)
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::{normalize_surface, PersonRef, PlaceRef};
    use crate::header::parse::{PersonMention, PersonRecord, PlaceMention};
    use crate::model::entity::PersonRelation;
    use crate::resolve::alias::AliasTable;
    use std::collections::HashSet;
    use std::path::Path;

    #[test]
    fn markers_are_stripped() {
        assert_eq!(normalize_surface("@Dana"), "Dana");
        assert_eq!(normalize_surface("[[Dana Ibarra|Dana]]"), "Dana Ibarra");
        assert_eq!(normalize_surface("  *Parc   Jarry*  "), "Parc Jarry");
        assert_eq!(normalize_surface("#spring"), "spring");
    }

    #[test]
    fn person_text_splits_into_identity_parts() {
        let aliases = AliasTable::empty();
        let full = PersonRef::from_text("Dana Ibarra", &aliases).unwrap();
        assert_eq!(full.name, "Dana");
        assert_eq!(full.last_name.as_deref(), Some("Ibarra"));

        let scoped = PersonRef::from_text("Dana (work)", &aliases).unwrap();
        assert_eq!(scoped.disambiguator.as_deref(), Some("work"));
        assert!(scoped.last_name.is_none());

        assert!(PersonRef::from_text("@Dana", &aliases).unwrap().is_bare());
    }

    #[test]
    fn aliases_expand_before_splitting() {
        let aliases =
            AliasTable::from_yaml_str("people:\n  DI: Dana Ibarra\n", Path::new("a.yaml")).unwrap();
        let person = PersonRef::from_text("@DI", &aliases).unwrap();
        assert_eq!(person.label(), "Dana Ibarra");
    }

    #[test]
    fn record_keeps_multi_word_given_name() {
        let record = PersonMention::Record(PersonRecord {
            name: "Mary Ann".to_string(),
            last_name: Some("Ruiz".to_string()),
            aliases: vec!["@MA".to_string()],
            ..PersonRecord::default()
        });
        let person = PersonRef::from_mention(&record, &AliasTable::empty()).unwrap();
        assert_eq!(person.name, "Mary Ann");
        assert_eq!(person.aliases, vec!["MA".to_string()]);
    }

    #[test]
    fn person_refs_with_relations_dedupe_in_a_set() {
        let mention = PersonMention::Record(PersonRecord {
            name: "Dana".to_string(),
            last_name: Some("Ibarra".to_string()),
            relation: Some(PersonRelation::Friend),
            ..PersonRecord::default()
        });
        let aliases = AliasTable::empty();
        let first = PersonRef::from_mention(&mention, &aliases).unwrap();
        let second = PersonRef::from_mention(&mention, &aliases).unwrap();

        let set: HashSet<PersonRef> = [first, second].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn place_region_goes_through_region_aliases() {
        let aliases =
            AliasTable::from_yaml_str("regions:\n  MTL: Montréal\n", Path::new("a.yaml")).unwrap();
        let place = PlaceRef::from_mention(
            &PlaceMention {
                name: "Parc Jarry".to_string(),
                region: Some("mtl".to_string()),
            },
            &aliases,
        )
        .unwrap();
        assert_eq!(place.region.as_deref(), Some("Montréal"));
    }
}
