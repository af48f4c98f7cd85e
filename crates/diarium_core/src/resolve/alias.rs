//! Curated alias table.
//!
//! # Invariants
//! - Keys compare case-insensitively after whitespace collapsing.
//! - The table is read-only once constructed; one instance serves a whole
//!   batch run.

use crate::config::{ConfigError, ConfigResult};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct AliasFile {
    people: HashMap<String, String>,
    places: HashMap<String, String>,
    regions: HashMap<String, String>,
}

/// Surface text → canonical text, per entity kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AliasTable {
    people: HashMap<String, String>,
    places: HashMap<String, String>,
    regions: HashMap<String, String>,
}

impl AliasTable {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_yaml_str(text: &str, origin: &Path) -> ConfigResult<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        let file: AliasFile = serde_yaml::from_str(text).map_err(|source| ConfigError::Yaml {
            path: origin.to_path_buf(),
            source,
        })?;
        Ok(Self {
            people: normalize_keys(file.people),
            places: normalize_keys(file.places),
            regions: normalize_keys(file.regions),
        })
    }

    pub fn load(path: &Path) -> ConfigResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&text, path)
    }

    pub fn person(&self, text: &str) -> Option<&str> {
        self.people.get(&alias_key(text)).map(String::as_str)
    }

    pub fn place(&self, text: &str) -> Option<&str> {
        self.places.get(&alias_key(text)).map(String::as_str)
    }

    pub fn region(&self, text: &str) -> Option<&str> {
        self.regions.get(&alias_key(text)).map(String::as_str)
    }

    /// Whether `text` would be rewritten by the people table.
    pub fn is_person_alias(&self, text: &str) -> bool {
        self.person(text).is_some()
    }

    pub fn len(&self) -> usize {
        self.people.len() + self.places.len() + self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn normalize_keys(map: HashMap<String, String>) -> HashMap<String, String> {
    map.into_iter()
        .map(|(key, value)| (alias_key(&key), value.trim().to_string()))
        .filter(|(key, value)| !key.is_empty() && !value.is_empty())
        .collect()
}

fn alias_key(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::AliasTable;
    use std::path::Path;

    #[test]
    fn lookups_ignore_case_and_spacing() {
        let table = AliasTable::from_yaml_str(
            "people:\n  D.I.: Dana Ibarra\nregions:\n  MTL: Montréal\n",
            Path::new("aliases.yaml"),
        )
        .unwrap();
        assert_eq!(table.person("d.i."), Some("Dana Ibarra"));
        assert_eq!(table.region(" mtl "), Some("Montréal"));
        assert_eq!(table.place("mtl"), None);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn unknown_sections_are_rejected() {
        assert!(AliasTable::from_yaml_str("pets: {}\n", Path::new("aliases.yaml")).is_err());
    }
}
