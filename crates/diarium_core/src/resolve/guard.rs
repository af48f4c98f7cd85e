//! Dedup guard and change detection.
//!
//! # Responsibility
//! - Gate every get-or-create call so one identity key maps to one row.
//! - Detect unchanged documents by content hash.
//!
//! # Invariants
//! - Cache entries made while importing a document stay pending until
//!   `commit`; `rollback` forgets them, so ids from a rolled-back
//!   transaction are never reused.
//! - Bare person names are not identity keys and are never cached.

use crate::model::document::DocumentId;
use crate::model::entity::NamedKind;
use crate::repo::document_repo::DocumentRepository;
use crate::repo::RepoResult;
use crate::resolve::reference::PersonRef;
use crate::resolve::resolver::ResolveResult;
use std::collections::HashMap;

/// Case-folded identity key of a shared entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IdentityKey {
    Person {
        name: String,
        last_name: Option<String>,
        disambiguator: Option<String>,
    },
    Region(String),
    /// Place name within a region name.
    Place(String, String),
    Named(NamedKind, String),
    Work(String),
}

impl IdentityKey {
    /// `None` for bare names.
    pub fn person(person: &PersonRef) -> Option<Self> {
        if person.is_bare() {
            return None;
        }
        Some(Self::Person {
            name: fold(&person.name),
            last_name: person.last_name.as_deref().map(fold),
            disambiguator: person.disambiguator.as_deref().map(fold),
        })
    }

    pub fn region(name: &str) -> Self {
        Self::Region(fold(name))
    }

    pub fn place(name: &str, region_name: &str) -> Self {
        Self::Place(fold(name), fold(region_name))
    }

    pub fn named(kind: NamedKind, name: &str) -> Self {
        Self::Named(kind, fold(name))
    }

    pub fn work(title: &str) -> Self {
        Self::Work(fold(title))
    }
}

fn fold(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Rows created vs. reused through the guard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GuardStats {
    pub created: u64,
    pub reused: u64,
}

/// Batch-scoped get-or-create gate.
#[derive(Debug, Default)]
pub struct DedupGuard {
    cache: HashMap<IdentityKey, i64>,
    pending: Vec<IdentityKey>,
    committed: GuardStats,
    pending_stats: GuardStats,
}

impl DedupGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the row for `key`, looking it up and creating it only when
    /// neither the cache nor the store has one.
    pub fn get_or_create(
        &mut self,
        key: IdentityKey,
        lookup: impl FnOnce() -> ResolveResult<Option<i64>>,
        create: impl FnOnce() -> ResolveResult<i64>,
    ) -> ResolveResult<i64> {
        if let Some(id) = self.cache.get(&key) {
            self.pending_stats.reused += 1;
            return Ok(*id);
        }
        let id = match lookup()? {
            Some(id) => {
                self.pending_stats.reused += 1;
                id
            }
            None => {
                let id = create()?;
                self.pending_stats.created += 1;
                id
            }
        };
        self.cache.insert(key.clone(), id);
        self.pending.push(key);
        Ok(id)
    }

    /// Records reuse of a row that was resolved without a cacheable key.
    pub fn note_reused(&mut self) {
        self.pending_stats.reused += 1;
    }

    pub fn cached(&self, key: &IdentityKey) -> Option<i64> {
        self.cache.get(key).copied()
    }

    /// Keeps entries made since the last commit/rollback.
    pub fn commit(&mut self) {
        self.pending.clear();
        self.committed.created += self.pending_stats.created;
        self.committed.reused += self.pending_stats.reused;
        self.pending_stats = GuardStats::default();
    }

    /// Forgets entries made since the last commit/rollback.
    pub fn rollback(&mut self) {
        for key in self.pending.drain(..) {
            self.cache.remove(&key);
        }
        self.pending_stats = GuardStats::default();
    }

    pub fn stats(&self) -> GuardStats {
        self.committed
    }
}

/// Result of comparing a document's hash with the stored one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeStatus {
    /// No stored document carries this source path.
    New,
    Changed(DocumentId),
    Unchanged(DocumentId),
}

/// Compares `content_hash` with the hash stored for `source_path`.
///
/// `force` reports an unchanged document as changed.
pub fn check_change<R: DocumentRepository + ?Sized>(
    repo: &R,
    source_path: &str,
    content_hash: &str,
    force: bool,
) -> RepoResult<ChangeStatus> {
    let Some(document) = repo.find_by_source(source_path)? else {
        return Ok(ChangeStatus::New);
    };
    if !force && document.content_hash == content_hash {
        return Ok(ChangeStatus::Unchanged(document.id));
    }
    Ok(ChangeStatus::Changed(document.id))
}

#[cfg(test)]
mod tests {
    use super::{DedupGuard, GuardStats, IdentityKey};
    use crate::model::entity::NamedKind;
    use std::cell::Cell;

    #[test]
    fn second_request_for_a_key_hits_the_cache() {
        let mut guard = DedupGuard::new();
        let created = Cell::new(0);
        let run = |guard: &mut DedupGuard| {
            guard
                .get_or_create(
                    IdentityKey::named(NamedKind::Keyword, "Spring"),
                    || Ok(None),
                    || {
                        created.set(created.get() + 1);
                        Ok(7)
                    },
                )
                .unwrap()
        };
        assert_eq!(run(&mut guard), 7);
        assert_eq!(run(&mut guard), 7);
        guard.commit();
        assert_eq!(created.get(), 1);
        assert_eq!(
            guard.stats(),
            GuardStats {
                created: 1,
                reused: 1
            }
        );
    }

    #[test]
    fn rollback_forgets_pending_keys() {
        let mut guard = DedupGuard::new();
        let key = IdentityKey::work("Moby-Dick");
        guard
            .get_or_create(key.clone(), || Ok(None), || Ok(3))
            .unwrap();
        guard.rollback();
        assert_eq!(guard.cached(&key), None);
        assert_eq!(guard.stats(), GuardStats::default());
    }

    #[test]
    fn keys_fold_case() {
        assert_eq!(
            IdentityKey::named(NamedKind::Arc, "The Move"),
            IdentityKey::named(NamedKind::Arc, "the move ")
        );
    }
}
