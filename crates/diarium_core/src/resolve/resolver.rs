//! Lookup and creation of canonical entities.
//!
//! # Responsibility
//! - Look up candidates by the identity key of each entity kind.
//! - Create canonical rows through explicit calls only.
//!
//! # Invariants
//! - `lookup_*` never writes; the same resolver backs import and
//!   autocomplete.
//! - Several candidates without disambiguating detail surface as
//!   `ResolveError::Ambiguous`; nothing is guessed.

use crate::header::parse::WorkSpec;
use crate::model::entity::{
    EntityValidationError, ExternalWork, NamedEntity, NamedKind, Person, PersonId, Place, PlaceId,
    Region, RegionId, WorkId,
};
use crate::repo::entity_repo::EntityRepository;
use crate::repo::RepoError;
use crate::resolve::alias::AliasTable;
use crate::resolve::reference::{eq_ci, normalize_surface, PersonRef, RegionRef};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type ResolveResult<T> = Result<T, ResolveError>;

/// Resolution failure for one reference.
#[derive(Debug)]
pub enum ResolveError {
    Validation(EntityValidationError),
    Ambiguous {
        reference: String,
        candidates: Vec<String>,
    },
    Repo(RepoError),
}

impl Display for ResolveError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Ambiguous {
                reference,
                candidates,
            } => write!(
                f,
                "`{reference}` matches several entities: {}",
                candidates.join(", ")
            ),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ResolveError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Ambiguous { .. } => None,
            Self::Repo(err) => Some(err),
        }
    }
}

impl From<RepoError> for ResolveError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::Validation(err) => Self::Validation(err),
            other => Self::Repo(other),
        }
    }
}

impl From<EntityValidationError> for ResolveError {
    fn from(value: EntityValidationError) -> Self {
        Self::Validation(value)
    }
}

/// Resolver over an entity repository and a read-only alias table.
pub struct EntityResolver<'a, R: EntityRepository + ?Sized> {
    repo: &'a R,
    aliases: &'a AliasTable,
}

impl<'a, R: EntityRepository + ?Sized> EntityResolver<'a, R> {
    pub fn new(repo: &'a R, aliases: &'a AliasTable) -> Self {
        Self { repo, aliases }
    }

    pub fn aliases(&self) -> &'a AliasTable {
        self.aliases
    }

    pub fn repo(&self) -> &'a R {
        self.repo
    }

    /// Finds the canonical person for a reference.
    ///
    /// Keyed references prefer an exact identity match; bare references match
    /// given names and stored aliases.
    pub fn lookup_person(&self, person: &PersonRef) -> ResolveResult<Option<Person>> {
        let candidates = if person.is_bare() {
            self.repo.find_people_by_name_or_alias(&person.name)?
        } else {
            let candidates = self.repo.find_people_by_key(
                &person.name,
                person.last_name.as_deref(),
                person.disambiguator.as_deref(),
            )?;
            let exact: Vec<Person> = candidates
                .iter()
                .filter(|candidate| {
                    opt_matches(&candidate.last_name, &person.last_name)
                        && opt_matches(&candidate.disambiguator, &person.disambiguator)
                })
                .cloned()
                .collect();
            if exact.len() == 1 {
                exact
            } else {
                candidates
            }
        };
        single(person.label(), candidates, Person::display_name)
    }

    /// Stored people a bare name could refer to.
    pub fn people_named(&self, name: &str) -> ResolveResult<Vec<Person>> {
        Ok(self.repo.find_people_by_name_or_alias(name)?)
    }

    pub fn create_person(&self, person: &PersonRef) -> ResolveResult<PersonId> {
        let new_person = person.to_new_person();
        new_person.validate()?;
        let id = self.repo.insert_person(&new_person)?;
        if !person.aliases.is_empty() {
            self.repo.add_person_aliases(id, &person.aliases)?;
        }
        Ok(id)
    }

    /// Applies optional attributes carried by a reference to an existing row.
    pub fn enrich_person(&self, id: PersonId, person: &PersonRef) -> ResolveResult<()> {
        if let Some(relation) = person.relation {
            self.repo.set_person_relation(id, relation)?;
        }
        if !person.aliases.is_empty() {
            self.repo.add_person_aliases(id, &person.aliases)?;
        }
        Ok(())
    }

    pub fn lookup_region(&self, region: &RegionRef) -> ResolveResult<Option<Region>> {
        Ok(self.repo.find_region(&region.name)?)
    }

    pub fn create_region(&self, region: &RegionRef) -> ResolveResult<RegionId> {
        Ok(self
            .repo
            .insert_region(&region.name, region.country.as_deref())?)
    }

    pub fn enrich_region(&self, id: RegionId, region: &RegionRef) -> ResolveResult<()> {
        if let Some(country) = region.country.as_deref() {
            self.repo.set_region_country(id, country)?;
        }
        Ok(())
    }

    pub fn lookup_place_in(&self, name: &str, region_id: RegionId) -> ResolveResult<Option<Place>> {
        Ok(self.repo.find_place(name, region_id)?)
    }

    /// Looks a place up across all regions.
    pub fn lookup_place_anywhere(&self, name: &str) -> ResolveResult<Option<Place>> {
        let candidates = self.repo.find_places_by_name(name)?;
        single(name.to_string(), candidates, |place| {
            format!("{} ({})", place.name, place.region_name)
        })
    }

    /// Places matching a name across all regions; used when doc-local
    /// references add candidates of their own.
    pub fn places_named(&self, name: &str) -> ResolveResult<Vec<Place>> {
        Ok(self.repo.find_places_by_name(name)?)
    }

    pub fn create_place(&self, name: &str, region_id: RegionId) -> ResolveResult<PlaceId> {
        Ok(self.repo.insert_place(name, region_id)?)
    }

    pub fn lookup_named(&self, kind: NamedKind, name: &str) -> ResolveResult<Option<NamedEntity>> {
        Ok(self.repo.find_named(kind, name)?)
    }

    pub fn create_named(&self, kind: NamedKind, name: &str) -> ResolveResult<i64> {
        Ok(self.repo.insert_named(kind, name)?)
    }

    pub fn lookup_work(&self, title: &str) -> ResolveResult<Option<ExternalWork>> {
        Ok(self.repo.find_work(title)?)
    }

    pub fn create_work(&self, work: &WorkSpec) -> ResolveResult<WorkId> {
        Ok(self
            .repo
            .insert_work(&work.title, work.author.as_deref(), work.kind)?)
    }

    pub fn enrich_work(&self, id: WorkId, work: &WorkSpec) -> ResolveResult<()> {
        if work.author.is_some() || work.kind.is_some() {
            self.repo
                .update_work_details(id, work.author.as_deref(), work.kind)?;
        }
        Ok(())
    }

    /// Autocomplete over people; side-effect free.
    pub fn suggest_people(&self, prefix: &str, limit: u32) -> ResolveResult<Vec<Person>> {
        let prefix = normalize_surface(prefix);
        let prefix = self
            .aliases
            .person(&prefix)
            .map(str::to_string)
            .unwrap_or(prefix);
        if prefix.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self.repo.people_with_prefix(&prefix, limit)?)
    }
}

fn opt_matches(stored: &Option<String>, wanted: &Option<String>) -> bool {
    match (stored, wanted) {
        (Some(stored), Some(wanted)) => eq_ci(stored, wanted),
        (None, None) => true,
        _ => false,
    }
}

fn single<T>(
    reference: String,
    mut candidates: Vec<T>,
    describe: impl Fn(&T) -> String,
) -> ResolveResult<Option<T>> {
    match candidates.len() {
        0 => Ok(None),
        1 => Ok(candidates.pop()),
        _ => Err(ResolveError::Ambiguous {
            reference,
            candidates: candidates.iter().map(describe).collect(),
        }),
    }
}
