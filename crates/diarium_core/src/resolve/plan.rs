//! Side-effect-free resolution of one document header.
//!
//! # Responsibility
//! - Resolve every person and place mention of a header to an existing row
//!   or a validated "to create" reference.
//! - Validate document-local references (scene names, duplicates) before
//!   anything is written.
//!
//! # Invariants
//! - Planning only reads; a failed plan leaves the store untouched.
//! - Keyed person mentions are planned first so bare names can also match
//!   people introduced by the same document.
//! - Errors carry the field path of the offending mention.

use crate::header::parse::{
    CitationSpec, EventSpec, MotifSpec, ParsedHeader, PersonMention, PlaceMention, PoemSpec,
};
use crate::model::date::{DateRef, DatedContext};
use crate::model::entity::{EntityValidationError, NamedKind, PersonId, PlaceId};
use crate::repo::entity_repo::EntityRepository;
use crate::repo::RepoError;
use crate::resolve::reference::{
    canonical_label, eq_ci, PersonRef, PlaceRef, RegionRef,
};
use crate::resolve::resolver::{EntityResolver, ResolveError};
use chrono::NaiveDate;
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type PlanResult<T> = Result<T, PlanError>;

/// Planning failure located at a header field path.
#[derive(Debug)]
pub enum PlanError {
    Validation {
        field: String,
        message: String,
    },
    Ambiguity {
        field: String,
        reference: String,
        candidates: Vec<String>,
    },
    Repo(RepoError),
}

impl PlanError {
    pub(crate) fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Locates a resolver error at `field`.
    pub(crate) fn at(field: &str) -> impl FnOnce(ResolveError) -> PlanError + '_ {
        move |err| match err {
            ResolveError::Validation(err) => Self::validation(field, err.to_string()),
            ResolveError::Ambiguous {
                reference,
                candidates,
            } => Self::Ambiguity {
                field: field.to_string(),
                reference,
                candidates,
            },
            ResolveError::Repo(err) => Self::Repo(err),
        }
    }
}

impl Display for PlanError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation { field, message } => write!(f, "{field}: {message}"),
            Self::Ambiguity {
                field,
                reference,
                candidates,
            } => write!(
                f,
                "{field}: `{reference}` is ambiguous between {}",
                candidates.join(", ")
            ),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for PlanError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for PlanError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

/// Person resolved to an existing row, or a keyed reference to create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedPerson {
    pub reference: PersonRef,
    pub existing: Option<PersonId>,
}

/// Place resolved to an existing row, or a name to create in `region`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedPlace {
    pub name: String,
    pub region: String,
    pub existing: Option<PlaceId>,
}

/// Scene with members as indexes into the plan's people/places.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedScene {
    pub name: String,
    pub description: Option<String>,
    pub dates: Vec<DatedContext>,
    pub people: Vec<usize>,
    pub places: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedThread {
    pub name: String,
    pub near: DateRef,
    pub far: DateRef,
    pub entry: Option<NaiveDate>,
    pub content: Option<String>,
    pub people: Vec<usize>,
    pub places: Vec<usize>,
}

/// Validated resolution of one header.
///
/// `people`, `places` and `regions` are the document-level link sets: the
/// union of top-level mentions and those inside scenes and threads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionPlan {
    pub date: NaiveDate,
    pub people: Vec<PlannedPerson>,
    pub regions: Vec<RegionRef>,
    pub places: Vec<PlannedPlace>,
    pub arcs: Vec<String>,
    pub keywords: Vec<String>,
    pub concepts: Vec<String>,
    pub scenes: Vec<PlannedScene>,
    pub events: Vec<EventSpec>,
    pub threads: Vec<PlannedThread>,
    pub citations: Vec<CitationSpec>,
    pub poems: Vec<PoemSpec>,
    pub motifs: Vec<MotifSpec>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Owner {
    Document,
    Scene(usize),
    Thread(usize),
}

impl ResolutionPlan {
    /// Plans a header. `existing_scenes` are scene names already stored for
    /// the document that events may also reference (incremental merges).
    pub fn build<R: EntityRepository + ?Sized>(
        resolver: &EntityResolver<'_, R>,
        header: &ParsedHeader,
        existing_scenes: &[String],
    ) -> PlanResult<Self> {
        let mut planner = Planner {
            resolver,
            plan: ResolutionPlan {
                date: header.date,
                people: Vec::new(),
                regions: Vec::new(),
                places: Vec::new(),
                arcs: Vec::new(),
                keywords: Vec::new(),
                concepts: Vec::new(),
                scenes: Vec::new(),
                events: Vec::new(),
                threads: Vec::new(),
                citations: Vec::new(),
                poems: Vec::new(),
                motifs: Vec::new(),
            },
        };

        planner.plan_regions(header)?;
        planner.plan_scenes(header)?;
        planner.plan_threads(header)?;
        planner.plan_people(header)?;
        planner.plan_places(header)?;
        planner.plan_events(header, existing_scenes)?;
        planner.plan_labels(header);
        planner.plan_works(header)?;
        Ok(planner.plan)
    }

    /// Region names a newly created region would carry a country for.
    pub fn region_country(&self, name: &str) -> Option<&str> {
        self.regions
            .iter()
            .find(|region| eq_ci(&region.name, name))
            .and_then(|region| region.country.as_deref())
    }
}

struct Planner<'p, 'a, R: EntityRepository + ?Sized> {
    resolver: &'p EntityResolver<'a, R>,
    plan: ResolutionPlan,
}

impl<R: EntityRepository + ?Sized> Planner<'_, '_, R> {
    fn plan_regions(&mut self, header: &ParsedHeader) -> PlanResult<()> {
        for (index, mention) in header.regions.iter().enumerate() {
            let region = RegionRef::from_mention(mention, self.resolver.aliases()).ok_or_else(
                || PlanError::validation(format!("city[{index}]"), "region name is empty"),
            )?;
            self.push_region(region);
        }
        Ok(())
    }

    fn push_region(&mut self, region: RegionRef) {
        match self
            .plan
            .regions
            .iter_mut()
            .find(|existing| eq_ci(&existing.name, &region.name))
        {
            Some(existing) => {
                if existing.country.is_none() {
                    existing.country = region.country;
                }
            }
            None => self.plan.regions.push(region),
        }
    }

    fn plan_scenes(&mut self, header: &ParsedHeader) -> PlanResult<()> {
        let mut seen = HashSet::new();
        for (index, scene) in header.scenes.iter().enumerate() {
            let name = scene.name.trim().to_string();
            if !seen.insert(name.to_lowercase()) {
                return Err(PlanError::validation(
                    format!("scenes[{index}].name"),
                    format!("scene `{name}` is declared more than once"),
                ));
            }
            self.plan.scenes.push(PlannedScene {
                name,
                description: scene.description.clone(),
                dates: scene.dates.clone(),
                people: Vec::new(),
                places: Vec::new(),
            });
        }
        Ok(())
    }

    fn plan_threads(&mut self, header: &ParsedHeader) -> PlanResult<()> {
        let mut seen = HashSet::new();
        for (index, thread) in header.threads.iter().enumerate() {
            let name = thread.name.trim().to_string();
            if !seen.insert(name.to_lowercase()) {
                return Err(PlanError::validation(
                    format!("threads[{index}].name"),
                    format!("thread `{name}` is declared more than once"),
                ));
            }
            self.plan.threads.push(PlannedThread {
                name,
                near: thread.from.clone(),
                far: thread.to.clone(),
                entry: thread.entry,
                content: thread.content.clone(),
                people: Vec::new(),
                places: Vec::new(),
            });
        }
        Ok(())
    }

    fn person_mentions<'h>(header: &'h ParsedHeader) -> Vec<(Owner, String, &'h PersonMention)> {
        let mut mentions = Vec::new();
        for (index, mention) in header.people.iter().enumerate() {
            mentions.push((Owner::Document, format!("people[{index}]"), mention));
        }
        for (scene_index, scene) in header.scenes.iter().enumerate() {
            for (index, mention) in scene.people.iter().enumerate() {
                mentions.push((
                    Owner::Scene(scene_index),
                    format!("scenes[{scene_index}].people[{index}]"),
                    mention,
                ));
            }
        }
        for (thread_index, thread) in header.threads.iter().enumerate() {
            for (index, mention) in thread.people.iter().enumerate() {
                mentions.push((
                    Owner::Thread(thread_index),
                    format!("threads[{thread_index}].people[{index}]"),
                    mention,
                ));
            }
        }
        mentions
    }

    fn plan_people(&mut self, header: &ParsedHeader) -> PlanResult<()> {
        let mut resolved = Vec::new();
        for (owner, path, mention) in Self::person_mentions(header) {
            let reference = PersonRef::from_mention(mention, self.resolver.aliases())
                .ok_or_else(|| PlanError::validation(path.as_str(), "person name is empty"))?;
            resolved.push((owner, path, reference));
        }

        let mut indexes = vec![None; resolved.len()];
        for (slot, (_, path, reference)) in resolved.iter().enumerate() {
            if reference.is_bare() {
                continue;
            }
            let existing = self
                .resolver
                .lookup_person(reference)
                .map_err(PlanError::at(path))?
                .map(|person| person.id);
            indexes[slot] = Some(self.push_person(reference.clone(), existing));
        }
        for (slot, (_, path, reference)) in resolved.iter().enumerate() {
            if reference.is_bare() {
                indexes[slot] = Some(self.resolve_bare_person(path, reference)?);
            }
        }

        for ((owner, _, _), index) in resolved.iter().zip(indexes) {
            let Some(index) = index else {
                continue;
            };
            match owner {
                Owner::Document => {}
                Owner::Scene(scene) => push_unique(&mut self.plan.scenes[*scene].people, index),
                Owner::Thread(thread) => push_unique(&mut self.plan.threads[*thread].people, index),
            }
        }
        Ok(())
    }

    fn push_person(&mut self, reference: PersonRef, existing: Option<PersonId>) -> usize {
        let position = self.plan.people.iter().position(|planned| match existing {
            Some(id) => planned.existing == Some(id),
            None => planned.existing.is_none() && planned.reference.same_identity(&reference),
        });
        match position {
            Some(index) => {
                merge_person_details(&mut self.plan.people[index].reference, &reference);
                index
            }
            None => {
                self.plan.people.push(PlannedPerson {
                    reference,
                    existing,
                });
                self.plan.people.len() - 1
            }
        }
    }

    /// Bare names match stored given names/aliases and keyed people already
    /// planned for this document.
    fn resolve_bare_person(&mut self, path: &str, reference: &PersonRef) -> PlanResult<usize> {
        struct Candidate {
            existing: Option<PersonId>,
            local: Option<usize>,
            label: String,
        }

        let mut candidates: Vec<Candidate> = self
            .resolver
            .people_named(&reference.name)
            .map_err(PlanError::at(path))?
            .into_iter()
            .map(|person| Candidate {
                existing: Some(person.id),
                local: None,
                label: person.display_name(),
            })
            .collect();

        for (index, planned) in self.plan.people.iter().enumerate() {
            let matches = eq_ci(&planned.reference.name, &reference.name)
                || planned
                    .reference
                    .aliases
                    .iter()
                    .any(|alias| eq_ci(alias, &reference.name));
            if !matches || planned.reference.is_bare() {
                continue;
            }
            match planned.existing {
                Some(id) => match candidates.iter_mut().find(|c| c.existing == Some(id)) {
                    Some(candidate) => candidate.local = Some(index),
                    None => candidates.push(Candidate {
                        existing: Some(id),
                        local: Some(index),
                        label: planned.reference.label(),
                    }),
                },
                None => candidates.push(Candidate {
                    existing: None,
                    local: Some(index),
                    label: planned.reference.label(),
                }),
            }
        }

        match candidates.len() {
            0 => Err(PlanError::validation(
                path,
                EntityValidationError::PersonIdentityIncomplete(reference.name.clone())
                    .to_string(),
            )),
            1 => {
                let candidate = &candidates[0];
                Ok(match candidate.local {
                    Some(index) => {
                        merge_person_details(&mut self.plan.people[index].reference, reference);
                        index
                    }
                    None => self.push_person(reference.clone(), candidate.existing),
                })
            }
            _ => Err(PlanError::Ambiguity {
                field: path.to_string(),
                reference: reference.label(),
                candidates: candidates.into_iter().map(|c| c.label).collect(),
            }),
        }
    }

    fn plan_places(&mut self, header: &ParsedHeader) -> PlanResult<()> {
        let aliases = self.resolver.aliases();
        let mut mentions: Vec<(Owner, String, &PlaceMention)> = Vec::new();
        for (index, mention) in header.locations.iter().enumerate() {
            mentions.push((Owner::Document, format!("locations[{index}]"), mention));
        }
        for (scene_index, scene) in header.scenes.iter().enumerate() {
            for (index, mention) in scene.locations.iter().enumerate() {
                mentions.push((
                    Owner::Scene(scene_index),
                    format!("scenes[{scene_index}].locations[{index}]"),
                    mention,
                ));
            }
        }
        for (thread_index, thread) in header.threads.iter().enumerate() {
            for (index, mention) in thread.locations.iter().enumerate() {
                mentions.push((
                    Owner::Thread(thread_index),
                    format!("threads[{thread_index}].locations[{index}]"),
                    mention,
                ));
            }
        }

        let default_region = match self.plan.regions.as_slice() {
            [only] => Some(only.name.clone()),
            _ => None,
        };

        let mut resolved = Vec::new();
        for (owner, path, mention) in mentions {
            let mut place = PlaceRef::from_mention(mention, aliases)
                .ok_or_else(|| PlanError::validation(path.as_str(), "place name is empty"))?;
            if place.region.is_none() {
                place.region = default_region.clone();
            }
            resolved.push((owner, path, place));
        }

        let mut indexes = vec![None; resolved.len()];
        for (slot, (_, path, place)) in resolved.iter().enumerate() {
            if let Some(region) = place.region.as_deref() {
                indexes[slot] = Some(self.plan_placed(path, &place.name, region)?);
            }
        }
        for (slot, (_, path, place)) in resolved.iter().enumerate() {
            if place.region.is_none() {
                indexes[slot] = Some(self.resolve_unplaced(path, &place.name)?);
            }
        }

        for ((owner, _, _), index) in resolved.iter().zip(indexes) {
            let Some(index) = index else {
                continue;
            };
            match owner {
                Owner::Document => {}
                Owner::Scene(scene) => push_unique(&mut self.plan.scenes[*scene].places, index),
                Owner::Thread(thread) => push_unique(&mut self.plan.threads[*thread].places, index),
            }
        }

        let place_regions: Vec<String> =
            self.plan.places.iter().map(|place| place.region.clone()).collect();
        for region in place_regions {
            self.push_region(RegionRef {
                name: region,
                country: None,
            });
        }
        Ok(())
    }

    fn plan_placed(&mut self, path: &str, name: &str, region: &str) -> PlanResult<usize> {
        let region_ref = RegionRef {
            name: region.to_string(),
            country: None,
        };
        let existing = match self
            .resolver
            .lookup_region(&region_ref)
            .map_err(PlanError::at(path))?
        {
            Some(row) => self
                .resolver
                .lookup_place_in(name, row.id)
                .map_err(PlanError::at(path))?,
            None => None,
        };
        let (name, region) = match &existing {
            Some(place) => (place.name.clone(), place.region_name.clone()),
            None => (name.to_string(), region.to_string()),
        };
        Ok(self.push_place(PlannedPlace {
            name,
            region,
            existing: existing.map(|place| place.id),
        }))
    }

    /// A place without region matches stored places of that name in any
    /// region and places this document scoped explicitly.
    fn resolve_unplaced(&mut self, path: &str, name: &str) -> PlanResult<usize> {
        let mut candidates: Vec<PlannedPlace> = self
            .resolver
            .places_named(name)
            .map_err(PlanError::at(path))?
            .into_iter()
            .map(|place| PlannedPlace {
                name: place.name,
                region: place.region_name,
                existing: Some(place.id),
            })
            .collect();
        for planned in &self.plan.places {
            if eq_ci(&planned.name, name)
                && !candidates
                    .iter()
                    .any(|candidate| same_place(candidate, planned))
            {
                candidates.push(planned.clone());
            }
        }

        match candidates.len() {
            0 => Err(PlanError::validation(
                path,
                EntityValidationError::PlaceRegionMissing(name.to_string()).to_string(),
            )),
            1 => {
                let candidate = candidates.remove(0);
                Ok(self.push_place(candidate))
            }
            _ => Err(PlanError::Ambiguity {
                field: path.to_string(),
                reference: name.to_string(),
                candidates: candidates
                    .into_iter()
                    .map(|place| format!("{} ({})", place.name, place.region))
                    .collect(),
            }),
        }
    }

    fn push_place(&mut self, place: PlannedPlace) -> usize {
        match self
            .plan
            .places
            .iter()
            .position(|existing| same_place(existing, &place))
        {
            Some(index) => index,
            None => {
                self.plan.places.push(place);
                self.plan.places.len() - 1
            }
        }
    }

    fn plan_events(&mut self, header: &ParsedHeader, existing_scenes: &[String]) -> PlanResult<()> {
        let mut seen = HashSet::new();
        for (index, event) in header.events.iter().enumerate() {
            let name = event.name.trim().to_string();
            if !seen.insert(name.to_lowercase()) {
                return Err(PlanError::validation(
                    format!("events[{index}].name"),
                    format!("event `{name}` is declared more than once"),
                ));
            }
            let mut scenes: Vec<String> = Vec::new();
            for (scene_index, scene) in event.scenes.iter().enumerate() {
                let known = self
                    .plan
                    .scenes
                    .iter()
                    .map(|planned| planned.name.as_str())
                    .chain(existing_scenes.iter().map(String::as_str))
                    .find(|candidate| eq_ci(candidate, scene));
                let Some(known) = known else {
                    return Err(PlanError::validation(
                        format!("events[{index}].scenes[{scene_index}]"),
                        format!("event `{name}` references unknown scene `{scene}`"),
                    ));
                };
                if !scenes.iter().any(|existing| eq_ci(existing, known)) {
                    scenes.push(known.to_string());
                }
            }
            self.plan.events.push(EventSpec { name, scenes });
        }
        Ok(())
    }

    fn plan_labels(&mut self, header: &ParsedHeader) {
        self.plan.arcs = unique_labels(&header.arcs, NamedKind::Arc);
        self.plan.keywords = unique_labels(&header.tags, NamedKind::Keyword);
        self.plan.concepts = unique_labels(&header.themes, NamedKind::Concept);
    }

    fn plan_works(&mut self, header: &ParsedHeader) -> PlanResult<()> {
        for (index, citation) in header.citations.iter().enumerate() {
            let title = canonical_label(&citation.source.title).ok_or_else(|| {
                PlanError::validation(format!("references[{index}].source"), "work title is empty")
            })?;
            let mut citation = citation.clone();
            citation.source.title = title;
            self.plan.citations.push(citation);
        }

        let mut seen = HashSet::new();
        for (index, poem) in header.poems.iter().enumerate() {
            let title = canonical_label(&poem.title).ok_or_else(|| {
                PlanError::validation(format!("poems[{index}].title"), "poem title is empty")
            })?;
            if !seen.insert(title.to_lowercase()) {
                return Err(PlanError::validation(
                    format!("poems[{index}].title"),
                    format!("poem `{title}` appears more than once"),
                ));
            }
            self.plan.poems.push(PoemSpec {
                title,
                content: poem.content.clone(),
                notes: poem.notes.clone(),
            });
        }

        let mut seen = HashSet::new();
        for (index, motif) in header.motifs.iter().enumerate() {
            let name = canonical_label(&motif.name).ok_or_else(|| {
                PlanError::validation(format!("motifs[{index}].name"), "motif name is empty")
            })?;
            if !seen.insert(name.to_lowercase()) {
                return Err(PlanError::validation(
                    format!("motifs[{index}].name"),
                    format!("motif `{name}` appears more than once"),
                ));
            }
            self.plan.motifs.push(MotifSpec {
                name,
                description: motif.description.clone(),
            });
        }
        Ok(())
    }
}

fn merge_person_details(target: &mut PersonRef, source: &PersonRef) {
    if target.relation.is_none() {
        target.relation = source.relation;
    }
    for alias in &source.aliases {
        if !target.aliases.iter().any(|existing| eq_ci(existing, alias)) {
            target.aliases.push(alias.clone());
        }
    }
}

fn same_place(left: &PlannedPlace, right: &PlannedPlace) -> bool {
    match (left.existing, right.existing) {
        (Some(left), Some(right)) => left == right,
        _ => eq_ci(&left.name, &right.name) && eq_ci(&left.region, &right.region),
    }
}

fn push_unique(indexes: &mut Vec<usize>, index: usize) {
    if !indexes.contains(&index) {
        indexes.push(index);
    }
}

fn unique_labels(values: &[String], kind: NamedKind) -> Vec<String> {
    let mut seen = HashSet::new();
    values
        .iter()
        .filter_map(|value| canonical_label(value))
        .filter_map(|value| kind.normalize(&value))
        .filter(|value| seen.insert(value.to_lowercase()))
        .collect()
}
