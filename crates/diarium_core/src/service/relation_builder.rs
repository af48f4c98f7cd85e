//! Relationship builder.
//!
//! # Responsibility
//! - Turn a validated `ResolutionPlan` into entity rows, link rows and owned
//!   relation records for one document.
//!
//! # Invariants
//! - Every shared entity goes through the `DedupGuard`.
//! - `FullReplace` replaces each link set and the owned records;
//!   `Incremental` only adds links and merges owned records by name.
//! - Shared entity rows are never deleted.

use crate::header::parse::WorkSpec;
use crate::model::document::{DocumentId, UpdateMode};
use crate::model::entity::{NamedId, NamedKind, PersonId, PlaceId, RegionId, WorkId};
use crate::model::relation::{
    NewCitation, NewPatternOccurrence, NewScene, NewThread, NewVerseInstance,
};
use crate::repo::entity_repo::EntityRepository;
use crate::repo::relation_repo::{LinkKind, SqliteRelationRepository};
use crate::resolve::guard::{DedupGuard, IdentityKey};
use crate::resolve::plan::{PlanError, PlanResult, PlannedPerson, PlannedPlace, ResolutionPlan};
use crate::resolve::reference::RegionRef;
use crate::resolve::resolver::EntityResolver;
use std::collections::HashMap;

/// Counts of what one build wrote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildSummary {
    pub links: usize,
    pub scenes: usize,
    pub events: usize,
    pub threads: usize,
    pub citations: usize,
    pub verses: usize,
    pub motifs: usize,
}

/// Writes one document's relation graph through a resolver and guard.
pub struct RelationBuilder<'a, R: EntityRepository + ?Sized> {
    resolver: &'a EntityResolver<'a, R>,
    relations: &'a SqliteRelationRepository<'a>,
    guard: &'a mut DedupGuard,
}

impl<'a, R: EntityRepository + ?Sized> RelationBuilder<'a, R> {
    pub fn new(
        resolver: &'a EntityResolver<'a, R>,
        relations: &'a SqliteRelationRepository<'a>,
        guard: &'a mut DedupGuard,
    ) -> Self {
        Self {
            resolver,
            relations,
            guard,
        }
    }

    pub fn build(
        &mut self,
        document: DocumentId,
        plan: &ResolutionPlan,
        mode: UpdateMode,
    ) -> PlanResult<BuildSummary> {
        let mut summary = BuildSummary::default();

        let people = plan
            .people
            .iter()
            .enumerate()
            .map(|(index, person)| self.realize_person(&format!("people[{index}]"), person))
            .collect::<PlanResult<Vec<PersonId>>>()?;
        let regions = plan
            .regions
            .iter()
            .enumerate()
            .map(|(index, region)| self.realize_region(&format!("city[{index}]"), region))
            .collect::<PlanResult<Vec<RegionId>>>()?;
        let places = plan
            .places
            .iter()
            .enumerate()
            .map(|(index, place)| self.realize_place(&format!("locations[{index}]"), plan, place))
            .collect::<PlanResult<Vec<PlaceId>>>()?;
        let arcs = self.realize_named("arcs", NamedKind::Arc, &plan.arcs)?;
        let keywords = self.realize_named("tags", NamedKind::Keyword, &plan.keywords)?;
        let concepts = self.realize_named("themes", NamedKind::Concept, &plan.concepts)?;

        let link_sets = [
            (LinkKind::People, &people),
            (LinkKind::Regions, &regions),
            (LinkKind::Places, &places),
            (LinkKind::Arcs, &arcs),
            (LinkKind::Keywords, &keywords),
            (LinkKind::Concepts, &concepts),
        ];
        for (kind, ids) in link_sets {
            match mode {
                UpdateMode::FullReplace => self.relations.replace_links(document, kind, ids)?,
                UpdateMode::Incremental => self.relations.add_links(document, kind, ids)?,
            }
            summary.links += ids.len();
        }

        if mode == UpdateMode::FullReplace {
            self.relations.clear_owned(document)?;
        }

        let mut scene_ids: HashMap<String, i64> = HashMap::new();
        for scene in &plan.scenes {
            let record = NewScene {
                name: scene.name.clone(),
                description: scene.description.clone(),
                dates: scene.dates.clone(),
                people: pick(&people, &scene.people),
                places: pick(&places, &scene.places),
            };
            let id = match mode {
                UpdateMode::FullReplace => self.relations.insert_scene(document, &record)?,
                UpdateMode::Incremental => self.relations.merge_scene(document, &record)?,
            };
            scene_ids.insert(scene.name.to_lowercase(), id);
            summary.scenes += 1;
        }

        for (index, event) in plan.events.iter().enumerate() {
            let mut ids = Vec::with_capacity(event.scenes.len());
            for (scene_index, name) in event.scenes.iter().enumerate() {
                let id = match scene_ids.get(&name.to_lowercase()) {
                    Some(id) => Some(*id),
                    None => self.relations.find_scene_id(document, name)?,
                };
                let Some(id) = id else {
                    return Err(PlanError::validation(
                        format!("events[{index}].scenes[{scene_index}]"),
                        format!("event `{}` references unknown scene `{name}`", event.name),
                    ));
                };
                ids.push(id);
            }
            match mode {
                UpdateMode::FullReplace => self.relations.insert_event(document, &event.name, &ids)?,
                UpdateMode::Incremental => self.relations.merge_event(document, &event.name, &ids)?,
            };
            summary.events += 1;
        }

        for thread in &plan.threads {
            let record = NewThread {
                name: thread.name.clone(),
                near: thread.near.clone(),
                far: thread.far.clone(),
                entry: thread.entry,
                content: thread.content.clone(),
                people: pick(&people, &thread.people),
                places: pick(&places, &thread.places),
            };
            match mode {
                UpdateMode::FullReplace => self.relations.insert_thread(document, &record)?,
                UpdateMode::Incremental => self.relations.merge_thread(document, &record)?,
            };
            summary.threads += 1;
        }

        for (index, citation) in plan.citations.iter().enumerate() {
            let work_id = self.realize_work(&format!("references[{index}].source"), &citation.source)?;
            self.relations.upsert_citation(
                document,
                &NewCitation {
                    work_id,
                    content: citation.content.clone(),
                    description: citation.description.clone(),
                    mode: citation.mode,
                },
            )?;
            summary.citations += 1;
        }

        for (index, poem) in plan.poems.iter().enumerate() {
            let verse_id =
                self.realize_one(&format!("poems[{index}].title"), NamedKind::Verse, &poem.title)?;
            self.relations.upsert_verse_instance(
                document,
                &NewVerseInstance {
                    verse_id,
                    content: poem.content.clone(),
                    revision_date: plan.date,
                    notes: poem.notes.clone(),
                },
            )?;
            summary.verses += 1;
        }

        for (index, motif) in plan.motifs.iter().enumerate() {
            let pattern_id =
                self.realize_one(&format!("motifs[{index}].name"), NamedKind::Pattern, &motif.name)?;
            self.relations.upsert_pattern_occurrence(
                document,
                &NewPatternOccurrence {
                    pattern_id,
                    description: motif.description.clone(),
                },
            )?;
            summary.motifs += 1;
        }

        Ok(summary)
    }

    fn realize_person(&mut self, field: &str, planned: &PlannedPerson) -> PlanResult<PersonId> {
        let resolver = self.resolver;
        let reference = &planned.reference;
        let id = match IdentityKey::person(reference) {
            Some(key) => self.guard.get_or_create(
                key,
                || Ok(planned.existing),
                || resolver.create_person(reference),
            ),
            None => match planned.existing {
                Some(id) => {
                    self.guard.note_reused();
                    Ok(id)
                }
                None => resolver.create_person(reference),
            },
        }
        .map_err(PlanError::at(field))?;
        resolver
            .enrich_person(id, reference)
            .map_err(PlanError::at(field))?;
        Ok(id)
    }

    fn realize_region(&mut self, field: &str, region: &RegionRef) -> PlanResult<RegionId> {
        let resolver = self.resolver;
        let id = self
            .guard
            .get_or_create(
                IdentityKey::region(&region.name),
                || Ok(resolver.lookup_region(region)?.map(|row| row.id)),
                || resolver.create_region(region),
            )
            .map_err(PlanError::at(field))?;
        resolver
            .enrich_region(id, region)
            .map_err(PlanError::at(field))?;
        Ok(id)
    }

    fn realize_place(
        &mut self,
        field: &str,
        plan: &ResolutionPlan,
        place: &PlannedPlace,
    ) -> PlanResult<PlaceId> {
        let region = RegionRef {
            name: place.region.clone(),
            country: plan.region_country(&place.region).map(str::to_string),
        };
        let region_id = self.realize_region(field, &region)?;
        let resolver = self.resolver;
        self.guard
            .get_or_create(
                IdentityKey::place(&place.name, &place.region),
                || match place.existing {
                    Some(id) => Ok(Some(id)),
                    None => Ok(resolver
                        .lookup_place_in(&place.name, region_id)?
                        .map(|row| row.id)),
                },
                || resolver.create_place(&place.name, region_id),
            )
            .map_err(PlanError::at(field))
    }

    fn realize_named(
        &mut self,
        field: &str,
        kind: NamedKind,
        names: &[String],
    ) -> PlanResult<Vec<NamedId>> {
        names
            .iter()
            .enumerate()
            .map(|(index, name)| self.realize_one(&format!("{field}[{index}]"), kind, name))
            .collect()
    }

    fn realize_one(&mut self, field: &str, kind: NamedKind, name: &str) -> PlanResult<NamedId> {
        let resolver = self.resolver;
        self.guard
            .get_or_create(
                IdentityKey::named(kind, name),
                || Ok(resolver.lookup_named(kind, name)?.map(|row| row.id)),
                || resolver.create_named(kind, name),
            )
            .map_err(PlanError::at(field))
    }

    fn realize_work(&mut self, field: &str, work: &WorkSpec) -> PlanResult<WorkId> {
        let resolver = self.resolver;
        let id = self
            .guard
            .get_or_create(
                IdentityKey::work(&work.title),
                || Ok(resolver.lookup_work(&work.title)?.map(|row| row.id)),
                || resolver.create_work(work),
            )
            .map_err(PlanError::at(field))?;
        resolver.enrich_work(id, work).map_err(PlanError::at(field))?;
        Ok(id)
    }
}

fn pick(ids: &[i64], indexes: &[usize]) -> Vec<i64> {
    indexes.iter().filter_map(|index| ids.get(*index).copied()).collect()
}
