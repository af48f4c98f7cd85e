//! Read model of one stored document and everything it links.

use crate::model::document::{Document, DocumentId};
use crate::model::entity::{
    ExternalWork, NamedEntity, NamedKind, Person, PersonId, Place, PlaceId, Region,
};
use crate::model::relation::{
    CitationRecord, EventRecord, PatternOccurrenceRecord, SceneRecord, ThreadRecord,
    VerseInstanceRecord,
};
use crate::repo::document_repo::{DocumentRepository, SqliteDocumentRepository};
use crate::repo::entity_repo::{EntityRepository, SqliteEntityRepository};
use crate::repo::relation_repo::{LinkKind, SqliteRelationRepository};
use crate::repo::{RepoError, RepoResult};
use rusqlite::Connection;
use std::collections::BTreeMap;

/// Stored document plus its links and owned records, with every referenced
/// entity row loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentSnapshot {
    pub document: Document,
    pub people: Vec<PersonId>,
    pub regions: Vec<Region>,
    pub places: Vec<PlaceId>,
    pub arcs: Vec<NamedEntity>,
    pub keywords: Vec<NamedEntity>,
    pub concepts: Vec<NamedEntity>,
    pub scenes: Vec<SceneRecord>,
    pub events: Vec<EventRecord>,
    pub threads: Vec<ThreadRecord>,
    pub citations: Vec<(CitationRecord, ExternalWork)>,
    pub verses: Vec<(VerseInstanceRecord, NamedEntity)>,
    pub motifs: Vec<(PatternOccurrenceRecord, NamedEntity)>,
    /// Every person linked to the document or one of its records.
    pub person_rows: BTreeMap<PersonId, Person>,
    /// Every place linked to the document or one of its records.
    pub place_rows: BTreeMap<PlaceId, Place>,
}

impl DocumentSnapshot {
    pub fn person(&self, id: PersonId) -> Option<&Person> {
        self.person_rows.get(&id)
    }

    pub fn place(&self, id: PlaceId) -> Option<&Place> {
        self.place_rows.get(&id)
    }
}

/// Loads a snapshot; `Ok(None)` when the document does not exist.
pub fn load_snapshot(conn: &Connection, id: DocumentId) -> RepoResult<Option<DocumentSnapshot>> {
    let documents = SqliteDocumentRepository::try_new(conn)?;
    let entities = SqliteEntityRepository::try_new(conn)?;
    let relations = SqliteRelationRepository::try_new(conn)?;

    let Some(document) = documents.get_document(id)? else {
        return Ok(None);
    };

    let people = relations.linked_ids(id, LinkKind::People)?;
    let places = relations.linked_ids(id, LinkKind::Places)?;
    let regions = relations
        .linked_ids(id, LinkKind::Regions)?
        .into_iter()
        .map(|region_id| {
            entities
                .get_region(region_id)?
                .ok_or_else(|| missing("region", region_id))
        })
        .collect::<RepoResult<Vec<_>>>()?;
    let arcs = load_named(&entities, &relations, id, LinkKind::Arcs, NamedKind::Arc)?;
    let keywords = load_named(&entities, &relations, id, LinkKind::Keywords, NamedKind::Keyword)?;
    let concepts = load_named(&entities, &relations, id, LinkKind::Concepts, NamedKind::Concept)?;

    let scenes = relations.list_scenes(id)?;
    let events = relations.list_events(id)?;
    let threads = relations.list_threads(id)?;

    let citations = relations
        .list_citations(id)?
        .into_iter()
        .map(|citation| {
            let work = entities
                .get_work(citation.work_id)?
                .ok_or_else(|| missing("work", citation.work_id))?;
            Ok((citation, work))
        })
        .collect::<RepoResult<Vec<_>>>()?;
    let verses = relations
        .list_verse_instances(id)?
        .into_iter()
        .map(|instance| {
            let verse = entities
                .get_named(NamedKind::Verse, instance.verse_id)?
                .ok_or_else(|| missing("verse", instance.verse_id))?;
            Ok((instance, verse))
        })
        .collect::<RepoResult<Vec<_>>>()?;
    let motifs = relations
        .list_pattern_occurrences(id)?
        .into_iter()
        .map(|occurrence| {
            let pattern = entities
                .get_named(NamedKind::Pattern, occurrence.pattern_id)?
                .ok_or_else(|| missing("pattern", occurrence.pattern_id))?;
            Ok((occurrence, pattern))
        })
        .collect::<RepoResult<Vec<_>>>()?;

    let mut person_rows = BTreeMap::new();
    let person_ids = people
        .iter()
        .chain(scenes.iter().flat_map(|scene| scene.people.iter()))
        .chain(threads.iter().flat_map(|thread| thread.people.iter()));
    for person_id in person_ids {
        if !person_rows.contains_key(person_id) {
            let person = entities
                .get_person(*person_id)?
                .ok_or_else(|| missing("person", *person_id))?;
            person_rows.insert(*person_id, person);
        }
    }

    let mut place_rows = BTreeMap::new();
    let place_ids = places
        .iter()
        .chain(scenes.iter().flat_map(|scene| scene.places.iter()))
        .chain(threads.iter().flat_map(|thread| thread.places.iter()));
    for place_id in place_ids {
        if !place_rows.contains_key(place_id) {
            let place = entities
                .get_place(*place_id)?
                .ok_or_else(|| missing("place", *place_id))?;
            place_rows.insert(*place_id, place);
        }
    }

    Ok(Some(DocumentSnapshot {
        document,
        people,
        regions,
        places,
        arcs,
        keywords,
        concepts,
        scenes,
        events,
        threads,
        citations,
        verses,
        motifs,
        person_rows,
        place_rows,
    }))
}

fn load_named(
    entities: &SqliteEntityRepository<'_>,
    relations: &SqliteRelationRepository<'_>,
    document: DocumentId,
    link: LinkKind,
    kind: NamedKind,
) -> RepoResult<Vec<NamedEntity>> {
    relations
        .linked_ids(document, link)?
        .into_iter()
        .map(|id| {
            entities
                .get_named(kind, id)?
                .ok_or_else(|| missing(kind.label(), id))
        })
        .collect()
}

fn missing(kind: &str, id: i64) -> RepoError {
    RepoError::InvalidData(format!("linked {kind} {id} does not exist"))
}
