//! Relation graph comparison and round-trip verification.
//!
//! # Responsibility
//! - Describe a document's relations as an order-free value per relation
//!   type, either from the store or from a header resolved lookup-only.
//! - Diff two graphs and verify that export followed by re-import is
//!   equivalent to the stored graph.
//!
//! # Invariants
//! - Building a graph from a header never writes.
//! - Graphs ignore field order, inline vs. block rendering and the
//!   `ThisDocument` sentinel vs. the document's own date.

use crate::header::parse::ParsedHeader;
use crate::header::{parse_document, RenderOptions};
use crate::model::date::{format_day, DateRef, DatedContext};
use crate::model::document::DocumentId;
use crate::model::entity::{NamedKind, Person};
use crate::model::relation::CitationMode;
use crate::repo::entity_repo::{EntityRepository, SqliteEntityRepository};
use crate::resolve::alias::AliasTable;
use crate::resolve::plan::ResolutionPlan;
use crate::resolve::resolver::EntityResolver;
use crate::service::error::{SyncError, SyncResult};
use crate::service::export_service::Exporter;
use crate::service::snapshot::{load_snapshot, DocumentSnapshot};
use chrono::NaiveDate;
use log::{info, warn};
use rusqlite::Connection;
use std::collections::BTreeSet;
use std::fmt::Debug;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct SceneNode {
    pub name: String,
    pub description: Option<String>,
    pub dates: BTreeSet<DatedContext>,
    pub people: BTreeSet<String>,
    pub places: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct EventNode {
    pub name: String,
    pub scenes: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ThreadNode {
    pub name: String,
    pub near: DateRef,
    pub far: DateRef,
    pub entry: Option<NaiveDate>,
    pub content: Option<String>,
    pub people: BTreeSet<String>,
    pub places: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct CitationNode {
    pub work: String,
    pub content: String,
    pub description: Option<String>,
    pub mode: CitationMode,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct VerseNode {
    pub title: String,
    pub content: String,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct MotifNode {
    pub name: String,
    pub description: Option<String>,
}

/// Order-free relation graph of one document.
///
/// Entities are named by their stored canonical labels.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentGraph {
    pub people: BTreeSet<String>,
    pub regions: BTreeSet<String>,
    pub places: BTreeSet<String>,
    pub arcs: BTreeSet<String>,
    pub keywords: BTreeSet<String>,
    pub concepts: BTreeSet<String>,
    pub scenes: BTreeSet<SceneNode>,
    pub events: BTreeSet<EventNode>,
    pub threads: BTreeSet<ThreadNode>,
    pub citations: BTreeSet<CitationNode>,
    pub verses: BTreeSet<VerseNode>,
    pub motifs: BTreeSet<MotifNode>,
    /// Mentions a lookup-only resolution could not map to a stored row.
    pub unresolved: BTreeSet<String>,
}

/// Items of one relation type present on only one side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphDiff {
    pub relation: &'static str,
    /// In the expected graph only.
    pub missing: Vec<String>,
    /// In the actual graph only.
    pub unexpected: Vec<String>,
}

/// Outcome of `verify_round_trip`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundTripReport {
    pub document: DocumentId,
    pub differences: Vec<GraphDiff>,
}

impl RoundTripReport {
    pub fn is_equivalent(&self) -> bool {
        self.differences.is_empty()
    }
}

/// Graph of a stored document.
pub fn load_graph(conn: &Connection, id: DocumentId) -> SyncResult<DocumentGraph> {
    let snapshot = load_snapshot(conn, id)
        .map_err(|err| SyncError::store(&id.to_string(), err))?
        .ok_or(SyncError::DocumentNotFound(id))?;
    Ok(graph_from_snapshot(&snapshot))
}

pub fn graph_from_snapshot(snapshot: &DocumentSnapshot) -> DocumentGraph {
    let date = snapshot.document.date;
    let person_text = |id: &i64| snapshot.person(*id).map(Person::display_name);
    let place_text = |id: &i64| {
        snapshot
            .place(*id)
            .map(|place| place_label(&place.name, &place.region_name))
    };

    DocumentGraph {
        people: snapshot.people.iter().filter_map(person_text).collect(),
        regions: snapshot
            .regions
            .iter()
            .map(|region| region.name.clone())
            .collect(),
        places: snapshot.places.iter().filter_map(place_text).collect(),
        arcs: snapshot.arcs.iter().map(|arc| arc.name.clone()).collect(),
        keywords: snapshot.keywords.iter().map(|keyword| keyword.name.clone()).collect(),
        concepts: snapshot.concepts.iter().map(|concept| concept.name.clone()).collect(),
        scenes: snapshot
            .scenes
            .iter()
            .map(|scene| SceneNode {
                name: scene.name.clone(),
                description: scene.description.clone(),
                dates: effective_dates(&scene.dates, date),
                people: scene.people.iter().filter_map(person_text).collect(),
                places: scene.places.iter().filter_map(place_text).collect(),
            })
            .collect(),
        events: snapshot
            .events
            .iter()
            .map(|event| EventNode {
                name: event.name.clone(),
                scenes: event.scene_names.iter().cloned().collect(),
            })
            .collect(),
        threads: snapshot
            .threads
            .iter()
            .map(|thread| ThreadNode {
                name: thread.name.clone(),
                near: thread.near.effective(date),
                far: thread.far.effective(date),
                entry: thread.entry,
                content: thread.content.clone(),
                people: thread.people.iter().filter_map(person_text).collect(),
                places: thread.places.iter().filter_map(place_text).collect(),
            })
            .collect(),
        citations: snapshot
            .citations
            .iter()
            .map(|(citation, work)| CitationNode {
                work: work.title.clone(),
                content: citation.content.clone(),
                description: citation.description.clone(),
                mode: citation.mode,
            })
            .collect(),
        verses: snapshot
            .verses
            .iter()
            .map(|(instance, verse)| VerseNode {
                title: verse.name.clone(),
                content: instance.content.clone(),
                notes: instance.notes.clone(),
            })
            .collect(),
        motifs: snapshot
            .motifs
            .iter()
            .map(|(occurrence, pattern)| MotifNode {
                name: pattern.name.clone(),
                description: occurrence.description.clone(),
            })
            .collect(),
        unresolved: BTreeSet::new(),
    }
}

/// Graph a header would produce, resolved against the store without writing.
pub fn graph_from_header(
    conn: &Connection,
    header: &ParsedHeader,
    aliases: &AliasTable,
) -> SyncResult<DocumentGraph> {
    let label = format_day(header.date);
    let entities =
        SqliteEntityRepository::try_new(conn).map_err(|err| SyncError::store(&label, err))?;
    let resolver = EntityResolver::new(&entities, aliases);
    let plan = ResolutionPlan::build(&resolver, header, &[])
        .map_err(|err| SyncError::from_plan(&label, err))?;

    let mut graph = DocumentGraph::default();
    let mut people = Vec::with_capacity(plan.people.len());
    for planned in &plan.people {
        let stored = match planned.existing {
            Some(id) => entities
                .get_person(id)
                .map_err(|err| SyncError::store(&label, err))?,
            None => None,
        };
        match stored {
            Some(person) => people.push(Some(person.display_name())),
            None => {
                graph
                    .unresolved
                    .insert(format!("person {}", planned.reference.label()));
                people.push(None);
            }
        }
    }
    let mut places = Vec::with_capacity(plan.places.len());
    for planned in &plan.places {
        let stored = match planned.existing {
            Some(id) => entities
                .get_place(id)
                .map_err(|err| SyncError::store(&label, err))?,
            None => None,
        };
        match stored {
            Some(place) => places.push(Some(place_label(&place.name, &place.region_name))),
            None => {
                graph.unresolved.insert(format!(
                    "place {}",
                    place_label(&planned.name, &planned.region)
                ));
                places.push(None);
            }
        }
    }
    let pick = |labels: &[Option<String>], indexes: &[usize]| -> BTreeSet<String> {
        indexes
            .iter()
            .filter_map(|index| labels.get(*index).cloned().flatten())
            .collect()
    };

    graph.people = people.iter().flatten().cloned().collect();
    graph.places = places.iter().flatten().cloned().collect();
    for region in &plan.regions {
        match resolver
            .lookup_region(region)
            .map_err(|err| SyncError::from_resolve(&label, "city", err))?
        {
            Some(row) => {
                graph.regions.insert(row.name);
            }
            None => {
                graph.unresolved.insert(format!("region {}", region.name));
            }
        }
    }
    graph.arcs = lookup_names(&resolver, &label, NamedKind::Arc, &plan.arcs, &mut graph.unresolved)?;
    graph.keywords = lookup_names(
        &resolver,
        &label,
        NamedKind::Keyword,
        &plan.keywords,
        &mut graph.unresolved,
    )?;
    graph.concepts = lookup_names(
        &resolver,
        &label,
        NamedKind::Concept,
        &plan.concepts,
        &mut graph.unresolved,
    )?;

    graph.scenes = plan
        .scenes
        .iter()
        .map(|scene| SceneNode {
            name: scene.name.clone(),
            description: scene.description.clone(),
            dates: effective_dates(&scene.dates, plan.date),
            people: pick(&people, &scene.people),
            places: pick(&places, &scene.places),
        })
        .collect();
    graph.events = plan
        .events
        .iter()
        .map(|event| EventNode {
            name: event.name.clone(),
            scenes: event.scenes.iter().cloned().collect(),
        })
        .collect();
    graph.threads = plan
        .threads
        .iter()
        .map(|thread| ThreadNode {
            name: thread.name.clone(),
            near: thread.near.effective(plan.date),
            far: thread.far.effective(plan.date),
            entry: thread.entry,
            content: thread.content.clone(),
            people: pick(&people, &thread.people),
            places: pick(&places, &thread.places),
        })
        .collect();

    for citation in &plan.citations {
        let work = resolver
            .lookup_work(&citation.source.title)
            .map_err(|err| SyncError::from_resolve(&label, "references", err))?;
        let title = match work {
            Some(work) => work.title,
            None => {
                graph
                    .unresolved
                    .insert(format!("work {}", citation.source.title));
                citation.source.title.clone()
            }
        };
        graph.citations.insert(CitationNode {
            work: title,
            content: citation.content.clone(),
            description: citation.description.clone(),
            mode: citation.mode,
        });
    }
    let verse_titles: Vec<String> = plan.poems.iter().map(|poem| poem.title.clone()).collect();
    let verse_titles = lookup_ordered(&resolver, &label, NamedKind::Verse, &verse_titles, &mut graph.unresolved)?;
    graph.verses = plan
        .poems
        .iter()
        .zip(verse_titles)
        .map(|(poem, title)| VerseNode {
            title,
            content: poem.content.clone(),
            notes: poem.notes.clone(),
        })
        .collect();
    let motif_names: Vec<String> = plan.motifs.iter().map(|motif| motif.name.clone()).collect();
    let motif_names =
        lookup_ordered(&resolver, &label, NamedKind::Pattern, &motif_names, &mut graph.unresolved)?;
    graph.motifs = plan
        .motifs
        .iter()
        .zip(motif_names)
        .map(|(motif, name)| MotifNode {
            name,
            description: motif.description.clone(),
        })
        .collect();

    Ok(graph)
}

/// Per-relation differences; empty when the graphs are equivalent.
pub fn diff_graphs(expected: &DocumentGraph, actual: &DocumentGraph) -> Vec<GraphDiff> {
    let mut differences = Vec::new();
    push_diff(&mut differences, "people", &expected.people, &actual.people);
    push_diff(&mut differences, "city", &expected.regions, &actual.regions);
    push_diff(&mut differences, "locations", &expected.places, &actual.places);
    push_diff(&mut differences, "arcs", &expected.arcs, &actual.arcs);
    push_diff(&mut differences, "tags", &expected.keywords, &actual.keywords);
    push_diff(&mut differences, "themes", &expected.concepts, &actual.concepts);
    push_diff(&mut differences, "scenes", &expected.scenes, &actual.scenes);
    push_diff(&mut differences, "events", &expected.events, &actual.events);
    push_diff(&mut differences, "threads", &expected.threads, &actual.threads);
    push_diff(&mut differences, "references", &expected.citations, &actual.citations);
    push_diff(&mut differences, "poems", &expected.verses, &actual.verses);
    push_diff(&mut differences, "motifs", &expected.motifs, &actual.motifs);
    push_diff(&mut differences, "unresolved", &expected.unresolved, &actual.unresolved);
    differences
}

/// Renders the export of a stored document, re-parses it, resolves it
/// lookup-only and diffs the result against the stored graph.
pub fn verify_round_trip(
    conn: &Connection,
    id: DocumentId,
    aliases: &AliasTable,
    options: RenderOptions,
) -> SyncResult<RoundTripReport> {
    let expected = load_graph(conn, id)?;
    let exported = Exporter::new(aliases, options).export_document(conn, id)?;
    let parsed = parse_document(&exported).map_err(|err| SyncError::parse(&id.to_string(), err))?;
    let actual = graph_from_header(conn, &parsed.header, aliases)?;
    let differences = diff_graphs(&expected, &actual);

    if differences.is_empty() {
        info!("event=round_trip_verify module=sync status=ok");
    } else {
        warn!(
            "event=round_trip_verify module=sync status=error error_code=graph_mismatch relations={}",
            differences
                .iter()
                .map(|diff| diff.relation)
                .collect::<Vec<_>>()
                .join(",")
        );
    }
    Ok(RoundTripReport {
        document: id,
        differences,
    })
}

fn push_diff<T: Ord + Debug>(
    differences: &mut Vec<GraphDiff>,
    relation: &'static str,
    expected: &BTreeSet<T>,
    actual: &BTreeSet<T>,
) {
    let missing: Vec<String> = expected
        .difference(actual)
        .map(|item| format!("{item:?}"))
        .collect();
    let unexpected: Vec<String> = actual
        .difference(expected)
        .map(|item| format!("{item:?}"))
        .collect();
    if !missing.is_empty() || !unexpected.is_empty() {
        differences.push(GraphDiff {
            relation,
            missing,
            unexpected,
        });
    }
}

fn effective_dates(dates: &[DatedContext], document_date: NaiveDate) -> BTreeSet<DatedContext> {
    dates
        .iter()
        .map(|date| DatedContext::new(date.date.effective(document_date), date.context.clone()))
        .collect()
}

fn place_label(name: &str, region: &str) -> String {
    format!("{name} ({region})")
}

fn lookup_names<R: EntityRepository + ?Sized>(
    resolver: &EntityResolver<'_, R>,
    label: &str,
    kind: NamedKind,
    names: &[String],
    unresolved: &mut BTreeSet<String>,
) -> SyncResult<BTreeSet<String>> {
    Ok(lookup_ordered(resolver, label, kind, names, unresolved)?
        .into_iter()
        .collect())
}

/// Stored names for `names`, in order; unknown names are kept as written
/// and recorded as unresolved.
fn lookup_ordered<R: EntityRepository + ?Sized>(
    resolver: &EntityResolver<'_, R>,
    label: &str,
    kind: NamedKind,
    names: &[String],
    unresolved: &mut BTreeSet<String>,
) -> SyncResult<Vec<String>> {
    names
        .iter()
        .map(|name| {
            let row = resolver
                .lookup_named(kind, name)
                .map_err(|err| SyncError::from_resolve(label, kind.label(), err))?;
            Ok(match row {
                Some(row) => row.name,
                None => {
                    unresolved.insert(format!("{} {name}", kind.label()));
                    name.clone()
                }
            })
        })
        .collect()
}
