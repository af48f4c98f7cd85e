//! Header export and editable-field write-back.
//!
//! # Responsibility
//! - Render the stored graph of a document as deterministic header text.
//! - Rewrite the header of an existing document file, keeping its body.
//! - Apply editable fields from an external header without touching
//!   relations or computed fields.
//!
//! # Invariants
//! - Field order follows `HEADER_FIELDS`; computed fields come from the
//!   store only.
//! - Every rendered reference resolves back to the row it was rendered from.

use crate::header::extract::replace_front_matter;
use crate::header::render::MapBuilder;
use crate::header::{content_hash, parse_document, render_yaml, RenderOptions, YamlNode};
use crate::model::date::{format_day, DateRef, DatedContext};
use crate::model::document::{DocumentId, HEADER_FIELDS};
use crate::model::entity::{NamedEntity, Person, PlaceId, Region, RegionId};
use crate::model::relation::CitationMode;
use crate::repo::document_repo::{DocumentRepository, SqliteDocumentRepository};
use crate::resolve::alias::AliasTable;
use crate::resolve::reference::PersonRef;
use crate::service::error::{SyncError, SyncResult};
use crate::service::snapshot::{load_snapshot, DocumentSnapshot};
use log::info;
use rusqlite::Connection;
use std::path::Path;
use std::time::Instant;

/// Renders stored documents as header text.
pub struct Exporter<'a> {
    aliases: &'a AliasTable,
    options: RenderOptions,
}

impl<'a> Exporter<'a> {
    /// `aliases` decides when a person needs the record form to resolve
    /// back to the same row.
    pub fn new(aliases: &'a AliasTable, options: RenderOptions) -> Self {
        Self { aliases, options }
    }

    /// Header body text, without `---` delimiters.
    pub fn render_header(&self, conn: &Connection, id: DocumentId) -> SyncResult<String> {
        let snapshot = load_snapshot(conn, id)
            .map_err(|err| SyncError::store(&id.to_string(), err))?
            .ok_or(SyncError::DocumentNotFound(id))?;
        Ok(render_yaml(&header_tree(&snapshot, self.aliases), self.options))
    }

    /// Header as a front matter block, ready to precede a body.
    pub fn export_document(&self, conn: &Connection, id: DocumentId) -> SyncResult<String> {
        let header = self.render_header(conn, id)?;
        Ok(replace_front_matter("", &header))
    }

    /// Replaces the header of the file at `path`, keeps its body, and records
    /// the new content hash so the next batch run skips the file.
    ///
    /// Returns the new content hash.
    pub fn export_to_file(&self, conn: &Connection, id: DocumentId, path: &Path) -> SyncResult<String> {
        let started_at = Instant::now();
        let header = self.render_header(conn, id)?;
        let current = std::fs::read_to_string(path).map_err(|err| SyncError::io(path, err))?;
        let updated = replace_front_matter(&current, &header);
        std::fs::write(path, &updated).map_err(|err| SyncError::io(path, err))?;

        let hash = content_hash(&updated);
        let documents = SqliteDocumentRepository::try_new(conn)
            .map_err(|err| SyncError::store(&id.to_string(), err))?;
        documents
            .update_content_hash(id, &hash)
            .map_err(|err| SyncError::store(&id.to_string(), err))?;

        info!(
            "event=document_export module=sync status=ok target=file changed={} duration_ms={}",
            current != updated,
            started_at.elapsed().as_millis()
        );
        Ok(hash)
    }
}

/// Applies `notes`/`summary` from an external document to the stored
/// document with the same date. Relations and computed fields are ignored.
pub fn write_back_editable(conn: &Connection, text: &str) -> SyncResult<DocumentId> {
    let parsed = parse_document(text).map_err(|err| SyncError::parse("<write-back>", err))?;
    let label = format_day(parsed.header.date);
    let documents =
        SqliteDocumentRepository::try_new(conn).map_err(|err| SyncError::store(&label, err))?;
    let document = documents
        .find_by_date(parsed.header.date)
        .map_err(|err| SyncError::store(&label, err))?
        .ok_or_else(|| SyncError::Validation {
            document: label.clone(),
            field: "date".to_string(),
            message: "no stored document has this date".to_string(),
        })?;
    documents
        .update_editable(document.id, &parsed.header.editable)
        .map_err(|err| SyncError::store(&label, err))?;
    info!(
        "event=editable_write_back module=sync status=ok notes={} summary={}",
        parsed.header.editable.notes.is_some(),
        parsed.header.editable.summary.is_some()
    );
    Ok(document.id)
}

/// Builds the ordered header tree of a snapshot.
pub fn header_tree(snapshot: &DocumentSnapshot, aliases: &AliasTable) -> YamlNode {
    let renderer = HeaderRenderer { snapshot, aliases };
    HEADER_FIELDS
        .iter()
        .fold(MapBuilder::new(), |builder, (key, _)| match renderer.field(key) {
            Some(node) => builder.field(key, node),
            None => builder,
        })
        .build()
}

struct HeaderRenderer<'s> {
    snapshot: &'s DocumentSnapshot,
    aliases: &'s AliasTable,
}

impl HeaderRenderer<'_> {
    fn field(&self, key: &str) -> Option<YamlNode> {
        let snapshot = self.snapshot;
        let document = &snapshot.document;
        match key {
            "date" => Some(YamlNode::text(format_day(document.date))),
            "word_count" => Some(YamlNode::Number(document.word_count)),
            "city" => Some(YamlNode::scalar_or_list(
                snapshot.regions.iter().map(region_node).collect(),
            )),
            "locations" => Some(self.places(&snapshot.places)),
            "people" => Some(self.people(&snapshot.people)),
            "arcs" => Some(named_list(&snapshot.arcs)),
            "tags" => Some(named_list(&snapshot.keywords)),
            "themes" => Some(named_list(&snapshot.concepts)),
            "scenes" => Some(YamlNode::List(
                snapshot
                    .scenes
                    .iter()
                    .map(|scene| {
                        MapBuilder::new()
                            .field("name", YamlNode::text(scene.name.as_str()))
                            .optional("description", scene.description.as_deref())
                            .field("date", self.scene_dates(&scene.dates))
                            .field("people", self.people(&scene.people))
                            .field("locations", self.places(&scene.places))
                            .build()
                    })
                    .collect(),
            )),
            "events" => Some(YamlNode::List(
                snapshot
                    .events
                    .iter()
                    .map(|event| {
                        MapBuilder::new()
                            .field("name", YamlNode::text(event.name.as_str()))
                            .field(
                                "scenes",
                                YamlNode::List(
                                    event.scene_names.iter().map(|name| YamlNode::text(name.as_str())).collect(),
                                ),
                            )
                            .build()
                    })
                    .collect(),
            )),
            "threads" => Some(YamlNode::List(
                snapshot
                    .threads
                    .iter()
                    .map(|thread| {
                        let from = (thread.near != DateRef::ThisDocument)
                            .then(|| YamlNode::text(thread.near.to_text()));
                        let mut builder = MapBuilder::new().field("name", YamlNode::text(thread.name.as_str()));
                        if let Some(from) = from {
                            builder = builder.field("from", from);
                        }
                        builder
                            .field("to", YamlNode::text(thread.far.to_text()))
                            .optional("entry", thread.entry.map(format_day).as_deref())
                            .optional("content", thread.content.as_deref())
                            .field("people", self.people(&thread.people))
                            .field("locations", self.places(&thread.places))
                            .build()
                    })
                    .collect(),
            )),
            "references" => Some(YamlNode::List(
                snapshot
                    .citations
                    .iter()
                    .map(|(citation, work)| {
                        let source = if work.author.is_none() && work.kind.is_none() {
                            YamlNode::text(work.title.as_str())
                        } else {
                            MapBuilder::new()
                                .field("title", YamlNode::text(work.title.as_str()))
                                .optional("author", work.author.as_deref())
                                .optional("type", work.kind.map(|kind| kind.as_str()))
                                .build()
                        };
                        let mode = (citation.mode != CitationMode::Direct)
                            .then(|| citation.mode.as_str());
                        MapBuilder::new()
                            .field("content", YamlNode::text(citation.content.as_str()))
                            .optional("description", citation.description.as_deref())
                            .optional("mode", mode)
                            .field("source", source)
                            .build()
                    })
                    .collect(),
            )),
            "poems" => Some(YamlNode::List(
                snapshot
                    .verses
                    .iter()
                    .map(|(instance, verse)| {
                        MapBuilder::new()
                            .field("title", YamlNode::text(verse.name.as_str()))
                            .field("content", YamlNode::text(instance.content.as_str()))
                            .optional("notes", instance.notes.as_deref())
                            .build()
                    })
                    .collect(),
            )),
            "motifs" => Some(YamlNode::List(
                snapshot
                    .motifs
                    .iter()
                    .map(|(occurrence, pattern)| {
                        MapBuilder::new()
                            .field("name", YamlNode::text(pattern.name.as_str()))
                            .optional("description", occurrence.description.as_deref())
                            .build()
                    })
                    .collect(),
            )),
            "summary" => document.summary.as_deref().map(YamlNode::text),
            "notes" => document.notes.as_deref().map(YamlNode::text),
            _ => None,
        }
    }

    fn people(&self, ids: &[i64]) -> YamlNode {
        YamlNode::scalar_or_list(
            ids.iter()
                .filter_map(|id| self.snapshot.person(*id))
                .map(|person| person_node(person, self.aliases))
                .collect(),
        )
    }

    /// Plain names when the document has a single region holding every
    /// place; a `{Region: [places]}` mapping otherwise.
    fn places(&self, ids: &[PlaceId]) -> YamlNode {
        let places: Vec<_> = ids
            .iter()
            .filter_map(|id| self.snapshot.place(*id))
            .collect();
        let single_region: Option<RegionId> = match self.snapshot.regions.as_slice() {
            [only] => Some(only.id),
            _ => None,
        };
        if places
            .iter()
            .all(|place| Some(place.region_id) == single_region)
        {
            return YamlNode::scalar_or_list(
                places
                    .iter()
                    .map(|place| YamlNode::text(place.name.as_str()))
                    .collect(),
            );
        }

        let mut groups: Vec<(String, Vec<YamlNode>)> = Vec::new();
        for place in places {
            let name = YamlNode::text(place.name.as_str());
            match groups
                .iter_mut()
                .find(|(region, _)| *region == place.region_name)
            {
                Some((_, names)) => names.push(name),
                None => groups.push((place.region_name.clone(), vec![name])),
            }
        }
        YamlNode::Map(
            groups
                .into_iter()
                .map(|(region, names)| (region, YamlNode::scalar_or_list(names)))
                .collect(),
        )
    }

    /// Omitted when the only date is the document's own day.
    fn scene_dates(&self, dates: &[DatedContext]) -> YamlNode {
        let own_day = DatedContext::new(DateRef::exact(self.snapshot.document.date), None);
        if dates.len() == 1 && dates[0] == own_day {
            return YamlNode::List(Vec::new());
        }
        YamlNode::scalar_or_list(
            dates
                .iter()
                .map(|date| YamlNode::text(date.to_packed()))
                .collect(),
        )
    }
}

/// Text form when it parses back to the same identity, record form
/// otherwise (multi-word given names, alias collisions).
fn person_node(person: &Person, aliases: &AliasTable) -> YamlNode {
    let text = person.display_name();
    let stored = PersonRef {
        name: person.name.clone(),
        last_name: person.last_name.clone(),
        disambiguator: person.disambiguator.clone(),
        relation: None,
        aliases: Vec::new(),
    };
    let reparsed = PersonRef::from_text(&text, aliases);
    if reparsed.is_some_and(|reparsed| reparsed.same_identity(&stored)) {
        return YamlNode::text(text);
    }
    MapBuilder::new()
        .field("name", YamlNode::text(person.name.as_str()))
        .optional("last_name", person.last_name.as_deref())
        .optional("disambiguator", person.disambiguator.as_deref())
        .build()
}

fn region_node(region: &Region) -> YamlNode {
    match region.country.as_deref() {
        Some(country) => YamlNode::text(format!("{} ({country})", region.name)),
        None => YamlNode::text(region.name.as_str()),
    }
}

fn named_list(entities: &[NamedEntity]) -> YamlNode {
    YamlNode::scalar_or_list(
        entities
            .iter()
            .map(|entity| YamlNode::text(entity.name.as_str()))
            .collect(),
    )
}
