//! Document link rows and owned relation records.
//!
//! # Responsibility
//! - Maintain document ↔ shared entity link rows.
//! - Insert, merge, list and clear the relation records a document owns.
//!
//! # Invariants
//! - Link writes never touch shared entity rows.
//! - `merge_*` calls only add or overwrite with present values; they never
//!   unlink participants, places or dates.
//! - Owned record names are matched case-insensitively within one document.

use crate::model::date::{format_day, parse_day, DateRef, DatedContext};
use crate::model::document::DocumentId;
use crate::model::entity::NamedId;
use crate::model::relation::{
    CitationMode, CitationRecord, EventRecord, NewCitation, NewPatternOccurrence, NewScene,
    NewThread, NewVerseInstance, PatternOccurrenceRecord, SceneRecord, ThreadRecord,
    VerseInstanceRecord,
};
use crate::repo::document_repo::parse_document_id;
use crate::repo::{ensure_tables, RepoError, RepoResult};
use rusqlite::{params, Connection, OptionalExtension};

const OWNED_TABLES: &[&str] = &[
    "events",
    "scenes",
    "threads",
    "citations",
    "verse_instances",
    "pattern_occurrences",
];

/// Shared entity kinds linked directly to a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LinkKind {
    People,
    Places,
    Regions,
    Arcs,
    Keywords,
    Concepts,
}

impl LinkKind {
    pub const ALL: [LinkKind; 6] = [
        LinkKind::People,
        LinkKind::Places,
        LinkKind::Regions,
        LinkKind::Arcs,
        LinkKind::Keywords,
        LinkKind::Concepts,
    ];

    fn table(self) -> &'static str {
        match self {
            Self::People => "document_people",
            Self::Places => "document_places",
            Self::Regions => "document_regions",
            Self::Arcs => "document_arcs",
            Self::Keywords => "document_keywords",
            Self::Concepts => "document_concepts",
        }
    }

    fn column(self) -> &'static str {
        match self {
            Self::People => "person_id",
            Self::Places => "place_id",
            Self::Regions => "region_id",
            Self::Arcs => "arc_id",
            Self::Keywords => "keyword_id",
            Self::Concepts => "concept_id",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::People => "people",
            Self::Places => "locations",
            Self::Regions => "city",
            Self::Arcs => "arcs",
            Self::Keywords => "tags",
            Self::Concepts => "themes",
        }
    }
}

/// SQLite-backed repository for document-scoped relations.
pub struct SqliteRelationRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteRelationRepository<'conn> {
    /// Constructs a repository from a migrated connection or transaction.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_tables(
            conn,
            &[
                "document_people",
                "document_places",
                "document_regions",
                "document_arcs",
                "document_keywords",
                "document_concepts",
                "scenes",
                "scene_dates",
                "scene_people",
                "scene_places",
                "events",
                "event_scenes",
                "threads",
                "thread_people",
                "thread_places",
                "citations",
                "verse_instances",
                "pattern_occurrences",
            ],
        )?;
        Ok(Self { conn })
    }

    /// Lists linked entity ids in ascending id order.
    pub fn linked_ids(&self, document: DocumentId, kind: LinkKind) -> RepoResult<Vec<i64>> {
        let sql = format!(
            "SELECT {column} FROM {table} WHERE document_uuid = ?1 ORDER BY {column} ASC;",
            column = kind.column(),
            table = kind.table()
        );
        query_ids(self.conn, &sql, [document.to_string()])
    }

    /// Replaces all links of one kind. Entities absent from `ids` are
    /// unlinked only.
    pub fn replace_links(&self, document: DocumentId, kind: LinkKind, ids: &[i64]) -> RepoResult<()> {
        self.conn.execute(
            &format!("DELETE FROM {} WHERE document_uuid = ?1;", kind.table()),
            [document.to_string()],
        )?;
        self.add_links(document, kind, ids)
    }

    /// Unions `ids` into the existing links of one kind.
    pub fn add_links(&self, document: DocumentId, kind: LinkKind, ids: &[i64]) -> RepoResult<()> {
        let sql = format!(
            "INSERT OR IGNORE INTO {} (document_uuid, {}) VALUES (?1, ?2);",
            kind.table(),
            kind.column()
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let document = document.to_string();
        for id in ids {
            stmt.execute(params![document, id])?;
        }
        Ok(())
    }

    /// Documents linking one entity, ordered by document date.
    pub fn documents_linking(&self, kind: LinkKind, entity_id: i64) -> RepoResult<Vec<DocumentId>> {
        let sql = format!(
            "SELECT d.uuid
             FROM {table} l
             INNER JOIN documents d ON d.uuid = l.document_uuid
             WHERE l.{column} = ?1
             ORDER BY d.date ASC;",
            table = kind.table(),
            column = kind.column()
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query([entity_id])?;
        let mut documents = Vec::new();
        while let Some(row) = rows.next()? {
            let value: String = row.get(0)?;
            documents.push(parse_document_id(&value)?);
        }
        Ok(documents)
    }

    /// Removes every owned record of a document (full replace).
    pub fn clear_owned(&self, document: DocumentId) -> RepoResult<()> {
        let document = document.to_string();
        for table in OWNED_TABLES {
            self.conn.execute(
                &format!("DELETE FROM {table} WHERE document_uuid = ?1;"),
                [document.as_str()],
            )?;
        }
        Ok(())
    }

    pub fn list_scenes(&self, document: DocumentId) -> RepoResult<Vec<SceneRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, description
             FROM scenes
             WHERE document_uuid = ?1
             ORDER BY id ASC;",
        )?;
        let mut rows = stmt.query([document.to_string()])?;
        let mut scenes = Vec::new();
        while let Some(row) = rows.next()? {
            scenes.push(SceneRecord {
                id: row.get(0)?,
                name: row.get(1)?,
                description: row.get(2)?,
                dates: Vec::new(),
                people: Vec::new(),
                places: Vec::new(),
            });
        }
        drop(rows);

        for scene in &mut scenes {
            scene.dates = self.scene_dates(scene.id)?;
            scene.people = query_ids(
                self.conn,
                "SELECT person_id FROM scene_people WHERE scene_id = ?1 ORDER BY person_id ASC;",
                [scene.id],
            )?;
            scene.places = query_ids(
                self.conn,
                "SELECT place_id FROM scene_places WHERE scene_id = ?1 ORDER BY place_id ASC;",
                [scene.id],
            )?;
        }
        Ok(scenes)
    }

    pub fn find_scene_id(&self, document: DocumentId, name: &str) -> RepoResult<Option<i64>> {
        let id = self
            .conn
            .query_row(
                "SELECT id FROM scenes WHERE document_uuid = ?1 AND name = ?2 COLLATE NOCASE;",
                params![document.to_string(), name.trim()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }

    pub fn insert_scene(&self, document: DocumentId, scene: &NewScene) -> RepoResult<i64> {
        self.conn.execute(
            "INSERT INTO scenes (document_uuid, name, description) VALUES (?1, ?2, ?3);",
            params![document.to_string(), scene.name.trim(), scene.description.as_deref()],
        )?;
        let id = self.conn.last_insert_rowid();
        self.add_scene_members(id, scene)?;
        Ok(id)
    }

    /// Merges into the same-named scene, or inserts it.
    pub fn merge_scene(&self, document: DocumentId, scene: &NewScene) -> RepoResult<i64> {
        let Some(id) = self.find_scene_id(document, &scene.name)? else {
            return self.insert_scene(document, scene);
        };
        if let Some(description) = scene.description.as_deref() {
            self.conn.execute(
                "UPDATE scenes SET description = ?2 WHERE id = ?1;",
                params![id, description],
            )?;
        }
        self.add_scene_members(id, scene)?;
        Ok(id)
    }

    fn add_scene_members(&self, scene_id: i64, scene: &NewScene) -> RepoResult<()> {
        for dated in &scene.dates {
            self.conn.execute(
                "INSERT OR IGNORE INTO scene_dates (scene_id, date_text, context)
                 VALUES (?1, ?2, ?3);",
                params![
                    scene_id,
                    dated.date.to_text(),
                    dated.context.as_deref().unwrap_or("")
                ],
            )?;
        }
        insert_pairs(
            self.conn,
            "INSERT OR IGNORE INTO scene_people (scene_id, person_id) VALUES (?1, ?2);",
            scene_id,
            &scene.people,
        )?;
        insert_pairs(
            self.conn,
            "INSERT OR IGNORE INTO scene_places (scene_id, place_id) VALUES (?1, ?2);",
            scene_id,
            &scene.places,
        )
    }

    fn scene_dates(&self, scene_id: i64) -> RepoResult<Vec<DatedContext>> {
        let mut stmt = self.conn.prepare(
            "SELECT date_text, context
             FROM scene_dates
             WHERE scene_id = ?1
             ORDER BY date_text ASC, context ASC;",
        )?;
        let mut rows = stmt.query([scene_id])?;
        let mut dates = Vec::new();
        while let Some(row) = rows.next()? {
            let text: String = row.get(0)?;
            let context: String = row.get(1)?;
            dates.push(DatedContext::new(
                parse_stored_date(&text, "scene_dates.date_text")?,
                (!context.is_empty()).then_some(context),
            ));
        }
        Ok(dates)
    }

    pub fn list_events(&self, document: DocumentId) -> RepoResult<Vec<EventRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name
             FROM events
             WHERE document_uuid = ?1
             ORDER BY id ASC;",
        )?;
        let mut rows = stmt.query([document.to_string()])?;
        let mut events = Vec::new();
        while let Some(row) = rows.next()? {
            events.push(EventRecord {
                id: row.get(0)?,
                name: row.get(1)?,
                scene_names: Vec::new(),
            });
        }
        drop(rows);

        for event in &mut events {
            let mut stmt = self.conn.prepare(
                "SELECT s.name
                 FROM event_scenes es
                 INNER JOIN scenes s ON s.id = es.scene_id
                 WHERE es.event_id = ?1
                 ORDER BY s.id ASC;",
            )?;
            let mut rows = stmt.query([event.id])?;
            while let Some(row) = rows.next()? {
                event.scene_names.push(row.get(0)?);
            }
        }
        Ok(events)
    }

    pub fn insert_event(&self, document: DocumentId, name: &str, scene_ids: &[i64]) -> RepoResult<i64> {
        self.conn.execute(
            "INSERT INTO events (document_uuid, name) VALUES (?1, ?2);",
            params![document.to_string(), name.trim()],
        )?;
        let id = self.conn.last_insert_rowid();
        insert_pairs(
            self.conn,
            "INSERT OR IGNORE INTO event_scenes (event_id, scene_id) VALUES (?1, ?2);",
            id,
            scene_ids,
        )?;
        Ok(id)
    }

    /// Unions scene references into the same-named event, or inserts it.
    pub fn merge_event(&self, document: DocumentId, name: &str, scene_ids: &[i64]) -> RepoResult<i64> {
        let existing: Option<i64> = self
            .conn
            .query_row(
                "SELECT id FROM events WHERE document_uuid = ?1 AND name = ?2 COLLATE NOCASE;",
                params![document.to_string(), name.trim()],
                |row| row.get(0),
            )
            .optional()?;
        let Some(id) = existing else {
            return self.insert_event(document, name, scene_ids);
        };
        insert_pairs(
            self.conn,
            "INSERT OR IGNORE INTO event_scenes (event_id, scene_id) VALUES (?1, ?2);",
            id,
            scene_ids,
        )?;
        Ok(id)
    }

    pub fn list_threads(&self, document: DocumentId) -> RepoResult<Vec<ThreadRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT
                t.id,
                t.name,
                t.near_date,
                t.far_date,
                t.entry_date,
                t.content,
                d.uuid
             FROM threads t
             LEFT JOIN documents d ON d.date = t.entry_date
             WHERE t.document_uuid = ?1
             ORDER BY t.id ASC;",
        )?;
        let mut rows = stmt.query([document.to_string()])?;
        let mut threads = Vec::new();
        while let Some(row) = rows.next()? {
            let near: String = row.get(2)?;
            let far: String = row.get(3)?;
            let entry: Option<String> = row.get(4)?;
            let entry_document: Option<String> = row.get(6)?;
            threads.push(ThreadRecord {
                id: row.get(0)?,
                name: row.get(1)?,
                near: parse_stored_date(&near, "threads.near_date")?,
                far: parse_stored_date(&far, "threads.far_date")?,
                entry: entry.as_deref().and_then(parse_day),
                entry_document: entry_document
                    .as_deref()
                    .map(parse_document_id)
                    .transpose()?,
                content: row.get(5)?,
                people: Vec::new(),
                places: Vec::new(),
            });
        }
        drop(rows);

        for thread in &mut threads {
            thread.people = query_ids(
                self.conn,
                "SELECT person_id FROM thread_people WHERE thread_id = ?1 ORDER BY person_id ASC;",
                [thread.id],
            )?;
            thread.places = query_ids(
                self.conn,
                "SELECT place_id FROM thread_places WHERE thread_id = ?1 ORDER BY place_id ASC;",
                [thread.id],
            )?;
        }
        Ok(threads)
    }

    pub fn insert_thread(&self, document: DocumentId, thread: &NewThread) -> RepoResult<i64> {
        self.conn.execute(
            "INSERT INTO threads (
                document_uuid,
                name,
                near_date,
                far_date,
                entry_date,
                content
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                document.to_string(),
                thread.name.trim(),
                thread.near.to_text(),
                thread.far.to_text(),
                thread.entry.map(format_day),
                thread.content.as_deref(),
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        self.add_thread_members(id, thread)?;
        Ok(id)
    }

    /// Overwrites the dates of the same-named thread and unions its members,
    /// or inserts it.
    pub fn merge_thread(&self, document: DocumentId, thread: &NewThread) -> RepoResult<i64> {
        let existing: Option<i64> = self
            .conn
            .query_row(
                "SELECT id FROM threads WHERE document_uuid = ?1 AND name = ?2 COLLATE NOCASE;",
                params![document.to_string(), thread.name.trim()],
                |row| row.get(0),
            )
            .optional()?;
        let Some(id) = existing else {
            return self.insert_thread(document, thread);
        };
        self.conn.execute(
            "UPDATE threads
             SET
                near_date = ?2,
                far_date = ?3,
                entry_date = COALESCE(?4, entry_date),
                content = COALESCE(?5, content)
             WHERE id = ?1;",
            params![
                id,
                thread.near.to_text(),
                thread.far.to_text(),
                thread.entry.map(format_day),
                thread.content.as_deref(),
            ],
        )?;
        self.add_thread_members(id, thread)?;
        Ok(id)
    }

    fn add_thread_members(&self, thread_id: i64, thread: &NewThread) -> RepoResult<()> {
        insert_pairs(
            self.conn,
            "INSERT OR IGNORE INTO thread_people (thread_id, person_id) VALUES (?1, ?2);",
            thread_id,
            &thread.people,
        )?;
        insert_pairs(
            self.conn,
            "INSERT OR IGNORE INTO thread_places (thread_id, place_id) VALUES (?1, ?2);",
            thread_id,
            &thread.places,
        )
    }

    pub fn list_citations(&self, document: DocumentId) -> RepoResult<Vec<CitationRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, work_id, content, description, mode
             FROM citations
             WHERE document_uuid = ?1
             ORDER BY id ASC;",
        )?;
        let mut rows = stmt.query([document.to_string()])?;
        let mut citations = Vec::new();
        while let Some(row) = rows.next()? {
            let mode: String = row.get(4)?;
            citations.push(CitationRecord {
                id: row.get(0)?,
                work_id: row.get(1)?,
                content: row.get(2)?,
                description: row.get(3)?,
                mode: CitationMode::parse(&mode).ok_or_else(|| {
                    RepoError::InvalidData(format!("invalid mode `{mode}` in citations.mode"))
                })?,
            });
        }
        Ok(citations)
    }

    /// Upserts by `(work, content)`.
    pub fn upsert_citation(&self, document: DocumentId, citation: &NewCitation) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO citations (document_uuid, work_id, content, description, mode)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT (document_uuid, work_id, content) DO UPDATE SET
                description = COALESCE(excluded.description, description),
                mode = excluded.mode;",
            params![
                document.to_string(),
                citation.work_id,
                citation.content.as_str(),
                citation.description.as_deref(),
                citation.mode.as_str(),
            ],
        )?;
        Ok(())
    }

    pub fn list_verse_instances(&self, document: DocumentId) -> RepoResult<Vec<VerseInstanceRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, verse_id, content, revision_date, notes
             FROM verse_instances
             WHERE document_uuid = ?1
             ORDER BY id ASC;",
        )?;
        let mut rows = stmt.query([document.to_string()])?;
        let mut verses = Vec::new();
        while let Some(row) = rows.next()? {
            let revision: String = row.get(3)?;
            verses.push(VerseInstanceRecord {
                id: row.get(0)?,
                verse_id: row.get(1)?,
                content: row.get(2)?,
                revision_date: parse_day(&revision).ok_or_else(|| {
                    RepoError::InvalidData(format!(
                        "invalid date `{revision}` in verse_instances.revision_date"
                    ))
                })?,
                notes: row.get(4)?,
            });
        }
        Ok(verses)
    }

    /// Upserts by verse; one instance per verse and document.
    pub fn upsert_verse_instance(
        &self,
        document: DocumentId,
        verse: &NewVerseInstance,
    ) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO verse_instances (document_uuid, verse_id, content, revision_date, notes)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT (document_uuid, verse_id) DO UPDATE SET
                content = excluded.content,
                revision_date = excluded.revision_date,
                notes = COALESCE(excluded.notes, notes);",
            params![
                document.to_string(),
                verse.verse_id,
                verse.content.as_str(),
                format_day(verse.revision_date),
                verse.notes.as_deref(),
            ],
        )?;
        Ok(())
    }

    /// Documents carrying an instance of a verse, ordered by revision date.
    pub fn verse_revisions(&self, verse_id: NamedId) -> RepoResult<Vec<(DocumentId, String)>> {
        let mut stmt = self.conn.prepare(
            "SELECT document_uuid, content
             FROM verse_instances
             WHERE verse_id = ?1
             ORDER BY revision_date ASC, id ASC;",
        )?;
        let mut rows = stmt.query([verse_id])?;
        let mut revisions = Vec::new();
        while let Some(row) = rows.next()? {
            let uuid: String = row.get(0)?;
            revisions.push((parse_document_id(&uuid)?, row.get(1)?));
        }
        Ok(revisions)
    }

    pub fn list_pattern_occurrences(
        &self,
        document: DocumentId,
    ) -> RepoResult<Vec<PatternOccurrenceRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, pattern_id, description
             FROM pattern_occurrences
             WHERE document_uuid = ?1
             ORDER BY id ASC;",
        )?;
        let mut rows = stmt.query([document.to_string()])?;
        let mut occurrences = Vec::new();
        while let Some(row) = rows.next()? {
            occurrences.push(PatternOccurrenceRecord {
                id: row.get(0)?,
                pattern_id: row.get(1)?,
                description: row.get(2)?,
            });
        }
        Ok(occurrences)
    }

    pub fn upsert_pattern_occurrence(
        &self,
        document: DocumentId,
        occurrence: &NewPatternOccurrence,
    ) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO pattern_occurrences (document_uuid, pattern_id, description)
             VALUES (?1, ?2, ?3)
             ON CONFLICT (document_uuid, pattern_id) DO UPDATE SET
                description = COALESCE(excluded.description, description);",
            params![
                document.to_string(),
                occurrence.pattern_id,
                occurrence.description.as_deref(),
            ],
        )?;
        Ok(())
    }

    /// Counts every owned record of a document, across all owned tables.
    pub fn owned_record_count(&self, document: DocumentId) -> RepoResult<i64> {
        let document = document.to_string();
        let mut total = 0;
        for table in OWNED_TABLES {
            let count: i64 = self.conn.query_row(
                &format!("SELECT COUNT(*) FROM {table} WHERE document_uuid = ?1;"),
                [document.as_str()],
                |row| row.get(0),
            )?;
            total += count;
        }
        Ok(total)
    }
}

fn query_ids(conn: &Connection, sql: &str, params: impl rusqlite::Params) -> RepoResult<Vec<i64>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(params)?;
    let mut ids = Vec::new();
    while let Some(row) = rows.next()? {
        ids.push(row.get(0)?);
    }
    Ok(ids)
}

fn insert_pairs(conn: &Connection, sql: &str, owner: i64, ids: &[i64]) -> RepoResult<()> {
    let mut stmt = conn.prepare(sql)?;
    for id in ids {
        stmt.execute(params![owner, id])?;
    }
    Ok(())
}

fn parse_stored_date(text: &str, column: &str) -> RepoResult<DateRef> {
    DateRef::parse(text)
        .map_err(|_| RepoError::InvalidData(format!("invalid date `{text}` in {column}")))
}

