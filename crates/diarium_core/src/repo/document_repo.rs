//! Document repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist the document aggregate row (identity, computed and editable
//!   fields).
//! - Provide lookups used by the change detector (`find_by_source`) and the
//!   importer (`find_by_date`).
//!
//! # Invariants
//! - `date` is unique; `source_path` is unique when present.
//! - `update_editable` only touches fields that are `Some`.
//! - Deleting a document relies on `ON DELETE CASCADE` for owned rows and
//!   link rows; shared entity rows are never deleted here.

use crate::model::date::{format_day, parse_day};
use crate::model::document::{Document, DocumentId, EditableFields, NewDocument};
use crate::repo::{ensure_tables, RepoError, RepoResult};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

const DOCUMENT_SELECT_SQL: &str = "SELECT
    uuid,
    date,
    source_path,
    word_count,
    content_hash,
    notes,
    summary,
    created_at,
    updated_at
FROM documents";

/// Repository interface for document rows.
pub trait DocumentRepository {
    fn create_document(&self, new: &NewDocument) -> RepoResult<Document>;
    fn get_document(&self, id: DocumentId) -> RepoResult<Option<Document>>;
    fn find_by_date(&self, date: NaiveDate) -> RepoResult<Option<Document>>;
    fn find_by_source(&self, source_path: &str) -> RepoResult<Option<Document>>;
    /// Lists all documents ordered by date.
    fn list_documents(&self) -> RepoResult<Vec<Document>>;
    /// Rewrites computed fields after a re-import.
    fn update_computed(
        &self,
        id: DocumentId,
        source_path: Option<&str>,
        word_count: i64,
        content_hash: &str,
    ) -> RepoResult<()>;
    /// Records a new content hash after an export rewrote the source file.
    fn update_content_hash(&self, id: DocumentId, content_hash: &str) -> RepoResult<()>;
    /// Applies operator-editable fields; `None` leaves a field unchanged.
    fn update_editable(&self, id: DocumentId, fields: &EditableFields) -> RepoResult<()>;
    fn delete_document(&self, id: DocumentId) -> RepoResult<()>;
}

/// SQLite-backed document repository.
pub struct SqliteDocumentRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteDocumentRepository<'conn> {
    /// Constructs a repository from a migrated connection or transaction.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_tables(conn, &["documents"])?;
        Ok(Self { conn })
    }
}

impl DocumentRepository for SqliteDocumentRepository<'_> {
    fn create_document(&self, new: &NewDocument) -> RepoResult<Document> {
        let id = Uuid::new_v4();
        if let Some(source_path) = new.source_path.as_deref() {
            release_source_path(self.conn, source_path, id)?;
        }

        self.conn.execute(
            "INSERT INTO documents (
                uuid,
                date,
                source_path,
                word_count,
                content_hash
            ) VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                id.to_string(),
                format_day(new.date),
                new.source_path.as_deref(),
                new.word_count,
                new.content_hash.as_str(),
            ],
        )?;

        self.get_document(id)?.ok_or_else(|| {
            RepoError::InvalidData(format!("document {id} missing after insert"))
        })
    }

    fn get_document(&self, id: DocumentId) -> RepoResult<Option<Document>> {
        let document = self
            .conn
            .query_row(
                &format!("{DOCUMENT_SELECT_SQL} WHERE uuid = ?1;"),
                [id.to_string()],
                |row| Ok(parse_document_row(row)),
            )
            .optional()?;
        document.transpose()
    }

    fn find_by_date(&self, date: NaiveDate) -> RepoResult<Option<Document>> {
        let document = self
            .conn
            .query_row(
                &format!("{DOCUMENT_SELECT_SQL} WHERE date = ?1;"),
                [format_day(date)],
                |row| Ok(parse_document_row(row)),
            )
            .optional()?;
        document.transpose()
    }

    fn find_by_source(&self, source_path: &str) -> RepoResult<Option<Document>> {
        let document = self
            .conn
            .query_row(
                &format!("{DOCUMENT_SELECT_SQL} WHERE source_path = ?1;"),
                [source_path],
                |row| Ok(parse_document_row(row)),
            )
            .optional()?;
        document.transpose()
    }

    fn list_documents(&self) -> RepoResult<Vec<Document>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{DOCUMENT_SELECT_SQL} ORDER BY date ASC;"))?;
        let mut rows = stmt.query([])?;
        let mut documents = Vec::new();
        while let Some(row) = rows.next()? {
            documents.push(parse_document_row(row)?);
        }
        Ok(documents)
    }

    fn update_computed(
        &self,
        id: DocumentId,
        source_path: Option<&str>,
        word_count: i64,
        content_hash: &str,
    ) -> RepoResult<()> {
        if let Some(source_path) = source_path {
            release_source_path(self.conn, source_path, id)?;
        }

        let changed = self.conn.execute(
            "UPDATE documents
             SET
                source_path = COALESCE(?2, source_path),
                word_count = ?3,
                content_hash = ?4,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?1;",
            params![id.to_string(), source_path, word_count, content_hash],
        )?;
        if changed == 0 {
            return Err(RepoError::DocumentNotFound(id));
        }
        Ok(())
    }

    fn update_content_hash(&self, id: DocumentId, content_hash: &str) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE documents SET content_hash = ?2 WHERE uuid = ?1;",
            params![id.to_string(), content_hash],
        )?;
        if changed == 0 {
            return Err(RepoError::DocumentNotFound(id));
        }
        Ok(())
    }

    fn update_editable(&self, id: DocumentId, fields: &EditableFields) -> RepoResult<()> {
        if fields.is_empty() {
            if self.get_document(id)?.is_none() {
                return Err(RepoError::DocumentNotFound(id));
            }
            return Ok(());
        }

        let changed = self.conn.execute(
            "UPDATE documents
             SET
                notes = CASE WHEN ?2 THEN ?3 ELSE notes END,
                summary = CASE WHEN ?4 THEN ?5 ELSE summary END,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?1;",
            params![
                id.to_string(),
                fields.notes.is_some(),
                fields.notes.as_ref().and_then(|value| value.as_deref()),
                fields.summary.is_some(),
                fields.summary.as_ref().and_then(|value| value.as_deref()),
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::DocumentNotFound(id));
        }
        Ok(())
    }

    fn delete_document(&self, id: DocumentId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM documents WHERE uuid = ?1;", [id.to_string()])?;
        if changed == 0 {
            return Err(RepoError::DocumentNotFound(id));
        }
        Ok(())
    }
}

/// A renamed file may carry a path still recorded on another document.
fn release_source_path(conn: &Connection, source_path: &str, owner: DocumentId) -> RepoResult<()> {
    conn.execute(
        "UPDATE documents
         SET source_path = NULL
         WHERE source_path = ?1
           AND uuid <> ?2;",
        params![source_path, owner.to_string()],
    )?;
    Ok(())
}

pub(crate) fn parse_document_id(value: &str) -> RepoResult<DocumentId> {
    Uuid::parse_str(value).map_err(|_| {
        RepoError::InvalidData(format!("invalid uuid value `{value}` in documents.uuid"))
    })
}

fn parse_document_row(row: &Row<'_>) -> RepoResult<Document> {
    let uuid_text: String = row.get("uuid")?;
    let date_text: String = row.get("date")?;
    let date = parse_day(&date_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid date `{date_text}` in documents.date"))
    })?;

    Ok(Document {
        id: parse_document_id(&uuid_text)?,
        date,
        source_path: row.get("source_path")?,
        word_count: row.get("word_count")?,
        content_hash: row.get("content_hash")?,
        notes: row.get("notes")?,
        summary: row.get("summary")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
