//! Read-side queries and document deletion.
//!
//! # Responsibility
//! - Provide document lookups and entity summaries for callers outside the
//!   import path.
//!
//! # Invariants
//! - Every query except `delete_document` is read-only.
//! - Summaries are computed from the link graph, never read from headers.

use crate::model::document::{Document, DocumentId};
use crate::model::entity::{NamedKind, Person, PersonId, PersonSummary};
use crate::repo::document_repo::{DocumentRepository, SqliteDocumentRepository};
use crate::repo::entity_repo::{EntityRepository, SqliteEntityRepository};
use crate::repo::relation_repo::{LinkKind, SqliteRelationRepository};
use crate::repo::RepoResult;
use crate::resolve::alias::AliasTable;
use crate::resolve::resolver::{EntityResolver, ResolveResult};
use chrono::NaiveDate;
use log::{error, info};
use rusqlite::Connection;
use std::time::Instant;

/// Query entry points over one connection.
pub struct QueryService<'conn> {
    documents: SqliteDocumentRepository<'conn>,
    entities: SqliteEntityRepository<'conn>,
    relations: SqliteRelationRepository<'conn>,
}

impl<'conn> QueryService<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        Ok(Self {
            documents: SqliteDocumentRepository::try_new(conn)?,
            entities: SqliteEntityRepository::try_new(conn)?,
            relations: SqliteRelationRepository::try_new(conn)?,
        })
    }

    pub fn get_document(&self, id: DocumentId) -> RepoResult<Option<Document>> {
        self.documents.get_document(id)
    }

    pub fn find_document_by_date(&self, date: NaiveDate) -> RepoResult<Option<Document>> {
        self.documents.find_by_date(date)
    }

    /// All documents ordered by date.
    pub fn list_documents(&self) -> RepoResult<Vec<Document>> {
        self.documents.list_documents()
    }

    /// Deletes a document and the records it owns.
    ///
    /// Shared entities stay in place; only their links to this document go.
    pub fn delete_document(&self, id: DocumentId) -> RepoResult<()> {
        let started_at = Instant::now();
        match self.documents.delete_document(id) {
            Ok(()) => {
                info!(
                    "event=document_delete module=sync status=ok duration_ms={}",
                    started_at.elapsed().as_millis()
                );
                Ok(())
            }
            Err(err) => {
                error!(
                    "event=document_delete module=sync status=error duration_ms={} error_code={}",
                    started_at.elapsed().as_millis(),
                    err.code()
                );
                Err(err)
            }
        }
    }

    pub fn person(&self, id: PersonId) -> RepoResult<Option<Person>> {
        self.entities.get_person(id)
    }

    /// Linked document count and first/last appearance of one person.
    pub fn person_summary(&self, id: PersonId) -> RepoResult<PersonSummary> {
        self.entities.person_summary(id)
    }

    /// Documents linking a person, ordered by date.
    pub fn documents_for_person(&self, id: PersonId) -> RepoResult<Vec<Document>> {
        self.load_all(self.relations.documents_linking(LinkKind::People, id)?)
    }

    /// Documents tagged with a keyword, ordered by date. Unknown keywords
    /// yield an empty list.
    pub fn documents_for_keyword(&self, keyword: &str) -> RepoResult<Vec<Document>> {
        let Some(name) = NamedKind::Keyword.normalize(keyword) else {
            return Ok(Vec::new());
        };
        let Some(entity) = self.entities.find_named(NamedKind::Keyword, &name)? else {
            return Ok(Vec::new());
        };
        self.load_all(
            self.relations
                .documents_linking(LinkKind::Keywords, entity.id)?,
        )
    }

    /// Every stored revision of a poem, oldest first.
    pub fn verse_history(&self, title: &str) -> RepoResult<Vec<(DocumentId, String)>> {
        let Some(verse) = self.entities.find_named(NamedKind::Verse, title)? else {
            return Ok(Vec::new());
        };
        self.relations.verse_revisions(verse.id)
    }

    /// People whose name, last name or alias starts with `prefix`.
    pub fn suggest_people(
        &self,
        aliases: &AliasTable,
        prefix: &str,
        limit: u32,
    ) -> ResolveResult<Vec<Person>> {
        EntityResolver::new(&self.entities, aliases).suggest_people(prefix, limit)
    }

    fn load_all(&self, ids: Vec<DocumentId>) -> RepoResult<Vec<Document>> {
        let mut documents = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(document) = self.documents.get_document(id)? {
                documents.push(document);
            }
        }
        Ok(documents)
    }
}
