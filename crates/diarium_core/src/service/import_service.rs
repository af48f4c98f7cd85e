//! Document import.
//!
//! # Responsibility
//! - Run one document through change detection, parsing, resolution and
//!   relationship building inside a single `IMMEDIATE` transaction.
//!
//! # Invariants
//! - An unchanged content hash performs zero writes unless `force` is set.
//! - Any failure rolls back the whole document and the guard's pending keys.
//! - Computed header fields are ignored; editable fields that are absent
//!   leave stored values unchanged.
//! - A date owned by another source file that still exists is rejected;
//!   the path moves only when the previous file is gone.

use crate::config::SyncConfig;
use crate::header::{content_hash, parse_document, HeaderWarning, ParsedDocument};
use crate::model::date::format_day;
use crate::model::document::{DocumentId, NewDocument, UpdateMode};
use crate::repo::document_repo::{DocumentRepository, SqliteDocumentRepository};
use crate::repo::entity_repo::SqliteEntityRepository;
use crate::repo::relation_repo::SqliteRelationRepository;
use crate::resolve::alias::AliasTable;
use crate::resolve::guard::{check_change, ChangeStatus, DedupGuard, GuardStats};
use crate::resolve::plan::ResolutionPlan;
use crate::resolve::resolver::EntityResolver;
use crate::service::error::{SyncError, SyncResult};
use crate::service::relation_builder::{BuildSummary, RelationBuilder};
use log::{error, info};
use rusqlite::{Connection, TransactionBehavior};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Per-import switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportOptions {
    pub mode: UpdateMode,
    /// Re-import even when the content hash is unchanged.
    pub force: bool,
}

impl ImportOptions {
    pub fn from_config(config: &SyncConfig) -> Self {
        Self {
            mode: config.default_mode,
            force: false,
        }
    }
}

/// Result of a committed import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportReport {
    pub document: DocumentId,
    /// `true` when the document row was created by this import.
    pub created: bool,
    pub mode: UpdateMode,
    pub summary: BuildSummary,
    pub warnings: Vec<HeaderWarning>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportOutcome {
    /// Content hash matched the stored one; nothing was written.
    Skipped(DocumentId),
    Committed(ImportReport),
}

/// Imports documents with one alias table and one dedup guard.
///
/// A single importer serves a whole batch run so identity keys are cached
/// across documents.
#[derive(Debug)]
pub struct Importer {
    aliases: AliasTable,
    guard: DedupGuard,
    source_root: Option<PathBuf>,
}

impl Importer {
    pub fn new(aliases: AliasTable) -> Self {
        Self {
            aliases,
            guard: DedupGuard::new(),
            source_root: None,
        }
    }

    /// Directory that relative source paths are resolved against.
    pub fn set_source_root(&mut self, root: Option<&Path>) {
        self.source_root = root.map(Path::to_path_buf);
    }

    pub fn aliases(&self) -> &AliasTable {
        &self.aliases
    }

    /// Created vs. reused entity rows over committed documents.
    pub fn guard_stats(&self) -> GuardStats {
        self.guard.stats()
    }

    /// Imports one document text.
    ///
    /// `source_path` keys change detection; without it the hash check is
    /// skipped and the document is always imported.
    pub fn import_text(
        &mut self,
        conn: &mut Connection,
        source_path: Option<&str>,
        text: &str,
        options: ImportOptions,
    ) -> SyncResult<ImportOutcome> {
        let started_at = Instant::now();
        let label = source_path.unwrap_or("<inline>").to_string();

        if let Some(path) = source_path {
            let hash = content_hash(text);
            let documents =
                SqliteDocumentRepository::try_new(conn).map_err(|err| SyncError::store(&label, err))?;
            let status = check_change(&documents, path, &hash, options.force)
                .map_err(|err| SyncError::store(&label, err))?;
            if let ChangeStatus::Unchanged(id) = status {
                info!(
                    "event=document_import module=sync status=skip reason=unchanged duration_ms={}",
                    started_at.elapsed().as_millis()
                );
                return Ok(ImportOutcome::Skipped(id));
            }
        }

        let parsed = parse_document(text).map_err(|err| {
            let err = SyncError::parse(&label, err);
            log_failure(&err, started_at);
            err
        })?;
        let label = match source_path {
            Some(path) => path.to_string(),
            None => format_day(parsed.header.date),
        };

        let result = self.import_parsed(conn, source_path, &label, &parsed, options);
        match result {
            Ok(report) => {
                self.guard.commit();
                info!(
                    "event=document_import module=sync status=ok date={} mode={} created={} links={} scenes={} warnings={} duration_ms={}",
                    format_day(parsed.header.date),
                    report.mode.as_str(),
                    report.created,
                    report.summary.links,
                    report.summary.scenes,
                    report.warnings.len(),
                    started_at.elapsed().as_millis()
                );
                Ok(ImportOutcome::Committed(report))
            }
            Err(err) => {
                self.guard.rollback();
                log_failure(&err, started_at);
                Err(err)
            }
        }
    }

    fn import_parsed(
        &mut self,
        conn: &mut Connection,
        source_path: Option<&str>,
        label: &str,
        parsed: &ParsedDocument,
        options: ImportOptions,
    ) -> SyncResult<ImportReport> {
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|err| SyncError::store(label, err))?;

        let documents =
            SqliteDocumentRepository::try_new(&tx).map_err(|err| SyncError::store(label, err))?;
        let entities =
            SqliteEntityRepository::try_new(&tx).map_err(|err| SyncError::store(label, err))?;
        let relations =
            SqliteRelationRepository::try_new(&tx).map_err(|err| SyncError::store(label, err))?;
        let resolver = EntityResolver::new(&entities, &self.aliases);
        let header = &parsed.header;

        let existing = documents
            .find_by_date(header.date)
            .map_err(|err| SyncError::store(label, err))?;
        if let (Some(document), Some(incoming)) = (&existing, source_path) {
            if let Some(owner) = document.source_path.as_deref() {
                if owner != incoming && self.source_exists(owner) {
                    return Err(SyncError::Validation {
                        document: label.to_string(),
                        field: "date".to_string(),
                        message: format!(
                            "date {} is already imported from `{owner}`",
                            format_day(header.date)
                        ),
                    });
                }
            }
        }
        let existing_scenes = match (&existing, options.mode) {
            (Some(document), UpdateMode::Incremental) => relations
                .list_scenes(document.id)
                .map_err(|err| SyncError::store(label, err))?
                .into_iter()
                .map(|scene| scene.name)
                .collect(),
            _ => Vec::new(),
        };

        let plan = ResolutionPlan::build(&resolver, header, &existing_scenes)
            .map_err(|err| SyncError::from_plan(label, err))?;

        let (document, created) = match existing {
            Some(document) => {
                documents
                    .update_computed(document.id, source_path, parsed.word_count, &parsed.content_hash)
                    .map_err(|err| SyncError::store(label, err))?;
                (document.id, false)
            }
            None => {
                let document = documents
                    .create_document(&NewDocument {
                        date: header.date,
                        source_path: source_path.map(str::to_string),
                        word_count: parsed.word_count,
                        content_hash: parsed.content_hash.clone(),
                    })
                    .map_err(|err| SyncError::store(label, err))?;
                (document.id, true)
            }
        };
        documents
            .update_editable(document, &header.editable)
            .map_err(|err| SyncError::store(label, err))?;

        let summary = RelationBuilder::new(&resolver, &relations, &mut self.guard)
            .build(document, &plan, options.mode)
            .map_err(|err| SyncError::from_plan(label, err))?;

        tx.commit().map_err(|err| SyncError::store(label, err))?;

        Ok(ImportReport {
            document,
            created,
            mode: options.mode,
            summary,
            warnings: header.warnings.clone(),
        })
    }

    fn source_exists(&self, source_path: &str) -> bool {
        match &self.source_root {
            Some(root) => root.join(source_path).is_file(),
            None => Path::new(source_path).is_file(),
        }
    }
}

fn log_failure(err: &SyncError, started_at: Instant) {
    error!(
        "event=document_import module=sync status=error duration_ms={} error_code={}",
        started_at.elapsed().as_millis(),
        err.kind().code()
    );
}
