//! Batch import over a directory tree.
//!
//! # Responsibility
//! - Walk a root directory in sorted path order and import every document
//!   with the configured extension.
//! - Collect skips and failures individually; one failing document never
//!   stops the batch.
//!
//! # Invariants
//! - Documents are imported sequentially through one `Importer`, so the
//!   dedup guard sees every get-or-create of the run.
//! - Source paths are recorded relative to the root with `/` separators.

use crate::config::{ConfigResult, SyncConfig};
use crate::header::HeaderWarning;
use crate::model::document::DocumentId;
use crate::resolve::alias::AliasTable;
use crate::resolve::guard::GuardStats;
use crate::service::error::{SyncError, SyncErrorKind, SyncResult};
use crate::service::import_service::{ImportOptions, ImportOutcome, Importer};
use log::{info, warn};
use rusqlite::Connection;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Instant;
use walkdir::WalkDir;

/// One document that failed to import.
#[derive(Debug)]
pub struct BatchFailure {
    pub source_path: String,
    pub error: SyncError,
}

/// Outcome of a batch run.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Files with the configured extension that were visited.
    pub scanned: usize,
    pub committed: Vec<(String, DocumentId)>,
    pub skipped: Vec<String>,
    pub failures: Vec<BatchFailure>,
    /// Warnings of committed documents, per source path.
    pub warnings: Vec<(String, HeaderWarning)>,
    pub stats: GuardStats,
}

impl BatchReport {
    /// Failure count per error kind.
    pub fn failure_counts(&self) -> BTreeMap<&'static str, usize> {
        let mut counts = BTreeMap::new();
        for failure in &self.failures {
            *counts.entry(failure.error.kind().code()).or_insert(0) += 1;
        }
        counts
    }

    pub fn failures_of(&self, kind: SyncErrorKind) -> impl Iterator<Item = &BatchFailure> {
        self.failures
            .iter()
            .filter(move |failure| failure.error.kind() == kind)
    }
}

/// Runs batch imports with one configuration and alias table.
pub struct BatchRunner {
    config: SyncConfig,
    importer: Importer,
}

impl BatchRunner {
    pub fn new(config: SyncConfig, aliases: AliasTable) -> Self {
        Self {
            config,
            importer: Importer::new(aliases),
        }
    }

    /// Loads the alias table named by `config`, or starts with an empty one.
    pub fn from_config(config: SyncConfig) -> ConfigResult<Self> {
        let aliases = match config.alias_file.as_deref() {
            Some(path) => AliasTable::load(path)?,
            None => AliasTable::empty(),
        };
        Ok(Self::new(config, aliases))
    }

    pub fn importer(&self) -> &Importer {
        &self.importer
    }

    /// Imports every document under `root`.
    ///
    /// Only an unreadable root aborts the run; per-document problems are
    /// listed in the report.
    pub fn run(&mut self, conn: &mut Connection, root: &Path, force: bool) -> SyncResult<BatchReport> {
        let started_at = Instant::now();
        info!("event=batch_import module=sync status=start force={force}");
        std::fs::metadata(root).map_err(|err| SyncError::io(root, err))?;

        let options = ImportOptions {
            force,
            ..ImportOptions::from_config(&self.config)
        };
        self.importer.set_source_root(Some(root));
        let mut report = BatchReport::default();
        let walker = WalkDir::new(root).sort_by_file_name().into_iter();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    let path = err
                        .path()
                        .map(|path| relative_source_path(root, path))
                        .unwrap_or_default();
                    let io_err = err
                        .into_io_error()
                        .unwrap_or_else(|| std::io::Error::other("directory walk failed"));
                    report.failures.push(BatchFailure {
                        error: SyncError::io(root.join(&path), io_err),
                        source_path: path,
                    });
                    continue;
                }
            };
            if !entry.file_type().is_file() || !has_extension(entry.path(), self.config.extension()) {
                continue;
            }

            report.scanned += 1;
            let source_path = relative_source_path(root, entry.path());
            let text = match std::fs::read_to_string(entry.path()) {
                Ok(text) => text,
                Err(err) => {
                    report.failures.push(BatchFailure {
                        error: SyncError::io(entry.path(), err),
                        source_path,
                    });
                    continue;
                }
            };

            match self
                .importer
                .import_text(conn, Some(&source_path), &text, options)
            {
                Ok(ImportOutcome::Skipped(_)) => report.skipped.push(source_path),
                Ok(ImportOutcome::Committed(import)) => {
                    report.warnings.extend(
                        import
                            .warnings
                            .into_iter()
                            .map(|warning| (source_path.clone(), warning)),
                    );
                    report.committed.push((source_path, import.document));
                }
                Err(error) => report.failures.push(BatchFailure { source_path, error }),
            }
        }
        report.stats = self.importer.guard_stats();

        let status = if report.failures.is_empty() { "ok" } else { "error" };
        let message = format!(
            "event=batch_import module=sync status={status} scanned={} committed={} skipped={} failed={} warnings={} created={} reused={} duration_ms={}",
            report.scanned,
            report.committed.len(),
            report.skipped.len(),
            report.failures.len(),
            report.warnings.len(),
            report.stats.created,
            report.stats.reused,
            started_at.elapsed().as_millis()
        );
        if report.failures.is_empty() {
            info!("{message}");
        } else {
            warn!("{message}");
            for failure in &report.failures {
                warn!(
                    "event=batch_import_failure module=sync status=error error_code={} source_path={}",
                    failure.error.kind().code(),
                    failure.source_path
                );
            }
        }
        Ok(report)
    }
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|value| value.to_str())
        .is_some_and(|value| value.eq_ignore_ascii_case(extension))
}

fn relative_source_path(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|component| component.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
