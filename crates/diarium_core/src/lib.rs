//! Diary metadata import and synchronization core.
//!
//! Documents carry a YAML header describing the people, places and moments
//! they mention. This crate extracts those headers, resolves references to
//! canonical entities, stores the relation graph in SQLite and renders it
//! back deterministically.

pub mod config;
pub mod db;
pub mod header;
pub mod logging;
pub mod model;
pub mod repo;
pub mod resolve;
pub mod service;

pub use config::{load_config, ConfigError, ConfigResult, SyncConfig};
pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use logging::{
    default_log_level, init_logging, init_logging_from_config, logging_status, LoggingError,
};
pub use model::document::{Document, DocumentId, EditableFields, UpdateMode};
pub use repo::{RepoError, RepoResult};
pub use resolve::{AliasTable, EntityResolver, ResolveError, ResolveResult};
pub use service::{
    verify_round_trip, write_back_editable, BatchReport, BatchRunner, Exporter, ImportOptions,
    ImportOutcome, ImportReport, Importer, QueryService, SyncError, SyncErrorKind, SyncResult,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
