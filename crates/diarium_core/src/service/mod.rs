//! Synchronization use cases.
//!
//! # Responsibility
//! - Orchestrate import, export, batch runs and queries over the
//!   repositories and the entity resolver.
//! - Own transaction boundaries: one `IMMEDIATE` transaction per document.
//!
//! # Invariants
//! - Computed fields flow store → header only; editable fields flow both
//!   ways; relation fields are rebuilt by the relationship builder.

pub mod batch_service;
pub mod error;
pub mod export_service;
pub mod graph;
pub mod import_service;
pub mod query;
pub mod relation_builder;
pub mod snapshot;

pub use batch_service::{BatchFailure, BatchReport, BatchRunner};
pub use error::{SyncError, SyncErrorKind, SyncResult};
pub use export_service::{write_back_editable, Exporter};
pub use graph::{verify_round_trip, DocumentGraph, GraphDiff, RoundTripReport};
pub use import_service::{ImportOptions, ImportOutcome, ImportReport, Importer};
pub use query::QueryService;
pub use relation_builder::BuildSummary;
pub use snapshot::{load_snapshot, DocumentSnapshot};
