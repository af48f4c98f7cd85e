//! Synchronization error model.
//!
//! # Invariants
//! - Every variant names the document it concerns, so batch reports can list
//!   failures individually.
//! - `Validation` and `Ambiguity` are raised before the first write of a
//!   document.

use crate::config::ConfigError;
use crate::header::HeaderError;
use crate::model::document::DocumentId;
use crate::repo::RepoError;
use crate::resolve::plan::PlanError;
use crate::resolve::resolver::ResolveError;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub type SyncResult<T> = Result<T, SyncError>;

/// Failure while importing, exporting or querying one document.
#[derive(Debug)]
pub enum SyncError {
    /// Header could not be extracted; nothing was written.
    Parse { document: String, message: String },
    /// A reference or record failed validation; nothing was written.
    Validation {
        document: String,
        field: String,
        message: String,
    },
    /// A reference matches several entities and needs an explicit key.
    Ambiguity {
        document: String,
        field: String,
        reference: String,
        candidates: Vec<String>,
    },
    /// Storage failure; the document's transaction was rolled back.
    Store { document: String, source: RepoError },
    DocumentNotFound(DocumentId),
    Io { path: PathBuf, source: std::io::Error },
    Config(ConfigError),
}

/// Stable category of a `SyncError`, used for counters and log codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncErrorKind {
    Parse,
    Validation,
    Ambiguity,
    Store,
    NotFound,
    Io,
    Config,
}

impl SyncErrorKind {
    pub fn code(self) -> &'static str {
        match self {
            Self::Parse => "parse_failed",
            Self::Validation => "validation_failed",
            Self::Ambiguity => "ambiguous_reference",
            Self::Store => "store_failed",
            Self::NotFound => "document_not_found",
            Self::Io => "io_failed",
            Self::Config => "config_invalid",
        }
    }
}

impl SyncError {
    pub fn kind(&self) -> SyncErrorKind {
        match self {
            Self::Parse { .. } => SyncErrorKind::Parse,
            Self::Validation { .. } => SyncErrorKind::Validation,
            Self::Ambiguity { .. } => SyncErrorKind::Ambiguity,
            Self::Store { .. } => SyncErrorKind::Store,
            Self::DocumentNotFound(_) => SyncErrorKind::NotFound,
            Self::Io { .. } => SyncErrorKind::Io,
            Self::Config(_) => SyncErrorKind::Config,
        }
    }

    pub(crate) fn parse(document: &str, err: HeaderError) -> Self {
        Self::Parse {
            document: document.to_string(),
            message: err.to_string(),
        }
    }

    pub(crate) fn store(document: &str, source: impl Into<RepoError>) -> Self {
        Self::Store {
            document: document.to_string(),
            source: source.into(),
        }
    }

    pub(crate) fn from_plan(document: &str, err: PlanError) -> Self {
        match err {
            PlanError::Validation { field, message } => Self::Validation {
                document: document.to_string(),
                field,
                message,
            },
            PlanError::Ambiguity {
                field,
                reference,
                candidates,
            } => Self::Ambiguity {
                document: document.to_string(),
                field,
                reference,
                candidates,
            },
            PlanError::Repo(source) => Self::store(document, source),
        }
    }

    pub(crate) fn from_resolve(document: &str, field: &str, err: ResolveError) -> Self {
        Self::from_plan(document, PlanError::at(field)(err))
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

impl Display for SyncError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse { document, message } => write!(f, "{document}: {message}"),
            Self::Validation {
                document,
                field,
                message,
            } => write!(f, "{document}: {field}: {message}"),
            Self::Ambiguity {
                document,
                field,
                reference,
                candidates,
            } => write!(
                f,
                "{document}: {field}: `{reference}` is ambiguous between {}",
                candidates.join(", ")
            ),
            Self::Store { document, source } => write!(f, "{document}: {source}"),
            Self::DocumentNotFound(id) => write!(f, "document not found: {id}"),
            Self::Io { path, source } => write!(f, "{}: {source}", path.display()),
            Self::Config(err) => write!(f, "{err}"),
        }
    }
}

impl Error for SyncError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store { source, .. } => Some(source),
            Self::Io { source, .. } => Some(source),
            Self::Config(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ConfigError> for SyncError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}
