//! Document header extraction, parsing and rendering.
//!
//! # Responsibility
//! - Split a document into front matter, body and content hash.
//! - Convert loosely-typed header values into typed specs.
//! - Render headers back deterministically for export.
//!
//! # Invariants
//! - Nothing outside this module inspects raw YAML shapes.

pub mod extract;
pub mod field;
pub mod parse;
pub mod render;

pub use extract::{content_hash, HeaderError};
pub use parse::{parse_document, HeaderWarning, ParsedDocument, ParsedHeader};
pub use render::{render_yaml, RenderOptions, YamlNode};
