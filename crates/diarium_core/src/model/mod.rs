//! Normalized domain model for diary documents and their relation graph.
//!
//! # Responsibility
//! - Define canonical data structures shared by extraction, resolution,
//!   relationship building and export.
//!
//! # Invariants
//! - A `Document` is identified by its stable `DocumentId` and, as a natural
//!   key, by its unique date.
//! - Shared entities (`Person`, `Place`, `Region`, named tags, works) outlive
//!   any document that links them.
//! - Owned relation records (`relation` module) live and die with one document.

pub mod date;
pub mod document;
pub mod entity;
pub mod relation;
