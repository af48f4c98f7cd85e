//! Entity resolution.
//!
//! # Responsibility
//! - Normalize free-text mentions and map them to canonical entities.
//! - Plan a whole header before any write and gate every get-or-create call.
//!
//! # Invariants
//! - The alias table is passed in explicitly and never mutated during a run.
//! - Lookups never write; creation is always an explicit call.

pub mod alias;
pub mod guard;
pub mod plan;
pub mod reference;
pub mod resolver;

pub use alias::AliasTable;
pub use guard::{check_change, ChangeStatus, DedupGuard, GuardStats, IdentityKey};
pub use plan::{PlanError, ResolutionPlan};
pub use reference::{normalize_surface, PersonRef, PlaceRef, RegionRef};
pub use resolver::{EntityResolver, ResolveError, ResolveResult};
