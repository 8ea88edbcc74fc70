//! Entity resolution: maps free-text terms to canonical catalog values.
//!
//! Each category gets a [`FuzzyIndex`] built from a store snapshot. The
//! [`ResolutionService`] queries all of them for a term, applies the
//! ambiguity policy, and the context builder turns the outcomes into filter
//! directives for the query generator.

pub mod context;
pub mod fuzzy;
pub mod resolver;
pub mod service;
pub mod types;

pub use context::{build_context, context_block};
pub use fuzzy::{normalize, weighted_fields, FuzzyIndex, WeightedField};
pub use resolver::{apply_policy, resolve_with};
pub use service::{CategoryLoad, RefreshReport, ResolutionService};
pub use types::*;
