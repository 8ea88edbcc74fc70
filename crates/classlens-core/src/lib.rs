//! ClassLens Core: catalog types, resolution policy, configuration.

pub mod catalog;
pub mod config;
pub mod error;

pub use catalog::{CanonicalRecord, CanonicalSource, Category};
pub use config::{ClassLensConfig, DataPaths, ResolutionPolicy, SCORE_EPSILON};
pub use error::{Error, Result};
