//! ClassLens Store: SQLite star schema holding the canonical catalog.

pub mod schema;
pub mod sqlite;
pub mod types;

pub use sqlite::SqliteStore;
pub use types::*;
