//! Seed file format and store-level statistics.

use serde::{Deserialize, Serialize};

/// An instructor entry in a seed file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedInstructor {
    pub first_name: String,
    pub last_name: String,
}

/// A class entry in a seed file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedClass {
    pub title: String,
    #[serde(default)]
    pub domain: Option<String>,
}

/// A topic entry in a seed file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedTopic {
    pub name: String,
    #[serde(default)]
    pub class: Option<String>,
}

/// A fact row in a seed file; dimensions are referenced by canonical value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedSession {
    pub class: String,
    #[serde(default)]
    pub instructor: Option<String>,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub held_on: Option<String>,
    #[serde(default)]
    pub attendees: Option<i64>,
    #[serde(default)]
    pub rating: Option<f64>,
}

/// Contents of a `seed.json` file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeedData {
    #[serde(default)]
    pub instructors: Vec<SeedInstructor>,
    #[serde(default)]
    pub domains: Vec<String>,
    #[serde(default)]
    pub classes: Vec<SeedClass>,
    #[serde(default)]
    pub topics: Vec<SeedTopic>,
    #[serde(default)]
    pub sessions: Vec<SeedSession>,
}

/// Rows written by a seed import. Duplicates are skipped, not counted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportReport {
    pub instructors: usize,
    pub domains: usize,
    pub classes: usize,
    pub topics: usize,
    pub sessions: usize,
    /// Fact rows dropped because they referenced an unknown class.
    pub skipped_sessions: usize,
}

/// Store-level statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreStats {
    pub instructors: i64,
    pub domains: i64,
    pub classes: i64,
    pub topics: i64,
    pub sessions: i64,
    pub db_path: String,
    pub db_size_mb: f64,
}

/// Result of a read-only query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRows {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<serde_json::Value>>,
    /// True when more rows were available than were returned.
    pub truncated: bool,
}
