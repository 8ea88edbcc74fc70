//! Catalog categories and canonical values.
//!
//! A canonical value is the authoritative string a category stores in the
//! backing database (e.g. an instructor's full name or a class title). Free
//! text from a user's question is resolved against these values.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Aux field holding an instructor's given name.
pub const FIRST_NAME: &str = "first_name";
/// Aux field holding an instructor's family name.
pub const LAST_NAME: &str = "last_name";

/// Entity category a term can resolve to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Instructor,
    Domain,
    Class,
    Topic,
}

impl Category {
    /// All categories, in the order indexes are queried.
    pub const ALL: [Category; 4] = [
        Category::Instructor,
        Category::Domain,
        Category::Class,
        Category::Topic,
    ];

    /// Lowercase tag used in JSON and logs.
    pub fn tag(self) -> &'static str {
        match self {
            Self::Instructor => "instructor",
            Self::Domain => "domain",
            Self::Class => "class",
            Self::Topic => "topic",
        }
    }

    /// Dimension table holding this category's canonical values.
    pub fn table(self) -> &'static str {
        match self {
            Self::Instructor => "instructors",
            Self::Domain => "domains",
            Self::Class => "classes",
            Self::Topic => "topics",
        }
    }

    /// Column the query generator should filter on for this category.
    pub fn filter_column(self) -> &'static str {
        match self {
            Self::Instructor => "instructor_name",
            Self::Domain => "domain_name",
            Self::Class => "class_title",
            Self::Topic => "topic_name",
        }
    }

    /// Position in [`Category::ALL`].
    pub fn index(self) -> usize {
        match self {
            Self::Instructor => 0,
            Self::Domain => 1,
            Self::Class => 2,
            Self::Topic => 3,
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

/// One canonical row loaded from the backing store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    pub category: Category,
    /// The canonical value itself (full name for instructors).
    pub primary: String,
    /// Extra searchable fields, keyed by field name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub aux: BTreeMap<String, String>,
}

impl CanonicalRecord {
    pub fn new(category: Category, primary: impl Into<String>) -> Self {
        Self {
            category,
            primary: primary.into(),
            aux: BTreeMap::new(),
        }
    }

    /// Build an instructor record; the primary value is `"first last"`.
    pub fn instructor(first_name: &str, last_name: &str) -> Self {
        let first_name = first_name.trim();
        let last_name = last_name.trim();
        let full = format!("{} {}", first_name, last_name).trim().to_string();
        let mut aux = BTreeMap::new();
        aux.insert(FIRST_NAME.to_string(), first_name.to_string());
        aux.insert(LAST_NAME.to_string(), last_name.to_string());
        Self {
            category: Category::Instructor,
            primary: full,
            aux,
        }
    }

    /// Look up an aux field.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.aux.get(name).map(String::as_str)
    }
}

/// Backing store that can list a category's canonical values.
///
/// Rows come back in a stable order (insertion order for the SQLite store)
/// so that index construction, and therefore tie-breaking, is deterministic.
pub trait CanonicalSource: Send + Sync {
    fn list_canonical_values(&self, category: Category) -> Result<Vec<CanonicalRecord>>;
}
