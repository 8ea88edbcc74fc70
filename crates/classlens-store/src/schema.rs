//! Database schema SQL: dimension tables around a `sessions` fact table.

use classlens_core::Category;

/// Dimension tables hold the canonical values; `sessions` is the fact table.
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS instructors (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    first_name TEXT NOT NULL,
    last_name TEXT NOT NULL,
    full_name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS domains (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS classes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL UNIQUE,
    domain_id INTEGER REFERENCES domains(id)
);

CREATE TABLE IF NOT EXISTS topics (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    class_id INTEGER REFERENCES classes(id)
);

CREATE TABLE IF NOT EXISTS sessions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    class_id INTEGER NOT NULL REFERENCES classes(id),
    instructor_id INTEGER REFERENCES instructors(id),
    topic_id INTEGER REFERENCES topics(id),
    held_on TEXT,
    attendees INTEGER,
    rating REAL
);

CREATE INDEX IF NOT EXISTS idx_sessions_class ON sessions(class_id);
CREATE INDEX IF NOT EXISTS idx_sessions_instructor ON sessions(instructor_id);
CREATE INDEX IF NOT EXISTS idx_sessions_topic ON sessions(topic_id);

CREATE VIEW IF NOT EXISTS session_facts AS
SELECT
    s.id AS session_id,
    i.full_name AS instructor_name,
    d.name AS domain_name,
    c.title AS class_title,
    t.name AS topic_name,
    s.held_on,
    s.attendees,
    s.rating
FROM sessions s
JOIN classes c ON c.id = s.class_id
LEFT JOIN domains d ON d.id = c.domain_id
LEFT JOIN instructors i ON i.id = s.instructor_id
LEFT JOIN topics t ON t.id = s.topic_id;
"#;

/// Description of the queryable surface handed to the query generator.
/// Filter directives name the `session_facts` columns.
pub const QUERY_SCHEMA: &str = "\
SQLite database. Query the view session_facts, one row per teaching session:
  session_id INTEGER
  instructor_name TEXT   -- full name, e.g. 'Robert Smith'
  domain_name TEXT       -- subject area, e.g. 'Data Science'
  class_title TEXT       -- class the session belongs to
  topic_name TEXT        -- topic covered, may be NULL
  held_on TEXT           -- ISO date, YYYY-MM-DD
  attendees INTEGER
  rating REAL            -- average session rating, 1.0 to 5.0";

/// Column holding a category's canonical value.
pub fn value_column(category: Category) -> &'static str {
    match category {
        Category::Instructor => "full_name",
        Category::Domain | Category::Topic => "name",
        Category::Class => "title",
    }
}
