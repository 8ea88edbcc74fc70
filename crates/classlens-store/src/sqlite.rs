//! SQLite-backed catalog store.
//!
//! Holds the star schema (instructors, domains, classes, topics around a
//! `sessions` fact table) and serves canonical value snapshots to the
//! resolution layer through [`CanonicalSource`].

use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use rusqlite::types::ValueRef;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info, warn};

use crate::schema::{value_column, SCHEMA_SQL};
use crate::types::*;
use classlens_core::{CanonicalRecord, CanonicalSource, Category, Error, Result};

/// SQLite store for the course analytics dataset.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

fn db_err(e: rusqlite::Error) -> Error {
    Error::Database(e.to_string())
}

impl SqliteStore {
    /// Open or create the SQLite store.
    ///
    /// `db_dir` is the directory (e.g., `data/db/`). The file will be `db_dir/classlens.db`.
    pub fn open(db_dir: impl AsRef<Path>) -> Result<Self> {
        let db_dir = db_dir.as_ref();
        std::fs::create_dir_all(db_dir).map_err(|e| Error::Storage(e.to_string()))?;
        let db_path = db_dir.join("classlens.db");

        let conn = Self::create_connection(&db_path)?;
        conn.execute_batch(SCHEMA_SQL)
            .map_err(|e| Error::Database(format!("Schema init failed: {}", e)))?;

        let store = Self {
            conn: Mutex::new(conn),
            db_path,
        };

        info!(
            "SqliteStore initialized: {} instructors, {} domains, {} classes, {} topics, path={}",
            store.count(Category::Instructor)?,
            store.count(Category::Domain)?,
            store.count(Category::Class)?,
            store.count(Category::Topic)?,
            store.db_path.display()
        );

        Ok(store)
    }

    fn create_connection(db_path: &Path) -> Result<Connection> {
        let conn = Connection::open(db_path).map_err(db_err)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA foreign_keys = ON;
             PRAGMA synchronous = NORMAL;",
        )
        .map_err(db_err)?;
        Ok(conn)
    }

    // ---------------------------------------------------------------
    // Dimension writes
    // ---------------------------------------------------------------

    /// Insert an instructor. Returns false if the full name already exists.
    pub fn add_instructor(&self, first_name: &str, last_name: &str) -> Result<bool> {
        let conn = self.conn.lock();
        insert_instructor(&conn, first_name, last_name)
    }

    /// Insert a canonical value into a category's dimension table.
    ///
    /// Instructor values are split into given and family name at the last
    /// whitespace. Returns false if the value already exists.
    pub fn add_value(&self, category: Category, value: &str) -> Result<bool> {
        let value = value.trim();
        if value.is_empty() {
            return Err(Error::InvalidInput(format!(
                "empty {} value",
                category.tag()
            )));
        }

        let conn = self.conn.lock();
        match category {
            Category::Instructor => {
                let (first, last) = value
                    .rsplit_once(char::is_whitespace)
                    .unwrap_or((value, ""));
                insert_instructor(&conn, first, last)
            }
            Category::Domain | Category::Class | Category::Topic => {
                insert_named(&conn, category, value, None)
            }
        }
    }

    /// Load a seed file's rows in one transaction. Existing values are kept.
    pub fn import_seed(&self, seed: &SeedData) -> Result<ImportReport> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction().map_err(db_err)?;
        let mut report = ImportReport::default();

        for instructor in &seed.instructors {
            if insert_instructor(&tx, &instructor.first_name, &instructor.last_name)? {
                report.instructors += 1;
            }
        }
        for domain in &seed.domains {
            if insert_named(&tx, Category::Domain, domain, None)? {
                report.domains += 1;
            }
        }
        for class in &seed.classes {
            let domain_id = match &class.domain {
                Some(domain) => lookup_id(&tx, Category::Domain, domain)?,
                None => None,
            };
            if insert_named(&tx, Category::Class, &class.title, domain_id)? {
                report.classes += 1;
            }
        }
        for topic in &seed.topics {
            let class_id = match &topic.class {
                Some(class) => lookup_id(&tx, Category::Class, class)?,
                None => None,
            };
            if insert_named(&tx, Category::Topic, &topic.name, class_id)? {
                report.topics += 1;
            }
        }
        for session in &seed.sessions {
            let Some(class_id) = lookup_id(&tx, Category::Class, &session.class)? else {
                warn!("Skipping session for unknown class {:?}", session.class);
                report.skipped_sessions += 1;
                continue;
            };
            let instructor_id = match &session.instructor {
                Some(name) => lookup_id(&tx, Category::Instructor, name)?,
                None => None,
            };
            let topic_id = match &session.topic {
                Some(name) => lookup_id(&tx, Category::Topic, name)?,
                None => None,
            };
            tx.execute(
                "INSERT INTO sessions (class_id, instructor_id, topic_id, held_on, attendees, rating) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    class_id,
                    instructor_id,
                    topic_id,
                    session.held_on,
                    session.attendees,
                    session.rating,
                ],
            )
            .map_err(db_err)?;
            report.sessions += 1;
        }

        tx.commit().map_err(db_err)?;
        info!(
            "Seed import: +{} instructors, +{} domains, +{} classes, +{} topics, +{} sessions ({} skipped)",
            report.instructors,
            report.domains,
            report.classes,
            report.topics,
            report.sessions,
            report.skipped_sessions
        );
        Ok(report)
    }

    /// Read and import a JSON seed file.
    pub fn import_seed_file(&self, path: impl AsRef<Path>) -> Result<ImportReport> {
        let data = std::fs::read_to_string(path.as_ref())?;
        let seed: SeedData = serde_json::from_str(&data)?;
        self.import_seed(&seed)
    }

    // ---------------------------------------------------------------
    // Reads
    // ---------------------------------------------------------------

    /// Count rows in a category's dimension table.
    pub fn count(&self, category: Category) -> Result<i64> {
        let conn = self.conn.lock();
        let sql = format!("SELECT COUNT(*) FROM {}", category.table());
        conn.query_row(&sql, [], |row| row.get(0)).map_err(db_err)
    }

    /// Count fact rows.
    pub fn count_sessions(&self) -> Result<i64> {
        let conn = self.conn.lock();
        conn.query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0))
            .map_err(db_err)
    }

    /// Get store statistics.
    pub fn get_stats(&self) -> Result<StoreStats> {
        let db_size = std::fs::metadata(&self.db_path)
            .map(|m| m.len())
            .unwrap_or(0);

        Ok(StoreStats {
            instructors: self.count(Category::Instructor)?,
            domains: self.count(Category::Domain)?,
            classes: self.count(Category::Class)?,
            topics: self.count(Category::Topic)?,
            sessions: self.count_sessions()?,
            db_path: self.db_path.to_string_lossy().to_string(),
            db_size_mb: db_size as f64 / (1024.0 * 1024.0),
        })
    }

    /// Run a generated read-only query against the store, returning at most
    /// `max_rows` rows.
    ///
    /// Only a single `SELECT`/`WITH` statement that SQLite reports as
    /// read-only is accepted.
    pub fn run_read_query(&self, sql: &str, max_rows: usize) -> Result<QueryRows> {
        let sql = sql.trim().trim_end_matches(';').trim();
        let head = sql
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .to_ascii_uppercase();
        if head != "SELECT" && head != "WITH" {
            return Err(Error::InvalidInput(
                "only SELECT queries can be executed".into(),
            ));
        }
        if sql.contains(';') {
            return Err(Error::InvalidInput(
                "multiple statements are not allowed".into(),
            ));
        }

        let conn = self.conn.lock();
        let mut stmt = conn.prepare(sql).map_err(db_err)?;
        if !stmt.readonly() {
            return Err(Error::InvalidInput("query would modify the store".into()));
        }

        let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
        let width = columns.len();
        let mut rows = stmt.query([]).map_err(db_err)?;
        let mut out = QueryRows {
            columns,
            rows: Vec::new(),
            truncated: false,
        };

        while let Some(row) = rows.next().map_err(db_err)? {
            if out.rows.len() >= max_rows {
                out.truncated = true;
                break;
            }
            let mut values = Vec::with_capacity(width);
            for i in 0..width {
                values.push(json_value(row.get_ref(i).map_err(db_err)?));
            }
            out.rows.push(values);
        }

        debug!("Query returned {} rows (truncated={})", out.rows.len(), out.truncated);
        Ok(out)
    }
}

fn json_value(value: ValueRef<'_>) -> serde_json::Value {
    match value {
        ValueRef::Null => serde_json::Value::Null,
        ValueRef::Integer(i) => serde_json::Value::from(i),
        ValueRef::Real(f) => serde_json::Value::from(f),
        ValueRef::Text(t) => serde_json::Value::from(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => serde_json::Value::from(format!("<{} bytes>", b.len())),
    }
}

impl CanonicalSource for SqliteStore {
    fn list_canonical_values(&self, category: Category) -> Result<Vec<CanonicalRecord>> {
        let conn = self.conn.lock();
        let records = match category {
            Category::Instructor => {
                let mut stmt = conn
                    .prepare_cached(
                        "SELECT first_name, last_name, full_name FROM instructors ORDER BY id",
                    )
                    .map_err(db_err)?;
                let rows = stmt
                    .query_map([], |row| {
                        let first: String = row.get(0)?;
                        let last: String = row.get(1)?;
                        let full: String = row.get(2)?;
                        let mut record = CanonicalRecord::instructor(&first, &last);
                        record.primary = full;
                        Ok(record)
                    })
                    .map_err(db_err)?;
                rows.collect::<rusqlite::Result<Vec<_>>>().map_err(db_err)?
            }
            Category::Domain | Category::Class | Category::Topic => {
                let sql = format!(
                    "SELECT {} FROM {} ORDER BY id",
                    value_column(category),
                    category.table()
                );
                let mut stmt = conn.prepare_cached(&sql).map_err(db_err)?;
                let rows = stmt
                    .query_map([], |row| {
                        let value: String = row.get(0)?;
                        Ok(CanonicalRecord::new(category, value))
                    })
                    .map_err(db_err)?;
                rows.collect::<rusqlite::Result<Vec<_>>>().map_err(db_err)?
            }
        };
        debug!("Listed {} {} values", records.len(), category);
        Ok(records)
    }
}

// ---------------------------------------------------------------
// Row helpers (shared by single inserts and the import transaction)
// ---------------------------------------------------------------

fn insert_instructor(conn: &Connection, first_name: &str, last_name: &str) -> Result<bool> {
    let record = CanonicalRecord::instructor(first_name, last_name);
    if record.primary.is_empty() {
        return Err(Error::InvalidInput("empty instructor name".into()));
    }
    let inserted = conn
        .prepare_cached(
            "INSERT OR IGNORE INTO instructors (first_name, last_name, full_name) VALUES (?1, ?2, ?3)",
        )
        .map_err(db_err)?
        .execute(params![first_name.trim(), last_name.trim(), record.primary])
        .map_err(db_err)?;
    Ok(inserted > 0)
}

fn insert_named(
    conn: &Connection,
    category: Category,
    value: &str,
    parent_id: Option<i64>,
) -> Result<bool> {
    let value = value.trim();
    if value.is_empty() {
        return Err(Error::InvalidInput(format!("empty {} value", category.tag())));
    }
    let sql = match category {
        Category::Class => "INSERT OR IGNORE INTO classes (title, domain_id) VALUES (?1, ?2)",
        Category::Topic => "INSERT OR IGNORE INTO topics (name, class_id) VALUES (?1, ?2)",
        Category::Domain => "INSERT OR IGNORE INTO domains (name) VALUES (?1)",
        Category::Instructor => {
            return Err(Error::Internal(
                "instructors are inserted with first and last name".into(),
            ))
        }
    };
    let inserted = match category {
        Category::Domain => conn.execute(sql, params![value]),
        _ => conn.execute(sql, params![value, parent_id]),
    }
    .map_err(db_err)?;
    Ok(inserted > 0)
}

fn lookup_id(conn: &Connection, category: Category, value: &str) -> Result<Option<i64>> {
    let sql = format!(
        "SELECT id FROM {} WHERE {} = ?1",
        category.table(),
        value_column(category)
    );
    conn.query_row(&sql, params![value.trim()], |row| row.get(0))
        .optional()
        .map_err(db_err)
}
