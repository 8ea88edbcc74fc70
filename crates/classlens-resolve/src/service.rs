//! Resolution service: owns the published per-category indexes.
//!
//! Each category has one slot holding an `Arc<FuzzyIndex>`. Readers clone the
//! `Arc` under a short read lock and search without holding it. A refresh
//! builds each replacement index off to the side and swaps the pointer in, so
//! a reader sees either the old snapshot or the new one, never a partial
//! build. Categories are published one at a time; a request that lands
//! mid-refresh may see a mix of old and new categories.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tracing::{debug, info, warn};

use classlens_core::{CanonicalSource, Category, ResolutionPolicy};

use crate::fuzzy::{weighted_fields, FuzzyIndex};
use crate::resolver::resolve_with;
use crate::types::ResolvedTerm;

/// Load outcome for one category during a refresh.
#[derive(Debug, Clone, Serialize)]
pub struct CategoryLoad {
    pub category: Category,
    /// Records indexed, or `None` if the load failed.
    pub loaded: Option<usize>,
    /// Size of the index left in place after a failed load.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retained: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Summary of one warm-up or refresh cycle.
#[derive(Debug, Clone, Serialize)]
pub struct RefreshReport {
    pub generation: u64,
    pub categories: Vec<CategoryLoad>,
    pub duration_ms: u64,
    pub completed_at: String,
}

impl RefreshReport {
    pub fn failed(&self) -> impl Iterator<Item = Category> + '_ {
        self.categories
            .iter()
            .filter(|c| c.error.is_some())
            .map(|c| c.category)
    }
}

/// Shared entity resolution state, built at warm-up and handed to request
/// handlers by reference.
pub struct ResolutionService {
    slots: [RwLock<Arc<FuzzyIndex>>; 4],
    policy: ResolutionPolicy,
    generation: AtomicU64,
    refresh_lock: Mutex<()>,
    last_report: RwLock<Option<RefreshReport>>,
}

impl ResolutionService {
    /// Create a service with every category index empty.
    pub fn new(policy: ResolutionPolicy) -> Self {
        Self {
            slots: Category::ALL.map(|c| RwLock::new(Arc::new(FuzzyIndex::empty(c)))),
            policy,
            generation: AtomicU64::new(0),
            refresh_lock: Mutex::new(()),
            last_report: RwLock::new(None),
        }
    }

    pub fn policy(&self) -> &ResolutionPolicy {
        &self.policy
    }

    /// Number of completed refresh cycles.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    pub fn last_report(&self) -> Option<RefreshReport> {
        self.last_report.read().clone()
    }

    /// Publish a fully built index for its category.
    pub fn publish(&self, index: FuzzyIndex) {
        let slot = &self.slots[index.category().index()];
        *slot.write() = Arc::new(index);
    }

    /// Current index for one category.
    pub fn index(&self, category: Category) -> Arc<FuzzyIndex> {
        self.slots[category.index()].read().clone()
    }

    /// Current indexes in category order.
    pub fn snapshot(&self) -> Vec<Arc<FuzzyIndex>> {
        self.slots.iter().map(|slot| slot.read().clone()).collect()
    }

    /// Records indexed per category.
    pub fn index_sizes(&self) -> BTreeMap<Category, usize> {
        Category::ALL
            .iter()
            .map(|&c| (c, self.index(c).len()))
            .collect()
    }

    /// Initial load at process start.
    pub fn warm_up(&self, source: &dyn CanonicalSource) -> RefreshReport {
        info!("Warming up entity indexes");
        self.refresh(source)
    }

    /// Rebuild every category index from `source`, one category at a time.
    ///
    /// A category whose load fails keeps its current index (empty on first
    /// warm-up); the failure is logged and reported, never raised.
    pub fn refresh(&self, source: &dyn CanonicalSource) -> RefreshReport {
        let _guard = self.refresh_lock.lock();
        let started = Instant::now();
        let mut categories = Vec::with_capacity(Category::ALL.len());

        for category in Category::ALL {
            match source.list_canonical_values(category) {
                Ok(records) => {
                    let index = FuzzyIndex::build(category, records, weighted_fields(category));
                    let loaded = index.len();
                    self.publish(index);
                    info!("Loaded {} {} values into fuzzy index", loaded, category);
                    categories.push(CategoryLoad {
                        category,
                        loaded: Some(loaded),
                        retained: None,
                        error: None,
                    });
                }
                Err(e) => {
                    let retained = self.index(category).len();
                    warn!(
                        "Failed to load {} values: {}; keeping {} indexed records",
                        category, e, retained
                    );
                    categories.push(CategoryLoad {
                        category,
                        loaded: None,
                        retained: Some(retained),
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        let report = RefreshReport {
            generation,
            categories,
            duration_ms: started.elapsed().as_millis() as u64,
            completed_at: chrono::Utc::now().to_rfc3339(),
        };
        *self.last_report.write() = Some(report.clone());
        report
    }

    /// Resolve one free-text term against the current indexes.
    pub fn resolve(&self, term: &str) -> ResolvedTerm {
        let outcome = resolve_with(&self.snapshot(), term, &self.policy);
        debug!(
            "Resolved {:?} -> {} ({} candidates)",
            term,
            outcome.status(),
            outcome.candidates().len()
        );
        outcome
    }

    /// Resolve each term, keeping input order.
    pub fn resolve_all<S: AsRef<str>>(&self, terms: &[S]) -> Vec<(String, ResolvedTerm)> {
        terms
            .iter()
            .map(|t| (t.as_ref().to_string(), self.resolve(t.as_ref())))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use classlens_core::{CanonicalRecord, Error, Result};
    use classlens_store::SqliteStore;
    use std::collections::HashSet;
    use std::sync::atomic::AtomicBool;

    /// In-memory source whose categories can be switched to failing.
    struct StubSource {
        records: Mutex<BTreeMap<Category, Vec<CanonicalRecord>>>,
        failing: Mutex<HashSet<Category>>,
        calls: AtomicU64,
    }

    impl StubSource {
        fn new() -> Self {
            Self {
                records: Mutex::new(BTreeMap::new()),
                failing: Mutex::new(HashSet::new()),
                calls: AtomicU64::new(0),
            }
        }

        fn set(&self, category: Category, records: Vec<CanonicalRecord>) {
            self.records.lock().insert(category, records);
        }

        fn fail(&self, category: Category, failing: bool) {
            let mut set = self.failing.lock();
            if failing {
                set.insert(category);
            } else {
                set.remove(&category);
            }
        }
    }

    impl CanonicalSource for StubSource {
        fn list_canonical_values(&self, category: Category) -> Result<Vec<CanonicalRecord>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.failing.lock().contains(&category) {
                return Err(Error::Database("connection refused".into()));
            }
            Ok(self
                .records
                .lock()
                .get(&category)
                .cloned()
                .unwrap_or_default())
        }
    }

    fn seeded_source() -> StubSource {
        let source = StubSource::new();
        source.set(
            Category::Instructor,
            vec![
                CanonicalRecord::instructor("Robert", "Smith"),
                CanonicalRecord::instructor("Robert", "Jones"),
            ],
        );
        source.set(
            Category::Domain,
            vec![CanonicalRecord::new(Category::Domain, "Backend")],
        );
        source.set(
            Category::Class,
            vec![CanonicalRecord::new(Category::Class, "Robert's Seminar")],
        );
        source
    }

    #[test]
    fn test_unloaded_service_resolves_nothing() {
        let service = ResolutionService::new(ResolutionPolicy::default());
        assert_eq!(service.resolve("Robert"), ResolvedTerm::Unresolved);
        assert_eq!(service.generation(), 0);
        assert!(service.last_report().is_none());
    }

    #[test]
    fn test_warm_up_loads_every_category_once() {
        let source = seeded_source();
        let service = ResolutionService::new(ResolutionPolicy::default());
        let report = service.warm_up(&source);

        assert_eq!(source.calls.load(Ordering::SeqCst), 4);
        assert_eq!(report.generation, 1);
        assert_eq!(report.failed().count(), 0);
        let sizes = service.index_sizes();
        assert_eq!(sizes[&Category::Instructor], 2);
        assert_eq!(sizes[&Category::Domain], 1);
        assert_eq!(sizes[&Category::Topic], 0);

        assert!(matches!(
            service.resolve("Robert"),
            ResolvedTerm::Ambiguous(ref l) if l.len() == 2
        ));
    }

    #[test]
    fn test_failed_category_is_empty_and_isolated() {
        let source = seeded_source();
        source.fail(Category::Instructor, true);
        let service = ResolutionService::new(ResolutionPolicy::default());
        let report = service.warm_up(&source);

        assert_eq!(report.failed().collect::<Vec<_>>(), vec![Category::Instructor]);
        assert_eq!(service.index(Category::Instructor).len(), 0);
        assert_eq!(
            service.resolve("Backend").candidates()[0].value,
            "Backend".to_string()
        );
        // Only the class remains for "Robert".
        match service.resolve("Robert") {
            ResolvedTerm::SinglyResolved(m) => assert_eq!(m.category, Category::Class),
            other => panic!("expected class match, got {:?}", other),
        }
    }

    #[test]
    fn test_failed_refresh_keeps_previous_index() {
        let source = seeded_source();
        let service = ResolutionService::new(ResolutionPolicy::default());
        service.warm_up(&source);

        source.fail(Category::Domain, true);
        let report = service.refresh(&source);
        let domain = report
            .categories
            .iter()
            .find(|c| c.category == Category::Domain)
            .unwrap();
        assert_eq!(domain.loaded, None);
        assert_eq!(domain.retained, Some(1));
        assert_eq!(service.index(Category::Domain).len(), 1);
        assert_eq!(report.generation, 2);
    }

    #[test]
    fn test_refresh_publishes_new_values() {
        let source = seeded_source();
        let service = ResolutionService::new(ResolutionPolicy::default());
        service.warm_up(&source);
        assert!(service
            .resolve("Ownership")
            .candidates()
            .iter()
            .all(|c| c.category != Category::Topic));

        let before = service.index(Category::Topic);
        source.set(
            Category::Topic,
            vec![CanonicalRecord::new(Category::Topic, "Ownership")],
        );
        service.refresh(&source);

        // A reader holding the old snapshot still sees it intact.
        assert!(before.is_empty());
        assert_eq!(
            service.resolve("ownership").candidates()[0].category,
            Category::Topic
        );
    }

    #[test]
    fn test_concurrent_reads_during_refresh() {
        let source = seeded_source();
        let service = ResolutionService::new(ResolutionPolicy::default());
        service.warm_up(&source);
        let done = AtomicBool::new(false);

        std::thread::scope(|scope| {
            let reader = scope.spawn(|| {
                let mut reads = 0;
                while !done.load(Ordering::Acquire) || reads == 0 {
                    let outcome = service.resolve("Robert Smith");
                    assert!(matches!(
                        outcome,
                        ResolvedTerm::SinglyResolved(ref m) if m.value == "Robert Smith"
                    ));
                    reads += 1;
                }
                reads
            });
            for _ in 0..20 {
                service.refresh(&source);
            }
            done.store(true, Ordering::Release);
            assert!(reader.join().unwrap() > 0);
        });
        assert_eq!(service.generation(), 21);
    }

    #[test]
    fn test_resolve_all_preserves_order() {
        let source = seeded_source();
        let service = ResolutionService::new(ResolutionPolicy::default());
        service.warm_up(&source);
        let results = service.resolve_all(&["xyz", "Backend", "Robert"]);
        let statuses: Vec<(&str, &str)> = results
            .iter()
            .map(|(t, r)| (t.as_str(), r.status()))
            .collect();
        assert_eq!(
            statuses,
            vec![("xyz", "unresolved"), ("Backend", "resolved"), ("Robert", "ambiguous")]
        );
    }

    #[test]
    fn test_warm_up_from_sqlite_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::open(dir.path()).unwrap();
        store.add_instructor("Konstantinos", "Pappas").unwrap();
        store.add_value(Category::Domain, "Backend").unwrap();

        let service = ResolutionService::new(ResolutionPolicy::default());
        service.warm_up(&store);
        assert_eq!(
            service.resolve("Pappas"),
            ResolvedTerm::SinglyResolved(crate::types::MatchCandidate::new(
                Category::Instructor,
                "Konstantinos Pappas",
                0.0
            ))
        );
    }
}
