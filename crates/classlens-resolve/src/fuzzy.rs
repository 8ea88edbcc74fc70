//! Per-category fuzzy index over canonical values.
//!
//! Scores are distances: 0 for an exact field hit, approaching 1 for
//! unrelated strings. A field's distance is the smaller of the Jaro-Winkler
//! distance and a substring-containment distance, scaled up for fields that
//! carry less weight than the category's heaviest field.

use classlens_core::catalog::{FIRST_NAME, LAST_NAME};
use classlens_core::{CanonicalRecord, Category};

/// Multiplier on the uncovered fraction of a field that contains the term.
pub const SUBSTRING_PENALTY: f64 = 0.3;

/// Searchable field of a canonical record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldKey {
    /// The canonical value itself.
    Primary,
    /// A named aux field.
    Aux(&'static str),
}

/// A field and its relative weight within a category.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightedField {
    pub key: FieldKey,
    pub weight: f64,
}

impl WeightedField {
    pub const fn new(key: FieldKey, weight: f64) -> Self {
        Self { key, weight }
    }
}

const INSTRUCTOR_FIELDS: [WeightedField; 3] = [
    WeightedField::new(FieldKey::Aux(FIRST_NAME), 2.0),
    WeightedField::new(FieldKey::Aux(LAST_NAME), 2.0),
    WeightedField::new(FieldKey::Primary, 1.0),
];

const PRIMARY_ONLY: [WeightedField; 1] = [WeightedField::new(FieldKey::Primary, 1.0)];

/// Fields searched for a category. Only instructors weight given and family
/// name above the full name.
pub fn weighted_fields(category: Category) -> &'static [WeightedField] {
    match category {
        Category::Instructor => &INSTRUCTOR_FIELDS,
        Category::Domain | Category::Class | Category::Topic => &PRIMARY_ONLY,
    }
}

/// Lowercase, drop apostrophes, turn other punctuation into spaces, and
/// collapse whitespace.
pub fn normalize(text: &str) -> String {
    let mut cleaned = String::with_capacity(text.len());
    for c in text.chars() {
        if c == '\'' || c == '\u{2019}' {
            continue;
        }
        if c.is_alphanumeric() {
            cleaned.extend(c.to_lowercase());
        } else {
            cleaned.push(' ');
        }
    }
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn field_distance(term: &str, field: &str) -> f64 {
    if term == field {
        return 0.0;
    }
    let mut distance = 1.0 - strsim::jaro_winkler(term, field);
    if field.contains(term) {
        let coverage = term.chars().count() as f64 / field.chars().count() as f64;
        distance = distance.min((1.0 - coverage) * SUBSTRING_PENALTY);
    }
    distance.clamp(0.0, 1.0)
}

#[derive(Debug)]
struct IndexEntry {
    record: CanonicalRecord,
    /// (normalized field text, distance multiplier)
    fields: Vec<(String, f64)>,
}

/// Immutable fuzzy index for one category.
#[derive(Debug)]
pub struct FuzzyIndex {
    category: Category,
    entries: Vec<IndexEntry>,
}

impl FuzzyIndex {
    /// An index with no values; every search returns nothing.
    pub fn empty(category: Category) -> Self {
        Self {
            category,
            entries: Vec::new(),
        }
    }

    /// Build an index from a snapshot of records.
    ///
    /// Records from another category and fields that normalize to nothing are
    /// skipped. Insertion order is kept so equal scores come back in the
    /// order the store listed them.
    pub fn build(
        category: Category,
        records: Vec<CanonicalRecord>,
        fields: &[WeightedField],
    ) -> Self {
        let max_weight = fields
            .iter()
            .map(|f| f.weight)
            .fold(0.0_f64, f64::max);

        let entries = records
            .into_iter()
            .filter(|record| record.category == category)
            .filter_map(|record| {
                let indexed: Vec<(String, f64)> = fields
                    .iter()
                    .filter(|f| f.weight > 0.0)
                    .filter_map(|f| {
                        let raw = match f.key {
                            FieldKey::Primary => Some(record.primary.as_str()),
                            FieldKey::Aux(name) => record.field(name),
                        }?;
                        let text = normalize(raw);
                        (!text.is_empty()).then(|| (text, max_weight / f.weight))
                    })
                    .collect();
                (!indexed.is_empty()).then_some(IndexEntry {
                    record,
                    fields: indexed,
                })
            })
            .collect();

        Self { category, entries }
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Ranked matches for `term`, best (lowest score) first.
    ///
    /// Records with no similarity at all (score 1.0) are omitted.
    pub fn search(&self, term: &str) -> Vec<(&CanonicalRecord, f64)> {
        let term = normalize(term);
        if term.is_empty() {
            return Vec::new();
        }

        let mut matches: Vec<(&CanonicalRecord, f64)> = self
            .entries
            .iter()
            .map(|entry| {
                let score = entry
                    .fields
                    .iter()
                    .map(|(text, multiplier)| (field_distance(&term, text) * multiplier).min(1.0))
                    .fold(1.0_f64, f64::min);
                (&entry.record, score)
            })
            .filter(|(_, score)| *score < 1.0)
            .collect();

        matches.sort_by(|a, b| a.1.total_cmp(&b.1));
        matches
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instructors(names: &[(&str, &str)]) -> FuzzyIndex {
        let records = names
            .iter()
            .map(|(first, last)| CanonicalRecord::instructor(first, last))
            .collect();
        FuzzyIndex::build(
            Category::Instructor,
            records,
            weighted_fields(Category::Instructor),
        )
    }

    fn values(category: Category, values: &[&str]) -> FuzzyIndex {
        let records = values
            .iter()
            .map(|v| CanonicalRecord::new(category, *v))
            .collect();
        FuzzyIndex::build(category, records, weighted_fields(category))
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("  Robert's   Seminar "), "roberts seminar");
        assert_eq!(normalize("Full-Stack/Web"), "full stack web");
        assert_eq!(normalize("?!"), "");
    }

    #[test]
    fn test_exact_match_scores_zero() {
        let index = values(Category::Domain, &["Backend", "Data Science"]);
        let results = index.search("backend");
        assert_eq!(results[0].0.primary, "Backend");
        assert_eq!(results[0].1, 0.0);
    }

    #[test]
    fn test_first_name_hit_is_exact() {
        let index = instructors(&[("Robert", "Smith"), ("Robert", "Jones")]);
        let results = index.search("Robert");
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0.primary, "Robert Smith");
        assert_eq!(results[0].1, 0.0);
        assert_eq!(results[1].0.primary, "Robert Jones");
        assert_eq!(results[1].1, 0.0);
    }

    #[test]
    fn test_last_name_hit_is_exact() {
        let index = instructors(&[("Konstantinos", "Pappas"), ("Maria", "Lopez")]);
        let results = index.search("pappas");
        assert_eq!(results[0].0.primary, "Konstantinos Pappas");
        assert_eq!(results[0].1, 0.0);
        assert!(results.iter().skip(1).all(|(_, score)| *score > 0.0));
    }

    #[test]
    fn test_full_name_field_weighs_less() {
        // Same string distance, but the full-name field is penalised.
        let weighted = instructors(&[("Ann", "Lee")]);
        let flat = FuzzyIndex::build(
            Category::Instructor,
            vec![CanonicalRecord::instructor("Ann", "Lee")],
            &[WeightedField::new(FieldKey::Primary, 1.0)],
        );
        let weighted_score = weighted.search("ann leee")[0].1;
        let flat_score = flat.search("ann leee")[0].1;
        assert!(weighted_score > flat_score);
    }

    #[test]
    fn test_substring_distance() {
        let index = values(Category::Class, &["Introduction to Rust"]);
        let results = index.search("rust");
        assert_eq!(results.len(), 1);
        let expected = (1.0 - 4.0 / 20.0) * SUBSTRING_PENALTY;
        assert!(results[0].1 <= expected + 1e-9);
    }

    #[test]
    fn test_unrelated_term_has_no_matches() {
        let index = values(Category::Domain, &["Backend", "Robotics"]);
        assert!(index.search("Zzyzxq").is_empty());
    }

    #[test]
    fn test_results_sorted_ascending() {
        let index = values(Category::Topic, &["Ownership", "Borrowing", "Owners"]);
        let results = index.search("owner");
        assert!(!results.is_empty());
        assert!(results.windows(2).all(|w| w[0].1 <= w[1].1));
    }

    #[test]
    fn test_empty_index_and_blank_term() {
        let empty = FuzzyIndex::empty(Category::Topic);
        assert!(empty.is_empty());
        assert!(empty.search("anything").is_empty());

        let index = values(Category::Topic, &["Ownership"]);
        assert!(index.search("   ").is_empty());
    }

    #[test]
    fn test_build_skips_foreign_and_blank_records() {
        let records = vec![
            CanonicalRecord::new(Category::Domain, "Backend"),
            CanonicalRecord::new(Category::Class, "Backend 101"),
            CanonicalRecord::new(Category::Domain, "---"),
        ];
        let index = FuzzyIndex::build(Category::Domain, records, weighted_fields(Category::Domain));
        assert_eq!(index.len(), 1);
    }
}
