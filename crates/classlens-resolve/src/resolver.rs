//! Entity resolver: cross-category matching plus the ambiguity policy.

use std::sync::Arc;

use classlens_core::{ResolutionPolicy, SCORE_EPSILON};

use crate::fuzzy::{normalize, FuzzyIndex};
use crate::types::{MatchCandidate, ResolvedTerm};

/// Resolve `term` against a set of category indexes.
///
/// Indexes are queried in the order given; that order, then each index's own
/// ranking, is the discovery order used to break score ties. A blank term
/// resolves to [`ResolvedTerm::Unresolved`] without touching any index.
pub fn resolve_with(
    indexes: &[Arc<FuzzyIndex>],
    term: &str,
    policy: &ResolutionPolicy,
) -> ResolvedTerm {
    if normalize(term).is_empty() {
        return ResolvedTerm::Unresolved;
    }

    let raw: Vec<MatchCandidate> = indexes
        .iter()
        .flat_map(|index| {
            let category = index.category();
            index
                .search(term)
                .into_iter()
                .map(move |(record, score)| MatchCandidate::new(category, &record.primary, score))
        })
        .collect();

    apply_policy(raw, policy)
}

/// Apply the quality floor, ambiguity window and candidate cap to raw
/// matches listed in discovery order.
///
/// Candidates from different categories are kept side by side; a person's
/// name and an unrelated class title may legitimately tie.
pub fn apply_policy(raw: Vec<MatchCandidate>, policy: &ResolutionPolicy) -> ResolvedTerm {
    let mut kept: Vec<MatchCandidate> = raw
        .into_iter()
        .filter(|c| c.score >= 0.0 && c.score < policy.quality_floor)
        .collect();

    if kept.is_empty() {
        return ResolvedTerm::Unresolved;
    }

    // Stable: equal scores stay in discovery order.
    kept.sort_by(|a, b| a.score.total_cmp(&b.score));

    let best = kept[0].score;
    kept.retain(|c| c.score - best <= policy.ambiguity_margin + SCORE_EPSILON);
    kept.truncate(policy.max_candidates.max(1));

    if kept.len() == 1 {
        ResolvedTerm::SinglyResolved(kept.remove(0))
    } else {
        ResolvedTerm::Ambiguous(kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use classlens_core::{CanonicalRecord, Category};

    use crate::fuzzy::weighted_fields;

    fn candidate(category: Category, value: &str, score: f64) -> MatchCandidate {
        MatchCandidate::new(category, value, score)
    }

    fn policy() -> ResolutionPolicy {
        ResolutionPolicy::default()
    }

    fn index(category: Category, records: Vec<CanonicalRecord>) -> Arc<FuzzyIndex> {
        Arc::new(FuzzyIndex::build(category, records, weighted_fields(category)))
    }

    fn catalog() -> Vec<Arc<FuzzyIndex>> {
        vec![
            index(
                Category::Instructor,
                vec![
                    CanonicalRecord::instructor("Robert", "Smith"),
                    CanonicalRecord::instructor("Robert", "Jones"),
                ],
            ),
            index(
                Category::Domain,
                vec![
                    CanonicalRecord::new(Category::Domain, "Backend"),
                    CanonicalRecord::new(Category::Domain, "Data Science"),
                ],
            ),
            index(
                Category::Class,
                vec![
                    CanonicalRecord::new(Category::Class, "Robert's Seminar"),
                    CanonicalRecord::new(Category::Class, "Rust Fundamentals"),
                ],
            ),
            Arc::new(FuzzyIndex::empty(Category::Topic)),
        ]
    }

    #[test]
    fn test_nothing_below_floor_is_unresolved() {
        let raw = vec![
            candidate(Category::Domain, "Backend", 0.4),
            candidate(Category::Class, "Databases", 0.72),
        ];
        assert_eq!(apply_policy(raw, &policy()), ResolvedTerm::Unresolved);
        assert_eq!(apply_policy(Vec::new(), &policy()), ResolvedTerm::Unresolved);
    }

    #[test]
    fn test_close_instructors_are_ambiguous() {
        let raw = vec![
            candidate(Category::Instructor, "Robert Smith", 0.10),
            candidate(Category::Instructor, "Robert Jones", 0.11),
        ];
        match apply_policy(raw, &policy()) {
            ResolvedTerm::Ambiguous(list) => {
                let values: Vec<&str> = list.iter().map(|c| c.value.as_str()).collect();
                assert_eq!(values, vec!["Robert Smith", "Robert Jones"]);
                assert_eq!(list[0].score, 0.10);
                assert_eq!(list[1].score, 0.11);
            }
            other => panic!("expected ambiguous, got {:?}", other),
        }
    }

    #[test]
    fn test_margin_excludes_distant_category() {
        let raw = vec![
            candidate(Category::Class, "Robert's Seminar", 0.35),
            candidate(Category::Instructor, "Robert Smith", 0.10),
        ];
        assert_eq!(
            apply_policy(raw, &policy()),
            ResolvedTerm::SinglyResolved(candidate(Category::Instructor, "Robert Smith", 0.10))
        );
    }

    #[test]
    fn test_threshold_is_inclusive_and_exclusion_strict() {
        let raw = vec![
            candidate(Category::Topic, "Ownership", 0.10),
            candidate(Category::Topic, "Owners", 0.15),
            candidate(Category::Topic, "Ownerless", 0.16),
        ];
        let resolved = apply_policy(raw, &policy());
        let values: Vec<&str> = resolved.candidates().iter().map(|c| c.value.as_str()).collect();
        assert_eq!(values, vec!["Ownership", "Owners"]);
    }

    #[test]
    fn test_margin_boundary_survives_float_rounding() {
        // 0.12 + 0.05 rounds below 0.17 in f64.
        let raw = vec![
            candidate(Category::Instructor, "Robert Smith", 0.12),
            candidate(Category::Instructor, "Robert Jones", 0.17),
        ];
        match apply_policy(raw, &policy()) {
            ResolvedTerm::Ambiguous(list) => {
                let values: Vec<&str> = list.iter().map(|c| c.value.as_str()).collect();
                assert_eq!(values, vec!["Robert Smith", "Robert Jones"]);
            }
            other => panic!("expected ambiguous, got {:?}", other),
        }

        let wide = ResolutionPolicy {
            quality_floor: 0.5,
            ..policy()
        };
        for (best, edge) in [(0.18, 0.23), (0.29, 0.34), (0.35, 0.40)] {
            let raw = vec![
                candidate(Category::Topic, "Best", best),
                candidate(Category::Topic, "Edge", edge),
            ];
            let kept = apply_policy(raw, &wide);
            assert_eq!(kept.candidates().len(), 2, "{} vs {}", best, edge);
        }
    }

    #[test]
    fn test_ties_keep_discovery_order_across_categories() {
        let raw = vec![
            candidate(Category::Instructor, "Ada Park", 0.02),
            candidate(Category::Class, "Park Studies", 0.02),
            candidate(Category::Domain, "Parks", 0.0),
        ];
        let resolved = apply_policy(raw, &policy());
        let order: Vec<Category> = resolved.candidates().iter().map(|c| c.category).collect();
        assert_eq!(
            order,
            vec![Category::Domain, Category::Instructor, Category::Class]
        );
    }

    #[test]
    fn test_candidates_capped() {
        let raw: Vec<MatchCandidate> = (0..8)
            .map(|i| candidate(Category::Class, &format!("Class {}", i), 0.01 * i as f64 / 2.0))
            .collect();
        match apply_policy(raw, &policy()) {
            ResolvedTerm::Ambiguous(list) => {
                assert_eq!(list.len(), 5);
                assert_eq!(list[0].value, "Class 0");
                assert_eq!(list[4].value, "Class 4");
            }
            other => panic!("expected ambiguous, got {:?}", other),
        }
    }

    #[test]
    fn test_custom_policy() {
        let tight = ResolutionPolicy {
            quality_floor: 0.2,
            ambiguity_margin: 0.0,
            max_candidates: 1,
        };
        let raw = vec![
            candidate(Category::Domain, "Backend", 0.1),
            candidate(Category::Domain, "Backend Ops", 0.1),
            candidate(Category::Domain, "Frontend", 0.25),
        ];
        assert_eq!(
            apply_policy(raw, &tight),
            ResolvedTerm::SinglyResolved(candidate(Category::Domain, "Backend", 0.1))
        );
    }

    #[test]
    fn test_resolve_shared_first_name() {
        let resolved = resolve_with(&catalog(), "Robert", &policy());
        match resolved {
            ResolvedTerm::Ambiguous(list) => {
                let values: Vec<&str> = list.iter().map(|c| c.value.as_str()).collect();
                assert_eq!(values, vec!["Robert Smith", "Robert Jones"]);
                assert!(list.iter().all(|c| c.category == Category::Instructor));
            }
            other => panic!("expected ambiguous, got {:?}", other),
        }
    }

    #[test]
    fn test_resolve_typo_to_single_instructor() {
        let resolved = resolve_with(&catalog(), "Robrt Smith", &policy());
        match resolved {
            ResolvedTerm::SinglyResolved(m) => {
                assert_eq!(m.category, Category::Instructor);
                assert_eq!(m.value, "Robert Smith");
                assert!(m.score < 0.4);
            }
            other => panic!("expected single match, got {:?}", other),
        }
    }

    #[test]
    fn test_resolve_exact_domain() {
        let resolved = resolve_with(&catalog(), "backend", &policy());
        assert_eq!(
            resolved,
            ResolvedTerm::SinglyResolved(candidate(Category::Domain, "Backend", 0.0))
        );
    }

    #[test]
    fn test_resolve_gibberish_is_unresolved() {
        assert_eq!(
            resolve_with(&catalog(), "Zzyzxq", &policy()),
            ResolvedTerm::Unresolved
        );
    }

    #[test]
    fn test_blank_term_is_unresolved() {
        assert_eq!(resolve_with(&catalog(), "", &policy()), ResolvedTerm::Unresolved);
        assert_eq!(resolve_with(&catalog(), " \t", &policy()), ResolvedTerm::Unresolved);
    }

    #[test]
    fn test_resolve_is_deterministic() {
        let indexes = catalog();
        for term in ["Robert", "rust", "data", "Smith"] {
            let first = resolve_with(&indexes, term, &policy());
            let second = resolve_with(&indexes, term, &policy());
            assert_eq!(first, second);
        }
    }

    #[test]
    fn test_resolved_candidates_respect_invariants() {
        let indexes = catalog();
        let p = policy();
        for term in ["Robert", "Rob", "Jones", "science", "fundamentals", "seminar", "xq"] {
            let candidates = resolve_with(&indexes, term, &p).candidates().to_vec();
            assert!(candidates.len() <= p.max_candidates);
            if let Some(best) = candidates.first() {
                let within = |c: &MatchCandidate| {
                    c.score < p.quality_floor
                        && c.score - best.score <= p.ambiguity_margin + SCORE_EPSILON
                };
                assert!(candidates.iter().all(within));
            }
        }
    }
}
