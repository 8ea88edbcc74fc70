//! Context builder: turns resolution outcomes into filter directives.
//!
//! Directives are plain descriptive sentences for the query-generation
//! prompt. They name the filter column and the values to match but carry no
//! SQL syntax; how a disjunction across columns is expressed is up to the
//! generator.

use crate::types::{MatchCandidate, ResolvedTerm};

fn describe(candidate: &MatchCandidate) -> String {
    format!(
        "{} \"{}\" (column {})",
        candidate.category,
        candidate.value,
        candidate.category.filter_column()
    )
}

/// One directive per resolved term, in input order. Unresolved terms emit
/// nothing and are left to the generator's own heuristics.
pub fn build_context(resolutions: &[(String, ResolvedTerm)]) -> Vec<String> {
    resolutions
        .iter()
        .filter_map(|(term, outcome)| match outcome {
            ResolvedTerm::Unresolved => None,
            ResolvedTerm::SinglyResolved(m) => Some(format!(
                "Term \"{}\" refers to the {} \"{}\": filter on {} equal to \"{}\".",
                term,
                m.category,
                m.value,
                m.category.filter_column(),
                m.value
            )),
            ResolvedTerm::Ambiguous(candidates) => {
                let options: Vec<String> = candidates.iter().map(describe).collect();
                Some(format!(
                    "Term \"{}\" is ambiguous and may refer to any of: {}. \
                     Match rows equal to ANY of these values rather than choosing one.",
                    term,
                    options.join("; ")
                ))
            }
        })
        .collect()
}

/// Directives joined into the block handed to the query generator.
pub fn context_block(resolutions: &[(String, ResolvedTerm)]) -> String {
    build_context(resolutions).join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use classlens_core::Category;

    #[test]
    fn test_unresolved_terms_emit_nothing() {
        let directives = build_context(&[
            ("xyz".to_string(), ResolvedTerm::Unresolved),
            (
                "Backend".to_string(),
                ResolvedTerm::SinglyResolved(MatchCandidate::new(Category::Domain, "Backend", 0.0)),
            ),
        ]);
        assert_eq!(directives.len(), 1);
        let directive = &directives[0];
        assert!(directive.contains("domain_name"));
        assert!(directive.contains("\"Backend\""));
        for other in ["instructor_name", "class_title", "topic_name", "xyz"] {
            assert!(!directive.contains(other));
        }
    }

    #[test]
    fn test_ambiguous_lists_every_candidate() {
        let directives = build_context(&[(
            "Robert".to_string(),
            ResolvedTerm::Ambiguous(vec![
                MatchCandidate::new(Category::Instructor, "Robert Smith", 0.10),
                MatchCandidate::new(Category::Instructor, "Robert Jones", 0.11),
                MatchCandidate::new(Category::Class, "Robert's Seminar", 0.12),
            ]),
        )]);
        assert_eq!(directives.len(), 1);
        let directive = &directives[0];
        assert!(directive.contains("ambiguous"));
        assert!(directive.contains("ANY"));
        let smith = directive.find("Robert Smith").unwrap();
        let jones = directive.find("Robert Jones").unwrap();
        let seminar = directive.find("Robert's Seminar").unwrap();
        assert!(smith < jones && jones < seminar);
        assert!(directive.contains("instructor_name"));
        assert!(directive.contains("class_title"));
    }

    #[test]
    fn test_order_preserved_and_block_joined() {
        let resolutions = vec![
            (
                "Rust".to_string(),
                ResolvedTerm::SinglyResolved(MatchCandidate::new(
                    Category::Class,
                    "Rust Fundamentals",
                    0.2,
                )),
            ),
            ("nothing".to_string(), ResolvedTerm::Unresolved),
            (
                "Ownership".to_string(),
                ResolvedTerm::SinglyResolved(MatchCandidate::new(
                    Category::Topic,
                    "Ownership",
                    0.0,
                )),
            ),
        ];
        let directives = build_context(&resolutions);
        assert_eq!(directives.len(), 2);
        assert!(directives[0].contains("class_title"));
        assert!(directives[1].contains("topic_name"));

        let block = context_block(&resolutions);
        assert_eq!(block.lines().count(), 2);
        assert_eq!(block, directives.join("\n"));
    }

    #[test]
    fn test_empty_input() {
        assert!(build_context(&[]).is_empty());
        assert_eq!(context_block(&[]), "");
    }
}
