//! Resolution result types.

use classlens_core::Category;
use serde::{Deserialize, Serialize};

/// One canonical value a term may refer to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchCandidate {
    pub category: Category,
    pub value: String,
    /// Fuzzy distance in [0, 1]; 0 is an exact match.
    pub score: f64,
}

impl MatchCandidate {
    pub fn new(category: Category, value: impl Into<String>, score: f64) -> Self {
        Self {
            category,
            value: value.into(),
            score,
        }
    }
}

/// Outcome of resolving a single term.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedTerm {
    /// No canonical value scored below the quality floor.
    Unresolved,
    /// Exactly one candidate survived the ambiguity window.
    SinglyResolved(MatchCandidate),
    /// Several near-equally plausible candidates, best first.
    Ambiguous(Vec<MatchCandidate>),
}

impl ResolvedTerm {
    pub fn status(&self) -> &'static str {
        match self {
            Self::Unresolved => "unresolved",
            Self::SinglyResolved(_) => "resolved",
            Self::Ambiguous(_) => "ambiguous",
        }
    }

    /// Candidates carried by this outcome, best first.
    pub fn candidates(&self) -> &[MatchCandidate] {
        match self {
            Self::Unresolved => &[],
            Self::SinglyResolved(candidate) => std::slice::from_ref(candidate),
            Self::Ambiguous(candidates) => candidates,
        }
    }

    pub fn is_resolved(&self) -> bool {
        !matches!(self, Self::Unresolved)
    }
}

/// Serializable view of one term's resolution.
#[derive(Debug, Clone, Serialize)]
pub struct TermResolution {
    pub term: String,
    pub status: &'static str,
    pub candidates: Vec<MatchCandidate>,
}

impl TermResolution {
    pub fn new(term: &str, outcome: &ResolvedTerm) -> Self {
        Self {
            term: term.to_string(),
            status: outcome.status(),
            candidates: outcome.candidates().to_vec(),
        }
    }
}
