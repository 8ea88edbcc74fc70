//! Term extraction: pulls candidate entity mentions out of a question.
//!
//! Extraction never fails: an LLM that errors or replies with something
//! unparseable degrades to the heuristic extractor, and a question with no
//! usable terms yields an empty list.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

use crate::providers::LlmClient;
use crate::types::ChatMessage;

pub const DEFAULT_MAX_TERMS: usize = 8;

static QUOTED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"["\u{201C}]([^"\u{201C}\u{201D}]{2,80})["\u{201D}]"#).unwrap());

/// Question words and dataset vocabulary that never name a catalog value.
static STOPWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "a", "an", "the", "and", "or", "of", "in", "on", "at", "to", "for", "by", "with",
        "from", "about", "into", "than", "that", "this", "these", "those", "there", "their",
        "how", "many", "much", "what", "which", "who", "whom", "whose", "when", "where", "why",
        "did", "do", "does", "is", "are", "was", "were", "be", "been", "has", "have", "had",
        "show", "list", "give", "get", "find", "tell", "me", "us", "i", "we", "you", "our",
        "my", "it", "its", "not", "only", "also", "some", "any", "all", "each", "every",
        "per", "so", "can", "could", "would", "please", "top", "most", "least", "more",
        "less", "over", "under", "between", "during", "before", "after", "since", "last",
        "next", "year", "years", "month", "months", "week", "weeks", "day", "days",
        "total", "number", "count", "average", "avg", "sum", "mean", "rating", "ratings",
        "rated", "attendees", "attendance", "attended", "session", "sessions", "class",
        "classes", "course", "courses", "topic", "topics", "domain", "domains",
        "instructor", "instructors", "teacher", "teachers", "teach", "teaches", "taught",
        "teaching", "held", "best", "worst", "highest", "lowest", "compare", "versus", "vs",
        "both", "either", "them", "they", "he", "she", "his", "her",
    ]
    .into_iter()
    .collect()
});

/// Rule-based extraction: quoted phrases, runs of capitalized words, then
/// remaining content words.
#[derive(Debug, Clone)]
pub struct HeuristicExtractor {
    max_terms: usize,
}

impl Default for HeuristicExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_TERMS)
    }
}

impl HeuristicExtractor {
    pub fn new(max_terms: usize) -> Self {
        Self {
            max_terms: max_terms.max(1),
        }
    }

    pub fn extract(&self, question: &str) -> Vec<String> {
        let mut terms = TermSet::new(self.max_terms);

        for cap in QUOTED_RE.captures_iter(question) {
            if let Some(m) = cap.get(1) {
                terms.push(m.as_str());
            }
        }
        // Quoted spans are consumed; the break keeps runs from bridging them.
        let rest = QUOTED_RE.replace_all(question, " | ");

        let mut run: Vec<&str> = Vec::new();
        let mut loose: Vec<String> = Vec::new();
        for token in rest.split_whitespace() {
            let word = token.trim_matches(|c: char| !c.is_alphanumeric());
            let opens_clause = token.starts_with(['(', '|']);
            let closes_clause = token.ends_with([',', '.', ';', ':', '?', '!', ')']);

            if opens_clause {
                terms.push_run(&mut run);
            }
            if word.is_empty() {
                terms.push_run(&mut run);
                continue;
            }

            let lower = word.to_lowercase();
            let capitalized = word.chars().next().is_some_and(char::is_uppercase);
            if STOPWORDS.contains(lower.as_str()) || word.chars().all(|c| c.is_ascii_digit()) {
                terms.push_run(&mut run);
            } else if capitalized {
                run.push(word);
            } else {
                terms.push_run(&mut run);
                if word.chars().count() >= 3 {
                    loose.push(word.to_string());
                }
            }

            if closes_clause {
                terms.push_run(&mut run);
            }
        }
        terms.push_run(&mut run);

        for word in loose {
            if !terms.covers_word(&word) {
                terms.push(&word);
            }
        }

        let terms = terms.into_vec();
        debug!("Heuristic extraction: {:?}", terms);
        terms
    }
}

/// Ordered, case-insensitively deduplicated term list with a cap.
struct TermSet {
    seen: HashSet<String>,
    terms: Vec<String>,
    cap: usize,
}

impl TermSet {
    fn new(cap: usize) -> Self {
        Self {
            seen: HashSet::new(),
            terms: Vec::new(),
            cap,
        }
    }

    fn push(&mut self, term: &str) {
        let term = term.split_whitespace().collect::<Vec<_>>().join(" ");
        if term.is_empty() || self.terms.len() >= self.cap {
            return;
        }
        if self.seen.insert(term.to_lowercase()) {
            self.terms.push(term);
        }
    }

    fn push_run(&mut self, run: &mut Vec<&str>) {
        if !run.is_empty() {
            self.push(&run.join(" "));
            run.clear();
        }
    }

    fn covers_word(&self, word: &str) -> bool {
        let word = word.to_lowercase();
        self.seen
            .iter()
            .any(|t| t.split_whitespace().any(|w| w == word))
    }

    fn into_vec(self) -> Vec<String> {
        self.terms
    }
}

const EXTRACTION_PROMPT: &str = "You extract entity mentions from questions about a course \
analytics dataset (instructors, subject domains, classes and class topics). Reply with a JSON \
array of strings containing only the literal words from the question that name a specific \
instructor, domain, class or topic. Do not correct spelling. Do not include generic words such \
as sessions, rating or attendees. Reply with [] if there are none.";

/// LLM-backed extraction that falls back to [`HeuristicExtractor`].
pub struct LlmTermExtractor {
    client: Option<LlmClient>,
    fallback: HeuristicExtractor,
}

impl LlmTermExtractor {
    pub fn new(client: Option<LlmClient>) -> Self {
        Self {
            client,
            fallback: HeuristicExtractor::default(),
        }
    }

    pub async fn extract(&self, question: &str) -> Vec<String> {
        let Some(client) = &self.client else {
            return self.fallback.extract(question);
        };

        let messages = [
            ChatMessage::system(EXTRACTION_PROMPT),
            ChatMessage::user(question),
        ];
        match client.complete(&messages, 0.0, 256).await {
            Ok(reply) => match parse_term_list(&reply, self.fallback.max_terms) {
                Some(terms) => {
                    debug!("LLM extraction via {}: {:?}", client.provider(), terms);
                    terms
                }
                None => {
                    warn!("Unparseable extraction reply, using heuristics: {:?}", reply);
                    self.fallback.extract(question)
                }
            },
            Err(e) => {
                warn!("LLM extraction failed, using heuristics: {}", e);
                self.fallback.extract(question)
            }
        }
    }
}

/// Parse a JSON string array out of a model reply, tolerating prose or code
/// fences around it. Non-string elements are ignored.
pub fn parse_term_list(reply: &str, max_terms: usize) -> Option<Vec<String>> {
    let start = reply.find('[')?;
    let end = reply.rfind(']')?;
    if end < start {
        return None;
    }
    let items: Vec<serde_json::Value> = serde_json::from_str(&reply[start..=end]).ok()?;

    let mut terms = TermSet::new(max_terms.max(1));
    for item in &items {
        if let Some(s) = item.as_str() {
            terms.push(s);
        }
    }
    Some(terms.into_vec())
}
