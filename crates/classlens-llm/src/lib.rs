//! LLM collaborators for ClassLens.
//!
//! Term extraction pulls candidate entity mentions out of a user's question
//! (heuristically, or via an LLM with heuristic fallback). Query generation
//! sends the question plus the resolved-entity context block to an external
//! LLM and returns its SQL. Calls go to external APIs with a request timeout
//! and retry-with-backoff.

pub mod config;
pub mod extract;
pub mod generate;
pub mod providers;
pub mod types;

pub use config::LLMConfig;
pub use extract::{HeuristicExtractor, LlmTermExtractor};
pub use generate::QueryGenerator;
pub use providers::LlmClient;
pub use types::*;
