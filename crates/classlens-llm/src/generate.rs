//! Query generation: question plus resolved-entity context in, SQL out.

use tracing::{debug, info};

use classlens_core::{Error, Result};

use crate::providers::LlmClient;
use crate::types::ChatMessage;

const GENERATION_RULES: &str = "You translate questions about a course analytics dataset into \
a single SQLite SELECT statement. Use only the tables and columns described below. When entity \
directives are given, use exactly the values they name in your filters; when a term is marked \
ambiguous, match rows equal to any of its listed values (an IN list or an OR across the named \
columns) instead of picking one. Reply with the SQL only, no explanation.";

/// Sends a question and its context block to an LLM and returns the query.
pub struct QueryGenerator {
    client: LlmClient,
    schema: String,
    max_tokens: usize,
}

impl QueryGenerator {
    pub fn new(client: LlmClient, schema: impl Into<String>) -> Self {
        Self {
            client,
            schema: schema.into(),
            max_tokens: 1024,
        }
    }

    /// The generated query is returned as-is apart from fence stripping.
    pub async fn generate(&self, question: &str, context_block: &str) -> Result<String> {
        let messages = build_messages(&self.schema, question, context_block);
        let reply = self.client.complete(&messages, 0.0, self.max_tokens).await?;
        let query = strip_code_fences(&reply);
        if query.is_empty() {
            return Err(Error::Llm("model returned an empty query".into()));
        }
        info!(
            "Generated query via {} ({} chars)",
            self.client.provider(),
            query.len()
        );
        debug!("Generated query: {}", query);
        Ok(query)
    }
}

fn build_messages(schema: &str, question: &str, context_block: &str) -> Vec<ChatMessage> {
    let system = format!("{}\n\nSchema:\n{}", GENERATION_RULES, schema);
    let user = if context_block.trim().is_empty() {
        format!("Question: {}", question)
    } else {
        format!(
            "Entity directives:\n{}\n\nQuestion: {}",
            context_block, question
        )
    };
    vec![ChatMessage::system(system), ChatMessage::user(user)]
}

/// Remove a surrounding markdown code fence (with optional language tag).
pub fn strip_code_fences(reply: &str) -> String {
    let trimmed = reply.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed.to_string();
    };
    // Drop the language tag line, if any.
    let body = match rest.find('\n') {
        Some(i) => &rest[i + 1..],
        None => rest,
    };
    let body = body.trim_end();
    body.strip_suffix("```").unwrap_or(body).trim().to_string()
}
