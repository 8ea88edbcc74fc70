//! External LLM provider clients.
//!
//! OpenAI and Groq share the chat-completions format; Anthropic uses the
//! Messages API. Requests carry a timeout, and transport errors, 429s and
//! 5xx responses are retried with exponential backoff.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde_json::json;
use tracing::{debug, warn};

use classlens_core::{Error, Result};

use crate::config::LLMConfig;
use crate::types::{ChatMessage, LLMProvider};

const OPENAI_URL: &str = "https://api.openai.com/v1/chat/completions";
const GROQ_URL: &str = "https://api.groq.com/openai/v1/chat/completions";
const ANTHROPIC_URL: &str = "https://api.anthropic.com/v1/messages";

/// Delay before the first retry; doubles on each further attempt.
const BASE_BACKOFF: Duration = Duration::from_millis(500);

/// A configured connection to one provider.
#[derive(Clone)]
pub struct LlmClient {
    http: Client,
    provider: LLMProvider,
    model: String,
    api_key: String,
    max_retries: u32,
}

enum Attempt {
    Done(String),
    Retry(String),
    Fail(String),
}

impl LlmClient {
    /// Build a client for the resolved provider, or `None` if no key is set.
    pub fn from_config(config: &LLMConfig) -> Option<Self> {
        let (provider, model, api_key) = config.resolve_provider()?;
        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs.max(1)))
            .build()
            .ok()?;
        Some(Self {
            http,
            provider,
            model,
            api_key,
            max_retries: config.max_retries,
        })
    }

    pub fn provider(&self) -> LLMProvider {
        self.provider
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Run a non-streaming completion and return the reply text.
    pub async fn complete(
        &self,
        messages: &[ChatMessage],
        temperature: f64,
        max_tokens: usize,
    ) -> Result<String> {
        let mut attempt = 0u32;
        loop {
            match self.attempt(messages, temperature, max_tokens).await {
                Attempt::Done(text) => return Ok(text),
                Attempt::Fail(e) => return Err(Error::Llm(e)),
                Attempt::Retry(e) if attempt >= self.max_retries => {
                    return Err(Error::Llm(format!(
                        "{} (gave up after {} attempts)",
                        e,
                        attempt + 1
                    )))
                }
                Attempt::Retry(e) => {
                    let delay = backoff_delay(attempt);
                    warn!(
                        "{} request failed: {}; retrying in {}ms",
                        self.provider,
                        e,
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    async fn attempt(
        &self,
        messages: &[ChatMessage],
        temperature: f64,
        max_tokens: usize,
    ) -> Attempt {
        let request = match self.provider {
            LLMProvider::OpenAI | LLMProvider::Groq => {
                let url = if self.provider == LLMProvider::OpenAI {
                    OPENAI_URL
                } else {
                    GROQ_URL
                };
                let msgs: Vec<serde_json::Value> = messages
                    .iter()
                    .map(|m| json!({"role": m.role, "content": m.content}))
                    .collect();
                self.http
                    .post(url)
                    .header("Authorization", format!("Bearer {}", self.api_key))
                    .json(&json!({
                        "model": self.model,
                        "messages": msgs,
                        "temperature": temperature,
                        "max_tokens": max_tokens,
                    }))
            }
            LLMProvider::Anthropic => {
                let system: Option<String> = messages
                    .iter()
                    .find(|m| m.role == "system")
                    .map(|m| m.content.clone());
                let conv: Vec<serde_json::Value> = messages
                    .iter()
                    .filter(|m| m.role != "system")
                    .map(|m| json!({"role": m.role, "content": m.content}))
                    .collect();
                let mut body = json!({
                    "model": self.model,
                    "messages": conv,
                    "temperature": temperature,
                    "max_tokens": max_tokens,
                });
                if let Some(sys) = system {
                    body["system"] = json!(sys);
                }
                self.http
                    .post(ANTHROPIC_URL)
                    .header("x-api-key", &self.api_key)
                    .header("anthropic-version", "2023-06-01")
                    .json(&body)
            }
        };

        debug!("Calling {} with model {}", self.provider, self.model);

        let response = match request.send().await {
            Ok(r) => r,
            Err(e) => return Attempt::Retry(format!("request failed: {}", e)),
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = format!("API error {}: {}", status, body);
            return if is_retryable(status) {
                Attempt::Retry(message)
            } else {
                Attempt::Fail(message)
            };
        }

        let parsed: serde_json::Value = match response.json().await {
            Ok(v) => v,
            Err(e) => return Attempt::Fail(format!("invalid response body: {}", e)),
        };

        match extract_text(self.provider, &parsed) {
            Some(text) => Attempt::Done(text),
            None => Attempt::Fail("response contained no text".into()),
        }
    }
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn backoff_delay(attempt: u32) -> Duration {
    BASE_BACKOFF * 2u32.saturating_pow(attempt.min(6))
}

/// Pull the reply text out of a provider response body.
fn extract_text(provider: LLMProvider, body: &serde_json::Value) -> Option<String> {
    let text = match provider {
        LLMProvider::OpenAI | LLMProvider::Groq => {
            body["choices"][0]["message"]["content"].as_str()?.to_string()
        }
        LLMProvider::Anthropic => body["content"]
            .as_array()?
            .iter()
            .filter(|block| block["type"] == "text")
            .filter_map(|block| block["text"].as_str())
            .collect::<Vec<_>>()
            .join(""),
    };
    (!text.trim().is_empty()).then_some(text)
}
