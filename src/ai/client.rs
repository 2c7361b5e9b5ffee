//! Multi-provider text generation for escalated questions.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use thiserror::Error;

use crate::config::{AiConfig, ProviderKind};

use super::{format_escalation_prompt, ADVISOR_SYSTEM_PROMPT};

/// Connection timeout for HTTP requests.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Overall request timeout for HTTP requests.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum number of retries for transient failures.
const MAX_RETRIES: u32 = 3;

/// Build an HTTP client with proper timeout configuration.
fn build_http_client() -> Result<Client, AiError> {
    Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(|e| AiError::RequestFailed(format!("Failed to build HTTP client: {e}")))
}

/// Determine if a request should be retried based on status code and attempt count.
fn should_retry(status_code: u16, attempt: u32) -> bool {
    if attempt >= MAX_RETRIES {
        return false;
    }
    // Retry on 5xx server errors
    (500..600).contains(&status_code)
}

/// Calculate exponential backoff duration for retry attempts.
fn calculate_backoff(attempt: u32) -> Duration {
    // Exponential backoff: 1s, 2s, 4s
    Duration::from_secs(1 << attempt)
}

/// Errors from text generation.
#[derive(Error, Debug)]
pub enum AiError {
    #[error("API key not configured (env: {0})")]
    MissingApiKey(String),
    #[error("API request failed: {0}")]
    RequestFailed(String),
    #[error("Failed to parse response: {0}")]
    ParseError(String),
    #[error("Text generation request timed out")]
    Timeout,
}

/// Trait for AI providers.
#[async_trait]
pub trait AiProvider: Send + Sync {
    /// Generate a response from the AI provider.
    async fn generate(&self, system: &str, user: &str) -> Result<String, AiError>;
}

/// The escalation collaborator: answers a question given grounding facts.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Produce an answer to `prompt` that stays consistent with `facts`.
    async fn generate(&self, prompt: &str, facts: &[String]) -> Result<String, AiError>;
}

/// Send the request built by `request`, retrying 5xx responses with backoff,
/// and return the parsed JSON body.
async fn post_with_retry<F>(request: F) -> Result<serde_json::Value, AiError>
where
    F: Fn() -> RequestBuilder,
{
    let mut attempt = 0;
    loop {
        let response = request().send().await.map_err(|e| {
            if e.is_timeout() {
                AiError::Timeout
            } else {
                AiError::RequestFailed(e.to_string())
            }
        })?;

        let status = response.status();
        if status.is_success() {
            return response
                .json()
                .await
                .map_err(|e| AiError::ParseError(e.to_string()));
        }

        let status_code = status.as_u16();
        if should_retry(status_code, attempt) {
            let backoff = calculate_backoff(attempt);
            tracing::debug!(status = status_code, attempt, ?backoff, "Retrying provider request");
            tokio::time::sleep(backoff).await;
            attempt += 1;
            continue;
        }

        let text = response.text().await.unwrap_or_default();
        return Err(AiError::RequestFailed(format!("HTTP {status}: {text}")));
    }
}

/// Chat endpoint of one provider, speaking that provider's wire format.
#[derive(Debug, Clone)]
pub struct HttpProvider {
    kind: ProviderKind,
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
}

impl HttpProvider {
    /// # Errors
    ///
    /// Returns `AiError::RequestFailed` if the HTTP client cannot be built.
    pub fn new(config: &AiConfig, api_key: String) -> Result<Self, AiError> {
        Ok(Self {
            kind: config.provider.clone(),
            client: build_http_client()?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
        })
    }

    #[must_use]
    pub fn kind(&self) -> &ProviderKind {
        &self.kind
    }

    fn endpoint(&self) -> String {
        match self.kind {
            ProviderKind::Gemini => format!("{}/models/{}:generateContent", self.base_url, self.model),
            ProviderKind::Claude => format!("{}/v1/messages", self.base_url),
        }
    }

    fn body(&self, system: &str, user: &str) -> serde_json::Value {
        match self.kind {
            ProviderKind::Gemini => serde_json::json!({
                "contents": [{ "role": "user", "parts": [{ "text": user }] }],
                "systemInstruction": { "parts": [{ "text": system }] },
                "generationConfig": { "maxOutputTokens": self.max_tokens }
            }),
            ProviderKind::Claude => serde_json::json!({
                "model": self.model,
                "max_tokens": self.max_tokens,
                "system": system,
                "messages": [{ "role": "user", "content": user }]
            }),
        }
    }

    fn request(&self, url: &str, body: &serde_json::Value) -> RequestBuilder {
        let request = self.client.post(url).json(body);
        match self.kind {
            ProviderKind::Gemini => request.header("x-goog-api-key", &self.api_key),
            ProviderKind::Claude => request
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", "2023-06-01"),
        }
    }

    /// The answer text inside a provider response.
    fn extract(&self, json: &serde_json::Value) -> Option<String> {
        let text = match self.kind {
            ProviderKind::Gemini => &json["candidates"][0]["content"]["parts"][0]["text"],
            ProviderKind::Claude => &json["content"][0]["text"],
        };
        text.as_str().map(String::from)
    }
}

#[async_trait]
impl AiProvider for HttpProvider {
    async fn generate(&self, system: &str, user: &str) -> Result<String, AiError> {
        let url = self.endpoint();
        let body = self.body(system, user);
        let json = post_with_retry(|| self.request(&url, &body)).await?;
        self.extract(&json).ok_or_else(|| {
            AiError::ParseError(format!("No text in {:?} response", self.kind))
        })
    }
}

/// Text generator backed by a configured HTTP provider.
#[derive(Debug, Clone)]
pub struct AdvisorClient {
    provider: HttpProvider,
    config: AiConfig,
}

impl AdvisorClient {
    /// Create a new client with the given provider and config.
    #[must_use]
    pub fn new(provider: HttpProvider, config: AiConfig) -> Self {
        Self { provider, config }
    }

    /// Create client from configuration.
    ///
    /// # Errors
    ///
    /// Returns `AiError::MissingApiKey` if the configured API key environment
    /// variable is not set.
    pub fn from_config(config: AiConfig) -> Result<Self, AiError> {
        let api_key = std::env::var(&config.api_key_env)
            .map_err(|_| AiError::MissingApiKey(config.api_key_env.clone()))?;

        let provider = HttpProvider::new(&config, api_key)?;
        Ok(Self { provider, config })
    }

    /// Get the configured model.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Get the provider kind.
    #[must_use]
    pub fn provider_kind(&self) -> &ProviderKind {
        &self.config.provider
    }
}

#[async_trait]
impl TextGenerator for AdvisorClient {
    async fn generate(&self, prompt: &str, facts: &[String]) -> Result<String, AiError> {
        let user_message = format_escalation_prompt(prompt, facts);
        tracing::debug!(
            model = %self.config.model,
            facts = facts.len(),
            "Escalating question to provider"
        );
        let text = self
            .provider
            .generate(ADVISOR_SYSTEM_PROMPT, &user_message)
            .await?;

        let text = text.trim();
        if text.is_empty() {
            return Err(AiError::ParseError("Empty response".to_string()));
        }
        Ok(text.to_string())
    }
}
