//! HTTP backend client, one instance per configured provider.
//!
//! A single reqwest-based implementation covers every provider; the
//! request/response wire shape is selected by [`ProviderFlavor`]:
//! `generative` speaks the `models/{model}:generateContent?key=` style,
//! `chat-completions` the bearer-token `/chat/completions` style.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use insightforge_shared::config::{ProviderConfig, ProviderFlavor, RetryConfig};

use crate::{Backend, FailureKind, Pacer, RetryPolicy};

/// Per-request deadline for backend calls.
const REQUEST_TIMEOUT_SECS: u64 = 60;

// ---------------------------------------------------------------------------
// Wire types: generative flavor
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<GenerateContent>,
}

#[derive(Debug, Serialize)]
struct GenerateContent {
    parts: Vec<GeneratePart>,
}

#[derive(Debug, Serialize)]
struct GeneratePart {
    text: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

// ---------------------------------------------------------------------------
// Wire types: chat-completions flavor
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: Option<ChatChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

// ---------------------------------------------------------------------------
// HttpBackend
// ---------------------------------------------------------------------------

/// Reqwest-backed [`Backend`] with pacing and retry/backoff.
pub struct HttpBackend {
    provider: ProviderConfig,
    api_key: String,
    client: reqwest::Client,
    pacer: Pacer,
    retry: RetryPolicy,
}

impl HttpBackend {
    /// Build a backend for `provider`, reading the API key from the
    /// configured env var. Returns `None` when the key is absent, which
    /// silently disables this provider's stages.
    pub fn from_provider(provider: &ProviderConfig, retry: &RetryConfig) -> Option<Self> {
        let api_key = provider.api_key()?;
        Some(Self::with_key(provider.clone(), api_key, retry))
    }

    /// Build a backend with an explicit key (tests and probes).
    pub fn with_key(provider: ProviderConfig, api_key: String, retry: &RetryConfig) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(concat!("insightforge/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("failed to build HTTP client");

        let pacer = Pacer::new(provider.requests_per_minute);

        Self {
            provider,
            api_key,
            client,
            pacer,
            retry: RetryPolicy::from_config(retry),
        }
    }

    /// One paced attempt with no retries, used by the `backends`
    /// diagnostic command.
    pub async fn probe(&self, prompt: &str) -> Result<String, FailureKind> {
        self.pacer.pace().await;
        self.call_once(prompt).await
    }

    /// Single request/response cycle, classified.
    async fn call_once(&self, prompt: &str) -> Result<String, FailureKind> {
        let request = match self.provider.flavor {
            ProviderFlavor::Generative => {
                let url = format!(
                    "{}/models/{}:generateContent?key={}",
                    self.provider.endpoint, self.provider.model, self.api_key
                );
                let body = GenerateRequest {
                    contents: vec![GenerateContent {
                        parts: vec![GeneratePart {
                            text: prompt.to_string(),
                        }],
                    }],
                };
                self.client.post(&url).json(&body)
            }
            ProviderFlavor::ChatCompletions => {
                let url = format!("{}/chat/completions", self.provider.endpoint);
                let body = ChatRequest {
                    model: self.provider.model.clone(),
                    messages: vec![ChatMessage {
                        role: "user".into(),
                        content: prompt.to_string(),
                    }],
                };
                self.client.post(&url).bearer_auth(&self.api_key).json(&body)
            }
        };

        let response = request.send().await.map_err(classify_transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(classify_status(status));
        }

        let text = match self.provider.flavor {
            ProviderFlavor::Generative => {
                let parsed: GenerateResponse = response.json().await.map_err(classify_body)?;
                parsed
                    .candidates
                    .into_iter()
                    .next()
                    .and_then(|c| c.content)
                    .and_then(|c| c.parts.into_iter().next())
                    .and_then(|p| p.text)
            }
            ProviderFlavor::ChatCompletions => {
                let parsed: ChatResponse = response.json().await.map_err(classify_body)?;
                parsed
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|c| c.message)
                    .and_then(|m| m.content)
            }
        };

        match text {
            Some(t) if !t.trim().is_empty() => Ok(t.trim().to_string()),
            _ => Err(FailureKind::ParseError),
        }
    }
}

#[async_trait::async_trait]
impl Backend for HttpBackend {
    fn name(&self) -> &str {
        &self.provider.name
    }

    fn cost_per_call_usd(&self) -> f64 {
        self.provider.cost_per_call_usd
    }

    async fn call(&self, prompt: &str) -> Result<String, FailureKind> {
        let mut attempt: u32 = 1;
        loop {
            // Pacing precedes every attempt; backoff is additive on top.
            self.pacer.pace().await;

            match self.call_once(prompt).await {
                Ok(text) => {
                    debug!(backend = %self.provider.name, attempt, chars = text.len(), "backend call ok");
                    return Ok(text);
                }
                Err(kind) if kind.is_retryable() && attempt < self.retry.max_retries => {
                    let delay = self.retry.backoff_delay(attempt);
                    warn!(
                        backend = %self.provider.name,
                        failure = %kind,
                        attempt,
                        backoff_ms = delay.as_millis() as u64,
                        "backend call failed, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(kind) => {
                    warn!(backend = %self.provider.name, failure = %kind, attempt, "backend call failed");
                    return Err(kind);
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

fn classify_status(status: reqwest::StatusCode) -> FailureKind {
    match status.as_u16() {
        429 => FailureKind::RateLimited,
        401 | 403 => FailureKind::AuthError,
        500..=599 => FailureKind::ServerError,
        _ => FailureKind::ClientError,
    }
}

fn classify_transport(error: reqwest::Error) -> FailureKind {
    if error.is_timeout() {
        FailureKind::Timeout
    } else {
        FailureKind::NetworkError
    }
}

fn classify_body(error: reqwest::Error) -> FailureKind {
    if error.is_timeout() {
        FailureKind::Timeout
    } else {
        FailureKind::ParseError
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
