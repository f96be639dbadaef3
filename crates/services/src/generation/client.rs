use std::env;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::error::GenerationError;

/// One fully-assembled request to the generative text endpoint.
///
/// The prompt arrives complete; the gateway and client never build prompt
/// text themselves.
#[derive(Clone, Debug, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub top_k: u32,
    pub top_p: f32,
}

impl GenerationRequest {
    /// Wraps a prompt with the default sampling parameters.
    #[must_use]
    pub fn for_prompt(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            temperature: 0.7,
            max_output_tokens: 1024,
            top_k: 40,
            top_p: 0.95,
        }
    }
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GenerationConfigError {
    #[error("invalid generation base URL")]
    InvalidBaseUrl,
}

/// Endpoint configuration for the HTTP client.
#[derive(Clone, Debug)]
pub struct GenerationConfig {
    base_url: String,
    api_key: String,
    model: String,
}

impl GenerationConfig {
    /// Build a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns `GenerationConfigError::InvalidBaseUrl` if the base URL does
    /// not parse.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, GenerationConfigError> {
        let base_url = base_url.into();
        if Url::parse(&base_url).is_err() {
            return Err(GenerationConfigError::InvalidBaseUrl);
        }
        Ok(Self {
            base_url,
            api_key: api_key.into(),
            model: model.into(),
        })
    }

    /// Read configuration from the environment, if present.
    ///
    /// `INTERVIEW_AI_API_KEY` selects whether generation is configured at all;
    /// base URL and model fall back to the hosted defaults.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let api_key = env::var("INTERVIEW_AI_API_KEY").ok()?;
        if api_key.trim().is_empty() {
            return None;
        }
        let base_url = env::var("INTERVIEW_AI_BASE_URL")
            .unwrap_or_else(|_| "https://generativelanguage.googleapis.com/v1beta".into());
        let model =
            env::var("INTERVIEW_AI_MODEL").unwrap_or_else(|_| "gemini-1.5-flash".into());

        match Self::new(base_url, api_key, model) {
            Ok(config) => Some(config),
            Err(err) => {
                tracing::warn!(error = %err, "ignoring invalid generation configuration");
                None
            }
        }
    }
}

/// Seam to the external generative text endpoint.
///
/// The gateway is the only caller; everything else goes through the gateway.
#[async_trait]
pub trait GenerativeClient: Send + Sync {
    /// Perform one generation attempt.
    ///
    /// # Errors
    ///
    /// Returns the transport-level `GenerationError` for this single attempt;
    /// retry policy lives in the gateway, not here.
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError>;
}

/// HTTP implementation of `GenerativeClient` against a
/// `generateContent`-style REST surface.
#[derive(Clone)]
pub struct HttpGenerativeClient {
    client: Client,
    config: Option<GenerationConfig>,
}

impl HttpGenerativeClient {
    #[must_use]
    pub fn from_env() -> Self {
        Self::new(GenerationConfig::from_env())
    }

    #[must_use]
    pub fn new(config: Option<GenerationConfig>) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.config.is_some()
    }
}

#[async_trait]
impl GenerativeClient for HttpGenerativeClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let config = self.config.as_ref().ok_or(GenerationError::Disabled)?;

        let url = format!(
            "{}/models/{}:generateContent",
            config.base_url.trim_end_matches('/'),
            config.model
        );
        let payload = GenerateContentRequest {
            contents: vec![ContentPayload {
                parts: vec![TextPart {
                    text: request.prompt.clone(),
                }],
            }],
            generation_config: GenerationParams {
                temperature: request.temperature,
                max_output_tokens: request.max_output_tokens,
                top_k: request.top_k,
                top_p: request.top_p,
            },
        };

        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", &config.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|err| GenerationError::Transient(err.to_string()))?;

        match response.status() {
            status if status.is_success() => {}
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(GenerationError::InvalidCredential);
            }
            StatusCode::TOO_MANY_REQUESTS => return Err(GenerationError::RateLimited),
            status => {
                return Err(GenerationError::Transient(format!(
                    "endpoint answered status {status}"
                )));
            }
        }

        let body: GenerateContentResponse = response
            .json()
            .await
            .map_err(|err| GenerationError::Transient(err.to_string()))?;
        let text = body
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content.parts.into_iter().next())
            .and_then(|part| part.text)
            .ok_or(GenerationError::InvalidResponse)?;

        Ok(text)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<ContentPayload>,
    generation_config: GenerationParams,
}

#[derive(Debug, Serialize)]
struct ContentPayload {
    parts: Vec<TextPart>,
}

#[derive(Debug, Serialize)]
struct TextPart {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationParams {
    temperature: f32,
    max_output_tokens: u32,
    top_k: u32,
    top_p: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
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
