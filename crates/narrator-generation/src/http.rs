//! HTTP generation backend.
//!
//! Talks to a TTS server exposing:
//!
//! - `POST {base}/api/generate` with a JSON body
//!   `{text, voice, language, speed, temperature}`, answering `{"url": "..."}`
//! - `GET {base}/api/health`, answering any 2xx when ready
//!
//! Retries are not done here; the controller owns the retry schedule.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use narrator_core::{GenerationBackend, GenerationError, GenerationParams, ResourceLocator};

/// Default per-request timeout. Generation of a long paragraph can be slow.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Timeout for the health probe.
const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    text: &'a str,
    voice: &'a str,
    language: &'a str,
    speed: f32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    url: Option<String>,
}

/// Production backend using reqwest.
pub struct HttpGenerationBackend {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpGenerationBackend {
    /// Create a backend for the given server.
    pub fn new(base_url: Url) -> Result<Self, GenerationError> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    /// Create a backend with a custom request timeout.
    pub fn with_timeout(base_url: Url, timeout: Duration) -> Result<Self, GenerationError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GenerationError::other(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { client, base_url })
    }

    /// Server base URL; relative locators resolve against it.
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, GenerationError> {
        let mut base = self.base_url.clone();
        if !base.path().ends_with('/') {
            base.set_path(&format!("{}/", base.path()));
        }
        base.join(path)
            .map_err(|e| GenerationError::other(format!("invalid endpoint '{path}': {e}")))
    }
}

/// Map a transport-level failure.
fn map_transport(e: &reqwest::Error) -> GenerationError {
    if e.is_connect() || e.is_timeout() {
        GenerationError::unreachable(e.to_string())
    } else {
        GenerationError::other(e.to_string())
    }
}

#[async_trait]
impl GenerationBackend for HttpGenerationBackend {
    async fn generate(
        &self,
        text: &str,
        params: &GenerationParams,
    ) -> Result<ResourceLocator, GenerationError> {
        let url = self.endpoint("api/generate")?;
        let body = GenerateRequest {
            text,
            voice: &params.voice,
            language: &params.language,
            speed: params.speed,
            temperature: params.temperature,
        };

        let response = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|e| map_transport(&e))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .ok()
                .filter(|body| !body.trim().is_empty())
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("").to_string());
            return Err(GenerationError::Server {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: GenerateResponse =
            response
                .json()
                .await
                .map_err(|e| GenerationError::InvalidResponse {
                    message: e.to_string(),
                })?;

        match parsed.url {
            Some(url) if !url.trim().is_empty() => Ok(ResourceLocator::new(url)),
            _ => Err(GenerationError::InvalidResponse {
                message: "response has no audio url".to_string(),
            }),
        }
    }

    async fn check_connection(&self) -> Result<(), GenerationError> {
        let url = self.endpoint("api/health")?;
        let response = self
            .client
            .get(url)
            .timeout(HEALTH_TIMEOUT)
            .send()
            .await
            .map_err(|e| GenerationError::unreachable(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(GenerationError::Server {
                status: response.status().as_u16(),
                message: "health check failed".to_string(),
            })
        }
    }
}
