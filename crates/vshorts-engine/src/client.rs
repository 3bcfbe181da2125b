//! Transformation engine HTTP client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use tracing::{debug, warn};

use crate::engine::TransformEngine;
use crate::error::{EngineError, EngineResult};
use crate::types::{HealthResponse, StageState, StageSubmission};

/// Configuration for the engine client.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Base URL of the engine
    pub base_url: String,
    /// Account identifier
    pub cloud_name: String,
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
    /// Per-request timeout; stage timeouts are enforced by the executor
    pub timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8002".to_string(),
            cloud_name: "demo".to_string(),
            api_key: None,
            api_secret: None,
            timeout: Duration::from_secs(30),
        }
    }
}

impl EngineConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("ENGINE_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:8002".to_string()),
            cloud_name: std::env::var("MEDIA_CLOUD_NAME").unwrap_or_else(|_| "demo".to_string()),
            api_key: std::env::var("MEDIA_API_KEY").ok(),
            api_secret: std::env::var("MEDIA_API_SECRET").ok(),
            timeout: Duration::from_secs(
                std::env::var("ENGINE_REQUEST_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
        }
    }

    fn stages_url(&self) -> String {
        format!(
            "{}/v1_1/{}/stages",
            self.base_url.trim_end_matches('/'),
            self.cloud_name
        )
    }
}

/// HTTP client for the transformation engine.
pub struct HttpEngine {
    http: Client,
    config: EngineConfig,
}

impl HttpEngine {
    /// Create a new engine client.
    pub fn new(config: EngineConfig) -> EngineResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(EngineError::Network)?;

        Ok(Self { http, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> EngineResult<Self> {
        Self::new(EngineConfig::from_env())
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.api_key {
            Some(key) => request.basic_auth(key, self.config.api_secret.as_ref()),
            None => request,
        }
    }

    async fn read_state(response: Response) -> EngineResult<StageState> {
        let status = response.status();
        if status == reqwest::StatusCode::SERVICE_UNAVAILABLE {
            let body = response.text().await.unwrap_or_default();
            return Err(EngineError::ServiceUnavailable(body));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EngineError::request_failed(format!(
                "Engine returned {}: {}",
                status, body
            )));
        }

        let body = response.text().await?;
        serde_json::from_str(&body)
            .map_err(|e| EngineError::invalid_response(format!("{}: {}", e, body)))
    }
}

#[async_trait]
impl TransformEngine for HttpEngine {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn submit(&self, submission: &StageSubmission) -> EngineResult<StageState> {
        let url = self.config.stages_url();

        debug!(
            run_id = %submission.run_id,
            stage = %submission.stage_id,
            "Submitting {} stage to {}",
            submission.kind,
            url
        );

        let response = self
            .authorize(self.http.post(&url).json(submission))
            .send()
            .await?;

        Self::read_state(response).await
    }

    async fn status(&self, ticket: &str) -> EngineResult<StageState> {
        let url = format!(
            "{}/{}",
            self.config.stages_url(),
            urlencode_ticket(ticket)
        );

        let response = self.authorize(self.http.get(&url)).send().await?;
        let state = Self::read_state(response).await?;
        if state.ticket != ticket {
            return Err(EngineError::invalid_response(format!(
                "asked for ticket {} but engine answered for {}",
                ticket, state.ticket
            )));
        }
        Ok(state)
    }

    async fn health_check(&self) -> EngineResult<bool> {
        let url = format!("{}/health", self.config.base_url.trim_end_matches('/'));

        match self.http.get(&url).send().await {
            Ok(response) if response.status().is_success() => {
                let health: HealthResponse = response.json().await?;
                Ok(health.status == "healthy" || health.status == "ok")
            }
            Ok(response) => {
                warn!("Engine health check failed: {}", response.status());
                Ok(false)
            }
            Err(e) => {
                warn!("Engine health check error: {}", e);
                Ok(false)
            }
        }
    }
}

fn urlencode_ticket(ticket: &str) -> String {
    urlencoding::encode(ticket).into_owned()
}
