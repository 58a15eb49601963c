//! Agent API client
//!
//! Every submission is a fresh conversation: the caller builds the complete
//! message list each time and nothing is remembered between calls.

use async_trait::async_trait;
use fixhub_core::{AgentConfig, FixhubError, Result};
use parking_lot::Mutex;
use reqwest::Client;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

use crate::response::parse_response;
use crate::types::{AgentRequest, AgentTurn};

const RESPONSES_PATH: &str = "v1/responses";

/// Anything that can answer an [`AgentRequest`]
#[async_trait]
pub trait AgentApi: Send + Sync {
    /// Send one request and reduce the reply to a turn
    async fn submit(&self, request: &AgentRequest) -> Result<AgentTurn>;

    /// Model name recorded alongside each request
    fn model(&self) -> &str;
}

/// Client for a Responses-style endpoint
#[derive(Clone)]
pub struct ResponsesClient {
    http: Client,
    api_url: String,
    api_key: String,
    model: String,
}

impl ResponsesClient {
    pub fn new(
        api_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FixhubError::Http(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            http,
            api_url: api_url.into(),
            api_key: api_key.into(),
            model: model.into(),
        })
    }

    /// Build from config, failing when no API key is configured
    pub fn from_config(config: &AgentConfig) -> Result<Self> {
        Self::new(
            config.api_url.clone(),
            config.resolve_api_key()?,
            config.model.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    fn endpoint(&self) -> String {
        format!("{}/{}", self.api_url.trim_end_matches('/'), RESPONSES_PATH)
    }
}

impl std::fmt::Debug for ResponsesClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponsesClient")
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl AgentApi for ResponsesClient {
    #[instrument(skip(self, request), fields(model = %self.model))]
    async fn submit(&self, request: &AgentRequest) -> Result<AgentTurn> {
        tracing::debug!(
            "Sending {} messages to the agent API",
            request.messages.len() + 1
        );

        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&request.to_body(&self.model))
            .send()
            .await
            .map_err(|e| FixhubError::AgentApi(format!("Failed to send request: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown".to_string());
            tracing::error!("Agent API returned {}", status);
            return Err(FixhubError::AgentApi(format!("{}: {}", status, error_text)));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| FixhubError::MalformedResponse(format!("Failed to parse response: {}", e)))?;

        let turn = parse_response(&body)?;
        tracing::info!(
            "Agent responded ({} chars, {} tool calls)",
            turn.content().len(),
            turn.tool_calls.len()
        );
        Ok(turn)
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Replays queued turns and records every request
///
/// Clones share the same queue, so a test can keep a handle after giving one
/// to the session.
#[derive(Clone)]
pub struct ScriptedAgent {
    model: String,
    responses: Arc<Mutex<VecDeque<Result<AgentTurn>>>>,
    requests: Arc<Mutex<Vec<AgentRequest>>>,
}

impl ScriptedAgent {
    pub fn new() -> Self {
        Self {
            model: "scripted".to_string(),
            responses: Arc::new(Mutex::new(VecDeque::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Queue a successful turn
    pub fn then_turn(self, turn: AgentTurn) -> Self {
        self.responses.lock().push_back(Ok(turn));
        self
    }

    /// Queue a failure
    pub fn then_error(self, error: FixhubError) -> Self {
        self.responses.lock().push_back(Err(error));
        self
    }

    /// Requests received so far, oldest first
    pub fn requests(&self) -> Vec<AgentRequest> {
        self.requests.lock().clone()
    }

    pub fn remaining(&self) -> usize {
        self.responses.lock().len()
    }
}

impl Default for ScriptedAgent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AgentApi for ScriptedAgent {
    async fn submit(&self, request: &AgentRequest) -> Result<AgentTurn> {
        self.requests.lock().push(request.clone());
        self.responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(FixhubError::AgentApi("No scripted response left".to_string())))
    }

    fn model(&self) -> &str {
        &self.model
    }
}
