//! Wire back-ends for the agent gateway.

use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_bedrockagentruntime::error::DisplayErrorContext;
use aws_sdk_bedrockagentruntime::types::ResponseStream;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Agent returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Bedrock agent error: {0}")]
    Bedrock(String),

    #[error("Agent returned an empty completion")]
    Empty,

    #[error("Agent call timed out after {0:?}")]
    Timeout(Duration),
}

/// One round trip to a remote agent. Retries live in the gateway.
#[async_trait]
pub trait AgentTransport: Send + Sync {
    fn name(&self) -> &'static str;

    async fn invoke(&self, prompt: &str, session_id: &str) -> Result<String, TransportError>;
}

// ────────────────────────────────────────────────────────────────────────────
// AWS Bedrock Agent Runtime
// ────────────────────────────────────────────────────────────────────────────

pub struct BedrockTransport {
    client: aws_sdk_bedrockagentruntime::Client,
    agent_id: String,
    alias_id: String,
}

impl BedrockTransport {
    pub fn new(client: aws_sdk_bedrockagentruntime::Client, agent_id: String, alias_id: String) -> Self {
        Self {
            client,
            agent_id,
            alias_id,
        }
    }
}

#[async_trait]
impl AgentTransport for BedrockTransport {
    fn name(&self) -> &'static str {
        "bedrock"
    }

    async fn invoke(&self, prompt: &str, session_id: &str) -> Result<String, TransportError> {
        let output = self
            .client
            .invoke_agent()
            .agent_id(&self.agent_id)
            .agent_alias_id(&self.alias_id)
            .session_id(session_id)
            .input_text(prompt)
            .enable_trace(false)
            .send()
            .await
            .map_err(|e| TransportError::Bedrock(DisplayErrorContext(&e).to_string()))?;

        // The completion arrives as a stream of byte chunks.
        let mut stream = output.completion;
        let mut completion = String::new();
        while let Some(event) = stream
            .recv()
            .await
            .map_err(|e| TransportError::Bedrock(DisplayErrorContext(&e).to_string()))?
        {
            if let ResponseStream::Chunk(part) = event {
                if let Some(bytes) = part.bytes() {
                    completion.push_str(&String::from_utf8_lossy(bytes.as_ref()));
                }
            }
        }

        debug!("Bedrock completion received: {} chars", completion.len());
        if completion.is_empty() {
            return Err(TransportError::Empty);
        }
        Ok(completion)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Plain HTTP agent endpoint
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct HttpAgentRequest<'a> {
    prompt: &'a str,
    session_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct HttpAgentResponse {
    #[serde(alias = "response", alias = "result", alias = "output")]
    completion: Option<String>,
}

pub struct HttpTransport {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
}

impl HttpTransport {
    pub fn new(url: String, api_key: Option<String>, timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url,
            api_key,
        })
    }
}

/// Accepts `{"completion": ...}` (or a known alias) and falls back to the raw body.
fn completion_from_body(body: String) -> String {
    match serde_json::from_str::<HttpAgentResponse>(&body) {
        Ok(HttpAgentResponse {
            completion: Some(text),
        }) => text,
        _ => body,
    }
}

#[async_trait]
impl AgentTransport for HttpTransport {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn invoke(&self, prompt: &str, session_id: &str) -> Result<String, TransportError> {
        let mut request = self
            .client
            .post(&self.url)
            .json(&HttpAgentRequest { prompt, session_id });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                message: body,
            });
        }

        let completion = completion_from_body(body);
        if completion.trim().is_empty() {
            return Err(TransportError::Empty);
        }
        Ok(completion)
    }
}
