//! Agent gateway — the single entry point for calls to the remote AI agent.
//!
//! Back-end selection at startup:
//!   - `AWS_BEDROCK_AGENT_ID` set → Bedrock Agent Runtime
//!   - else `AGENT_HTTP_URL` set  → plain HTTP agent
//!   - else                       → mock mode
//!
//! `invoke` never fails. Every attempt is bounded by the configured timeout
//! and transport errors are retried with exponential backoff; once attempts
//! run out the caller gets a synthetic reply flagged `is_mock` with the
//! reason attached.

pub mod handlers;
pub mod parse;
pub mod prompts;
pub mod services;
pub mod session;
pub mod transport;

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use aws_config::{BehaviorVersion, Region};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::AgentConfig;
use crate::models::agent::{AgentTask, AgentType};
use transport::{AgentTransport, BedrockTransport, HttpTransport, TransportError};

#[derive(Debug, Clone, Serialize)]
pub struct AgentReply {
    pub completion: String,
    pub session_id: String,
    pub is_mock: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<String>,
    #[serde(skip)]
    pub attempts: u32,
    #[serde(skip)]
    pub latency_ms: i64,
}

/// Upper bound on `AGENT_MAX_ATTEMPTS`.
pub const MAX_ATTEMPTS: u32 = 10;
/// Longest single pause between retries.
const MAX_BACKOFF: Duration = Duration::from_secs(60);

#[derive(Clone)]
pub struct AgentGateway {
    transport: Option<Arc<dyn AgentTransport>>,
    max_attempts: u32,
    backoff: Duration,
    timeout: Duration,
}

/// Delay before retry number `retry` (1-based): base, 2·base, 4·base, ...
/// capped at `MAX_BACKOFF`.
fn backoff_delay(base: Duration, retry: u32) -> Duration {
    2u32.checked_pow(retry.saturating_sub(1))
        .and_then(|factor| base.checked_mul(factor))
        .map_or(MAX_BACKOFF, |delay| delay.min(MAX_BACKOFF))
}

/// `<user>-<agent_type>-<32 hex chars>`; always longer than 33 characters.
pub fn new_session_id(user: &str, agent_type: AgentType) -> String {
    format!("{user}-{agent_type}-{}", Uuid::new_v4().simple())
}

impl AgentGateway {
    pub fn new(
        transport: Option<Arc<dyn AgentTransport>>,
        max_attempts: u32,
        backoff: Duration,
        timeout: Duration,
    ) -> Self {
        Self {
            transport,
            max_attempts: max_attempts.clamp(1, MAX_ATTEMPTS),
            backoff,
            timeout,
        }
    }

    #[cfg(test)]
    pub fn mock() -> Self {
        Self::new(None, 1, Duration::ZERO, Duration::from_secs(1))
    }

    pub async fn from_config(config: &AgentConfig) -> Result<Self> {
        let transport: Option<Arc<dyn AgentTransport>> =
            if let Some(agent_id) = &config.bedrock_agent_id {
                let sdk_config = aws_config::defaults(BehaviorVersion::latest())
                    .region(Region::new(config.aws_region.clone()))
                    .load()
                    .await;
                let client = aws_sdk_bedrockagentruntime::Client::new(&sdk_config);
                info!(
                    "Agent gateway using Bedrock agent {agent_id} (alias {}, region {})",
                    config.bedrock_agent_alias_id, config.aws_region
                );
                let bedrock = BedrockTransport::new(
                    client,
                    agent_id.clone(),
                    config.bedrock_agent_alias_id.clone(),
                );
                Some(Arc::new(bedrock) as Arc<dyn AgentTransport>)
            } else if let Some(url) = &config.http_url {
                info!("Agent gateway using HTTP agent at {url}");
                let http = HttpTransport::new(
                    url.clone(),
                    config.api_key.clone(),
                    Duration::from_secs(config.timeout_secs),
                )?;
                Some(Arc::new(http) as Arc<dyn AgentTransport>)
            } else {
                warn!("No agent back-end configured; agent gateway running in mock mode");
                None
            };

        Ok(Self::new(
            transport,
            config.max_attempts,
            Duration::from_millis(config.backoff_ms),
            Duration::from_secs(config.timeout_secs),
        ))
    }

    pub fn is_mock(&self) -> bool {
        self.transport.is_none()
    }

    pub fn backend(&self) -> &'static str {
        self.transport.as_ref().map_or("mock", |t| t.name())
    }

    pub async fn invoke(&self, task: AgentTask, prompt: &str, session_id: &str) -> AgentReply {
        let started = Instant::now();
        let Some(transport) = &self.transport else {
            return AgentReply {
                completion: prompts::mock_completion(task, prompt),
                session_id: session_id.to_string(),
                is_mock: true,
                fallback_reason: None,
                attempts: 0,
                latency_ms: started.elapsed().as_millis() as i64,
            };
        };

        let mut last_error = String::new();
        for attempt in 0..self.max_attempts {
            if attempt > 0 {
                let delay = backoff_delay(self.backoff, attempt);
                warn!(
                    "Agent call ({task}) attempt {attempt}/{} failed, retrying after {}ms...",
                    self.max_attempts,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let outcome = tokio::time::timeout(self.timeout, transport.invoke(prompt, session_id))
                .await
                .unwrap_or(Err(TransportError::Timeout(self.timeout)));
            match outcome {
                Ok(completion) => {
                    return AgentReply {
                        completion,
                        session_id: session_id.to_string(),
                        is_mock: false,
                        fallback_reason: None,
                        attempts: attempt + 1,
                        latency_ms: started.elapsed().as_millis() as i64,
                    };
                }
                Err(e) => {
                    warn!("Agent call ({task}) via {} failed: {e}", transport.name());
                    last_error = e.to_string();
                }
            }
        }

        warn!(
            "Agent call ({task}) failed after {} attempts; returning fallback reply",
            self.max_attempts
        );
        AgentReply {
            completion: prompts::mock_completion(task, prompt),
            session_id: session_id.to_string(),
            is_mock: true,
            fallback_reason: Some(last_error),
            attempts: self.max_attempts,
            latency_ms: started.elapsed().as_millis() as i64,
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;

    use super::transport::{AgentTransport, TransportError};

    /// Never answers.
    pub struct HangingTransport;

    #[async_trait]
    impl AgentTransport for HangingTransport {
        fn name(&self) -> &'static str {
            "hanging"
        }

        async fn invoke(&self, _prompt: &str, _session_id: &str) -> Result<String, TransportError> {
            std::future::pending().await
        }
    }

    /// Fails the first `failures` calls, then echoes the prompt.
    pub struct FlakyTransport {
        pub failures: u32,
        pub calls: AtomicU32,
    }

    impl FlakyTransport {
        pub fn new(failures: u32) -> Self {
            Self {
                failures,
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl AgentTransport for FlakyTransport {
        fn name(&self) -> &'static str {
            "flaky"
        }

        async fn invoke(&self, prompt: &str, _session_id: &str) -> Result<String, TransportError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Err(TransportError::Status {
                    status: 503,
                    message: "agent warming up".to_string(),
                })
            } else {
                Ok(format!("echo: {prompt}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::test_support::{FlakyTransport, HangingTransport};
    use super::*;

    fn gateway(transport: Arc<FlakyTransport>, attempts: u32) -> AgentGateway {
        AgentGateway::new(
            Some(transport as Arc<dyn AgentTransport>),
            attempts,
            Duration::from_millis(1000),
            Duration::from_secs(60),
        )
    }

    #[tokio::test]
    async fn test_mock_mode_is_flagged_and_never_fails() {
        let gateway = AgentGateway::mock();
        assert!(gateway.is_mock());
        let reply = gateway
            .invoke(AgentTask::Concierge, "How do I apply?", "anon-concierge-abc")
            .await;
        assert!(reply.is_mock);
        assert!(reply.fallback_reason.is_none());
        assert!(reply.completion.starts_with("[MOCK]"));
        assert_eq!(reply.session_id, "anon-concierge-abc");
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_until_success() {
        let transport = Arc::new(FlakyTransport::new(2));
        let started = tokio::time::Instant::now();
        let reply = gateway(transport.clone(), 3)
            .invoke(AgentTask::CareerAdvice, "hello", "s")
            .await;
        assert!(!reply.is_mock);
        assert_eq!(reply.completion, "echo: hello");
        assert_eq!(reply.attempts, 3);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 3);
        // 1s + 2s of backoff
        assert!(started.elapsed() >= Duration::from_millis(3000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_fall_back_to_mock() {
        let transport = Arc::new(FlakyTransport::new(10));
        let reply = gateway(transport.clone(), 3)
            .invoke(AgentTask::GenerateQuestions, "questions please", "s")
            .await;
        assert!(reply.is_mock);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 3);
        let reason = reply.fallback_reason.unwrap();
        assert!(reason.contains("503"), "{reason}");
        let parsed = parse::parse_structured(&reply.completion);
        assert!(parsed["questions"].is_array());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unresponsive_agent_times_out_each_attempt() {
        let gateway = AgentGateway::new(
            Some(Arc::new(HangingTransport) as Arc<dyn AgentTransport>),
            2,
            Duration::from_millis(500),
            Duration::from_secs(5),
        );
        let started = tokio::time::Instant::now();
        let reply = gateway
            .invoke(AgentTask::Concierge, "anyone there?", "s")
            .await;
        assert!(reply.is_mock);
        assert_eq!(reply.attempts, 2);
        assert!(reply.fallback_reason.unwrap().contains("timed out"));
        // two 5s timeouts plus one 500ms pause
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(10_500));
        assert!(elapsed < Duration::from_secs(12));
    }

    #[test]
    fn test_backoff_doubles_and_is_capped() {
        let base = Duration::from_millis(1000);
        assert_eq!(backoff_delay(base, 1), Duration::from_secs(1));
        assert_eq!(backoff_delay(base, 2), Duration::from_secs(2));
        assert_eq!(backoff_delay(base, 3), Duration::from_secs(4));
        assert_eq!(backoff_delay(base, 40), MAX_BACKOFF);
        assert_eq!(backoff_delay(Duration::MAX, 2), MAX_BACKOFF);
    }

    #[test]
    fn test_attempts_are_clamped() {
        let transport = Arc::new(FlakyTransport::new(0));
        assert_eq!(gateway(transport.clone(), 0).max_attempts, 1);
        assert_eq!(gateway(transport, u32::MAX).max_attempts, MAX_ATTEMPTS);
    }

    #[test]
    fn test_session_id_format() {
        let id = new_session_id("42", AgentType::Concierge);
        assert!(id.starts_with("42-concierge-"));
        assert!(id.len() >= 33);
        let hex = id.rsplit('-').next().unwrap();
        assert_eq!(hex.len(), 32);
        assert!(hex.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
