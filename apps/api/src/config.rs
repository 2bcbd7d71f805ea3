use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
/// Only `DATABASE_URL` is mandatory; everything else has a default or
/// switches a feature off when absent.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub db_max_connections: u32,
    pub port: u16,
    pub rust_log: String,
    /// Empty means permissive CORS (development).
    pub cors_allowed_origins: Vec<String>,
    pub token_ttl_hours: i64,
    pub s3_bucket: Option<String>,
    pub s3_endpoint: Option<String>,
    pub agent: AgentConfig,
}

/// Settings for the external AI agent. With neither `bedrock_agent_id` nor
/// `http_url` set the gateway runs in mock mode.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub aws_region: String,
    pub bedrock_agent_id: Option<String>,
    pub bedrock_agent_alias_id: String,
    pub http_url: Option<String>,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    pub max_attempts: u32,
    pub backoff_ms: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            aws_region: "us-east-1".to_string(),
            bedrock_agent_id: None,
            bedrock_agent_alias_id: "TSTALIASID".to_string(),
            http_url: None,
            api_key: None,
            timeout_secs: 60,
            max_attempts: 3,
            backoff_ms: 1000,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let defaults = AgentConfig::default();

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            db_max_connections: parse_env("DB_MAX_CONNECTIONS", 10)?,
            port: parse_env("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            cors_allowed_origins: split_list(
                &std::env::var("CORS_ALLOWED_ORIGINS").unwrap_or_default(),
            ),
            token_ttl_hours: parse_env("TOKEN_TTL_HOURS", 24)?,
            s3_bucket: optional_env("S3_BUCKET"),
            s3_endpoint: optional_env("S3_ENDPOINT"),
            agent: AgentConfig {
                aws_region: optional_env("AWS_REGION").unwrap_or(defaults.aws_region),
                bedrock_agent_id: optional_env("AWS_BEDROCK_AGENT_ID"),
                bedrock_agent_alias_id: optional_env("AWS_BEDROCK_AGENT_ALIAS_ID")
                    .unwrap_or(defaults.bedrock_agent_alias_id),
                http_url: optional_env("AGENT_HTTP_URL"),
                api_key: optional_env("AGENT_API_KEY"),
                timeout_secs: parse_env("AGENT_TIMEOUT_SECS", defaults.timeout_secs)?,
                max_attempts: parse_env("AGENT_MAX_ATTEMPTS", defaults.max_attempts)?,
                backoff_ms: parse_env("AGENT_BACKOFF_MS", defaults.backoff_ms)?,
            },
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

/// Returns `None` for unset or blank variables.
fn optional_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional_env(key) {
        Some(raw) => raw
            .parse::<T>()
            .with_context(|| format!("{key} has an invalid value: '{raw}'")),
        None => Ok(default),
    }
}

/// Splits a comma-separated list, dropping blanks.
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_list_trims_and_drops_blanks() {
        let origins = split_list(" http://localhost:3000, ,https://hr.example.com ,");
        assert_eq!(
            origins,
            vec!["http://localhost:3000", "https://hr.example.com"]
        );
    }

    #[test]
    fn test_split_list_empty() {
        assert!(split_list("").is_empty());
    }

    #[test]
    fn test_agent_defaults() {
        let agent = AgentConfig::default();
        assert_eq!(agent.max_attempts, 3);
        assert_eq!(agent.bedrock_agent_alias_id, "TSTALIASID");
        assert!(agent.bedrock_agent_id.is_none());
        assert!(agent.http_url.is_none());
    }
}
