//! Configuration, read from the environment at startup.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::llm::LlmBackend;

/// Default completion model (matches the deployed service).
const DEFAULT_MODEL: &str = "gpt-4o";

/// Default embedding model for the knowledge index.
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-ada-002";

/// Service configuration. Endpoint credentials, model names, and the
/// knowledge-base location are injected here — never hardcoded downstream.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Completion backend.
    pub backend: LlmBackend,
    /// Completion model name.
    pub model: String,
    /// API key for the completion backend.
    pub api_key: SecretString,
    /// API key for the embedding service (OpenAI).
    pub embedding_api_key: SecretString,
    /// Embedding model name.
    pub embedding_model: String,
    /// Directory holding the HTML knowledge base.
    pub knowledge_dir: PathBuf,
    /// HTTP listen port.
    pub port: u16,
    /// Bound on a single outbound completion/embedding call.
    pub upstream_timeout: Duration,
    /// Sessions idle longer than this are pruned.
    pub session_idle_timeout: Duration,
}

impl AppConfig {
    /// Read configuration from the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let backend: LlmBackend = env_or("HMO_CHAT_LLM_BACKEND", "openai")
            .parse()
            .map_err(|message| ConfigError::InvalidValue {
                key: "HMO_CHAT_LLM_BACKEND".to_string(),
                message,
            })?;

        let key_var = match backend {
            LlmBackend::OpenAi => "OPENAI_API_KEY",
            LlmBackend::Anthropic => "ANTHROPIC_API_KEY",
        };
        let api_key = require_env(key_var)?;
        // Embeddings always go through OpenAI
        let embedding_api_key = require_env("OPENAI_API_KEY")?;

        Ok(Self {
            backend,
            model: env_or("HMO_CHAT_MODEL", DEFAULT_MODEL),
            api_key: SecretString::from(api_key),
            embedding_api_key: SecretString::from(embedding_api_key),
            embedding_model: env_or("HMO_CHAT_EMBEDDING_MODEL", DEFAULT_EMBEDDING_MODEL),
            knowledge_dir: PathBuf::from(env_or("HMO_CHAT_KNOWLEDGE_DIR", "./data")),
            port: parse_env("HMO_CHAT_PORT", 8000)?,
            upstream_timeout: Duration::from_secs(parse_env(
                "HMO_CHAT_UPSTREAM_TIMEOUT_SECS",
                30,
            )?),
            session_idle_timeout: Duration::from_secs(parse_env(
                "HMO_CHAT_SESSION_IDLE_SECS",
                3600,
            )?),
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn require_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}
