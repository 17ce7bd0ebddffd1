//! Application settings loaded from environment variables.

use crate::defaults;
use crate::error::{Error, Result};

/// Supported generation providers.
pub const SUPPORTED_PROVIDERS: &[&str] = &["anthropic", "openai", "deepseek", "openrouter"];

/// Application settings.
///
/// Loaded once at startup with [`Settings::from_env`] and passed to the
/// components that need it; there is no global instance.
#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: String,

    /// SQS-compatible queue URL. When absent the consumer is not started
    /// and the service runs in API-only mode.
    pub sqs_queue_url: Option<String>,
    pub aws_region: String,
    /// Override endpoint for LocalStack / ElasticMQ.
    pub aws_endpoint_url: Option<String>,

    /// One of [`SUPPORTED_PROVIDERS`].
    pub llm_provider: String,
    pub anthropic_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub deepseek_api_key: Option<String>,
    pub openrouter_api_key: Option<String>,

    pub embedding_model: String,

    pub api_host: String,
    pub api_port: u16,

    pub queue_poll_wait_secs: u64,
    pub queue_batch_size: usize,
    pub queue_visibility_timeout_secs: u64,
    pub max_extraction_retries: u32,
}

impl Settings {
    /// Load settings from the environment.
    ///
    /// `DATABASE_URL` is required; the API key matching `LLM_PROVIDER`
    /// is required. Everything else has a default.
    pub fn from_env() -> Result<Self> {
        let settings = Self {
            database_url: require_var("DATABASE_URL")?,
            sqs_queue_url: optional_var("SQS_QUEUE_URL"),
            aws_region: optional_var("AWS_REGION").unwrap_or_else(|| "us-east-1".to_string()),
            aws_endpoint_url: optional_var("AWS_ENDPOINT_URL"),
            llm_provider: optional_var("LLM_PROVIDER")
                .unwrap_or_else(|| "anthropic".to_string())
                .to_lowercase(),
            anthropic_api_key: optional_var("ANTHROPIC_API_KEY"),
            openai_api_key: optional_var("OPENAI_API_KEY"),
            deepseek_api_key: optional_var("DEEPSEEK_API_KEY"),
            openrouter_api_key: optional_var("OPENROUTER_API_KEY"),
            embedding_model: optional_var("EMBEDDING_MODEL")
                .unwrap_or_else(|| "intfloat/multilingual-e5-small".to_string()),
            api_host: optional_var("API_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            api_port: parse_var("API_PORT", 8000)?,
            queue_poll_wait_secs: parse_var(
                "SQS_POLL_INTERVAL_SECONDS",
                defaults::QUEUE_POLL_WAIT_SECS,
            )?,
            queue_batch_size: parse_var("SQS_BATCH_SIZE", defaults::QUEUE_BATCH_SIZE)?,
            queue_visibility_timeout_secs: parse_var(
                "SQS_VISIBILITY_TIMEOUT",
                defaults::QUEUE_VISIBILITY_TIMEOUT_SECS,
            )?,
            max_extraction_retries: parse_var(
                "SQS_MAX_RETRIES",
                defaults::MAX_EXTRACTION_RETRIES,
            )?,
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Check provider name and provider/key consistency.
    pub fn validate(&self) -> Result<()> {
        if !SUPPORTED_PROVIDERS.contains(&self.llm_provider.as_str()) {
            return Err(Error::Config(format!(
                "LLM_PROVIDER must be one of {:?}, got '{}'",
                SUPPORTED_PROVIDERS, self.llm_provider
            )));
        }
        let key = match self.llm_provider.as_str() {
            "anthropic" => &self.anthropic_api_key,
            "openai" => &self.openai_api_key,
            "deepseek" => &self.deepseek_api_key,
            "openrouter" => &self.openrouter_api_key,
            _ => unreachable!(),
        };
        if key.as_deref().map(str::trim).unwrap_or_default().is_empty() {
            return Err(Error::Config(format!(
                "{}_API_KEY is required when LLM_PROVIDER is '{}'",
                self.llm_provider.to_uppercase(),
                self.llm_provider
            )));
        }
        Ok(())
    }
}

fn require_var(name: &str) -> Result<String> {
    optional_var(name).ok_or_else(|| Error::Config(format!("{} is required", name)))
}

fn optional_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T> {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => v
            .trim()
            .parse()
            .map_err(|_| Error::Config(format!("{} has an invalid value: '{}'", name, v))),
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_settings() -> Settings {
        Settings {
            database_url: "postgres://localhost/mozaika".to_string(),
            sqs_queue_url: None,
            aws_region: "us-east-1".to_string(),
            aws_endpoint_url: None,
            llm_provider: "anthropic".to_string(),
            anthropic_api_key: Some("key".to_string()),
            openai_api_key: None,
            deepseek_api_key: None,
            openrouter_api_key: None,
            embedding_model: "intfloat/multilingual-e5-small".to_string(),
            api_host: "0.0.0.0".to_string(),
            api_port: 8000,
            queue_poll_wait_secs: 20,
            queue_batch_size: 10,
            queue_visibility_timeout_secs: 300,
            max_extraction_retries: 3,
        }
    }

    #[test]
    fn validate_accepts_matching_key() {
        assert!(base_settings().validate().is_ok());
    }

    #[test]
    fn validate_rejects_unknown_provider() {
        let mut s = base_settings();
        s.llm_provider = "gemini".to_string();
        assert!(matches!(s.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn validate_requires_key_for_provider() {
        let mut s = base_settings();
        s.llm_provider = "openai".to_string();
        let err = s.validate().unwrap_err();
        assert!(err.to_string().contains("OPENAI_API_KEY"));

        s.openai_api_key = Some("  ".to_string());
        assert!(s.validate().is_err());

        s.openai_api_key = Some("sk-test".to_string());
        assert!(s.validate().is_ok());
    }
}
