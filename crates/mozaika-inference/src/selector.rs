//! Backend selection from application settings.

use std::sync::Arc;

use tracing::info;

use mozaika_core::{EmbeddingBackend, Error, GenerationBackend, Result, Settings};

use crate::anthropic::{AnthropicBackend, AnthropicConfig};
use crate::openai::{OpenAIBackend, OpenAIConfig};

/// DeepSeek's OpenAI-compatible endpoint.
const DEEPSEEK_URL: &str = "https://api.deepseek.com/v1";

/// OpenRouter's OpenAI-compatible endpoint.
const OPENROUTER_URL: &str = "https://openrouter.ai/api/v1";

/// Build the generation backend named by `LLM_PROVIDER`.
pub fn create_generation_backend(settings: &Settings) -> Result<Arc<dyn GenerationBackend>> {
    let backend: Arc<dyn GenerationBackend> = match settings.llm_provider.as_str() {
        "anthropic" => {
            let config = AnthropicConfig {
                api_key: settings.anthropic_api_key.clone().unwrap_or_default(),
                ..Default::default()
            };
            Arc::new(AnthropicBackend::new(config)?)
        }
        "openai" => {
            let config = OpenAIConfig {
                api_key: settings.openai_api_key.clone().unwrap_or_default(),
                ..Default::default()
            };
            Arc::new(OpenAIBackend::new(config)?)
        }
        "deepseek" => {
            let config = OpenAIConfig {
                base_url: DEEPSEEK_URL.to_string(),
                api_key: settings.deepseek_api_key.clone().unwrap_or_default(),
                gen_model: "deepseek-chat".to_string(),
                ..Default::default()
            };
            Arc::new(OpenAIBackend::new(config)?)
        }
        "openrouter" => {
            let config = OpenAIConfig {
                base_url: OPENROUTER_URL.to_string(),
                api_key: settings.openrouter_api_key.clone().unwrap_or_default(),
                gen_model: "openai/gpt-4o-mini".to_string(),
                ..Default::default()
            };
            Arc::new(OpenAIBackend::new(config)?)
        }
        other => {
            return Err(Error::Config(format!(
                "Unsupported LLM provider '{}'",
                other
            )))
        }
    };

    info!(
        subsystem = "inference",
        component = "selector",
        provider = %settings.llm_provider,
        model = backend.model_name(),
        "Generation backend ready"
    );
    Ok(backend)
}

/// Build the embedding backend named by `EMBEDDING_MODEL`.
///
/// Local multilingual-e5 models run in process; `text-embedding-*` names
/// route to the OpenAI embeddings API and need `OPENAI_API_KEY`.
pub fn create_embedding_backend(settings: &Settings) -> Result<Arc<dyn EmbeddingBackend>> {
    if settings.embedding_model.starts_with("text-embedding-") {
        let api_key = settings.openai_api_key.clone().ok_or_else(|| {
            Error::Config("OPENAI_API_KEY is required for OpenAI embedding models".to_string())
        })?;
        let config = OpenAIConfig {
            api_key,
            embed_model: settings.embedding_model.clone(),
            ..Default::default()
        };
        return Ok(Arc::new(OpenAIBackend::new(config)?));
    }

    #[cfg(feature = "local-embeddings")]
    {
        let cache_dir = std::env::var("EMBEDDING_CACHE_DIR")
            .map(std::path::PathBuf::from)
            .unwrap_or_else(|_| std::path::PathBuf::from(".fastembed_cache"));
        let backend =
            crate::local::LocalEmbeddingBackend::new(&settings.embedding_model, cache_dir)?;
        Ok(Arc::new(backend))
    }

    #[cfg(not(feature = "local-embeddings"))]
    Err(Error::Config(format!(
        "Embedding model '{}' requires the local-embeddings feature",
        settings.embedding_model
    )))
}
