//! Local ONNX embedding backend built on fastembed.
//!
//! The default model is multilingual-e5-small (384 dimensions), which
//! handles Ukrainian and English text without a network dependency.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use tracing::{debug, info};

use mozaika_core::{defaults, EmbeddingBackend, Error, Result};

use crate::util::l2_normalize;

/// Canonical name of the default embedding model.
pub const DEFAULT_MODEL_NAME: &str = "intfloat/multilingual-e5-small";

/// Local embedding backend.
///
/// fastembed's `embed()` needs `&mut self`, so the model sits behind a
/// Mutex; batches run on the blocking pool to keep the async runtime free.
pub struct LocalEmbeddingBackend {
    model: Arc<Mutex<TextEmbedding>>,
    model_name: String,
    dimension: usize,
}

impl LocalEmbeddingBackend {
    /// Create a backend for the named model, caching weights under
    /// `cache_dir`. The model is downloaded on first use.
    pub fn new(model_name: &str, cache_dir: PathBuf) -> Result<Self> {
        let model_enum = parse_model_name(model_name)?;

        std::fs::create_dir_all(&cache_dir)?;

        info!(
            subsystem = "inference",
            component = "local_embeddings",
            model = model_name,
            "Loading embedding model"
        );

        let options = InitOptions::new(model_enum).with_cache_dir(cache_dir);
        let model = TextEmbedding::try_new(options)
            .map_err(|e| Error::Embedding(format!("Model initialization failed: {}", e)))?;

        Ok(Self {
            model: Arc::new(Mutex::new(model)),
            model_name: model_name.to_string(),
            dimension: defaults::EMBED_DIMENSION,
        })
    }

    /// Create a backend with the default multilingual model.
    pub fn with_defaults() -> Result<Self> {
        let cache_dir = std::env::var("EMBEDDING_CACHE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(".fastembed_cache"));
        Self::new(DEFAULT_MODEL_NAME, cache_dir)
    }
}

fn parse_model_name(name: &str) -> Result<EmbeddingModel> {
    match name {
        "intfloat/multilingual-e5-small" | "multilingual-e5-small" => {
            Ok(EmbeddingModel::MultilingualE5Small)
        }
        "intfloat/multilingual-e5-base" | "multilingual-e5-base" => {
            Ok(EmbeddingModel::MultilingualE5Base)
        }
        _ => Err(Error::Config(format!(
            "Unknown embedding model '{}'. Supported: multilingual-e5-small, multilingual-e5-base",
            name
        ))),
    }
}

#[async_trait]
impl EmbeddingBackend for LocalEmbeddingBackend {
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        debug!(
            subsystem = "inference",
            component = "local_embeddings",
            op = "embed_texts",
            count = texts.len(),
            "Embedding texts"
        );

        let model = Arc::clone(&self.model);
        let batch = texts.to_vec();
        let embeddings = tokio::task::spawn_blocking(move || {
            let mut model = model
                .lock()
                .map_err(|e| Error::Embedding(format!("Model lock poisoned: {}", e)))?;
            model
                .embed(batch, None)
                .map_err(|e| Error::Embedding(format!("Embedding generation failed: {}", e)))
        })
        .await
        .map_err(|e| Error::Embedding(format!("Embedding task panicked: {}", e)))??;

        Ok(embeddings.into_iter().map(l2_normalize).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}
