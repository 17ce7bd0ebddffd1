//! Mock backends for deterministic testing.
//!
//! Always compiled so downstream crates can drive their pipeline tests
//! without a live provider.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use mozaika_core::{EmbeddingBackend, Error, GenerationBackend, Result};

use crate::util::l2_normalize;

/// Scripted generation backend.
///
/// Responses are played back in order; when the script runs dry the
/// default response is returned. Every prompt is recorded for assertions.
#[derive(Clone)]
pub struct MockGenerationBackend {
    script: Arc<Mutex<VecDeque<Result<String>>>>,
    default_response: String,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl MockGenerationBackend {
    pub fn new() -> Self {
        Self {
            script: Arc::new(Mutex::new(VecDeque::new())),
            default_response: "{}".to_string(),
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Queue a successful response.
    pub fn push_response(self, response: impl Into<String>) -> Self {
        self.script
            .lock()
            .unwrap()
            .push_back(Ok(response.into()));
        self
    }

    /// Queue an error.
    pub fn push_error(self, error: Error) -> Self {
        self.script.lock().unwrap().push_back(Err(error));
        self
    }

    /// Set the response returned once the script is exhausted.
    pub fn with_default_response(mut self, response: impl Into<String>) -> Self {
        self.default_response = response.into();
        self
    }

    /// Prompts seen so far.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    /// Number of generate calls.
    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

impl Default for MockGenerationBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GenerationBackend for MockGenerationBackend {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        match self.script.lock().unwrap().pop_front() {
            Some(result) => result,
            None => Ok(self.default_response.clone()),
        }
    }

    async fn generate_with_system(&self, _system: &str, prompt: &str) -> Result<String> {
        self.generate(prompt).await
    }

    fn model_name(&self) -> &str {
        "mock-generation"
    }
}

/// Deterministic embedding backend.
///
/// Vectors are derived from a hash of the input text, so equal texts get
/// equal embeddings and distinct texts (almost always) get distinct ones.
#[derive(Clone)]
pub struct MockEmbeddingBackend {
    dimension: usize,
    calls: Arc<Mutex<Vec<Vec<String>>>>,
}

impl MockEmbeddingBackend {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Batches seen so far.
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }

    fn vector_for(&self, text: &str) -> Vec<f32> {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut v = Vec::with_capacity(self.dimension);
        for i in 0..self.dimension {
            let mut hasher = DefaultHasher::new();
            text.hash(&mut hasher);
            i.hash(&mut hasher);
            let h = hasher.finish();
            v.push(((h % 1000) as f32 / 500.0) - 1.0);
        }
        l2_normalize(v)
    }
}

#[async_trait]
impl EmbeddingBackend for MockEmbeddingBackend {
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.lock().unwrap().push(texts.to_vec());
        Ok(texts.iter().map(|t| self.vector_for(t)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        "mock-embedding"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_responses_play_in_order() {
        let backend = MockGenerationBackend::new()
            .push_response("first")
            .push_error(Error::RateLimited("busy".into()))
            .with_default_response("fallback");

        assert_eq!(backend.generate("a").await.unwrap(), "first");
        assert!(backend.generate("b").await.unwrap_err().is_rate_limited());
        assert_eq!(backend.generate("c").await.unwrap(), "fallback");
        assert_eq!(backend.call_count(), 3);
    }

    #[tokio::test]
    async fn embeddings_are_deterministic_and_normalized() {
        let backend = MockEmbeddingBackend::new(8);
        let a = backend
            .embed_texts(&["hello".to_string()])
            .await
            .unwrap();
        let b = backend
            .embed_texts(&["hello".to_string()])
            .await
            .unwrap();
        assert_eq!(a, b);

        let norm: f32 = a[0].iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }
}
