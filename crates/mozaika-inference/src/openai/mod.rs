//! OpenAI-compatible backend (OpenAI, DeepSeek, OpenRouter).

pub mod backend;
pub mod types;

pub use backend::{OpenAIBackend, OpenAIConfig, DEFAULT_OPENAI_URL};
