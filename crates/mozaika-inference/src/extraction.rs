//! LLM-driven extraction of structured event data and search intent.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use mozaika_core::{
    defaults, Error, EventExtraction, GenerationBackend, Profile, QueryIntent, Result,
};

/// Prompt for turning a raw announcement into structured event fields.
const EXTRACTION_PROMPT: &str = r#"
Проаналізуй текст події та поверни JSON з наступними полями.

Доступні категорії (обирай лише з цього списку): {categories_list}

Поверни ЛИШЕ валідний JSON без пояснень:
{
  "title": "короткий заголовок (до 120 символів)",
  "language": "uk",
  "city": null або "Київ",
  "country": null або "UA",
  "is_remote": null або true або false,
  "organizer": null або "Назва організації",
  "apply_url": null або "https://...",
  "occurs_from": null або "2025-12-12T09:00:00Z",
  "occurs_to": null або "2025-12-12T17:00:00Z",
  "deadline_at": null або "2025-12-05T23:59:59Z",
  "status": "active",
  "categories_slugs": []
}

Правила:
- language (ОБОВ'ЯЗКОВО): ISO-639-1 код ('uk', 'en', 'pl')
- country: ISO-3166-1 alpha-2 ('UA', 'PL', null)
- Всі дати: ISO 8601 UTC
- is_remote=true для онлайн/дистанційних подій
- categories_slugs: лише зі списку вище, якщо невпевнений — []

Текст події:
{event_text}
"#;

/// Prompt for deriving structured search filters from a free-text query.
const QUERY_UNDERSTANDING_PROMPT: &str = r#"
Проаналізуй запит користувача та поверни JSON з фільтрами пошуку.

Доступні категорії: {categories_list}

Поверни ЛИШЕ валідний JSON:
{
  "city": null або "Київ",
  "country": null або "UA",
  "language": null або "uk",
  "is_remote": null або true або false,
  "date_from": null або "2025-12-01T00:00:00Z",
  "date_to": null або "2025-12-31T23:59:59Z",
  "categories_slugs": [],
  "top_k": 12,
  "user_query_rewritten": "короткий переформульований запит"
}

Правила:
- Використовуй null для відсутньої інформації
- Нормалізуй категорії до канонічних слугів
- Всі дати: ISO 8601 UTC

Запит: {user_query}

Профіль користувача: {user_profile}
"#;

/// Backoff before retrying a format failure (bad JSON, failed validation).
fn soft_backoff(attempt: u32) -> Duration {
    Duration::from_secs(1u64 << attempt)
}

/// Backoff before retrying a rate-limited call, capped at 30 seconds.
fn hard_backoff(attempt: u32) -> Duration {
    Duration::from_secs((5u64 << attempt).min(30))
}

/// Strip a surrounding markdown code fence from a model response.
fn strip_code_fence(response: &str) -> &str {
    let trimmed = response.trim();
    if !trimmed.starts_with("```") {
        return trimmed;
    }
    let inner = match trimmed.split("```").nth(1) {
        Some(inner) => inner,
        None => return trimmed,
    };
    inner.strip_prefix("json").unwrap_or(inner).trim()
}

/// Client for extraction and query-understanding calls.
///
/// Holds the category vocabulary so model output can be constrained to
/// known slugs before it reaches storage.
pub struct ExtractionClient {
    backend: Arc<dyn GenerationBackend>,
    categories: Vec<String>,
    categories_list: String,
    max_retries: u32,
}

impl ExtractionClient {
    pub fn new(backend: Arc<dyn GenerationBackend>, categories: Vec<String>) -> Self {
        let categories_list = categories.join(", ");
        Self {
            backend,
            categories,
            categories_list,
            max_retries: defaults::MAX_EXTRACTION_RETRIES,
        }
    }

    /// Override the retry budget.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    /// Extract structured event data from raw text.
    ///
    /// Outcomes:
    /// - `Ok(Some(..))` — a valid extraction
    /// - `Ok(None)` — the model kept producing unusable output; the text
    ///   is not an event worth retrying
    /// - `Err(Error::RateLimited)` — the provider is out of capacity; the
    ///   caller decides whether the work is redelivered
    pub async fn extract_event(&self, raw_text: &str) -> Result<Option<EventExtraction>> {
        let prompt = EXTRACTION_PROMPT
            .replace("{categories_list}", &self.categories_list)
            .replace("{event_text}", raw_text);

        for attempt in 0..self.max_retries {
            let response = match self.backend.generate(&prompt).await {
                Ok(response) => response,
                Err(e) if e.is_rate_limited() => {
                    if attempt + 1 < self.max_retries {
                        let backoff = hard_backoff(attempt);
                        warn!(
                            subsystem = "inference",
                            component = "extraction",
                            op = "extract_event",
                            attempt = attempt + 1,
                            backoff_secs = backoff.as_secs(),
                            "Rate limited, backing off"
                        );
                        tokio::time::sleep(backoff).await;
                        continue;
                    }
                    error!(
                        subsystem = "inference",
                        component = "extraction",
                        op = "extract_event",
                        "Rate limit persisted through all retries"
                    );
                    return Err(e);
                }
                Err(e) => {
                    if attempt + 1 < self.max_retries {
                        warn!(
                            subsystem = "inference",
                            component = "extraction",
                            op = "extract_event",
                            attempt = attempt + 1,
                            error = %e,
                            "Generation failed, retrying"
                        );
                        tokio::time::sleep(soft_backoff(attempt)).await;
                        continue;
                    }
                    error!(
                        subsystem = "inference",
                        component = "extraction",
                        op = "extract_event",
                        error = %e,
                        "Extraction failed after all retries"
                    );
                    return Ok(None);
                }
            };

            match self.parse_extraction(&response) {
                Ok(extraction) => {
                    info!(
                        subsystem = "inference",
                        component = "extraction",
                        op = "extract_event",
                        model = self.backend.model_name(),
                        title = %extraction.title,
                        "Extraction succeeded"
                    );
                    return Ok(Some(extraction));
                }
                Err(e) => {
                    if attempt + 1 < self.max_retries {
                        warn!(
                            subsystem = "inference",
                            component = "extraction",
                            op = "extract_event",
                            attempt = attempt + 1,
                            error = %e,
                            "Unusable model output, retrying"
                        );
                        tokio::time::sleep(soft_backoff(attempt)).await;
                    } else {
                        error!(
                            subsystem = "inference",
                            component = "extraction",
                            op = "extract_event",
                            error = %e,
                            "Extraction failed after all retries"
                        );
                        return Ok(None);
                    }
                }
            }
        }
        Ok(None)
    }

    fn parse_extraction(&self, response: &str) -> Result<EventExtraction> {
        let json = strip_code_fence(response);
        let mut extraction: EventExtraction = serde_json::from_str(json)?;
        extraction.validate()?;
        extraction.retain_known_categories(&self.categories);
        Ok(extraction)
    }

    /// Derive structured search filters from a user query.
    ///
    /// A single attempt: any failure degrades to `Ok(None)` and the caller
    /// falls back to plain semantic search over the raw query. Rate limits
    /// are no exception here; unlike ingestion there is nothing to
    /// redeliver, and an unfiltered search beats an error page.
    pub async fn understand_query(
        &self,
        user_query: &str,
        profile: Option<&Profile>,
    ) -> Result<Option<QueryIntent>> {
        let profile_str = match profile {
            Some(p) => serde_json::to_string(p)?,
            None => "Немає".to_string(),
        };
        let prompt = QUERY_UNDERSTANDING_PROMPT
            .replace("{categories_list}", &self.categories_list)
            .replace("{user_query}", user_query)
            .replace("{user_profile}", &profile_str);

        let response = match self.backend.generate(&prompt).await {
            Ok(response) => response,
            Err(e) => {
                warn!(
                    subsystem = "inference",
                    component = "extraction",
                    op = "understand_query",
                    error = %e,
                    "Query understanding failed"
                );
                return Ok(None);
            }
        };

        match serde_json::from_str::<QueryIntent>(strip_code_fence(&response)) {
            Ok(mut intent) => {
                intent
                    .categories_slugs
                    .retain(|slug| self.categories.iter().any(|c| c == slug));
                if intent.top_k == 0 {
                    intent.top_k = defaults::DEFAULT_TOP_K;
                }
                debug!(
                    subsystem = "inference",
                    component = "extraction",
                    op = "understand_query",
                    rewritten = %intent.user_query_rewritten,
                    "Query intent parsed"
                );
                Ok(Some(intent))
            }
            Err(e) => {
                warn!(
                    subsystem = "inference",
                    component = "extraction",
                    op = "understand_query",
                    error = %e,
                    "Unusable query intent output"
                );
                Ok(None)
            }
        }
    }
}
