//! AI search flow: query understanding, vector retrieval, profile
//! re-ranking, and answer synthesis.

use std::sync::Arc;

use tracing::{debug, info, warn};

use mozaika_core::{
    AiSearchRequest, AiSearchResponse, EmbeddingBackend, Error, EventSearchResult,
    GenerationBackend, QueryIntent, Result, VectorIndex,
};
use mozaika_inference::ExtractionClient;

use crate::rerank::apply_profile;

/// Number of results fed into answer synthesis.
const ANSWER_CONTEXT_SIZE: usize = 5;

/// Fallback answer when synthesis fails, by language.
const FALLBACK_ANSWER_UK: &str =
    "Знайдено події, які можуть вас зацікавити. Перегляньте результати вище.";
const FALLBACK_ANSWER_EN: &str =
    "Found events that might interest you. Please review the results above.";

/// Orchestrates the four-step AI search flow.
pub struct HybridSearchEngine {
    extraction: Arc<ExtractionClient>,
    embeddings: Arc<dyn EmbeddingBackend>,
    generation: Arc<dyn GenerationBackend>,
    index: Arc<dyn VectorIndex>,
}

impl HybridSearchEngine {
    pub fn new(
        extraction: Arc<ExtractionClient>,
        embeddings: Arc<dyn EmbeddingBackend>,
        generation: Arc<dyn GenerationBackend>,
        index: Arc<dyn VectorIndex>,
    ) -> Self {
        Self {
            extraction,
            embeddings,
            generation,
            index,
        }
    }

    /// Run an AI search.
    ///
    /// Query understanding failures, rate limits included, degrade to an
    /// unfiltered semantic search over the raw query.
    pub async fn search(&self, request: &AiSearchRequest) -> Result<AiSearchResponse> {
        let query = request.query.trim();
        if query.is_empty() {
            return Err(Error::InvalidInput("Query must not be empty".into()));
        }

        // Step 1: understand the query
        let intent = self
            .extraction
            .understand_query(query, request.profile_inline.as_ref())
            .await?
            .unwrap_or_else(|| {
                debug!(
                    subsystem = "search",
                    component = "hybrid",
                    "No query intent, falling back to raw query"
                );
                QueryIntent {
                    city: None,
                    country: None,
                    language: None,
                    is_remote: None,
                    date_from: None,
                    date_to: None,
                    categories_slugs: Vec::new(),
                    top_k: request.top_k,
                    user_query_rewritten: query.to_string(),
                }
            });

        // Step 2: vector retrieval
        let query_embedding = self
            .embeddings
            .embed_text(&intent.user_query_rewritten)
            .await?;

        let mut hits = self
            .index
            .search_similar(&query_embedding, &intent, intent.top_k)
            .await?;

        // Step 3: profile re-ranking
        if let Some(profile) = &request.profile_inline {
            apply_profile(&mut hits, profile);
        }

        // Step 4: answer synthesis
        let language = request
            .profile_inline
            .as_ref()
            .and_then(|p| p.languages.first())
            .map(String::as_str)
            .unwrap_or("uk");
        let chat_answer = self.synthesize_answer(query, &hits, language).await;

        info!(
            subsystem = "search",
            component = "hybrid",
            op = "ai_search",
            query = %query,
            result_count = hits.len(),
            "AI search completed"
        );

        Ok(AiSearchResponse { hits, chat_answer })
    }

    /// Generate a short natural-language answer over the top results.
    ///
    /// Generation failures degrade to a fixed sentence; search results
    /// are always worth returning even without prose.
    async fn synthesize_answer(
        &self,
        query: &str,
        hits: &[EventSearchResult],
        language: &str,
    ) -> String {
        let context = hits
            .iter()
            .take(ANSWER_CONTEXT_SIZE)
            .enumerate()
            .map(|(i, event)| {
                format!(
                    "{}. {}\n   Місто: {}\n   Дедлайн: {}\n   Категорії: {}",
                    i + 1,
                    event.title,
                    event.city.as_deref().unwrap_or("Не вказано"),
                    event
                        .deadline_at
                        .map(|d| d.format("%Y-%m-%d").to_string())
                        .unwrap_or_else(|| "Не вказано".to_string()),
                    if event.categories_slugs.is_empty() {
                        "Не вказано".to_string()
                    } else {
                        event.categories_slugs.join(", ")
                    },
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n");

        let prompt = if language == "uk" {
            format!(
                "Користувач шукає: {}\n\nЗнайдені події:\n{}\n\n\
                 Поясни українською мовою, які події найкраще підходять під запит і чому. \
                 Будь лаконічним (2-3 речення).",
                query, context
            )
        } else {
            format!(
                "User is searching for: {}\n\nFound events:\n{}\n\n\
                 Explain which events best match the query and why. Be concise (2-3 sentences).",
                query, context
            )
        };

        match self.generation.generate(&prompt).await {
            Ok(answer) => answer,
            Err(e) => {
                warn!(
                    subsystem = "search",
                    component = "hybrid",
                    op = "synthesize_answer",
                    error = %e,
                    "Answer synthesis failed, using fallback"
                );
                if language == "uk" {
                    FALLBACK_ANSWER_UK.to_string()
                } else {
                    FALLBACK_ANSWER_EN.to_string()
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use uuid::Uuid;

    use mozaika_core::{IndexableEvent, Profile};
    use mozaika_inference::{MockEmbeddingBackend, MockGenerationBackend};

    /// In-memory index returning a preset result list and recording the
    /// intent it was queried with.
    struct FakeIndex {
        results: Vec<EventSearchResult>,
        seen_intents: Mutex<Vec<QueryIntent>>,
    }

    impl FakeIndex {
        fn new(results: Vec<EventSearchResult>) -> Self {
            Self {
                results,
                seen_intents: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl VectorIndex for FakeIndex {
        async fn index_event(&self, _event: &IndexableEvent, _embedding: &[f32]) -> Result<()> {
            Ok(())
        }

        async fn search_similar(
            &self,
            _query_embedding: &[f32],
            intent: &QueryIntent,
            top_k: usize,
        ) -> Result<Vec<EventSearchResult>> {
            self.seen_intents.lock().unwrap().push(intent.clone());
            Ok(self.results.iter().take(top_k).cloned().collect())
        }

        async fn remove_event(&self, _event_id: Uuid) -> Result<()> {
            Ok(())
        }
    }

    fn hit(title: &str, score: f32) -> EventSearchResult {
        EventSearchResult {
            id: Uuid::new_v4(),
            title: title.to_string(),
            city: Some("Київ".to_string()),
            country: Some("UA".to_string()),
            language: "uk".to_string(),
            is_remote: Some(false),
            source_url: "https://example.com".to_string(),
            posted_at: None,
            occurs_from: None,
            occurs_to: None,
            deadline_at: None,
            status: "active".to_string(),
            categories_slugs: vec!["workshop".to_string()],
            score: Some(score),
            match_score: None,
            match_tier: None,
        }
    }

    fn engine_with(
        generation: MockGenerationBackend,
        index: Arc<FakeIndex>,
    ) -> HybridSearchEngine {
        let backend: Arc<dyn GenerationBackend> = Arc::new(generation);
        let extraction = Arc::new(ExtractionClient::new(
            Arc::clone(&backend),
            vec!["workshop".to_string()],
        ));
        HybridSearchEngine::new(
            extraction,
            Arc::new(MockEmbeddingBackend::new(8)),
            backend,
            index,
        )
    }

    fn request(query: &str) -> AiSearchRequest {
        serde_json::from_value(serde_json::json!({ "query": query })).unwrap()
    }

    #[tokio::test]
    async fn empty_query_is_rejected() {
        let index = Arc::new(FakeIndex::new(vec![]));
        let engine = engine_with(MockGenerationBackend::new(), index);
        let err = engine.search(&request("   ")).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn intent_filters_reach_the_index() {
        let index = Arc::new(FakeIndex::new(vec![hit("A", 0.9)]));
        // First call: query understanding; second call: synthesis
        let generation = MockGenerationBackend::new()
            .push_response(
                r#"{"city": "Львів", "top_k": 3, "user_query_rewritten": "хакатони"}"#,
            )
            .push_response("Ось найкращі події.");
        let engine = engine_with(generation, Arc::clone(&index));

        let response = engine.search(&request("хакатони у Львові")).await.unwrap();
        assert_eq!(response.chat_answer, "Ось найкращі події.");

        let intents = index.seen_intents.lock().unwrap();
        assert_eq!(intents.len(), 1);
        assert_eq!(intents[0].city.as_deref(), Some("Львів"));
        assert_eq!(intents[0].top_k, 3);
        assert_eq!(intents[0].user_query_rewritten, "хакатони");
    }

    #[tokio::test]
    async fn unusable_intent_falls_back_to_raw_query() {
        let index = Arc::new(FakeIndex::new(vec![hit("A", 0.9)]));
        let generation = MockGenerationBackend::new()
            .push_response("not json at all")
            .push_response("answer");
        let engine = engine_with(generation, Arc::clone(&index));

        engine.search(&request("воркшопи")).await.unwrap();

        let intents = index.seen_intents.lock().unwrap();
        assert_eq!(intents[0].user_query_rewritten, "воркшопи");
        assert!(intents[0].city.is_none());
        assert_eq!(intents[0].top_k, 12);
    }

    #[tokio::test]
    async fn profile_reranks_and_tiers_results() {
        let mut far = hit("Mismatch", 0.95);
        far.city = Some("Львів".to_string());
        far.language = "en".to_string();
        far.categories_slugs = vec!["concert".to_string()];
        far.is_remote = Some(true);
        let near = hit("Match", 0.6);
        let near_id = near.id;

        let index = Arc::new(FakeIndex::new(vec![far, near]));
        let generation = MockGenerationBackend::new()
            .push_response("broken intent")
            .push_response("answer");
        let engine = engine_with(generation, index);

        let mut request = request("воркшопи у Києві");
        request.profile_inline = Some(Profile {
            city: Some("Київ".to_string()),
            languages: vec!["uk".to_string()],
            preferred_categories: vec!["workshop".to_string()],
            remote_preference: None,
        });

        let response = engine.search(&request).await.unwrap();
        // near: 0.6*0.7 + 1.0*0.3 = 0.72 > far: 0.95*0.7 + 0*0.3 = 0.665
        assert_eq!(response.hits[0].id, near_id);
        assert!(response.hits.iter().all(|h| h.match_tier.is_some()));
    }

    #[tokio::test]
    async fn synthesis_failure_uses_fallback_sentence() {
        let index = Arc::new(FakeIndex::new(vec![hit("A", 0.9)]));
        let generation = MockGenerationBackend::new()
            .push_response("bad intent")
            .push_error(Error::Inference("model offline".into()));
        let engine = engine_with(generation, index);

        let response = engine.search(&request("події")).await.unwrap();
        assert_eq!(response.chat_answer, FALLBACK_ANSWER_UK);
        assert_eq!(response.hits.len(), 1);
    }

    #[tokio::test]
    async fn english_profile_gets_english_fallback() {
        let index = Arc::new(FakeIndex::new(vec![hit("A", 0.9)]));
        let generation = MockGenerationBackend::new()
            .push_response("bad intent")
            .push_error(Error::Inference("model offline".into()));
        let engine = engine_with(generation, index);

        let mut request = request("events");
        request.profile_inline = Some(Profile {
            languages: vec!["en".to_string()],
            ..Default::default()
        });

        let response = engine.search(&request).await.unwrap();
        assert_eq!(response.chat_answer, FALLBACK_ANSWER_EN);
    }

    #[tokio::test]
    async fn rate_limited_understanding_falls_back_to_raw_query() {
        let index = Arc::new(FakeIndex::new(vec![hit("A", 0.9)]));
        let generation = MockGenerationBackend::new()
            .push_error(Error::RateLimited("quota".into()))
            .push_response("answer");
        let engine = engine_with(generation, Arc::clone(&index));

        let response = engine.search(&request("події")).await.unwrap();
        assert_eq!(response.hits.len(), 1);

        let intents = index.seen_intents.lock().unwrap();
        assert_eq!(intents[0].user_query_rewritten, "події");
        assert!(intents[0].city.is_none());
    }
}
