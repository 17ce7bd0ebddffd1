//! Data model for events, extractions, search requests, and profiles.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::defaults;
use crate::error::{Error, Result};

// =============================================================================
// QUEUE MESSAGES
// =============================================================================

/// Incoming queue message from a scraper.
///
/// `external_id` and `text` are required; everything else is optional.
/// `metadata.source_type` and `metadata.source_url` override the defaults
/// derived in [`QueueMessage::source_type`] / [`QueueMessage::source_url`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueMessage {
    pub external_id: String,
    pub text: String,
    #[serde(default)]
    pub source_id: Option<i64>,
    #[serde(default)]
    pub run_id: Option<i64>,
    #[serde(default)]
    pub posted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl QueueMessage {
    /// Parse a raw queue message body.
    pub fn parse(body: &str) -> Result<Self> {
        serde_json::from_str(body)
            .map_err(|e| Error::InvalidInput(format!("Malformed queue message: {}", e)))
    }

    /// Source type, defaulting to the scraper default when metadata is absent.
    pub fn source_type(&self) -> String {
        self.metadata
            .get("source_type")
            .and_then(|v| v.as_str())
            .unwrap_or(defaults::DEFAULT_SOURCE_TYPE)
            .to_string()
    }

    /// Canonical source URL, constructed from the external id when absent.
    pub fn source_url(&self) -> String {
        self.metadata
            .get("source_url")
            .and_then(|v| v.as_str())
            .map(String::from)
            .unwrap_or_else(|| format!("https://source.invalid/{}", self.external_id))
    }
}

// =============================================================================
// EXTRACTION
// =============================================================================

fn default_status() -> String {
    defaults::STATUS_ACTIVE.to_string()
}

/// Structured event data extracted from free text by the language model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventExtraction {
    pub title: String,
    /// ISO-639-1 code, always 2 lowercase letters after validation.
    pub language: String,
    #[serde(default)]
    pub city: Option<String>,
    /// ISO-3166-1 alpha-2, always 2 uppercase letters after validation.
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub is_remote: Option<bool>,
    #[serde(default)]
    pub organizer: Option<String>,
    #[serde(default)]
    pub apply_url: Option<String>,
    #[serde(default)]
    pub occurs_from: Option<DateTime<Utc>>,
    #[serde(default)]
    pub occurs_to: Option<DateTime<Utc>>,
    #[serde(default)]
    pub deadline_at: Option<DateTime<Utc>>,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default)]
    pub categories_slugs: Vec<String>,
}

impl EventExtraction {
    /// Maximum title length in characters.
    pub const MAX_TITLE_CHARS: usize = 120;

    /// Validate and canonicalize the extraction in place.
    ///
    /// Language is lower-cased, country upper-cased; both must be exactly
    /// two ASCII letters. A violation is a format failure the extraction
    /// retry loop treats as retryable.
    pub fn validate(&mut self) -> Result<()> {
        self.title = self.title.trim().to_string();
        if self.title.is_empty() {
            return Err(Error::InvalidInput("Extraction title is empty".into()));
        }
        if self.title.chars().count() > Self::MAX_TITLE_CHARS {
            return Err(Error::InvalidInput(format!(
                "Extraction title exceeds {} characters",
                Self::MAX_TITLE_CHARS
            )));
        }

        let lang = self.language.trim().to_lowercase();
        if lang.len() != 2 || !lang.chars().all(|c| c.is_ascii_lowercase()) {
            return Err(Error::InvalidInput(format!(
                "Language must be a 2-letter ISO-639-1 code, got '{}'",
                self.language
            )));
        }
        self.language = lang;

        if let Some(country) = &self.country {
            let country = country.trim().to_uppercase();
            if country.len() != 2 || !country.chars().all(|c| c.is_ascii_uppercase()) {
                return Err(Error::InvalidInput(format!(
                    "Country must be a 2-letter ISO-3166-1 alpha-2 code, got '{}'",
                    self.country.as_deref().unwrap_or_default()
                )));
            }
            self.country = Some(country);
        }

        if self.status.trim().is_empty() {
            self.status = default_status();
        }

        Ok(())
    }

    /// Keep only category slugs present in the known vocabulary.
    ///
    /// Unknown slugs are silently dropped, never an error.
    pub fn retain_known_categories(&mut self, known: &[String]) {
        self.categories_slugs
            .retain(|slug| known.iter().any(|k| k == slug));
    }
}

// =============================================================================
// PERSISTED EVENT
// =============================================================================

/// A persisted event row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub source_type: String,
    pub source_url: String,
    pub discovered_at: DateTime<Utc>,
    pub posted_at: Option<DateTime<Utc>>,
    pub occurs_from: Option<DateTime<Utc>>,
    pub occurs_to: Option<DateTime<Utc>>,
    pub deadline_at: Option<DateTime<Utc>>,
    pub language: String,
    pub title: String,
    pub raw_text: String,
    pub organizer: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub is_remote: Option<bool>,
    pub apply_url: Option<String>,
    pub status: String,
    pub dedupe_fingerprint: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub categories: Vec<String>,
}

/// A category reference entity (seeded out of band).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub slug: String,
    pub name: String,
}

// =============================================================================
// SEARCH
// =============================================================================

fn default_sort_by() -> String {
    "posted_at".to_string()
}

fn default_order() -> String {
    "desc".to_string()
}

fn default_page() -> i64 {
    1
}

fn default_size() -> i64 {
    defaults::DEFAULT_PAGE_SIZE
}

/// Filter-search request (GET /search).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    #[serde(default)]
    pub q: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub is_remote: Option<bool>,
    #[serde(default)]
    pub category: Vec<String>,
    #[serde(default)]
    pub posted_from: Option<DateTime<Utc>>,
    #[serde(default)]
    pub posted_to: Option<DateTime<Utc>>,
    #[serde(default)]
    pub occurs_from: Option<DateTime<Utc>>,
    #[serde(default)]
    pub occurs_to: Option<DateTime<Utc>>,
    #[serde(default)]
    pub deadline_before: Option<DateTime<Utc>>,
    #[serde(default)]
    pub deadline_after: Option<DateTime<Utc>>,
    /// One of: posted_at | deadline_at | occurs_from
    #[serde(default = "default_sort_by")]
    pub sort_by: String,
    /// One of: asc | desc
    #[serde(default = "default_order")]
    pub order: String,
    /// 1-indexed page.
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_size")]
    pub size: i64,
}

impl Default for SearchRequest {
    fn default() -> Self {
        Self {
            q: None,
            city: None,
            country: None,
            language: None,
            is_remote: None,
            category: Vec::new(),
            posted_from: None,
            posted_to: None,
            occurs_from: None,
            occurs_to: None,
            deadline_before: None,
            deadline_after: None,
            sort_by: default_sort_by(),
            order: default_order(),
            page: default_page(),
            size: default_size(),
        }
    }
}

impl SearchRequest {
    /// Validate paging and sort parameters.
    pub fn validate(&self) -> Result<()> {
        if self.page < 1 {
            return Err(Error::InvalidInput("page must be >= 1".into()));
        }
        if self.size < 1 || self.size > defaults::MAX_PAGE_SIZE {
            return Err(Error::InvalidInput(format!(
                "size must be between 1 and {}",
                defaults::MAX_PAGE_SIZE
            )));
        }
        if !matches!(self.sort_by.as_str(), "posted_at" | "deadline_at" | "occurs_from") {
            return Err(Error::InvalidInput(format!(
                "sort_by must be one of posted_at, deadline_at, occurs_from; got '{}'",
                self.sort_by
            )));
        }
        if !matches!(self.order.as_str(), "asc" | "desc") {
            return Err(Error::InvalidInput(format!(
                "order must be asc or desc; got '{}'",
                self.order
            )));
        }
        Ok(())
    }

    /// Row offset for the requested page.
    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.size
    }
}

/// Match tier summarizing a result's relevance to a user profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchTier {
    High,
    Medium,
    Low,
}

/// A single search hit: event projection plus optional scores.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventSearchResult {
    pub id: Uuid,
    pub title: String,
    pub city: Option<String>,
    pub country: Option<String>,
    pub language: String,
    pub is_remote: Option<bool>,
    pub source_url: String,
    pub posted_at: Option<DateTime<Utc>>,
    pub occurs_from: Option<DateTime<Utc>>,
    pub occurs_to: Option<DateTime<Utc>>,
    pub deadline_at: Option<DateTime<Utc>>,
    pub status: String,
    #[serde(default)]
    pub categories_slugs: Vec<String>,
    /// Semantic similarity score from vector retrieval.
    #[serde(default)]
    pub score: Option<f32>,
    /// Profile-adjusted score.
    #[serde(default)]
    pub match_score: Option<f32>,
    #[serde(default)]
    pub match_tier: Option<MatchTier>,
}

/// Filter-search response envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub hits: Vec<EventSearchResult>,
    pub page: i64,
    pub size: i64,
    pub total: i64,
}

// =============================================================================
// AI SEARCH
// =============================================================================

fn default_top_k() -> usize {
    defaults::DEFAULT_TOP_K
}

/// Structured filters derived from a free-text search query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryIntent {
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub is_remote: Option<bool>,
    #[serde(default)]
    pub date_from: Option<DateTime<Utc>>,
    #[serde(default)]
    pub date_to: Option<DateTime<Utc>>,
    #[serde(default)]
    pub categories_slugs: Vec<String>,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    pub user_query_rewritten: String,
}

/// Remote-work preference in a user profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemotePreference {
    Remote,
    Onsite,
    Any,
}

/// User profile supplied inline with an AI-search request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub languages: Vec<String>,
    #[serde(default)]
    pub preferred_categories: Vec<String>,
    #[serde(default)]
    pub remote_preference: Option<RemotePreference>,
}

/// AI-search request (POST /ai/search).
#[derive(Debug, Clone, Deserialize)]
pub struct AiSearchRequest {
    pub query: String,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default)]
    pub profile_inline: Option<Profile>,
}

/// AI-search response envelope.
#[derive(Debug, Clone, Serialize)]
pub struct AiSearchResponse {
    pub hits: Vec<EventSearchResult>,
    pub chat_answer: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_extraction() -> EventExtraction {
        EventExtraction {
            title: "Rust workshop in Kyiv".to_string(),
            language: "UK".to_string(),
            city: Some("Kyiv".to_string()),
            country: Some("ua".to_string()),
            is_remote: Some(false),
            organizer: None,
            apply_url: None,
            occurs_from: None,
            occurs_to: None,
            deadline_at: None,
            status: "active".to_string(),
            categories_slugs: vec!["workshop".to_string(), "bogus".to_string()],
        }
    }

    #[test]
    fn queue_message_parse_requires_text() {
        let err = QueueMessage::parse(r#"{"external_id": "m1"}"#);
        assert!(matches!(err, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn queue_message_defaults() {
        let msg = QueueMessage::parse(r#"{"external_id": "m1", "text": "hello"}"#).unwrap();
        assert_eq!(msg.source_type(), "telegram");
        assert_eq!(msg.source_url(), "https://source.invalid/m1");
    }

    #[test]
    fn queue_message_metadata_overrides() {
        let msg = QueueMessage::parse(
            r#"{"external_id": "m1", "text": "hi",
                "metadata": {"source_type": "web", "source_url": "https://example.com/p/1"}}"#,
        )
        .unwrap();
        assert_eq!(msg.source_type(), "web");
        assert_eq!(msg.source_url(), "https://example.com/p/1");
    }

    #[test]
    fn extraction_validate_canonicalizes_codes() {
        let mut ex = sample_extraction();
        ex.validate().unwrap();
        assert_eq!(ex.language, "uk");
        assert_eq!(ex.country.as_deref(), Some("UA"));
    }

    #[test]
    fn extraction_validate_rejects_bad_language() {
        let mut ex = sample_extraction();
        ex.language = "ukr".to_string();
        assert!(ex.validate().is_err());
    }

    #[test]
    fn extraction_validate_rejects_long_title() {
        let mut ex = sample_extraction();
        ex.title = "x".repeat(121);
        assert!(ex.validate().is_err());
    }

    #[test]
    fn extraction_retains_only_known_categories() {
        let mut ex = sample_extraction();
        let known = vec!["workshop".to_string(), "hackathon".to_string()];
        ex.retain_known_categories(&known);
        assert_eq!(ex.categories_slugs, vec!["workshop".to_string()]);
    }

    #[test]
    fn extraction_deserializes_with_defaults() {
        let ex: EventExtraction =
            serde_json::from_str(r#"{"title": "T", "language": "uk"}"#).unwrap();
        assert_eq!(ex.status, "active");
        assert!(ex.categories_slugs.is_empty());
        assert!(ex.city.is_none());
    }

    #[test]
    fn search_request_offset() {
        let req = SearchRequest {
            page: 3,
            size: 20,
            ..Default::default()
        };
        assert_eq!(req.offset(), 40);
    }

    #[test]
    fn search_request_validation() {
        let mut req = SearchRequest::default();
        assert!(req.validate().is_ok());

        req.page = 0;
        assert!(req.validate().is_err());

        req.page = 1;
        req.size = 101;
        assert!(req.validate().is_err());

        req.size = 20;
        req.sort_by = "embedding".to_string();
        assert!(req.validate().is_err());

        req.sort_by = "deadline_at".to_string();
        req.order = "sideways".to_string();
        assert!(req.validate().is_err());
    }

    #[test]
    fn query_intent_default_top_k() {
        let intent: QueryIntent =
            serde_json::from_str(r#"{"user_query_rewritten": "rust events"}"#).unwrap();
        assert_eq!(intent.top_k, 12);
    }

    #[test]
    fn match_tier_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&MatchTier::High).unwrap(), "\"high\"");
        assert_eq!(serde_json::to_string(&MatchTier::Low).unwrap(), "\"low\"");
    }

    #[test]
    fn remote_preference_deserializes_lowercase() {
        let p: RemotePreference = serde_json::from_str("\"onsite\"").unwrap();
        assert_eq!(p, RemotePreference::Onsite);
    }
}
