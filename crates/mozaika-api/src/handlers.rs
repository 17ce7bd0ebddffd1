//! HTTP handlers and error mapping.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::error;
use uuid::Uuid;

use mozaika_core::{
    defaults, AiSearchRequest, AiSearchResponse, Category, Error, Event, EventRepository,
    SearchRequest, SearchResponse,
};
use mozaika_ingest::ConsumerMetrics;
use mozaika_search::HybridSearchEngine;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub repository: Arc<dyn EventRepository>,
    pub search: Arc<HybridSearchEngine>,
    /// Present only when the queue consumer is running.
    pub consumer_metrics: Option<Arc<ConsumerMetrics>>,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/search", get(search_events))
        .route("/ai/search", post(ai_search))
        .route("/categories", get(list_categories))
        .route("/events/:id", get(get_event))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

// =============================================================================
// ERROR MAPPING
// =============================================================================

/// Error body shape: `{"detail": "..."}`.
pub enum ApiError {
    NotFound(String),
    Service(Error),
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self::Service(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            ApiError::NotFound(detail) => (StatusCode::NOT_FOUND, detail),
            ApiError::Service(Error::InvalidInput(detail)) => (StatusCode::BAD_REQUEST, detail),
            ApiError::Service(err) if err.is_rate_limited() => (
                StatusCode::SERVICE_UNAVAILABLE,
                "The service is briefly over capacity, please retry".to_string(),
            ),
            ApiError::Service(err) => {
                error!(
                    subsystem = "api",
                    component = "handlers",
                    error_msg = %err,
                    "Request failed"
                );
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };
        (status, Json(serde_json::json!({ "detail": detail }))).into_response()
    }
}

// =============================================================================
// QUERY PARAMETERS
// =============================================================================

/// Query-string form of a filter search.
///
/// Categories arrive as one comma-separated parameter
/// (`?category=workshop,hackathon`).
#[derive(Debug, Default, serde::Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub language: Option<String>,
    pub is_remote: Option<bool>,
    pub category: Option<String>,
    pub posted_from: Option<chrono::DateTime<chrono::Utc>>,
    pub posted_to: Option<chrono::DateTime<chrono::Utc>>,
    pub occurs_from: Option<chrono::DateTime<chrono::Utc>>,
    pub occurs_to: Option<chrono::DateTime<chrono::Utc>>,
    pub deadline_before: Option<chrono::DateTime<chrono::Utc>>,
    pub deadline_after: Option<chrono::DateTime<chrono::Utc>>,
    pub sort_by: Option<String>,
    pub order: Option<String>,
    pub page: Option<i64>,
    pub size: Option<i64>,
}

impl SearchQuery {
    pub fn into_request(self) -> SearchRequest {
        let defaults = SearchRequest::default();
        SearchRequest {
            q: self.q,
            city: self.city,
            country: self.country,
            language: self.language,
            is_remote: self.is_remote,
            category: self
                .category
                .map(|raw| {
                    raw.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_default(),
            posted_from: self.posted_from,
            posted_to: self.posted_to,
            occurs_from: self.occurs_from,
            occurs_to: self.occurs_to,
            deadline_before: self.deadline_before,
            deadline_after: self.deadline_after,
            sort_by: self.sort_by.unwrap_or(defaults.sort_by),
            order: self.order.unwrap_or(defaults.order),
            page: self.page.unwrap_or(defaults.page),
            size: self.size.unwrap_or(defaults.size),
        }
    }
}

// =============================================================================
// HANDLERS
// =============================================================================

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "consumer": state.consumer_metrics.as_ref().map(|m| m.snapshot()),
    }))
}

async fn search_events(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<SearchResponse>, ApiError> {
    let request = query.into_request();
    let response = state.repository.search_events(&request).await?;
    Ok(Json(response))
}

async fn ai_search(
    State(state): State<AppState>,
    Json(mut request): Json<AiSearchRequest>,
) -> Result<Json<AiSearchResponse>, ApiError> {
    if request.top_k == 0 || request.top_k > defaults::MAX_PAGE_SIZE as usize {
        request.top_k = defaults::DEFAULT_TOP_K;
    }
    let response = state.search.search(&request).await?;
    Ok(Json(response))
}

async fn list_categories(
    State(state): State<AppState>,
) -> Result<Json<Vec<Category>>, ApiError> {
    let categories = state.repository.get_categories().await?;
    Ok(Json(categories))
}

async fn get_event(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Event>, ApiError> {
    match state.repository.get_event(id).await? {
        Some(event) => Ok(Json(event)),
        None => Err(ApiError::NotFound(format!("Event {} not found", id))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_parameter_splits_on_commas() {
        let query = SearchQuery {
            category: Some("workshop, hackathon,,grant ".to_string()),
            ..Default::default()
        };
        let request = query.into_request();
        assert_eq!(request.category, vec!["workshop", "hackathon", "grant"]);
    }

    #[test]
    fn missing_parameters_fall_back_to_defaults() {
        let request = SearchQuery::default().into_request();
        assert_eq!(request.sort_by, "posted_at");
        assert_eq!(request.order, "desc");
        assert_eq!(request.page, 1);
        assert_eq!(request.size, 20);
        assert!(request.category.is_empty());
    }

    #[test]
    fn invalid_input_maps_to_400() {
        let response =
            ApiError::Service(Error::InvalidInput("bad sort".into())).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn rate_limit_maps_to_503() {
        let response =
            ApiError::Service(Error::RateLimited("quota".into())).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn other_errors_map_to_opaque_500() {
        let response =
            ApiError::Service(Error::Internal("secret details".into())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn missing_event_maps_to_404() {
        let response = ApiError::NotFound("Event x not found".into()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
