//! Event repository implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use tracing::{debug, info, warn};
use uuid::Uuid;

use mozaika_core::{
    fingerprint, Category, Event, EventExtraction, EventRepository, EventSearchResult, Result,
    SearchRequest, SearchResponse,
};

use crate::filter::{build_order_clause, EventFilterBuilder, QueryParam};

/// PostgreSQL implementation of the event repository.
pub struct PgEventRepository {
    pool: PgPool,
}

impl PgEventRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EventRepository for PgEventRepository {
    /// Insert or refresh an event keyed by its dedupe fingerprint.
    ///
    /// A conflicting fingerprint refreshes the volatile fields
    /// (status and the occurrence/deadline dates) and bumps `updated_at`;
    /// the original text and discovery metadata are kept.
    ///
    /// Returns the event id and whether the row was newly inserted.
    async fn upsert_event(
        &self,
        source_type: &str,
        source_url: &str,
        posted_at: Option<DateTime<Utc>>,
        normalized_text: &str,
        extraction: &EventExtraction,
    ) -> Result<(Uuid, bool)> {
        let dedupe = fingerprint(source_url, &extraction.title, normalized_text);

        let row = sqlx::query(
            r#"
            INSERT INTO events (
                source_type, source_url, posted_at,
                occurs_from, occurs_to, deadline_at,
                language, title, raw_text,
                organizer, city, country, is_remote, apply_url,
                status, dedupe_fingerprint
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10,
                $11, $12, $13, $14, $15, $16
            )
            ON CONFLICT (dedupe_fingerprint)
            DO UPDATE SET
                updated_at = NOW(),
                status = EXCLUDED.status,
                occurs_from = EXCLUDED.occurs_from,
                occurs_to = EXCLUDED.occurs_to,
                deadline_at = EXCLUDED.deadline_at
            RETURNING id, (xmax = 0) AS is_new
            "#,
        )
        .bind(source_type)
        .bind(source_url)
        .bind(posted_at)
        .bind(extraction.occurs_from)
        .bind(extraction.occurs_to)
        .bind(extraction.deadline_at)
        .bind(&extraction.language)
        .bind(&extraction.title)
        .bind(normalized_text)
        .bind(&extraction.organizer)
        .bind(&extraction.city)
        .bind(&extraction.country)
        .bind(extraction.is_remote)
        .bind(&extraction.apply_url)
        .bind(&extraction.status)
        .bind(&dedupe)
        .fetch_one(&self.pool)
        .await?;

        let id: Uuid = row.try_get("id")?;
        let is_new: bool = row.try_get("is_new")?;

        info!(
            subsystem = "db",
            component = "events",
            op = "upsert_event",
            event_id = %id,
            is_new,
            "Event upserted"
        );
        Ok((id, is_new))
    }

    /// Link an event to the categories named by `slugs`.
    ///
    /// Unknown slugs are warned about and skipped; existing links are
    /// left untouched.
    async fn link_categories(&self, event_id: Uuid, slugs: &[String]) -> Result<()> {
        if slugs.is_empty() {
            return Ok(());
        }

        let known: Vec<String> =
            sqlx::query_scalar("SELECT slug FROM categories WHERE slug = ANY($1)")
                .bind(slugs)
                .fetch_all(&self.pool)
                .await?;

        let unknown: Vec<&String> = slugs.iter().filter(|s| !known.contains(s)).collect();
        if !unknown.is_empty() {
            warn!(
                subsystem = "db",
                component = "events",
                op = "link_categories",
                event_id = %event_id,
                unknown = ?unknown,
                "Skipping unknown category slugs"
            );
        }
        if known.is_empty() {
            return Ok(());
        }

        let result = sqlx::query(
            r#"
            INSERT INTO event_categories (event_id, category_id)
            SELECT $1, id FROM categories WHERE slug = ANY($2)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(event_id)
        .bind(&known)
        .execute(&self.pool)
        .await?;

        debug!(
            subsystem = "db",
            component = "events",
            op = "link_categories",
            event_id = %event_id,
            linked = result.rows_affected(),
            "Categories linked"
        );
        Ok(())
    }

    /// All known categories, ordered by slug.
    async fn get_categories(&self) -> Result<Vec<Category>> {
        let rows = sqlx::query("SELECT slug, name FROM categories ORDER BY slug")
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter()
            .map(|row| {
                Ok(Category {
                    slug: row.try_get("slug")?,
                    name: row.try_get("name")?,
                })
            })
            .collect()
    }

    /// Fetch a single event with its category slugs.
    async fn get_event(&self, id: Uuid) -> Result<Option<Event>> {
        let row = sqlx::query(
            r#"
            SELECT e.*,
                   array_agg(c.slug) FILTER (WHERE c.slug IS NOT NULL) AS categories
            FROM events e
            LEFT JOIN event_categories ec ON ec.event_id = e.id
            LEFT JOIN categories c ON c.id = ec.category_id
            WHERE e.id = $1
            GROUP BY e.id
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| {
            Ok(Event {
                id: row.try_get("id")?,
                source_type: row.try_get("source_type")?,
                source_url: row.try_get("source_url")?,
                discovered_at: row.try_get("discovered_at")?,
                posted_at: row.try_get("posted_at")?,
                occurs_from: row.try_get("occurs_from")?,
                occurs_to: row.try_get("occurs_to")?,
                deadline_at: row.try_get("deadline_at")?,
                language: row.try_get("language")?,
                title: row.try_get("title")?,
                raw_text: row.try_get("raw_text")?,
                organizer: row.try_get("organizer")?,
                city: row.try_get("city")?,
                country: row.try_get("country")?,
                is_remote: row.try_get("is_remote")?,
                apply_url: row.try_get("apply_url")?,
                status: row.try_get("status")?,
                dedupe_fingerprint: row.try_get("dedupe_fingerprint")?,
                created_at: row.try_get("created_at")?,
                updated_at: row.try_get("updated_at")?,
                categories: row
                    .try_get::<Option<Vec<String>>, _>("categories")?
                    .unwrap_or_default(),
            })
        })
        .transpose()
    }

    /// Filter search over active events.
    async fn search_events(&self, request: &SearchRequest) -> Result<SearchResponse> {
        request.validate()?;

        let (where_clause, params) = EventFilterBuilder::new(request, 0).build();

        let count_sql = format!("SELECT COUNT(*) FROM events e WHERE {}", where_clause);
        let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
        for param in &params {
            count_query = match param {
                QueryParam::Text(s) => count_query.bind(s),
                QueryParam::Bool(b) => count_query.bind(b),
                QueryParam::Timestamp(ts) => count_query.bind(ts),
                QueryParam::TextArray(arr) => count_query.bind(arr),
            };
        }
        let total = count_query.fetch_one(&self.pool).await?;

        let order_clause = build_order_clause(&request.sort_by, &request.order);
        let select_sql = format!(
            r#"
            SELECT e.id, e.title, e.city, e.country, e.language, e.is_remote,
                   e.source_url, e.posted_at, e.occurs_from, e.occurs_to,
                   e.deadline_at, e.status,
                   array_agg(c.slug) FILTER (WHERE c.slug IS NOT NULL) AS categories
            FROM events e
            LEFT JOIN event_categories ec ON ec.event_id = e.id
            LEFT JOIN categories c ON c.id = ec.category_id
            WHERE {}
            GROUP BY e.id
            {}
            LIMIT ${} OFFSET ${}
            "#,
            where_clause,
            order_clause,
            params.len() + 1,
            params.len() + 2,
        );

        let mut query = sqlx::query(&select_sql);
        for param in &params {
            query = match param {
                QueryParam::Text(s) => query.bind(s),
                QueryParam::Bool(b) => query.bind(b),
                QueryParam::Timestamp(ts) => query.bind(ts),
                QueryParam::TextArray(arr) => query.bind(arr),
            };
        }
        query = query.bind(request.size).bind(request.offset());

        let rows = query.fetch_all(&self.pool).await?;
        let hits = rows
            .into_iter()
            .map(|row| {
                Ok(EventSearchResult {
                    id: row.try_get("id")?,
                    title: row.try_get("title")?,
                    city: row.try_get("city")?,
                    country: row.try_get("country")?,
                    language: row.try_get("language")?,
                    is_remote: row.try_get("is_remote")?,
                    source_url: row.try_get("source_url")?,
                    posted_at: row.try_get("posted_at")?,
                    occurs_from: row.try_get("occurs_from")?,
                    occurs_to: row.try_get("occurs_to")?,
                    deadline_at: row.try_get("deadline_at")?,
                    status: row.try_get("status")?,
                    categories_slugs: row
                        .try_get::<Option<Vec<String>>, _>("categories")?
                        .unwrap_or_default(),
                    score: None,
                    match_score: None,
                    match_tier: None,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        debug!(
            subsystem = "db",
            component = "events",
            op = "search_events",
            result_count = hits.len(),
            total,
            "Filter search completed"
        );

        Ok(SearchResponse {
            hits,
            page: request.page,
            size: request.size,
            total,
        })
    }
}
