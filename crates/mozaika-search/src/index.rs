//! pgvector-backed event index.
//!
//! One row per event in the `event_index` table. The jsonb metadata column
//! carries the filterable projection of the event, so similarity search
//! answers from this table alone. Timestamps live in the metadata as
//! RFC 3339 strings; those compare correctly as text.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pgvector::Vector;
use serde::Deserialize;
use sqlx::{PgPool, Row};
use tracing::{debug, trace};
use uuid::Uuid;

use mozaika_core::{
    Error, EventSearchResult, IndexableEvent, QueryIntent, Result, VectorIndex,
};

/// Filterable event projection stored in the metadata column.
#[derive(Debug, Deserialize)]
struct IndexMetadata {
    #[serde(default)]
    title: String,
    #[serde(default)]
    city: Option<String>,
    #[serde(default)]
    country: Option<String>,
    #[serde(default = "default_language")]
    language: String,
    #[serde(default)]
    is_remote: Option<bool>,
    #[serde(default)]
    source_url: String,
    #[serde(default)]
    posted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    occurs_from: Option<DateTime<Utc>>,
    #[serde(default)]
    occurs_to: Option<DateTime<Utc>>,
    #[serde(default)]
    deadline_at: Option<DateTime<Utc>>,
    #[serde(default = "default_status")]
    status: String,
    #[serde(default)]
    categories_slugs: Vec<String>,
}

fn default_language() -> String {
    "uk".to_string()
}

fn default_status() -> String {
    "active".to_string()
}

/// PostgreSQL implementation of the vector index.
pub struct PgVectorIndex {
    pool: PgPool,
    dimension: usize,
}

impl PgVectorIndex {
    pub fn new(pool: PgPool, dimension: usize) -> Self {
        Self { pool, dimension }
    }

    fn check_dimension(&self, embedding: &[f32]) -> Result<()> {
        if embedding.len() != self.dimension {
            return Err(Error::Search(format!(
                "Embedding dimension mismatch: expected {}, got {}",
                self.dimension,
                embedding.len()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl VectorIndex for PgVectorIndex {
    async fn index_event(&self, event: &IndexableEvent, embedding: &[f32]) -> Result<()> {
        self.check_dimension(embedding)?;

        sqlx::query(
            r#"
            INSERT INTO event_index (event_id, content, metadata, embedding)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (event_id)
            DO UPDATE SET
                content = EXCLUDED.content,
                metadata = EXCLUDED.metadata,
                embedding = EXCLUDED.embedding
            "#,
        )
        .bind(event.event_id)
        .bind(&event.content)
        .bind(&event.metadata)
        .bind(Vector::from(embedding.to_vec()))
        .execute(&self.pool)
        .await?;

        debug!(
            subsystem = "search",
            component = "vector_index",
            op = "index_event",
            event_id = %event.event_id,
            "Event indexed"
        );
        Ok(())
    }

    async fn search_similar(
        &self,
        query_embedding: &[f32],
        intent: &QueryIntent,
        top_k: usize,
    ) -> Result<Vec<EventSearchResult>> {
        self.check_dimension(query_embedding)?;

        // $1 is the query vector; filter parameters follow.
        let mut clauses: Vec<String> = vec!["metadata->>'status' = 'active'".to_string()];
        let mut text_params: Vec<String> = Vec::new();
        let mut bool_param: Option<bool> = None;
        let mut array_param: Option<Vec<String>> = None;
        let mut idx = 1usize;

        if let Some(city) = &intent.city {
            idx += 1;
            clauses.push(format!("metadata->>'city' = ${}", idx));
            text_params.push(city.clone());
        }
        if let Some(country) = &intent.country {
            idx += 1;
            clauses.push(format!("metadata->>'country' = ${}", idx));
            text_params.push(country.clone());
        }
        if let Some(language) = &intent.language {
            idx += 1;
            clauses.push(format!("metadata->>'language' = ${}", idx));
            text_params.push(language.clone());
        }
        // Same RFC 3339 "Z" form chrono's serde writes into the metadata,
        // so string comparison matches timestamp comparison.
        if let Some(date_from) = intent.date_from {
            idx += 1;
            clauses.push(format!("metadata->>'posted_at' >= ${}", idx));
            text_params.push(date_from.to_rfc3339_opts(chrono::SecondsFormat::AutoSi, true));
        }
        if let Some(date_to) = intent.date_to {
            idx += 1;
            clauses.push(format!("metadata->>'posted_at' <= ${}", idx));
            text_params.push(date_to.to_rfc3339_opts(chrono::SecondsFormat::AutoSi, true));
        }

        if let Some(is_remote) = intent.is_remote {
            idx += 1;
            clauses.push(format!("(metadata->>'is_remote')::boolean = ${}", idx));
            bool_param = Some(is_remote);
        }
        if !intent.categories_slugs.is_empty() {
            idx += 1;
            clauses.push(format!("metadata->'categories_slugs' ?| ${}", idx));
            array_param = Some(intent.categories_slugs.clone());
        }

        let sql = format!(
            r#"
            SELECT event_id, metadata, 1 - (embedding <=> $1) AS score
            FROM event_index
            WHERE {}
            ORDER BY embedding <=> $1
            LIMIT ${}
            "#,
            clauses.join(" AND "),
            idx + 1,
        );

        let mut query =
            sqlx::query(&sql).bind(Vector::from(query_embedding.to_vec()));
        for param in &text_params {
            query = query.bind(param);
        }
        if let Some(b) = bool_param {
            query = query.bind(b);
        }
        if let Some(arr) = &array_param {
            query = query.bind(arr);
        }
        query = query.bind(top_k as i64);

        let rows = query.fetch_all(&self.pool).await?;
        let mut results = Vec::with_capacity(rows.len());
        for row in rows {
            let event_id: Uuid = row.try_get("event_id")?;
            let metadata: serde_json::Value = row.try_get("metadata")?;
            let score: f64 = row.try_get("score")?;
            let meta: IndexMetadata = serde_json::from_value(metadata)
                .map_err(|e| Error::Search(format!("Bad index metadata: {}", e)))?;

            trace!(
                subsystem = "search",
                component = "vector_index",
                event_id = %event_id,
                score,
                "Search hit"
            );

            results.push(EventSearchResult {
                id: event_id,
                title: meta.title,
                city: meta.city,
                country: meta.country,
                language: meta.language,
                is_remote: meta.is_remote,
                source_url: meta.source_url,
                posted_at: meta.posted_at,
                occurs_from: meta.occurs_from,
                occurs_to: meta.occurs_to,
                deadline_at: meta.deadline_at,
                status: meta.status,
                categories_slugs: meta.categories_slugs,
                score: Some(score as f32),
                match_score: None,
                match_tier: None,
            });
        }

        debug!(
            subsystem = "search",
            component = "vector_index",
            op = "search_similar",
            result_count = results.len(),
            top_k,
            "Similarity search completed"
        );
        Ok(results)
    }

    async fn remove_event(&self, event_id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM event_index WHERE event_id = $1")
            .bind(event_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
