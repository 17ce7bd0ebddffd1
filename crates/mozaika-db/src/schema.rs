//! Idempotent schema setup.

use sqlx::PgPool;
use tracing::info;

use mozaika_core::Result;

const SCHEMA_SQL: &str = include_str!("../schema.sql");

/// Apply the schema to the database.
///
/// Every statement is idempotent (`IF NOT EXISTS` / `ON CONFLICT DO
/// NOTHING`), so this is safe to run on every startup.
pub async fn ensure_schema(pool: &PgPool) -> Result<()> {
    sqlx::raw_sql(SCHEMA_SQL).execute(pool).await?;
    info!(
        subsystem = "db",
        component = "schema",
        op = "ensure",
        "Database schema applied"
    );
    Ok(())
}
