// PostgreSQL backend for shared deployments.
//
// Queries are built at runtime with sqlx-core, so building the crate never
// needs a live database. Dates are TIMESTAMP columns here where SQLite stores
// TEXT, and duplicate reviews are skipped with ON CONFLICT DO NOTHING.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use sqlx_core::pool::Pool;
use sqlx_core::row::Row;
use sqlx_postgres::{PgRow, Postgres};
use tracing::warn;

use super::models::{InsertOutcome, StoredReview, ThemeCount};
use super::traits::Database;

pub type PgPool = Pool<Postgres>;

pub struct PgDatabase {
    pool: PgPool,
}

impl PgDatabase {
    /// Connect to PostgreSQL and run migrations.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPool::connect(database_url)
            .await
            .with_context(|| {
                format!(
                    "Failed to connect to PostgreSQL at {}",
                    crate::config::redact_url(database_url)
                )
            })?;

        let db = Self { pool };
        db.run_migrations().await?;
        Ok(db)
    }

    /// Run all pending migrations.
    ///
    /// Holds a session-level advisory lock so two processes starting together
    /// don't apply the same migration twice. Session locks belong to the
    /// connection that took them, so lock and unlock run on one dedicated
    /// connection while the migrations themselves use the pool. The unlock
    /// runs even when a migration fails; the migration error wins.
    async fn run_migrations(&self) -> Result<()> {
        // ASCII "REVTHEME" as a big-endian i64.
        const MIGRATION_LOCK_KEY: i64 = 0x5245565448454D45_u64 as i64;

        let mut lock_conn = self
            .pool
            .acquire()
            .await
            .context("Failed to acquire connection for migration advisory lock")?;

        sqlx_core::query::query("SELECT pg_advisory_lock($1)")
            .bind(MIGRATION_LOCK_KEY)
            .execute(&mut *lock_conn)
            .await
            .context("Failed to acquire migration advisory lock")?;

        let migration_result: Result<()> = async {
            sqlx_core::query::query(
                "CREATE TABLE IF NOT EXISTS schema_version (
                    version INTEGER PRIMARY KEY,
                    applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                )",
            )
            .execute(&self.pool)
            .await?;

            let migrations = [
                (
                    1,
                    include_str!("../../migrations/postgres/0001_initial.sql"),
                ),
                (
                    2,
                    include_str!("../../migrations/postgres/0002_sentiment_index.sql"),
                ),
            ];

            for (version, sql) in migrations {
                let applied: bool = sqlx_core::query::query(
                    "SELECT COUNT(*) > 0 FROM schema_version WHERE version = $1",
                )
                .bind(version)
                .fetch_one(&self.pool)
                .await
                .map(|row| row.get::<bool, _>(0))
                .unwrap_or(false);

                if !applied {
                    // Each migration records its own schema_version row, so
                    // the transaction makes DDL and bookkeeping atomic.
                    let mut tx = self.pool.begin().await?;
                    sqlx_core::raw_sql::raw_sql(sql).execute(&mut *tx).await?;
                    tx.commit()
                        .await
                        .with_context(|| format!("Migration v{version} failed"))?;
                }
            }

            Ok(())
        }
        .await;

        let unlock_result = sqlx_core::query::query("SELECT pg_advisory_unlock($1)")
            .bind(MIGRATION_LOCK_KEY)
            .execute(&mut *lock_conn)
            .await
            .context("Failed to release migration advisory lock");

        migration_result?;
        unlock_result?;

        Ok(())
    }
}

fn review_from_row(row: &PgRow) -> StoredReview {
    StoredReview {
        review_id: row.get(0),
        bank_id: row.get(1),
        review_text: row.get(2),
        rating: row.get(3),
        review_date: row.get::<Option<NaiveDateTime>, _>(4),
        bank_name: row.get(5),
        bank_code: row.get(6),
        source: row.get(7),
        sentiment_label: row.get(8),
        sentiment_score: row.get(9),
        sentiment_group: row.get(10),
        cleaned_text: row.get::<Option<String>, _>(11).unwrap_or_default(),
        keywords: row.get::<Option<String>, _>(12).unwrap_or_default(),
        theme: row.get::<Option<String>, _>(13).unwrap_or_default(),
    }
}

#[async_trait]
impl Database for PgDatabase {
    async fn table_count(&self) -> Result<i64> {
        let row = sqlx_core::query::query(
            "SELECT COUNT(*)::bigint FROM information_schema.tables
             WHERE table_schema = 'public' AND table_type = 'BASE TABLE'",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(row.get::<i64, _>(0))
    }

    async fn get_run_state(&self, key: &str) -> Result<Option<String>> {
        let row = sqlx_core::query::query("SELECT value FROM run_state WHERE key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.get::<String, _>(0)))
    }

    async fn set_run_state(&self, key: &str, value: &str) -> Result<()> {
        sqlx_core::query::query(
            "INSERT INTO run_state (key, value, updated_at)
             VALUES ($1, $2, NOW())
             ON CONFLICT(key) DO UPDATE SET value = $2, updated_at = NOW()",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_all_run_state(&self) -> Result<Vec<(String, String)>> {
        let rows = sqlx_core::query::query("SELECT key, value FROM run_state ORDER BY key")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .iter()
            .map(|r| (r.get::<String, _>(0), r.get::<String, _>(1)))
            .collect())
    }

    async fn insert_reviews(&self, reviews: &[StoredReview]) -> Result<InsertOutcome> {
        // No surrounding transaction: one bad row would abort the rest of a
        // Postgres transaction, and failed rows are skipped, not fatal.
        let mut outcome = InsertOutcome::default();
        for review in reviews {
            let result = sqlx_core::query::query(
                "INSERT INTO reviews_with_themes (
                    review_id, bank_id, review_text, rating, review_date, bank_name,
                    bank_code, source, sentiment_label, sentiment_score,
                    sentiment_group, cleaned_text, keywords, theme
                 ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
                 ON CONFLICT (review_id) DO NOTHING",
            )
            .bind(&review.review_id)
            .bind(&review.bank_id)
            .bind(&review.review_text)
            .bind(review.rating)
            .bind(review.review_date)
            .bind(&review.bank_name)
            .bind(&review.bank_code)
            .bind(&review.source)
            .bind(&review.sentiment_label)
            .bind(review.sentiment_score)
            .bind(&review.sentiment_group)
            .bind(&review.cleaned_text)
            .bind(&review.keywords)
            .bind(&review.theme)
            .execute(&self.pool)
            .await;

            match result {
                Ok(done) if done.rows_affected() == 0 => outcome.duplicates += 1,
                Ok(_) => outcome.inserted += 1,
                Err(e) => {
                    warn!(review_id = %review.review_id, error = %e, "Failed to insert review");
                    outcome.failed += 1;
                }
            }
        }
        Ok(outcome)
    }

    async fn review_count(&self) -> Result<i64> {
        let row = sqlx_core::query::query("SELECT COUNT(*)::bigint FROM reviews_with_themes")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get::<i64, _>(0))
    }

    async fn theme_distribution(&self) -> Result<Vec<ThemeCount>> {
        let rows = sqlx_core::query::query(
            "SELECT bank_code, COALESCE(theme, ''), COUNT(*)::bigint
             FROM reviews_with_themes
             GROUP BY bank_code, theme
             ORDER BY bank_code, theme",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|r| ThemeCount {
                bank_code: r.get(0),
                theme: r.get(1),
                count: r.get(2),
            })
            .collect())
    }

    async fn get_all_reviews(&self) -> Result<Vec<StoredReview>> {
        let rows = sqlx_core::query::query(
            "SELECT review_id, bank_id, review_text, rating, review_date, bank_name,
                    bank_code, source, sentiment_label, sentiment_score,
                    sentiment_group, cleaned_text, keywords, theme
             FROM reviews_with_themes
             ORDER BY review_id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(review_from_row).collect())
    }
}
