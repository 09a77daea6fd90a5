// Database trait: backend-agnostic async interface for all DB operations.
//
// Implementors: SqliteDatabase (wraps rusqlite), PgDatabase (wraps sqlx).
// All methods are async so both sync (rusqlite via Mutex) and native async
// (sqlx) backends fit behind a single interface.

use anyhow::Result;
use async_trait::async_trait;

use super::models::{InsertOutcome, StoredReview, ThemeCount};

#[async_trait]
pub trait Database: Send + Sync {
    // --- Lifecycle ---

    /// Count the number of user-created tables in the database.
    async fn table_count(&self) -> Result<i64>;

    // --- Run state ---

    /// Get a run state value by key (e.g., "last_analysis_at").
    async fn get_run_state(&self, key: &str) -> Result<Option<String>>;

    /// Set a run state value (upsert).
    async fn set_run_state(&self, key: &str, value: &str) -> Result<()>;

    /// Every run state entry, ordered by key.
    async fn get_all_run_state(&self) -> Result<Vec<(String, String)>>;

    // --- Themed reviews ---

    /// Insert reviews keyed by review_id. Existing ids are left untouched;
    /// a row the database rejects is logged and skipped.
    async fn insert_reviews(&self, reviews: &[StoredReview]) -> Result<InsertOutcome>;

    /// Total number of stored reviews.
    async fn review_count(&self) -> Result<i64>;

    /// Review counts per (bank, theme), ordered by bank then theme.
    async fn theme_distribution(&self) -> Result<Vec<ThemeCount>>;

    /// Every stored review, ordered by review_id.
    async fn get_all_reviews(&self) -> Result<Vec<StoredReview>>;
}
