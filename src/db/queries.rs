// Database queries: CRUD operations for all tables.
//
// Every database interaction goes through this module. This keeps SQL
// contained in one place and gives the rest of the app clean Rust interfaces.

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::warn;

use super::models::{InsertOutcome, StoredReview, ThemeCount, DATE_FORMAT};
use crate::reviews::models::parse_review_date;

// --- Run state ---

/// Get a run state value by key (e.g., "last_analysis_at").
pub fn get_run_state(conn: &Connection, key: &str) -> Result<Option<String>> {
    let mut stmt = conn.prepare("SELECT value FROM run_state WHERE key = ?1")?;
    let result = stmt.query_row(params![key], |row| row.get(0)).optional()?;
    Ok(result)
}

/// Set a run state value (upsert).
pub fn set_run_state(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO run_state (key, value, updated_at)
         VALUES (?1, ?2, datetime('now'))
         ON CONFLICT(key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
        params![key, value],
    )?;
    Ok(())
}

/// Every run state entry, ordered by key.
pub fn get_all_run_state(conn: &Connection) -> Result<Vec<(String, String)>> {
    let mut stmt = conn.prepare("SELECT key, value FROM run_state ORDER BY key")?;
    let rows = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

// --- Themed reviews ---

/// Insert reviews, ignoring ids that are already stored.
///
/// Runs in one transaction. A row SQLite rejects is logged and counted as
/// failed; the rest of the batch still commits.
pub fn insert_reviews(conn: &Connection, reviews: &[StoredReview]) -> Result<InsertOutcome> {
    let tx = conn
        .unchecked_transaction()
        .context("Failed to start review insert transaction")?;
    let mut outcome = InsertOutcome::default();
    {
        let mut stmt = tx.prepare(
            "INSERT OR IGNORE INTO reviews_with_themes (
                review_id, bank_id, review_text, rating, review_date, bank_name,
                bank_code, source, sentiment_label, sentiment_score,
                sentiment_group, cleaned_text, keywords, theme
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        )?;

        for review in reviews {
            let review_date = review
                .review_date
                .map(|d| d.format(DATE_FORMAT).to_string());
            let result = stmt.execute(params![
                review.review_id,
                review.bank_id,
                review.review_text,
                review.rating,
                review_date,
                review.bank_name,
                review.bank_code,
                review.source,
                review.sentiment_label,
                review.sentiment_score,
                review.sentiment_group,
                review.cleaned_text,
                review.keywords,
                review.theme,
            ]);
            match result {
                Ok(0) => outcome.duplicates += 1,
                Ok(_) => outcome.inserted += 1,
                Err(e) => {
                    warn!(review_id = %review.review_id, error = %e, "Failed to insert review");
                    outcome.failed += 1;
                }
            }
        }
    }
    tx.commit().context("Failed to commit review inserts")?;
    Ok(outcome)
}

/// Total number of stored reviews.
pub fn review_count(conn: &Connection) -> Result<i64> {
    let count = conn.query_row("SELECT COUNT(*) FROM reviews_with_themes", [], |row| {
        row.get(0)
    })?;
    Ok(count)
}

/// Review counts per (bank, theme).
pub fn theme_distribution(conn: &Connection) -> Result<Vec<ThemeCount>> {
    let mut stmt = conn.prepare(
        "SELECT bank_code, COALESCE(theme, ''), COUNT(*)
         FROM reviews_with_themes
         GROUP BY bank_code, theme
         ORDER BY bank_code, theme",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok(ThemeCount {
                bank_code: row.get(0)?,
                theme: row.get(1)?,
                count: row.get(2)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// Every stored review, ordered by review_id.
pub fn get_all_reviews(conn: &Connection) -> Result<Vec<StoredReview>> {
    let mut stmt = conn.prepare(
        "SELECT review_id, bank_id, review_text, rating, review_date, bank_name,
                bank_code, source, sentiment_label, sentiment_score,
                sentiment_group, cleaned_text, keywords, theme
         FROM reviews_with_themes
         ORDER BY review_id",
    )?;
    let rows = stmt
        .query_map([], review_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

fn review_from_row(row: &Row<'_>) -> rusqlite::Result<StoredReview> {
    let review_date: Option<String> = row.get(4)?;
    Ok(StoredReview {
        review_id: row.get(0)?,
        bank_id: row.get(1)?,
        review_text: row.get(2)?,
        rating: row.get(3)?,
        review_date: review_date.as_deref().and_then(parse_review_date),
        bank_name: row.get(5)?,
        bank_code: row.get(6)?,
        source: row.get(7)?,
        sentiment_label: row.get(8)?,
        sentiment_score: row.get(9)?,
        sentiment_group: row.get(10)?,
        cleaned_text: row.get::<_, Option<String>>(11)?.unwrap_or_default(),
        keywords: row.get::<_, Option<String>>(12)?.unwrap_or_default(),
        theme: row.get::<_, Option<String>>(13)?.unwrap_or_default(),
    })
}
