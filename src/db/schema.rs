// SQLite schema and migrations.
//
// Migrations are an ordered list of (version, SQL) pairs. `schema_version`
// records which ones ran; each pending migration and its bookkeeping row are
// applied in one transaction, so a failed migration leaves no trace.

use anyhow::{Context, Result};
use rusqlite::Connection;

const BASE_SCHEMA: &str = "
    -- Reviews enriched with cleaned text, keywords and a per-bank theme
    CREATE TABLE IF NOT EXISTS reviews_with_themes (
        review_id TEXT PRIMARY KEY,
        bank_id TEXT,
        review_text TEXT,
        rating REAL,
        review_date TEXT,                  -- YYYY-MM-DD HH:MM:SS
        bank_name TEXT,
        bank_code TEXT NOT NULL,
        source TEXT,
        sentiment_label TEXT,
        sentiment_score REAL,
        sentiment_group TEXT,              -- e.g. positive / negative
        cleaned_text TEXT,
        keywords TEXT,                     -- comma-joined top terms
        theme TEXT,                        -- Theme_<k>, scoped to bank_code
        stored_at TEXT NOT NULL DEFAULT (datetime('now'))
    );

    -- Last analysis time, input file and summary
    CREATE TABLE IF NOT EXISTS run_state (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL,
        updated_at TEXT NOT NULL DEFAULT (datetime('now'))
    );

    CREATE INDEX IF NOT EXISTS idx_reviews_bank_theme
        ON reviews_with_themes(bank_code, theme);
";

// Positive/negative splits of stored reviews filter on sentiment_group.
const SENTIMENT_INDEX: &str = "
    CREATE INDEX IF NOT EXISTS idx_reviews_sentiment
        ON reviews_with_themes(sentiment_group);
";

const MIGRATIONS: &[(i64, &str)] = &[(1, BASE_SCHEMA), (2, SENTIMENT_INDEX)];

/// Bring the schema up to date. Safe on every startup.
pub fn create_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )
    .context("Failed to create schema_version table")?;

    for &(version, sql) in MIGRATIONS {
        apply_migration(conn, version, sql)?;
    }
    Ok(())
}

fn apply_migration(conn: &Connection, version: i64, sql: &str) -> Result<()> {
    let applied: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM schema_version WHERE version = ?1)",
        [version],
        |row| row.get(0),
    )?;
    if applied {
        return Ok(());
    }

    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(sql)
        .with_context(|| format!("Migration v{version} failed"))?;
    tx.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
    tx.commit()
        .with_context(|| format!("Failed to commit migration v{version}"))?;
    Ok(())
}

/// Number of user tables, reported by `init`.
pub fn table_count(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
        [],
        |row| row.get(0),
    )?;
    Ok(count)
}
