// Database layer: storage for themed reviews and run state.
//
// SQLite (rusqlite, "bundled" so there's no system SQLite dependency) is the
// default backend; the file lives wherever REVIEWS_DB_PATH points (defaults
// to ./review_themes.db). PostgreSQL is available behind the `postgres`
// feature. Callers only see `Arc<dyn Database>`.

pub mod models;
pub mod traits;

#[cfg(feature = "sqlite")]
pub mod queries;
#[cfg(feature = "sqlite")]
pub mod schema;
#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "postgres")]
pub mod postgres;

use std::sync::Arc;

use anyhow::Result;

pub use traits::Database;

#[cfg(feature = "sqlite")]
use anyhow::Context;
#[cfg(feature = "sqlite")]
use rusqlite::Connection;
#[cfg(feature = "sqlite")]
use std::path::Path;

/// Open (or create) the SQLite database and bring its schema up to date.
///
/// Used by `init` and by `analyze --store` / `store`, which may be the first
/// command ever run against a fresh path.
#[cfg(feature = "sqlite")]
pub fn initialize_sqlite(db_path: &str) -> Result<Arc<dyn Database>> {
    let parent = Path::new(db_path).parent().filter(|p| !p.as_os_str().is_empty());
    if let Some(parent) = parent {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory for database: {db_path}"))?;
    }
    connect_sqlite(db_path)
}

/// Open an existing SQLite database; fails when the file is missing.
#[cfg(feature = "sqlite")]
pub fn open_sqlite(db_path: &str) -> Result<Arc<dyn Database>> {
    if !Path::new(db_path).exists() {
        anyhow::bail!("Database not found at {db_path}. Run `review-themes init` first.");
    }
    connect_sqlite(db_path)
}

#[cfg(feature = "sqlite")]
fn connect_sqlite(db_path: &str) -> Result<Arc<dyn Database>> {
    let conn = Connection::open(db_path)
        .with_context(|| format!("Failed to open database at {db_path}"))?;
    conn.pragma_update(None, "journal_mode", "WAL")
        .context("Failed to enable WAL journal mode")?;
    // Older files pick up migrations added since they were created.
    schema::create_tables(&conn)?;
    Ok(Arc::new(sqlite::SqliteDatabase::new(conn)))
}

/// Connect to PostgreSQL and run migrations.
#[cfg(feature = "postgres")]
pub async fn connect_postgres(database_url: &str) -> Result<Arc<dyn Database>> {
    let db = postgres::PgDatabase::connect(database_url).await?;
    Ok(Arc::new(db))
}
