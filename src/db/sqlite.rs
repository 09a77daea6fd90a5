// SQLite backend: one rusqlite Connection shared through an async mutex.
//
// rusqlite's Connection is !Send, so it sits in a tokio::sync::Mutex. Each
// method takes the lock, runs its synchronous query and releases the lock
// before returning; nothing awaits while holding it.

use anyhow::Result;
use async_trait::async_trait;
use rusqlite::Connection;
use tokio::sync::Mutex;

use super::models::{InsertOutcome, StoredReview, ThemeCount};
use super::traits::Database;

pub struct SqliteDatabase {
    conn: Mutex<Connection>,
}

impl SqliteDatabase {
    /// Wrap an already-opened rusqlite Connection.
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }
}

#[async_trait]
impl Database for SqliteDatabase {
    async fn table_count(&self) -> Result<i64> {
        let conn = self.conn.lock().await;
        super::schema::table_count(&conn)
    }

    async fn get_run_state(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock().await;
        super::queries::get_run_state(&conn, key)
    }

    async fn set_run_state(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn.lock().await;
        super::queries::set_run_state(&conn, key, value)
    }

    async fn get_all_run_state(&self) -> Result<Vec<(String, String)>> {
        let conn = self.conn.lock().await;
        super::queries::get_all_run_state(&conn)
    }

    async fn insert_reviews(&self, reviews: &[StoredReview]) -> Result<InsertOutcome> {
        let conn = self.conn.lock().await;
        super::queries::insert_reviews(&conn, reviews)
    }

    async fn review_count(&self) -> Result<i64> {
        let conn = self.conn.lock().await;
        super::queries::review_count(&conn)
    }

    async fn theme_distribution(&self) -> Result<Vec<ThemeCount>> {
        let conn = self.conn.lock().await;
        super::queries::theme_distribution(&conn)
    }

    async fn get_all_reviews(&self) -> Result<Vec<StoredReview>> {
        let conn = self.conn.lock().await;
        super::queries::get_all_reviews(&conn)
    }
}
