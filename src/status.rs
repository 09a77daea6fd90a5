// System status display: database stats, stored themes, last analysis run.

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;

use crate::db::models::run_keys;
use crate::db::Database;

/// Display system status to the terminal.
///
/// `db_display_path` is the SQLite file path, or a redacted PostgreSQL URL
/// (in which case `is_file` is false and no size is shown).
pub async fn show(db: &Arc<dyn Database>, db_display_path: &str, is_file: bool) -> Result<()> {
    if is_file {
        let file_size = std::fs::metadata(Path::new(db_display_path))
            .map(|m| format_bytes(m.len()))
            .unwrap_or_else(|_| "unknown".to_string());
        println!("Database: {} ({})", db_display_path, file_size);
    } else {
        println!("Database: {}", db_display_path);
    }

    let total = db.review_count().await?;
    println!("Stored reviews: {total}");

    let distribution = db.theme_distribution().await?;
    crate::output::terminal::display_theme_distribution(&distribution);

    match db.get_run_state(run_keys::LAST_ANALYSIS_AT).await? {
        Some(at) => {
            let input = db
                .get_run_state(run_keys::LAST_ANALYSIS_INPUT)
                .await?
                .unwrap_or_else(|| "unknown input".to_string());
            println!("Last analysis: {at} ({input})");
        }
        None => println!("Last analysis: never stored"),
    }

    if let Some(at) = db.get_run_state(run_keys::LAST_STORE_AT).await? {
        println!("Last store: {at}");
    }

    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.0 MB");
    }
}
