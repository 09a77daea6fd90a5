// Colored terminal output for analysis reports and stored theme counts.
//
// This module handles all terminal-specific formatting. The main.rs command
// handlers delegate here.

use std::collections::BTreeMap;

use colored::Colorize;

use crate::db::models::ThemeCount;
use crate::reviews::models::ThemedTable;
use crate::themes::summary::GroupReport;

/// Display the per-bank theme breakdown of an analysis run.
pub fn display_group_reports(groups: &[GroupReport], vocabulary_size: usize) {
    if groups.is_empty() {
        println!("No reviews analyzed.");
        return;
    }

    let rows: usize = groups.iter().map(|g| g.rows).sum();
    println!(
        "\n{}",
        format!(
            "=== Themes ({} reviews, {} banks, {} terms) ===",
            rows,
            groups.len(),
            vocabulary_size
        )
        .bold()
    );

    for group in groups {
        println!();
        let status = if group.fallback {
            "too few reviews, single theme".yellow().to_string()
        } else if !group.converged {
            format!("did not converge (inertia {:.3})", group.inertia)
                .red()
                .to_string()
        } else {
            format!("converged (inertia {:.3})", group.inertia)
                .dimmed()
                .to_string()
        };
        println!(
            "  {} ({} reviews) {}",
            group.group.bold(),
            group.rows,
            status
        );

        for theme in &group.themes {
            let share = if group.rows > 0 {
                theme.size as f64 / group.rows as f64 * 100.0
            } else {
                0.0
            };
            let terms = if theme.top_terms.is_empty() {
                "(no terms)".dimmed().to_string()
            } else {
                theme.top_terms.join(", ")
            };
            println!(
                "    {:<9} {:>5} {:>5.1}%  {}",
                theme.theme.cyan(),
                theme.size,
                share,
                terms
            );
        }
    }
    println!();
}

/// Display a few example reviews per bank and theme.
pub fn display_sample_reviews(table: &ThemedTable, per_theme: usize) {
    if per_theme == 0 || table.is_empty() {
        return;
    }

    let mut samples: BTreeMap<(&str, &str), Vec<&str>> = BTreeMap::new();
    for row in &table.rows {
        let Some(text) = row.record.review_text.as_deref() else {
            continue;
        };
        let slot = samples
            .entry((row.record.bank_code.as_str(), row.theme.as_str()))
            .or_default();
        if slot.len() < per_theme {
            slot.push(text);
        }
    }

    println!("{}", "=== Sample Reviews ===".bold());
    let mut current_bank = "";
    for ((bank, theme), texts) in &samples {
        if *bank != current_bank {
            println!("\n  {}", bank.bold());
            current_bank = *bank;
        }
        for text in texts {
            let preview = super::truncate_chars(text, 100);
            println!("    {:<9} \"{}\"", theme.cyan(), preview.dimmed());
        }
    }
    println!();
}

/// Display stored review counts per bank and theme.
pub fn display_theme_distribution(counts: &[ThemeCount]) {
    if counts.is_empty() {
        println!("Stored themes: none yet");
        println!("  Run `review-themes analyze --input <csv> --store` to add some");
        return;
    }

    println!("Stored themes:");
    let mut current_bank = "";
    for count in counts {
        if count.bank_code != current_bank {
            let bank_total: i64 = counts
                .iter()
                .filter(|c| c.bank_code == count.bank_code)
                .map(|c| c.count)
                .sum();
            println!("  {} ({} reviews)", count.bank_code.bold(), bank_total);
            current_bank = count.bank_code.as_str();
        }
        let theme = if count.theme.is_empty() {
            "(none)"
        } else {
            count.theme.as_str()
        };
        println!("    {:<9} {:>6}", theme.cyan(), count.count);
    }
}
