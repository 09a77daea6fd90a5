// Review source trait.
//
// The analysis only needs a table of reviews; where they come from (an
// exported CSV, a scraper, a database) is up to the implementor.

use anyhow::Result;

use super::models::ReviewTable;

pub trait ReviewSource {
    /// Load every review, validating the required columns.
    fn load(&self) -> Result<ReviewTable>;

    /// Human-readable description of where reviews come from, for logs.
    fn describe(&self) -> String;
}
