// review-themes: per-bank thematic clustering of app store reviews
//
// This is the library root. Each module corresponds to a major subsystem:
// review tables in and out, the theme extraction core, the pipeline that
// sequences it, and persistence of the themed results.

pub mod config;
pub mod db;
pub mod output;
pub mod pipeline;
pub mod reviews;
pub mod status;
pub mod themes;
