// Review tables: typed records, CSV/JSON reading and writing.

pub mod files;
pub mod models;
pub mod traits;
