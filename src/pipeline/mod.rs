// Pipelines: end-to-end runs composed from the themes building blocks.

pub mod analyze;
