//! # Formats
//!
//! Text formats at the table boundary. Pure transformations only; reading
//! and writing files is the app layer's job.

pub mod tsv;

pub use tsv::Table;
