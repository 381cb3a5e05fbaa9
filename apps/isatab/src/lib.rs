//! # isatab
//!
//! Command-line surface over `isatab-core`.
//!
//! The library target exposes the command layer and the settings loaders so
//! integration tests can drive them without spawning the binary.

pub mod cli;
pub mod settings;
