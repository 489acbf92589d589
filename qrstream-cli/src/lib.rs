//! Library entry for qrstream-cli used by integration tests and embedding.

pub mod commands;
pub mod config;
pub mod data_url;

// Re-export commands for convenience
pub use commands::*;

/// How a command prints its results
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human readable lines
    #[default]
    Text,
    /// One JSON document
    Json,
}
