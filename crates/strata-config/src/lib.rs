//! Configuration for the strata engine.
//!
//! Settings persist to disk as `config.ron`. Command-line flags override
//! loaded values, and missing fields fall back to defaults so older files
//! keep loading.

mod cli;
mod config;
mod error;

pub use cli::CliArgs;
pub use config::{Config, DebugSettings, PipelineSettings, WorldSettings};
pub use error::ConfigError;
