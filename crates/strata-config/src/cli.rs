//! Command-line argument parsing.

use std::path::PathBuf;

use clap::Parser;

use crate::Config;

/// strata command-line arguments.
///
/// CLI values override settings loaded from `config.ron`.
#[derive(Parser, Clone, Debug, Default)]
#[command(name = "strata", about = "Headless voxel world simulation")]
pub struct CliArgs {
    /// World seed.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Render distance in chunks.
    #[arg(long)]
    pub render_distance: Option<u32>,

    /// Pipeline worker threads.
    #[arg(long)]
    pub threads: Option<usize>,

    /// Stop after this many simulation ticks.
    #[arg(long)]
    pub ticks: Option<u64>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(seed) = args.seed {
            self.world.seed = seed;
        }
        if let Some(rd) = args.render_distance {
            self.world.render_distance = rd;
        }
        if let Some(threads) = args.threads {
            self.pipeline.worker_threads = Some(threads);
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
    }
}
