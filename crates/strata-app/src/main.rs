//! The `strata` binary.
//!
//! Run with: `cargo run -p strata-app -- --ticks 600`

use std::process::ExitCode;

use clap::Parser;
use strata_app::{App, AppError, ChunkStore, PlatformDirs};
use strata_config::{CliArgs, Config};
use tracing::{error, info};

fn main() -> ExitCode {
    let args = CliArgs::parse();

    let (file_config, dirs) = match prepare(&args) {
        Ok(prepared) => prepared,
        Err(err) => {
            strata_log::init_logging(None, false, None);
            error!("strata failed to start: {err}");
            return ExitCode::FAILURE;
        }
    };
    let mut config = file_config.clone();
    config.apply_cli_overrides(&args);

    strata_log::init_logging(
        Some(&dirs.log_dir),
        cfg!(debug_assertions) && config.debug.log_to_file,
        Some(&config),
    );
    info!(
        config = %dirs.config_dir.display(),
        data = %dirs.data_dir.display(),
        logs = %dirs.log_dir.display(),
        "strata starting"
    );

    match run(config, file_config, &dirs, &args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("strata stopped: {err}");
            ExitCode::FAILURE
        }
    }
}

/// Resolves and creates directories, then loads the config file as written
/// on disk.
fn prepare(args: &CliArgs) -> Result<(Config, PlatformDirs), AppError> {
    let mut dirs = PlatformDirs::resolve()?;
    if let Some(config_dir) = &args.config {
        dirs = dirs.with_config_dir(config_dir.clone());
    }
    dirs.create_dirs()?;

    let config = Config::load_or_create(&dirs.config_dir)?;
    Ok((config, dirs))
}

fn run(config: Config, file_config: Config, dirs: &PlatformDirs, args: &CliArgs) -> Result<(), AppError> {
    let mut app = App::new(config)?
        .with_chunk_store(ChunkStore::new(&dirs.data_dir))?
        .with_config_source(dirs.config_dir.clone(), file_config, args.clone());
    app.run(args.ticks)?;
    Ok(())
}
