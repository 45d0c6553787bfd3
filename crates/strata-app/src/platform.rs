//! OS-specific directory resolution.

use std::io;
use std::path::PathBuf;

const APP_NAME: &str = "strata";

/// Errors from resolving or creating platform directories.
#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    #[error("could not determine OS configuration directory")]
    NoConfigDir,
    #[error("failed to create {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Where strata keeps its files (XDG on Linux, Known Folders on Windows,
/// Library on macOS).
#[derive(Clone, Debug)]
pub struct PlatformDirs {
    /// `config.ron`.
    pub config_dir: PathBuf,
    /// Saved chunks.
    pub data_dir: PathBuf,
    /// Log files.
    pub log_dir: PathBuf,
}

impl PlatformDirs {
    /// Resolve directories without creating them.
    pub fn resolve() -> Result<Self, PlatformError> {
        let config_dir = dirs::config_dir()
            .ok_or(PlatformError::NoConfigDir)?
            .join(APP_NAME);
        let data_dir = dirs::data_dir()
            .map(|dir| dir.join(APP_NAME))
            .unwrap_or_else(|| config_dir.join("data"));

        Ok(Self {
            log_dir: config_dir.join("logs"),
            config_dir,
            data_dir,
        })
    }

    /// Replace the config directory, keeping the others.
    pub fn with_config_dir(mut self, config_dir: PathBuf) -> Self {
        self.config_dir = config_dir;
        self
    }

    pub fn create_dirs(&self) -> Result<(), PlatformError> {
        for dir in [&self.config_dir, &self.data_dir, &self.log_dir] {
            std::fs::create_dir_all(dir).map_err(|source| PlatformError::CreateDir {
                path: dir.clone(),
                source,
            })?;
        }
        Ok(())
    }
}
