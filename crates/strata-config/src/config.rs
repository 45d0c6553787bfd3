//! Configuration structs with defaults and RON persistence.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

const FILE_NAME: &str = "config.ron";

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// World generation settings.
    pub world: WorldSettings,
    /// Chunk pipeline settings.
    pub pipeline: PipelineSettings,
    /// Debug/development settings.
    pub debug: DebugSettings,
}

/// World generation settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WorldSettings {
    /// Seed for terrain and decoration.
    pub seed: u64,
    /// Radius, in chunks, of the sphere requested around the camera.
    pub render_distance: u32,
    /// Water fills open cells at or below this height.
    pub sea_level: i32,
}

/// Chunk pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineSettings {
    /// Worker threads besides the simulation thread. `None` uses hardware
    /// concurrency minus two.
    pub worker_threads: Option<usize>,
    /// Time each worker may spend in one stage per tick, in microseconds.
    pub stage_time_slice_us: u64,
    /// Number of pooled mesh builders.
    pub mesh_builders: usize,
    /// Simulation ticks per second.
    pub tick_rate_hz: u32,
}

/// Debug/development settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugSettings {
    /// Log level filter (e.g. "debug", "info", "strata_world=trace").
    pub log_level: String,
    /// Also write JSON logs to the log directory.
    pub log_to_file: bool,
}

// --- Default implementations ---

impl Default for WorldSettings {
    fn default() -> Self {
        Self {
            seed: 0,
            render_distance: 4,
            sea_level: 0,
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            worker_threads: None,
            stage_time_slice_us: 6000,
            mesh_builders: 64,
            tick_rate_hz: 60,
        }
    }
}

impl Default for DebugSettings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_to_file: cfg!(debug_assertions),
        }
    }
}

// --- Load / Save / Reload ---

impl Config {
    /// Load config from the given directory, or create a default config file.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join(FILE_NAME);

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path).map_err(|source| {
                ConfigError::Read {
                    path: config_path.clone(),
                    source,
                }
            })?;
            let config: Config = ron::from_str(&contents).map_err(ConfigError::Parse)?;
            log::info!("Loaded config from {}", config_path.display());
            Ok(config)
        } else {
            let config = Config::default();
            config.save(config_dir)?;
            log::info!("Created default config at {}", config_path.display());
            Ok(config)
        }
    }

    /// Save config to the given directory as `config.ron`.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        std::fs::create_dir_all(config_dir).map_err(|source| ConfigError::Write {
            path: config_dir.to_path_buf(),
            source,
        })?;

        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(3)
            .separate_tuple_members(true)
            .enumerate_arrays(false);
        let serialized =
            ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::Serialize)?;

        let config_path = config_dir.join(FILE_NAME);
        std::fs::write(&config_path, serialized).map_err(|source| ConfigError::Write {
            path: config_path,
            source,
        })?;
        Ok(())
    }

    /// Returns `Some(new_config)` if the file on disk differs from `self`.
    pub fn reload(&self, config_dir: &Path) -> Result<Option<Self>, ConfigError> {
        let config_path = config_dir.join(FILE_NAME);
        let contents = std::fs::read_to_string(&config_path).map_err(|source| ConfigError::Read {
            path: config_path.clone(),
            source,
        })?;
        let new_config: Config = ron::from_str(&contents).map_err(ConfigError::Parse)?;

        if &new_config != self {
            log::info!("Config reloaded with changes");
            Ok(Some(new_config))
        } else {
            Ok(None)
        }
    }
}
