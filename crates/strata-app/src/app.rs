//! The application: owns the world, the worker pool and the renderer, and
//! drives them from the heartbeat.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use glam::IVec3;
use strata_config::{CliArgs, Config, ConfigError};
use strata_world::{ParallelExecutor, World, WorldConfig};
use tracing::{debug, info, warn};

use crate::heartbeat::Heartbeat;
use crate::platform::PlatformError;
use crate::renderer::HeadlessRenderer;
use crate::storage::{ChunkStore, StorageError};

/// Startup failures.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Platform(#[from] PlatformError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("failed to spawn pipeline workers: {0}")]
    Workers(#[source] io::Error),
}

/// What a [`App::run`] call did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub ticks: u64,
    pub meshes: u64,
    pub chunks: usize,
    pub faces: usize,
    /// Chunks written to the chunk store at the end of the run.
    pub saved: usize,
}

/// The config file being watched, as it was last read from disk, and the
/// command-line flags layered on top of it.
struct ConfigSource {
    dir: PathBuf,
    file: Config,
    overrides: CliArgs,
}

pub struct App {
    config: Config,
    world: Arc<World>,
    executor: ParallelExecutor,
    renderer: HeadlessRenderer,
    heartbeat: Heartbeat,
    store: Option<ChunkStore>,
    config_source: Option<ConfigSource>,
}

impl App {
    pub fn new(config: Config) -> Result<Self, AppError> {
        let workers = config
            .pipeline
            .worker_threads
            .unwrap_or_else(ParallelExecutor::default_worker_count);
        let executor = ParallelExecutor::new(workers).map_err(AppError::Workers)?;

        let world = Arc::new(World::new(WorldConfig {
            seed: config.world.seed,
            sea_level: config.world.sea_level,
            stage_time_slice: Duration::from_micros(config.pipeline.stage_time_slice_us),
            mesh_builders: config.pipeline.mesh_builders,
        }));

        info!(
            seed = config.world.seed,
            workers,
            render_distance = config.world.render_distance,
            "world created"
        );

        Ok(Self {
            renderer: HeadlessRenderer::new(config.world.render_distance),
            heartbeat: Heartbeat::new(config.pipeline.tick_rate_hz),
            config,
            world,
            executor,
            store: None,
            config_source: None,
        })
    }

    /// Restores the chunks saved in `store` and sends future saves there.
    pub fn with_chunk_store(mut self, store: ChunkStore) -> Result<Self, AppError> {
        let restored = store.load_into(&self.world)?;
        info!(restored, dir = %store.dir().display(), "saved chunks loaded");
        self.store = Some(store);
        Ok(self)
    }

    /// Watches `config.ron` in `dir`. `file` is the config as read from
    /// disk; `overrides` are reapplied after every reload.
    pub fn with_config_source(mut self, dir: PathBuf, file: Config, overrides: CliArgs) -> Self {
        self.config_source = Some(ConfigSource {
            dir,
            file,
            overrides,
        });
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn world(&self) -> &Arc<World> {
        &self.world
    }

    pub fn renderer(&self) -> &HeadlessRenderer {
        &self.renderer
    }

    pub fn heartbeat(&self) -> &Heartbeat {
        &self.heartbeat
    }

    /// Moves the camera to `chunk`, requesting the chunks around it.
    pub fn set_camera_chunk(&mut self, chunk: IVec3) {
        self.renderer.set_camera_chunk(&self.world, chunk);
    }

    /// One simulation tick. Returns the number of chunks meshed.
    pub fn update(&mut self) -> usize {
        self.world.tick(&self.executor)
    }

    /// Collects finished meshes. Returns how many arrived.
    pub fn render(&mut self) -> usize {
        self.renderer.draw(&self.world)
    }

    /// Re-reads the watched config file. Returns `true` if the effective
    /// config changed.
    ///
    /// A new render distance applies at once. World and pipeline settings
    /// take effect on the next start.
    pub fn reload_config(&mut self) -> Result<bool, AppError> {
        let Some(source) = &mut self.config_source else {
            return Ok(false);
        };
        let Some(file) = source.file.reload(&source.dir)? else {
            return Ok(false);
        };
        let mut fresh = file.clone();
        fresh.apply_cli_overrides(&source.overrides);
        source.file = file;
        if fresh == self.config {
            return Ok(false);
        }

        if fresh.world.render_distance != self.config.world.render_distance {
            self.renderer
                .set_render_distance(&self.world, fresh.world.render_distance);
        }
        if fresh.world.seed != self.config.world.seed
            || fresh.world.sea_level != self.config.world.sea_level
            || fresh.pipeline != self.config.pipeline
        {
            warn!("world and pipeline settings take effect on restart");
        }
        info!(render_distance = fresh.world.render_distance, "config reloaded");
        self.config = fresh;
        Ok(true)
    }

    /// Writes every chunk edited since the last save. Without a chunk store
    /// the edits are dropped. Returns the number of chunks written.
    pub fn save(&self) -> Result<usize, AppError> {
        let saves = self.world.drain_saves();
        match &self.store {
            Some(store) => Ok(store.write_all(&saves)?),
            None => {
                if !saves.is_empty() {
                    debug!(count = saves.len(), "no chunk store, edits not persisted");
                }
                Ok(0)
            }
        }
    }

    /// Runs on the heartbeat until `ticks` ticks have passed, or with `None`
    /// until every requested mesh has been built and collected, then saves.
    ///
    /// The config file is checked for changes about once a second.
    pub fn run(&mut self, ticks: Option<u64>) -> Result<RunSummary, AppError> {
        if self.renderer.camera_chunk().is_none() {
            self.set_camera_chunk(IVec3::ZERO);
        }

        let reload_every = u64::from(self.config.pipeline.tick_rate_hz.max(1));
        let mut next_reload = reload_every;
        let mut ticks_run = 0u64;
        loop {
            let Self {
                world,
                executor,
                renderer,
                heartbeat,
                ..
            } = &mut *self;
            let world: &Arc<World> = world;
            let executor: &ParallelExecutor = executor;
            heartbeat.tick(
                |_, _| {
                    if ticks.is_none_or(|limit| ticks_run < limit) {
                        world.tick(executor);
                        ticks_run += 1;
                    }
                },
                |_| {
                    renderer.draw(world);
                },
            );

            let finished = match ticks {
                Some(limit) => ticks_run >= limit,
                None => {
                    ticks_run > 0
                        && world.stats().is_idle()
                        && world.builders().finished_len() == 0
                }
            };
            if finished {
                break;
            }

            if ticks_run >= next_reload {
                next_reload = ticks_run + reload_every;
                if let Err(err) = self.reload_config() {
                    warn!("config reload failed: {err}");
                }
            }
            std::thread::sleep(self.heartbeat.time_to_next_step());
        }

        let saved = self.save()?;
        let summary = RunSummary {
            ticks: ticks_run,
            meshes: self.renderer.meshes_received(),
            chunks: self.world.chunk_count(),
            faces: self.renderer.total_faces(),
            saved,
        };
        info!(
            ticks = summary.ticks,
            meshes = summary.meshes,
            chunks = summary.chunks,
            faces = summary.faces,
            saved = summary.saved,
            "run finished"
        );
        Ok(summary)
    }
}
