//! The strata application: a headless driver for the voxel world pipeline.
//!
//! [`App`] owns everything explicitly. There is no global state; subsystems
//! receive what they need by reference.

pub mod app;
pub mod heartbeat;
pub mod platform;
pub mod renderer;
pub mod storage;

pub use app::{App, AppError, RunSummary};
pub use heartbeat::{DEFAULT_TICK_RATE_HZ, Heartbeat, MAX_FRAME_TIME};
pub use platform::{PlatformDirs, PlatformError};
pub use renderer::{HeadlessRenderer, MeshSummary};
pub use storage::{ChunkStore, StorageError};
