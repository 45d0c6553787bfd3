//! Saved chunks on disk.
//!
//! Each chunk lives in its own file named after its chunk coordinate, e.g.
//! `3_-1_0.chunk`. The contents are exactly the bytes produced by
//! [`World::drain_saves`]. Files are written to a temporary name first and
//! renamed into place, so a crash mid-write never leaves a torn chunk.

use std::io;
use std::path::{Path, PathBuf};

use glam::IVec3;
use strata_world::World;
use tracing::{debug, warn};

const EXTENSION: &str = "chunk";

/// Errors from reading or writing the chunk directory.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// A directory of saved chunks.
#[derive(Clone, Debug)]
pub struct ChunkStore {
    dir: PathBuf,
}

impl ChunkStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File holding the chunk at `pos`.
    pub fn path_for(&self, pos: IVec3) -> PathBuf {
        self.dir
            .join(format!("{}_{}_{}.{EXTENSION}", pos.x, pos.y, pos.z))
    }

    /// Restores every saved chunk into `world`. Returns how many were
    /// restored.
    ///
    /// A missing directory holds no chunks. Files that fail to decode are
    /// skipped with a warning so one bad chunk does not block startup.
    pub fn load_into(&self, world: &World) -> Result<usize, StorageError> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(source) => {
                return Err(StorageError::Read {
                    path: self.dir.clone(),
                    source,
                });
            }
        };

        let mut restored = 0;
        for entry in entries.flatten() {
            let path = entry.path();
            let Some(pos) = chunk_position(&path) else {
                continue;
            };
            let bytes = std::fs::read(&path).map_err(|source| StorageError::Read {
                path: path.clone(),
                source,
            })?;
            match world.restore_chunk(pos, bytes) {
                Ok(_) => restored += 1,
                Err(err) => warn!(path = %path.display(), "skipping saved chunk: {err}"),
            }
        }
        Ok(restored)
    }

    /// Writes each `(position, bytes)` pair to its chunk file.
    pub fn write_all(&self, saves: &[(IVec3, Vec<u8>)]) -> Result<usize, StorageError> {
        if saves.is_empty() {
            return Ok(0);
        }
        std::fs::create_dir_all(&self.dir).map_err(|source| StorageError::Write {
            path: self.dir.clone(),
            source,
        })?;

        for (pos, bytes) in saves {
            let path = self.path_for(*pos);
            let tmp = path.with_extension(format!("{EXTENSION}.tmp"));
            std::fs::write(&tmp, bytes)
                .and_then(|()| std::fs::rename(&tmp, &path))
                .map_err(|source| StorageError::Write {
                    path: path.clone(),
                    source,
                })?;
        }
        debug!(count = saves.len(), dir = %self.dir.display(), "chunks written");
        Ok(saves.len())
    }
}

/// Parses `x_y_z.chunk` back into a chunk coordinate.
fn chunk_position(path: &Path) -> Option<IVec3> {
    if path.extension()? != EXTENSION {
        return None;
    }
    let mut parts = path.file_stem()?.to_str()?.split('_');
    let x = parts.next()?.parse().ok()?;
    let y = parts.next()?.parse().ok()?;
    let z = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some(IVec3::new(x, y, z))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use strata_world::{ParallelExecutor, WorldConfig};

    #[test]
    fn test_file_name_roundtrip() {
        let store = ChunkStore::new("saves");
        let pos = IVec3::new(-3, 0, 12);
        let path = store.path_for(pos);
        assert_eq!(path, Path::new("saves").join("-3_0_12.chunk"));
        assert_eq!(chunk_position(&path), Some(pos));
    }

    #[test]
    fn test_foreign_files_ignored() {
        assert_eq!(chunk_position(Path::new("1_2_3.chunk.tmp")), None);
        assert_eq!(chunk_position(Path::new("1_2.chunk")), None);
        assert_eq!(chunk_position(Path::new("1_2_3_4.chunk")), None);
        assert_eq!(chunk_position(Path::new("a_b_c.chunk")), None);
        assert_eq!(chunk_position(Path::new("config.ron")), None);
    }

    #[test]
    fn test_missing_dir_loads_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ChunkStore::new(tmp.path().join("absent"));
        let world = World::new(WorldConfig::default());
        assert_eq!(store.load_into(&world).unwrap(), 0);
    }

    #[test]
    fn test_edited_chunk_survives_restart() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ChunkStore::new(tmp.path().join("data"));
        let target = IVec3::new(4, 40, 4);

        let world = Arc::new(World::new(WorldConfig::default()));
        let block = world.registry().lookup_by_name("glowstone").unwrap();
        let executor = ParallelExecutor::new(1).unwrap();
        world.set_block(target, block);
        for _ in 0..100 {
            world.tick(&executor);
            if world.stats().is_idle() {
                break;
            }
        }
        assert_eq!(store.write_all(&world.drain_saves()).unwrap(), 1);
        assert!(store.path_for(IVec3::new(0, 2, 0)).is_file());

        let reloaded = World::new(WorldConfig::default());
        assert_eq!(store.load_into(&reloaded).unwrap(), 1);
        assert_eq!(reloaded.get_block(target), block);
    }

    #[test]
    fn test_corrupt_file_is_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ChunkStore::new(tmp.path());
        std::fs::write(store.path_for(IVec3::ZERO), b"junk").unwrap();
        let world = World::new(WorldConfig::default());
        assert_eq!(store.load_into(&world).unwrap(), 0);
        assert_eq!(world.chunk_count(), 0);
    }
}
