//! A chunk: palette-compressed blocks, a light map, pending edits, and the
//! atomic flags that drive it through the world pipeline.
//!
//! Chunks are shared between pipeline workers behind an `Arc`. Block data sits
//! behind a reader/writer lock so that meshing a neighbor can read while the
//! owning stage writes. Light values are individual atomics because flood fill
//! touches cells in many chunks at once.
//!
//! Each flag follows the same protocol: `mark_*` is a test-and-set that
//! returns `true` only for the caller that flipped it, and only that caller
//! enqueues the chunk. The flag is cleared once the queued work has finished.

use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};

use crossbeam_channel::{Receiver, Sender, unbounded};
use glam::IVec3;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::block_storage::BlockStorage;
use crate::coords::{CHUNK_VOLUME, boundary_faces, index_to_offset, offset_to_index};
use crate::light::{LIGHT_FULL, LIGHT_NONE, Light};
use crate::registry::{BlockId, BlockRegistry};

/// Edits applied per write-lock acquisition in [`Chunk::apply_changes`].
const EDIT_BATCH: usize = 256;

/// A queued block change.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockEdit {
    /// Cell index inside the chunk.
    pub index: usize,
    /// New block type.
    pub block: BlockId,
}

/// Summary of one [`Chunk::apply_changes`] call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AppliedChanges {
    /// Number of edits committed.
    pub applied: usize,
    /// Mask of chunk faces touched by a committed edit (see [`crate::Face::bit`]).
    pub boundary: u8,
}

/// One 16³ section of the world.
pub struct Chunk {
    position: IVec3,
    blocks: RwLock<BlockStorage>,
    light: Box<[AtomicU16]>,
    edits_tx: Sender<BlockEdit>,
    edits_rx: Receiver<BlockEdit>,
    decorated: AtomicBool,
    will_mesh: AtomicBool,
    dirty: AtomicBool,
    mesh_dirty: AtomicBool,
    will_save: AtomicBool,
}

impl Chunk {
    /// Creates an empty, undecorated, unlit chunk at chunk coordinate `position`.
    pub fn new(position: IVec3) -> Self {
        Self::from_parts(position, BlockStorage::new_air(), &[LIGHT_NONE; CHUNK_VOLUME])
    }

    /// Creates a chunk from existing storage and light values.
    pub fn from_parts(position: IVec3, blocks: BlockStorage, light: &[Light]) -> Self {
        debug_assert_eq!(light.len(), CHUNK_VOLUME);
        let (edits_tx, edits_rx) = unbounded();
        Self {
            position,
            blocks: RwLock::new(blocks),
            light: light.iter().map(|&l| AtomicU16::new(l)).collect(),
            edits_tx,
            edits_rx,
            decorated: AtomicBool::new(false),
            will_mesh: AtomicBool::new(false),
            dirty: AtomicBool::new(false),
            mesh_dirty: AtomicBool::new(false),
            will_save: AtomicBool::new(false),
        }
    }

    /// Chunk coordinate of this chunk.
    pub fn position(&self) -> IVec3 {
        self.position
    }

    // -- blocks ------------------------------------------------------------

    /// Shared access to the block storage.
    pub fn blocks(&self) -> RwLockReadGuard<'_, BlockStorage> {
        self.blocks.read()
    }

    /// Exclusive access to the block storage, for generation passes.
    pub fn blocks_mut(&self) -> RwLockWriteGuard<'_, BlockStorage> {
        self.blocks.write()
    }

    /// Returns the block at cell `index`.
    pub fn get_block(&self, index: usize) -> BlockId {
        self.blocks.read().get_block(index)
    }

    /// Writes a block directly, bypassing the edit queue.
    ///
    /// Used by terrain shaping and decoration, which own the chunk until it
    /// is marked decorated.
    pub fn set_block_at(&self, offset: IVec3, block: BlockId) {
        self.blocks.write().set_block(offset_to_index(offset), block);
    }

    /// Queues an edit for the apply stage.
    ///
    /// Returns `true` if this call made the chunk dirty, in which case the
    /// caller must push the chunk onto the apply queue.
    pub fn change_block_at(&self, offset: IVec3, block: BlockId) -> bool {
        self.queue_edit(BlockEdit {
            index: offset_to_index(offset),
            block,
        })
    }

    /// Queues an already-indexed edit. Same contract as
    /// [`change_block_at`](Self::change_block_at).
    pub fn queue_edit(&self, edit: BlockEdit) -> bool {
        // The receiver lives as long as `self`, so sending cannot fail.
        let _ = self.edits_tx.send(edit);
        self.mark_dirty()
    }

    /// Removes and returns every queued edit without applying it.
    pub fn take_edits(&self) -> Vec<BlockEdit> {
        self.edits_rx.try_iter().collect()
    }

    /// Number of queued, unapplied edits.
    pub fn pending_edits(&self) -> usize {
        self.edits_rx.len()
    }

    /// Drains the edit queue and commits every edit.
    ///
    /// Each edited cell's light is reset to full if the new block transmits
    /// light through its top face, or to zero otherwise. This is provisional;
    /// callers relight explicitly through the world's light operations.
    pub fn apply_changes(&self, registry: &BlockRegistry) -> AppliedChanges {
        let mut summary = AppliedChanges::default();
        loop {
            let batch: Vec<BlockEdit> = self.edits_rx.try_iter().take(EDIT_BATCH).collect();
            if batch.is_empty() {
                break;
            }
            let mut blocks = self.blocks.write();
            for edit in &batch {
                blocks.set_block(edit.index, edit.block);
                let light = if registry.is_transmissive(edit.block) {
                    LIGHT_FULL
                } else {
                    LIGHT_NONE
                };
                self.light[edit.index].store(light, Ordering::Relaxed);
                summary.boundary |= boundary_faces(index_to_offset(edit.index));
            }
            summary.applied += batch.len();
        }
        summary
    }

    // -- light -------------------------------------------------------------

    /// Returns the light value at cell `index`.
    pub fn light_at(&self, index: usize) -> Light {
        self.light[index].load(Ordering::Relaxed)
    }

    /// Stores a light value, returning the previous one.
    pub fn set_light(&self, index: usize, light: Light) -> Light {
        self.light[index].swap(light, Ordering::Relaxed)
    }

    /// Copies the light map out.
    pub fn light_snapshot(&self) -> Vec<Light> {
        self.light.iter().map(|l| l.load(Ordering::Relaxed)).collect()
    }

    // -- flags -------------------------------------------------------------

    /// Returns `true` once terrain and decoration are complete.
    pub fn is_decorated(&self) -> bool {
        self.decorated.load(Ordering::Acquire)
    }

    /// Publishes the chunk as fully generated.
    pub fn set_decorated(&self) {
        self.decorated.store(true, Ordering::Release);
    }

    /// Returns `true` if the renderer has asked for this chunk's mesh.
    pub fn wants_mesh(&self) -> bool {
        self.will_mesh.load(Ordering::Acquire)
    }

    /// Records a mesh request. Returns `true` for the first request only.
    pub fn request_mesh(&self) -> bool {
        !self.will_mesh.swap(true, Ordering::AcqRel)
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    /// Test-and-set on the dirty flag.
    pub fn mark_dirty(&self) -> bool {
        !self.dirty.swap(true, Ordering::AcqRel)
    }

    pub fn clear_dirty(&self) {
        self.dirty.store(false, Ordering::Release);
    }

    pub fn is_mesh_dirty(&self) -> bool {
        self.mesh_dirty.load(Ordering::Acquire)
    }

    /// Test-and-set on the mesh-dirty flag.
    pub fn mark_mesh_dirty(&self) -> bool {
        !self.mesh_dirty.swap(true, Ordering::AcqRel)
    }

    pub fn clear_mesh_dirty(&self) {
        self.mesh_dirty.store(false, Ordering::Release);
    }

    pub fn will_save(&self) -> bool {
        self.will_save.load(Ordering::Acquire)
    }

    /// Test-and-set on the save flag.
    pub fn mark_will_save(&self) -> bool {
        !self.will_save.swap(true, Ordering::AcqRel)
    }

    pub fn clear_will_save(&self) {
        self.will_save.store(false, Ordering::Release);
    }
}

impl std::fmt::Debug for Chunk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chunk")
            .field("position", &self.position)
            .field("decorated", &self.is_decorated())
            .field("dirty", &self.is_dirty())
            .field("mesh_dirty", &self.is_mesh_dirty())
            .field("pending_edits", &self.pending_edits())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::face::Face;
    use crate::registry::blocks;

    #[test]
    fn test_new_chunk_is_empty_and_undecorated() {
        let chunk = Chunk::new(IVec3::new(1, 2, 3));
        assert_eq!(chunk.position(), IVec3::new(1, 2, 3));
        assert!(!chunk.is_decorated());
        assert!(chunk.blocks().is_uniform(BlockId::AIR));
        assert_eq!(chunk.light_at(0), LIGHT_NONE);
    }

    #[test]
    fn test_flags_are_test_and_set() {
        let chunk = Chunk::new(IVec3::ZERO);
        assert!(chunk.mark_dirty());
        assert!(!chunk.mark_dirty());
        chunk.clear_dirty();
        assert!(chunk.mark_dirty());

        assert!(chunk.mark_mesh_dirty());
        assert!(!chunk.mark_mesh_dirty());
        assert!(chunk.request_mesh());
        assert!(!chunk.request_mesh());
        assert!(chunk.mark_will_save());
        assert!(!chunk.mark_will_save());
    }

    #[test]
    fn test_change_block_is_deferred_until_applied() {
        let registry = BlockRegistry::with_defaults();
        let chunk = Chunk::new(IVec3::ZERO);
        let offset = IVec3::new(4, 5, 6);

        assert!(chunk.change_block_at(offset, blocks::STONE));
        assert!(!chunk.change_block_at(offset, blocks::DIRT));
        assert_eq!(chunk.pending_edits(), 2);
        assert_eq!(chunk.get_block(offset_to_index(offset)), BlockId::AIR);

        let summary = chunk.apply_changes(&registry);
        assert_eq!(summary.applied, 2);
        assert_eq!(summary.boundary, 0);
        assert_eq!(chunk.pending_edits(), 0);
        assert_eq!(chunk.get_block(offset_to_index(offset)), blocks::DIRT);
    }

    #[test]
    fn test_apply_resets_light_by_top_face() {
        let registry = BlockRegistry::with_defaults();
        let chunk = Chunk::new(IVec3::ZERO);
        let solid = IVec3::new(1, 1, 1);
        let glass = IVec3::new(2, 2, 2);
        chunk.set_light(offset_to_index(solid), 0x8000);

        chunk.change_block_at(solid, blocks::STONE);
        chunk.change_block_at(glass, blocks::GLASS);
        chunk.apply_changes(&registry);

        assert_eq!(chunk.light_at(offset_to_index(solid)), LIGHT_NONE);
        assert_eq!(chunk.light_at(offset_to_index(glass)), LIGHT_FULL);
    }

    #[test]
    fn test_apply_reports_boundary_faces() {
        let registry = BlockRegistry::with_defaults();
        let chunk = Chunk::new(IVec3::ZERO);
        chunk.change_block_at(IVec3::new(0, 8, 8), blocks::STONE);
        chunk.change_block_at(IVec3::new(8, 15, 8), blocks::STONE);
        let summary = chunk.apply_changes(&registry);
        assert_eq!(summary.boundary, Face::NegX.bit() | Face::PosY.bit());
    }

    #[test]
    fn test_take_edits_moves_queue() {
        let source = Chunk::new(IVec3::ZERO);
        source.change_block_at(IVec3::new(1, 2, 3), blocks::STONE);
        source.change_block_at(IVec3::new(4, 5, 6), blocks::DIRT);
        let edits = source.take_edits();
        assert_eq!(edits.len(), 2);
        assert_eq!(source.pending_edits(), 0);

        let target = Chunk::new(IVec3::ZERO);
        let mut queued = false;
        for edit in edits {
            queued |= target.queue_edit(edit);
        }
        assert!(queued);
        assert_eq!(target.pending_edits(), 2);
    }

    #[test]
    fn test_large_edit_queue_drains_in_batches() {
        let registry = BlockRegistry::with_defaults();
        let chunk = Chunk::new(IVec3::ZERO);
        for index in 0..CHUNK_VOLUME {
            chunk.change_block_at(index_to_offset(index), blocks::STONE);
        }
        let summary = chunk.apply_changes(&registry);
        assert_eq!(summary.applied, CHUNK_VOLUME);
        assert!(chunk.blocks().is_uniform(blocks::STONE));
    }
}
