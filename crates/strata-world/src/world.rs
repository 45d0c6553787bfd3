//! The chunk map and the five-stage pipeline that moves chunks from
//! "requested" to "meshed".
//!
//! Every stage pulls chunk positions from a shared queue, so any number of
//! workers can run a stage at once without partitioning the work. Each worker
//! stops after its time slice even if the queue still has items; leftovers
//! carry over to the next tick.
//!
//! ```text
//! to_shape ─► shape ─► to_decorate ─► decorate ─► loaded ─► check ─► checked
//!
//! edits ─► dirty ─► apply ─┐
//!                          ├─► to_mesh ─► mesh ─► builder pool (finished)
//! mesh requests / light ───┘      ▲          │
//!                                 └─ failed ◄┘
//! ```

use std::cell::RefCell;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, unbounded};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use glam::{IVec3, Vec3};
use rustc_hash::FxHashSet;
use strata_lighting::{LightVolume, add_light, remove_light};
use strata_mesh::MeshBuilderPool;
use strata_voxel::{
    BlockId, BlockRegistry, Chunk, LIGHT_NONE, Light, SerialBuffer, SerialError,
    boundary_faces, boundary_neighbors, neighbor_offsets, offset_to_index, world_to_chunk,
};
use strata_terrain::TerrainGenerator;

use crate::executor::ParallelExecutor;
use crate::raycast::{RaycastHit, raycast};

/// Errors from world operations.
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    #[error("failed to restore chunk {position}: {source}")]
    Restore {
        position: IVec3,
        #[source]
        source: SerialError,
    },
}

/// World construction parameters.
#[derive(Clone, Debug)]
pub struct WorldConfig {
    pub seed: u64,
    pub sea_level: i32,
    /// Wall-clock budget per worker per stage.
    pub stage_time_slice: Duration,
    /// Number of pooled mesh builders.
    pub mesh_builders: usize,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            sea_level: 0,
            stage_time_slice: Duration::from_micros(6000),
            mesh_builders: 64,
        }
    }
}

/// Queue depths and chunk count at a point in time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub chunks: usize,
    pub to_shape: usize,
    pub to_decorate: usize,
    pub dirty: usize,
    pub to_mesh: usize,
    pub failed_mesh: usize,
    pub loaded: usize,
    pub checked: usize,
    pub to_save: usize,
    pub finished_meshes: usize,
}

impl PipelineStats {
    /// Returns `true` when no generation, apply, mesh or check work is waiting.
    pub fn is_idle(&self) -> bool {
        self.to_shape == 0
            && self.to_decorate == 0
            && self.dirty == 0
            && self.to_mesh == 0
            && self.failed_mesh == 0
            && self.loaded == 0
    }
}

/// Unbounded MPMC queue of chunk positions.
struct WorkQueue {
    tx: Sender<IVec3>,
    rx: Receiver<IVec3>,
}

impl WorkQueue {
    fn new() -> Self {
        let (tx, rx) = unbounded();
        Self { tx, rx }
    }

    fn push(&self, pos: IVec3) {
        // Both ends live in the same struct, so the channel never disconnects.
        let _ = self.tx.send(pos);
    }

    fn pop(&self) -> Option<IVec3> {
        self.rx.try_recv().ok()
    }

    fn len(&self) -> usize {
        self.rx.len()
    }
}

/// What a stage did with one dequeued position.
enum Step {
    Done,
    /// Handed off elsewhere without finishing; not counted.
    Deferred,
    /// Put the position back once this worker's slice is over.
    Retry,
}

pub struct World {
    chunks: DashMap<IVec3, Arc<Chunk>>,
    registry: BlockRegistry,
    generator: TerrainGenerator,
    builders: MeshBuilderPool,
    time_slice: Duration,

    to_shape: WorkQueue,
    to_decorate: WorkQueue,
    dirty: WorkQueue,
    to_mesh: WorkQueue,
    failed_mesh: WorkQueue,
    loaded: WorkQueue,
    to_save: WorkQueue,
    checked: WorkQueue,
}

impl World {
    /// A world over the default block set and noise terrain.
    pub fn new(config: WorldConfig) -> Self {
        let generator = TerrainGenerator::from_seed(config.seed, config.sea_level);
        Self::with_parts(config, BlockRegistry::with_defaults(), generator)
    }

    pub fn with_parts(config: WorldConfig, registry: BlockRegistry, generator: TerrainGenerator) -> Self {
        tracing::info!(
            seed = config.seed,
            sea_level = config.sea_level,
            mesh_builders = config.mesh_builders,
            "world created"
        );
        Self {
            chunks: DashMap::new(),
            registry,
            generator,
            builders: MeshBuilderPool::new(config.mesh_builders),
            time_slice: config.stage_time_slice,
            to_shape: WorkQueue::new(),
            to_decorate: WorkQueue::new(),
            dirty: WorkQueue::new(),
            to_mesh: WorkQueue::new(),
            failed_mesh: WorkQueue::new(),
            loaded: WorkQueue::new(),
            to_save: WorkQueue::new(),
            checked: WorkQueue::new(),
        }
    }

    pub fn registry(&self) -> &BlockRegistry {
        &self.registry
    }

    pub fn generator(&self) -> &TerrainGenerator {
        &self.generator
    }

    /// The mesh builder pool. The renderer takes finished builders from it
    /// and releases them after upload.
    pub fn builders(&self) -> &MeshBuilderPool {
        &self.builders
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    // -- chunk access --------------------------------------------------------

    /// Returns the chunk at `pos` if it exists.
    pub fn get_chunk(&self, pos: IVec3) -> Option<Arc<Chunk>> {
        self.chunks.get(&pos).map(|entry| Arc::clone(entry.value()))
    }

    /// Returns the chunk at `pos`, creating it and queueing it for shaping
    /// if this is the first reference.
    pub fn get_or_queue_chunk(&self, pos: IVec3) -> Arc<Chunk> {
        if let Some(chunk) = self.get_chunk(pos) {
            return chunk;
        }
        let chunk = match self.chunks.entry(pos) {
            Entry::Occupied(entry) => return Arc::clone(entry.get()),
            Entry::Vacant(entry) => {
                let chunk = Arc::new(Chunk::new(pos));
                entry.insert(Arc::clone(&chunk));
                chunk
            }
        };
        self.to_shape.push(pos);
        tracing::trace!(chunk = ?pos, "chunk queued for shaping");
        chunk
    }

    /// Like [`get_or_queue_chunk`](Self::get_or_queue_chunk), and also
    /// requests a mesh. All 26 neighbors are created too, since meshing
    /// cannot start until they are decorated.
    pub fn get_or_queue_chunk_with_mesh(&self, pos: IVec3) -> Arc<Chunk> {
        for offset in neighbor_offsets() {
            self.get_or_queue_chunk(pos + offset);
        }
        let chunk = self.get_or_queue_chunk(pos);
        if chunk.request_mesh() {
            self.mark_mesh_dirty(&chunk);
        }
        chunk
    }

    /// Requests meshes for `center + offset` for every offset, in order.
    pub fn request_around(&self, center: IVec3, offsets: &[IVec3]) {
        for offset in offsets {
            self.get_or_queue_chunk_with_mesh(center + *offset);
        }
    }

    /// Queues `chunk` for meshing if it has been requested and is not
    /// already queued.
    fn mark_mesh_dirty(&self, chunk: &Chunk) {
        if chunk.wants_mesh() && chunk.mark_mesh_dirty() {
            self.to_mesh.push(chunk.position());
        }
    }

    fn mark_neighbors_mesh_dirty(&self, pos: IVec3, mask: u8) {
        for delta in boundary_neighbors(mask) {
            if let Some(neighbor) = self.get_chunk(pos + delta) {
                self.mark_mesh_dirty(&neighbor);
            }
        }
    }

    // -- blocks --------------------------------------------------------------

    /// Queues a block change at world position `pos`.
    ///
    /// The change becomes visible after the next apply stage, which also
    /// marks this chunk and any neighbor sharing the cell's border for
    /// remeshing.
    pub fn change_block_at(&self, pos: IVec3, block: BlockId) {
        let (chunk_pos, offset) = world_to_chunk(pos);
        let chunk = self.get_or_queue_chunk(chunk_pos);
        if chunk.change_block_at(offset, block) {
            self.dirty.push(chunk_pos);
        }
    }

    /// Alias for [`change_block_at`](Self::change_block_at).
    pub fn set_block(&self, pos: IVec3, block: BlockId) {
        self.change_block_at(pos, block);
    }

    /// Block at world position `pos`. Missing chunks read as air.
    pub fn get_block(&self, pos: IVec3) -> BlockId {
        let (chunk_pos, offset) = world_to_chunk(pos);
        self.get_chunk(chunk_pos)
            .map_or(BlockId::AIR, |chunk| chunk.get_block(offset_to_index(offset)))
    }

    /// Light at world position `pos`. Missing chunks are dark.
    pub fn light_at(&self, pos: IVec3) -> Light {
        let (chunk_pos, offset) = world_to_chunk(pos);
        self.get_chunk(chunk_pos)
            .map_or(LIGHT_NONE, |chunk| chunk.light_at(offset_to_index(offset)))
    }

    /// First non-air block along a ray. Unloaded chunks count as air.
    pub fn raycast(&self, origin: Vec3, direction: Vec3, max_distance: f32) -> Option<RaycastHit> {
        raycast(origin, direction, max_distance, |pos| self.get_block(pos))
    }

    // -- light ---------------------------------------------------------------

    /// Places a light source at `pos` and floods it outwards.
    pub fn add_light(&self, pos: IVec3, light: Light) {
        let editor = LightEditor::new(self);
        add_light(&editor, pos, light);
        editor.finish();
    }

    /// Removes the light at `pos` and relights from any remaining sources.
    pub fn remove_light(&self, pos: IVec3) {
        let editor = LightEditor::new(self);
        remove_light(&editor, pos);
        editor.finish();
    }

    // -- pipeline ------------------------------------------------------------

    /// Runs all five stages once, in order. Returns the number of chunks
    /// meshed.
    pub fn tick(self: &Arc<Self>, executor: &ParallelExecutor) -> usize {
        let shaped = self.shape_chunks(executor);
        let decorated = self.decorate_chunks(executor);
        let applied = self.apply_changes(executor);
        let meshed = self.mesh_chunks(executor);
        self.check_chunks(executor);

        let stats = self.stats();
        tracing::debug!(
            shaped,
            decorated,
            applied,
            meshed,
            chunks = stats.chunks,
            to_shape = stats.to_shape,
            to_mesh = stats.to_mesh,
            finished = stats.finished_meshes,
            "pipeline tick"
        );
        meshed
    }

    /// Generates terrain for queued chunks. Returns the number shaped.
    pub fn shape_chunks(self: &Arc<Self>, executor: &ParallelExecutor) -> usize {
        self.run_stage(executor, Self::shape_worker)
    }

    /// Decorates shaped chunks. Returns the number decorated.
    pub fn decorate_chunks(self: &Arc<Self>, executor: &ParallelExecutor) -> usize {
        self.run_stage(executor, Self::decorate_worker)
    }

    /// Commits queued block edits. Returns the number of chunks processed.
    pub fn apply_changes(self: &Arc<Self>, executor: &ParallelExecutor) -> usize {
        self.run_stage(executor, Self::apply_worker)
    }

    /// Builds meshes for mesh-dirty chunks whose neighbors are ready.
    /// Returns the number of meshes handed to the finished queue.
    pub fn mesh_chunks(self: &Arc<Self>, executor: &ParallelExecutor) -> usize {
        let meshed = self.run_stage(executor, Self::mesh_worker);
        while let Some(pos) = self.failed_mesh.pop() {
            self.to_mesh.push(pos);
        }
        meshed
    }

    /// Moves loaded chunks to the checked queue. Nothing is evicted.
    pub fn check_chunks(self: &Arc<Self>, executor: &ParallelExecutor) -> usize {
        self.run_stage(executor, Self::check_worker)
    }

    fn run_stage(self: &Arc<Self>, executor: &ParallelExecutor, worker: fn(&World) -> usize) -> usize {
        let total = Arc::new(AtomicUsize::new(0));
        let world = Arc::clone(self);
        let sum = Arc::clone(&total);
        executor.run(move |_| {
            sum.fetch_add(worker(&world), Ordering::Relaxed);
        });
        total.load(Ordering::Relaxed)
    }

    /// Pops from `queue` until it is empty or the time slice runs out.
    /// At least one item is taken per call, so a zero slice still makes
    /// progress. Returns the number of items that finished.
    fn drain_timed(&self, queue: &WorkQueue, mut work: impl FnMut(IVec3) -> Step) -> usize {
        let start = Instant::now();
        let mut done = 0;
        let mut retry = Vec::new();
        while let Some(pos) = queue.pop() {
            match work(pos) {
                Step::Done => done += 1,
                Step::Deferred => {}
                Step::Retry => retry.push(pos),
            }
            if start.elapsed() >= self.time_slice {
                break;
            }
        }
        for pos in retry {
            queue.push(pos);
        }
        done
    }

    fn shape_worker(&self) -> usize {
        self.drain_timed(&self.to_shape, |pos| {
            if let Some(chunk) = self.get_chunk(pos) {
                // Restored chunks arrive decorated and keep their saved blocks.
                if !chunk.is_decorated() {
                    self.generator.shape(&chunk);
                }
                self.to_decorate.push(pos);
            }
            Step::Done
        })
    }

    fn decorate_worker(&self) -> usize {
        self.drain_timed(&self.to_decorate, |pos| {
            if let Some(chunk) = self.get_chunk(pos) {
                if !chunk.is_decorated() {
                    self.generator.decorate(&chunk);
                    chunk.set_decorated();
                }
                self.loaded.push(pos);
            }
            Step::Done
        })
    }

    fn apply_worker(&self) -> usize {
        self.drain_timed(&self.dirty, |pos| {
            let Some(chunk) = self.get_chunk(pos) else {
                return Step::Done;
            };
            // Shaping writes blocks directly and would clobber early edits.
            if !chunk.is_decorated() {
                return Step::Retry;
            }

            let changes = chunk.apply_changes(&self.registry);
            chunk.clear_dirty();
            // An edit queued between the drain and the clear saw the flag
            // still set and did not enqueue; pick it up here.
            if chunk.pending_edits() > 0 && chunk.mark_dirty() {
                self.dirty.push(pos);
            }

            if changes.applied > 0 {
                self.mark_mesh_dirty(&chunk);
                self.mark_neighbors_mesh_dirty(pos, changes.boundary);
                if chunk.mark_will_save() {
                    self.to_save.push(pos);
                }
            }
            Step::Done
        })
    }

    fn mesh_worker(&self) -> usize {
        self.drain_timed(&self.to_mesh, |pos| {
            let Some(chunk) = self.get_chunk(pos) else {
                return Step::Done;
            };
            if !self.neighbors_ready(pos) {
                tracing::trace!(chunk = ?pos, "mesh deferred, neighbors not ready");
                self.failed_mesh.push(pos);
                return Step::Deferred;
            }
            let Some(mut builder) = self.builders.try_acquire() else {
                tracing::trace!(chunk = ?pos, "mesh deferred, no free builder");
                self.failed_mesh.push(pos);
                return Step::Deferred;
            };

            // Cleared before building so an edit landing mid-build queues
            // a fresh mesh instead of being lost.
            chunk.clear_mesh_dirty();
            if builder.build(&chunk, &self.registry, |p| self.get_chunk(p)) {
                self.builders.finish(builder);
                Step::Done
            } else {
                self.builders.release(builder);
                if chunk.mark_mesh_dirty() {
                    self.failed_mesh.push(pos);
                }
                Step::Deferred
            }
        })
    }

    fn check_worker(&self) -> usize {
        self.drain_timed(&self.loaded, |pos| {
            self.checked.push(pos);
            Step::Done
        })
    }

    fn neighbors_ready(&self, pos: IVec3) -> bool {
        std::iter::once(IVec3::ZERO)
            .chain(neighbor_offsets())
            .all(|delta| self.get_chunk(pos + delta).is_some_and(|c| c.is_decorated()))
    }

    /// Current queue depths.
    pub fn stats(&self) -> PipelineStats {
        PipelineStats {
            chunks: self.chunks.len(),
            to_shape: self.to_shape.len(),
            to_decorate: self.to_decorate.len(),
            dirty: self.dirty.len(),
            to_mesh: self.to_mesh.len(),
            failed_mesh: self.failed_mesh.len(),
            loaded: self.loaded.len(),
            checked: self.checked.len(),
            to_save: self.to_save.len(),
            finished_meshes: self.builders.finished_len(),
        }
    }

    // -- persistence ---------------------------------------------------------

    /// Serializes every chunk queued for saving.
    pub fn drain_saves(&self) -> Vec<(IVec3, Vec<u8>)> {
        let mut saved = Vec::new();
        while let Some(pos) = self.to_save.pop() {
            let Some(chunk) = self.get_chunk(pos) else {
                continue;
            };
            // Cleared first so an edit applied during serialization queues
            // the chunk again.
            chunk.clear_will_save();
            let mut buf = SerialBuffer::new();
            chunk.serialize(&mut buf);
            saved.push((pos, buf.into_bytes()));
        }
        if !saved.is_empty() {
            tracing::debug!(count = saved.len(), "chunks serialized");
        }
        saved
    }

    /// Inserts a chunk from saved bytes, replacing any chunk at `pos`.
    ///
    /// The restored chunk counts as decorated. If the replaced chunk had a
    /// mesh request or unapplied edits, they carry over, and the edits are
    /// applied on top of the restored blocks.
    pub fn restore_chunk(&self, pos: IVec3, bytes: Vec<u8>) -> Result<Arc<Chunk>, WorldError> {
        let mut buf = SerialBuffer::from_bytes(bytes);
        let chunk = Chunk::deserialize(pos, &mut buf).map_err(|source| WorldError::Restore {
            position: pos,
            source,
        })?;
        chunk.set_decorated();
        let chunk = Arc::new(chunk);

        let previous = self.chunks.insert(pos, Arc::clone(&chunk));
        match previous {
            Some(old) => {
                let edits = old.take_edits();
                let carried = edits.len();
                let mut queued = false;
                for edit in edits {
                    queued |= chunk.queue_edit(edit);
                }
                if queued {
                    self.dirty.push(pos);
                }
                if carried > 0 {
                    tracing::debug!(chunk = ?pos, edits = carried, "edits carried over restore");
                }
                if old.wants_mesh() {
                    chunk.request_mesh();
                    self.mark_mesh_dirty(&chunk);
                }
            }
            None => self.loaded.push(pos),
        }
        self.mark_neighbors_mesh_dirty(pos, 0x3F);
        tracing::debug!(chunk = ?pos, "chunk restored");
        Ok(chunk)
    }
}

/// Flood-fill access to world light that remembers which chunks it wrote to.
struct LightEditor<'a> {
    world: &'a World,
    touched: RefCell<FxHashSet<(IVec3, u8)>>,
}

impl<'a> LightEditor<'a> {
    fn new(world: &'a World) -> Self {
        Self {
            world,
            touched: RefCell::new(FxHashSet::default()),
        }
    }

    /// Marks every chunk whose mesh samples a changed cell.
    fn finish(self) {
        let touched = self.touched.into_inner();
        for (chunk_pos, mask) in touched {
            if let Some(chunk) = self.world.get_chunk(chunk_pos) {
                self.world.mark_mesh_dirty(&chunk);
            }
            self.world.mark_neighbors_mesh_dirty(chunk_pos, mask);
        }
    }
}

impl LightVolume for LightEditor<'_> {
    fn light(&self, pos: IVec3) -> Light {
        self.world.light_at(pos)
    }

    fn set_light(&self, pos: IVec3, light: Light) {
        let (chunk_pos, offset) = world_to_chunk(pos);
        let chunk = self.world.get_or_queue_chunk(chunk_pos);
        let previous = chunk.set_light(offset_to_index(offset), light);
        if previous != light {
            self.touched
                .borrow_mut()
                .insert((chunk_pos, boundary_faces(offset)));
        }
    }

    fn is_transmissive(&self, pos: IVec3) -> bool {
        let block = self.world.get_block(pos);
        self.world.registry.is_transmissive(block)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
