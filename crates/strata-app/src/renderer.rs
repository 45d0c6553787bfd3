//! Headless stand-in for the chunk renderer.
//!
//! It does what the GPU side would do with the pipeline: request chunks around
//! the camera, take finished meshes from the builder pool, and hand the
//! builders back. Instead of uploading buffers it records per-chunk geometry
//! counts.

use glam::IVec3;
use rustc_hash::FxHashMap;
use strata_world::{World, sphere_offsets};
use tracing::{debug, trace};

/// Geometry of the latest mesh received for one chunk.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MeshSummary {
    pub faces: usize,
    pub transparent_vertices: usize,
    pub transparent_indices: usize,
}

pub struct HeadlessRenderer {
    offsets: Vec<IVec3>,
    camera_chunk: Option<IVec3>,
    meshes: FxHashMap<IVec3, MeshSummary>,
    meshes_received: u64,
}

impl HeadlessRenderer {
    /// Renderer requesting every chunk within `render_distance` chunks of
    /// the camera.
    pub fn new(render_distance: u32) -> Self {
        Self {
            offsets: sphere_offsets(render_distance),
            camera_chunk: None,
            meshes: FxHashMap::default(),
            meshes_received: 0,
        }
    }

    /// Moves the camera. Chunks around the new position are requested only
    /// when the camera crosses into a different chunk.
    pub fn set_camera_chunk(&mut self, world: &World, chunk: IVec3) {
        if self.camera_chunk == Some(chunk) {
            return;
        }
        self.camera_chunk = Some(chunk);
        world.request_around(chunk, &self.offsets);
        debug!(camera = ?chunk, requested = self.offsets.len(), "camera moved");
    }

    /// Changes the view radius and requests any chunks now in view.
    pub fn set_render_distance(&mut self, world: &World, render_distance: u32) {
        self.offsets = sphere_offsets(render_distance);
        if let Some(chunk) = self.camera_chunk {
            world.request_around(chunk, &self.offsets);
        }
        debug!(render_distance, requested = self.offsets.len(), "view radius changed");
    }

    /// Takes every finished mesh out of the pool. Returns how many arrived.
    pub fn draw(&mut self, world: &World) -> usize {
        let pool = world.builders();
        let mut received = 0;
        while let Some(builder) = pool.try_take_finished() {
            let summary = MeshSummary {
                faces: builder.faces().len(),
                transparent_vertices: builder.vertices().len(),
                transparent_indices: builder.indices().len(),
            };
            trace!(chunk = ?builder.position(), faces = summary.faces, "mesh received");
            self.meshes.insert(builder.position(), summary);
            pool.release(builder);
            received += 1;
        }
        self.meshes_received += received as u64;
        received
    }

    pub fn camera_chunk(&self) -> Option<IVec3> {
        self.camera_chunk
    }

    /// Number of chunk offsets requested per camera move.
    pub fn view_size(&self) -> usize {
        self.offsets.len()
    }

    pub fn mesh(&self, chunk: IVec3) -> Option<MeshSummary> {
        self.meshes.get(&chunk).copied()
    }

    /// Chunks with at least one received mesh.
    pub fn mesh_count(&self) -> usize {
        self.meshes.len()
    }

    /// Meshes received in total, remeshes included.
    pub fn meshes_received(&self) -> u64 {
        self.meshes_received
    }

    /// Opaque faces across the latest mesh of every chunk.
    pub fn total_faces(&self) -> usize {
        self.meshes.values().map(|m| m.faces).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_world::{ParallelExecutor, WorldConfig};
    use std::sync::Arc;

    #[test]
    fn test_camera_move_requests_once() {
        let world = World::new(WorldConfig::default());
        let mut renderer = HeadlessRenderer::new(1);
        renderer.set_camera_chunk(&world, IVec3::ZERO);
        let count = world.chunk_count();
        assert!(count >= 27);
        let queued = world.stats().to_shape;

        renderer.set_camera_chunk(&world, IVec3::ZERO);
        assert_eq!(world.chunk_count(), count);
        assert_eq!(world.stats().to_shape, queued);
        assert_eq!(renderer.camera_chunk(), Some(IVec3::ZERO));
    }

    #[test]
    fn test_wider_view_requests_more_chunks() {
        let world = World::new(WorldConfig::default());
        let mut renderer = HeadlessRenderer::new(0);
        renderer.set_camera_chunk(&world, IVec3::ZERO);
        assert_eq!(world.chunk_count(), 27);

        renderer.set_render_distance(&world, 1);
        assert_eq!(renderer.view_size(), 7);
        assert!(world.get_chunk(IVec3::new(2, 0, 0)).is_some());
        assert!(world.get_chunk(IVec3::new(0, 0, -2)).is_some());
    }

    #[test]
    fn test_draw_returns_builders() {
        let world = Arc::new(World::new(WorldConfig {
            mesh_builders: 4,
            ..WorldConfig::default()
        }));
        let executor = ParallelExecutor::new(2).unwrap();
        let mut renderer = HeadlessRenderer::new(0);
        renderer.set_camera_chunk(&world, IVec3::ZERO);

        for _ in 0..500 {
            world.tick(&executor);
            renderer.draw(&world);
            if renderer.mesh_count() == 1 && world.stats().is_idle() {
                break;
            }
        }
        assert_eq!(renderer.mesh_count(), 1);
        assert_eq!(renderer.meshes_received(), 1);
        assert!(renderer.mesh(IVec3::ZERO).is_some());
        assert_eq!(world.builders().available_len(), 4);
    }
}
