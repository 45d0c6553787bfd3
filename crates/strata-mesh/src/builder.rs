//! Turns a chunk and its neighbors into face and vertex lists.
//!
//! Cells are visited y outer, then z, then x, so output order depends only on
//! the block and light data. Two builds of unchanged data are byte-identical.

use std::sync::Arc;

use glam::{IVec3, Vec3};
use strata_voxel::{
    BlockData, BlockId, BlockRegistry, BlockShape, CHUNK_SIZE, CHUNK_VOLUME, Chunk, Face, Light,
    channel,
};

use crate::neighborhood::{ChunkNeighborhood, PADDED_VOLUME, padded_index};
use crate::vertex::{BlockFace, TransparentVertex};

/// Quad corners as `(u, v)` signs, matching the order of [`BlockFace::light`].
const CORNERS: [(i32, i32); 4] = [(-1, -1), (1, -1), (1, 1), (-1, 1)];

/// Pooled, reusable mesh builder.
///
/// All buffers are kept between builds and only cleared, so a warmed-up
/// builder does not allocate.
pub struct ChunkMeshBuilder {
    position: IVec3,
    faces: Vec<BlockFace>,
    vertices: Vec<TransparentVertex>,
    indices: Vec<u32>,
    cells: Vec<BlockId>,
    blocks: Vec<BlockId>,
    light: Vec<Light>,
}

impl ChunkMeshBuilder {
    pub fn new() -> Self {
        Self {
            position: IVec3::ZERO,
            faces: Vec::new(),
            vertices: Vec::new(),
            indices: Vec::new(),
            cells: vec![BlockId::AIR; CHUNK_VOLUME],
            blocks: vec![BlockId::AIR; PADDED_VOLUME],
            light: vec![0; PADDED_VOLUME],
        }
    }

    /// Chunk coordinate of the most recent build.
    pub fn position(&self) -> IVec3 {
        self.position
    }

    /// Opaque faces from the most recent build.
    pub fn faces(&self) -> &[BlockFace] {
        &self.faces
    }

    /// Transparent vertices from the most recent build.
    pub fn vertices(&self) -> &[TransparentVertex] {
        &self.vertices
    }

    /// Triangle indices into [`vertices`](Self::vertices).
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    /// Returns `true` if the last build produced no geometry.
    pub fn is_empty(&self) -> bool {
        self.faces.is_empty() && self.vertices.is_empty()
    }

    /// Drops the previous output, keeping capacity.
    pub fn clear(&mut self) {
        self.faces.clear();
        self.vertices.clear();
        self.indices.clear();
    }

    /// Meshes `chunk`, looking up its neighbors through `lookup`.
    ///
    /// Returns `false` without touching the output if any neighbor is
    /// missing or undecorated; the caller should retry later.
    pub fn build<F>(&mut self, chunk: &Arc<Chunk>, registry: &BlockRegistry, lookup: F) -> bool
    where
        F: Fn(IVec3) -> Option<Arc<Chunk>>,
    {
        let position = chunk.position();
        let neighborhood = ChunkNeighborhood::gather(position, |pos| {
            if pos == position {
                Some(Arc::clone(chunk))
            } else {
                lookup(pos)
            }
        });
        let Some(neighborhood) = neighborhood else {
            return false;
        };

        self.clear();
        self.position = position;
        if chunk.blocks().is_uniform(BlockId::AIR) {
            return true;
        }

        neighborhood.fill_padded(&mut self.cells, &mut self.blocks, &mut self.light);

        let size = CHUNK_SIZE as i32;
        for y in 0..size {
            for z in 0..size {
                for x in 0..size {
                    let block = self.blocks[padded_index(x, y, z)];
                    if block.is_air() {
                        continue;
                    }
                    let data = registry.get_block_data(block);
                    let cell = IVec3::new(x, y, z);
                    match data.shape {
                        BlockShape::Cross => self.emit_cross(cell, data),
                        BlockShape::Cube if data.is_fully_transparent() => {
                            self.emit_transparent_cube(cell, data, registry)
                        }
                        BlockShape::Cube => self.emit_opaque_cube(cell, data, registry),
                    }
                }
            }
        }

        tracing::trace!(
            chunk = ?position,
            faces = self.faces.len(),
            vertices = self.vertices.len(),
            "chunk meshed"
        );
        true
    }

    fn block_at(&self, pos: IVec3) -> BlockId {
        self.blocks[padded_index(pos.x, pos.y, pos.z)]
    }

    fn light_at(&self, pos: IVec3) -> Light {
        self.light[padded_index(pos.x, pos.y, pos.z)]
    }

    /// A face shows if the neighbor is void, or if this face is opaque and the
    /// neighbor's facing side is transparent.
    fn face_visible(&self, cell: IVec3, data: &BlockData, face: Face, registry: &BlockRegistry) -> bool {
        let neighbor = self.block_at(cell + face.normal());
        if neighbor.is_air() {
            return true;
        }
        !data.is_transparent(face) && registry.get_block_data(neighbor).is_transparent(face.opposite())
    }

    fn emit_opaque_cube(&mut self, cell: IVec3, data: &BlockData, registry: &BlockRegistry) {
        for face in Face::ALL {
            if !self.face_visible(cell, data, face, registry) {
                continue;
            }
            let light = self.corner_light(cell, face, registry);
            self.faces.push(BlockFace::new(
                cell.x as u32,
                cell.y as u32,
                cell.z as u32,
                face,
                data.texture(face),
                light,
            ));
        }
    }

    /// Averages each light nibble over the cells touching each quad corner on
    /// the outside of the face. A corner hidden behind two opaque sides is
    /// left out, which darkens creases.
    fn corner_light(&self, cell: IVec3, face: Face, registry: &BlockRegistry) -> [Light; 4] {
        let front = cell + face.normal();
        let (u, v) = face.tangents();
        let mut out = [0; 4];

        for (slot, (su, sv)) in CORNERS.into_iter().enumerate() {
            let side_u = front + u * su;
            let side_v = front + v * sv;
            let open_u = registry.is_transmissive(self.block_at(side_u));
            let open_v = registry.is_transmissive(self.block_at(side_v));

            let mut samples = [self.light_at(front), 0, 0, 0];
            let mut count = 1;
            if open_u {
                samples[count] = self.light_at(side_u);
                count += 1;
            }
            if open_v {
                samples[count] = self.light_at(side_v);
                count += 1;
            }
            let corner = front + u * su + v * sv;
            if (open_u || open_v) && registry.is_transmissive(self.block_at(corner)) {
                samples[count] = self.light_at(corner);
                count += 1;
            }

            out[slot] = average_light(&samples[..count]);
        }
        out
    }

    fn emit_transparent_cube(&mut self, cell: IVec3, data: &BlockData, registry: &BlockRegistry) {
        for face in Face::ALL {
            if !self.face_visible(cell, data, face, registry) {
                continue;
            }
            let n = face.normal().as_vec3();
            let (u, v) = face.tangents();
            let (u, v) = (u.as_vec3(), v.as_vec3());
            let center = cell.as_vec3() + Vec3::splat(0.5) + n * 0.5;
            let light = u32::from(self.light_at(cell + face.normal()));
            let corners = CORNERS.map(|(su, sv)| center + (u * su as f32 + v * sv as f32) * 0.5);
            self.push_quad(corners, data.texture(face), light);
        }
    }

    /// Two diagonal planes, each drawn from both sides.
    fn emit_cross(&mut self, cell: IVec3, data: &BlockData) {
        let base = cell.as_vec3();
        let light = u32::from(self.light_at(cell));
        let texture = data.texture(Face::PosX);
        let planes = [
            (Vec3::new(0.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 1.0)),
            (Vec3::new(1.0, 0.0, 0.0), Vec3::new(0.0, 0.0, 1.0)),
        ];
        for (a, b) in planes {
            let quad = [base + a, base + b, base + b + Vec3::Y, base + a + Vec3::Y];
            self.push_quad(quad, texture, light);
            self.push_quad([quad[1], quad[0], quad[3], quad[2]], texture, light);
        }
    }

    fn push_quad(&mut self, corners: [Vec3; 4], texture: u16, light: u32) {
        const UVS: [[f32; 2]; 4] = [[0.0, 1.0], [1.0, 1.0], [1.0, 0.0], [0.0, 0.0]];
        let base = self.vertices.len() as u32;
        for (corner, uv) in corners.into_iter().zip(UVS) {
            self.vertices.push(TransparentVertex {
                position: corner.to_array(),
                uv,
                texture: u32::from(texture),
                light,
            });
        }
        self.indices
            .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }
}

impl Default for ChunkMeshBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-nibble mean of `samples`, rounded down.
fn average_light(samples: &[Light]) -> Light {
    let mut out = 0;
    for ch in 0..4 {
        let sum: u32 = samples.iter().map(|&l| u32::from(channel(l, ch))).sum();
        let mean = (sum / samples.len() as u32) as u16;
        out |= mean << (ch * 4);
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rustc_hash::FxHashMap;
    use strata_voxel::{LIGHT_FULL, blocks, neighbor_offsets, offset_to_index, pack_light};

    struct TestWorld {
        chunks: FxHashMap<IVec3, Arc<Chunk>>,
        registry: BlockRegistry,
    }

    impl TestWorld {
        /// The center chunk and its 26 neighbors, all decorated and empty.
        fn new() -> Self {
            let mut chunks = FxHashMap::default();
            for delta in neighbor_offsets().chain(std::iter::once(IVec3::ZERO)) {
                let chunk = Chunk::new(delta);
                chunk.set_decorated();
                chunks.insert(delta, Arc::new(chunk));
            }
            Self {
                chunks,
                registry: BlockRegistry::with_defaults(),
            }
        }

        fn chunk(&self, pos: IVec3) -> &Arc<Chunk> {
            &self.chunks[&pos]
        }

        fn build(&self, builder: &mut ChunkMeshBuilder) -> bool {
            builder.build(self.chunk(IVec3::ZERO), &self.registry, |p| {
                self.chunks.get(&p).cloned()
            })
        }
    }

    #[test]
    fn test_missing_neighbor_returns_false() {
        let mut world = TestWorld::new();
        world.chunks.remove(&IVec3::new(-1, 1, 0));
        let mut builder = ChunkMeshBuilder::new();
        assert!(!world.build(&mut builder));
    }

    #[test]
    fn test_void_chunk_is_empty() {
        let world = TestWorld::new();
        let mut builder = ChunkMeshBuilder::new();
        assert!(world.build(&mut builder));
        assert!(builder.is_empty());
        assert_eq!(builder.position(), IVec3::ZERO);
    }

    #[test]
    fn test_single_block_emits_six_faces() {
        let world = TestWorld::new();
        world.chunk(IVec3::ZERO).set_block_at(IVec3::new(4, 4, 4), blocks::STONE);
        let mut builder = ChunkMeshBuilder::new();
        assert!(world.build(&mut builder));
        assert_eq!(builder.faces().len(), 6);
        assert!(builder.vertices().is_empty());
        for (face, expected) in builder.faces().iter().zip(Face::ALL) {
            assert_eq!(face.position(), [4, 4, 4]);
            assert_eq!(face.face_index(), expected.index());
        }
    }

    #[test]
    fn test_shared_face_is_culled() {
        let world = TestWorld::new();
        let chunk = world.chunk(IVec3::ZERO);
        chunk.set_block_at(IVec3::new(4, 4, 4), blocks::STONE);
        chunk.set_block_at(IVec3::new(5, 4, 4), blocks::DIRT);
        let mut builder = ChunkMeshBuilder::new();
        world.build(&mut builder);
        assert_eq!(builder.faces().len(), 10);
    }

    #[test]
    fn test_boundary_face_culled_by_neighbor_chunk() {
        let world = TestWorld::new();
        world.chunk(IVec3::ZERO).set_block_at(IVec3::new(15, 0, 0), blocks::STONE);
        world.chunk(IVec3::X).set_block_at(IVec3::new(0, 0, 0), blocks::STONE);
        let mut builder = ChunkMeshBuilder::new();
        world.build(&mut builder);
        assert_eq!(builder.faces().len(), 5);
        assert!(builder.faces().iter().all(|f| f.face_index() != Face::PosX.index()));
    }

    #[test]
    fn test_opaque_face_next_to_glass_is_drawn() {
        let world = TestWorld::new();
        let chunk = world.chunk(IVec3::ZERO);
        chunk.set_block_at(IVec3::new(4, 4, 4), blocks::STONE);
        chunk.set_block_at(IVec3::new(5, 4, 4), blocks::GLASS);
        let mut builder = ChunkMeshBuilder::new();
        world.build(&mut builder);
        // Stone keeps all six faces; glass hides the face against stone.
        assert_eq!(builder.faces().len(), 6);
        assert_eq!(builder.vertices().len(), 5 * 4);
        assert_eq!(builder.indices().len(), 5 * 6);
    }

    #[test]
    fn test_adjacent_glass_has_no_internal_faces() {
        let world = TestWorld::new();
        let chunk = world.chunk(IVec3::ZERO);
        chunk.set_block_at(IVec3::new(4, 4, 4), blocks::GLASS);
        chunk.set_block_at(IVec3::new(4, 5, 4), blocks::GLASS);
        let mut builder = ChunkMeshBuilder::new();
        world.build(&mut builder);
        assert!(builder.faces().is_empty());
        assert_eq!(builder.vertices().len(), 10 * 4);
    }

    #[test]
    fn test_cross_always_emits_four_quads() {
        let world = TestWorld::new();
        let chunk = world.chunk(IVec3::ZERO);
        chunk.set_block_at(IVec3::new(2, 2, 2), blocks::FLOWER);
        for face in Face::ALL {
            chunk.set_block_at(IVec3::new(2, 2, 2) + face.normal(), blocks::STONE);
        }
        let mut builder = ChunkMeshBuilder::new();
        world.build(&mut builder);
        assert_eq!(builder.vertices().len(), 16);
        assert_eq!(builder.indices().len(), 24);
    }

    #[test]
    fn test_corner_light_averages_open_cells() {
        let world = TestWorld::new();
        let chunk = world.chunk(IVec3::ZERO);
        chunk.set_block_at(IVec3::new(8, 8, 8), blocks::STONE);
        // Light everything above the block.
        for x in 7..=9 {
            for z in 7..=9 {
                chunk.set_light(offset_to_index(IVec3::new(x, 9, z)), LIGHT_FULL);
            }
        }
        // Darken one corner column of the top face's outside.
        chunk.set_light(offset_to_index(IVec3::new(7, 9, 7)), pack_light(3, 3, 3, 3));

        let mut builder = ChunkMeshBuilder::new();
        world.build(&mut builder);
        let top = builder
            .faces()
            .iter()
            .find(|f| f.face_index() == Face::PosY.index())
            .unwrap();
        // Corner (u, v) = (-1, -1) on the top face is at -Z, -X.
        assert_eq!(top.light[0], pack_light(12, 12, 12, 12));
        assert_eq!(top.light[2], LIGHT_FULL);
    }

    #[test]
    fn test_build_is_deterministic() {
        let world = TestWorld::new();
        let chunk = world.chunk(IVec3::ZERO);
        for i in (0..CHUNK_VOLUME).step_by(5) {
            let block = [blocks::STONE, blocks::GLASS, blocks::FLOWER, blocks::GRASS][i % 4];
            chunk.set_block_at(strata_voxel::index_to_offset(i), block);
            chunk.set_light(i, (i * 37) as u16);
        }
        let mut a = ChunkMeshBuilder::new();
        let mut b = ChunkMeshBuilder::new();
        world.build(&mut a);
        world.build(&mut b);
        assert!(!a.is_empty());
        assert_eq!(bytemuck::cast_slice::<_, u8>(a.faces()), bytemuck::cast_slice::<_, u8>(b.faces()));
        assert_eq!(
            bytemuck::cast_slice::<_, u8>(a.vertices()),
            bytemuck::cast_slice::<_, u8>(b.vertices())
        );
        assert_eq!(a.indices(), b.indices());

        // Rebuilding with the same builder reproduces the same output.
        let first = a.faces().to_vec();
        world.build(&mut a);
        assert_eq!(a.faces(), first.as_slice());
    }
}
