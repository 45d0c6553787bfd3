//! Block type registry: maps compact [`BlockId`] values to [`BlockData`].
//!
//! The registry is built once during startup and is read-only afterwards.
//! Air is always ID 0 so that a freshly created chunk is empty space.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::face::Face;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Compact identifier stored in every palette entry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockId(pub u16);

impl BlockId {
    /// The void block.
    pub const AIR: BlockId = BlockId(0);

    /// Returns `true` for the void block.
    pub fn is_air(self) -> bool {
        self == Self::AIR
    }
}

/// Geometry used to draw a block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockShape {
    /// A unit cube with six independently textured faces.
    Cube,
    /// Two crossed diagonal quads, used for plants.
    Cross,
}

/// Static metadata for a block type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BlockData {
    /// Human-readable name (e.g. "stone").
    pub name: String,
    /// Per-face transparency, indexed by [`Face::index`].
    pub transparent: [bool; 6],
    /// Whether entities collide with this block.
    pub collidable: bool,
    /// Geometry kind.
    pub shape: BlockShape,
    /// Per-face texture layer, indexed by [`Face::index`].
    pub textures: [u16; 6],
}

impl BlockData {
    /// An opaque, collidable cube using one texture on every face.
    pub fn solid(name: &str, texture: u16) -> Self {
        Self {
            name: name.to_string(),
            transparent: [false; 6],
            collidable: true,
            shape: BlockShape::Cube,
            textures: [texture; 6],
        }
    }

    /// A see-through cube (glass, water, leaves).
    pub fn transparent_cube(name: &str, texture: u16, collidable: bool) -> Self {
        Self {
            name: name.to_string(),
            transparent: [true; 6],
            collidable,
            shape: BlockShape::Cube,
            textures: [texture; 6],
        }
    }

    /// A non-collidable cross-shaped plant.
    pub fn cross(name: &str, texture: u16) -> Self {
        Self {
            name: name.to_string(),
            transparent: [true; 6],
            collidable: false,
            shape: BlockShape::Cross,
            textures: [texture; 6],
        }
    }

    /// Overrides the top and bottom textures, keeping the sides.
    pub fn with_top_bottom(mut self, top: u16, bottom: u16) -> Self {
        self.textures[Face::PosY.index()] = top;
        self.textures[Face::NegY.index()] = bottom;
        self
    }

    /// Returns whether the given face lets light and sight through.
    pub fn is_transparent(&self, face: Face) -> bool {
        self.transparent[face.index()]
    }

    /// Returns `true` if every face is transparent.
    pub fn is_fully_transparent(&self) -> bool {
        self.transparent.iter().all(|&t| t)
    }

    /// Returns the texture layer for the given face.
    pub fn texture(&self, face: Face) -> u16 {
        self.textures[face.index()]
    }
}

/// Errors that can occur during block registration.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A block with the same name has already been registered.
    #[error("duplicate block name: {0}")]
    DuplicateName(String),
    /// Every `u16` ID has been assigned.
    #[error("block registry is full (max 65536 types)")]
    RegistryFull,
}

/// IDs of the blocks registered by [`BlockRegistry::with_defaults`].
pub mod blocks {
    use super::BlockId;

    pub const AIR: BlockId = BlockId(0);
    pub const STONE: BlockId = BlockId(1);
    pub const DIRT: BlockId = BlockId(2);
    pub const GRASS: BlockId = BlockId(3);
    pub const LOG: BlockId = BlockId(4);
    pub const LEAVES: BlockId = BlockId(5);
    pub const SAND: BlockId = BlockId(6);
    pub const WATER: BlockId = BlockId(7);
    pub const GLASS: BlockId = BlockId(8);
    pub const TALL_GRASS: BlockId = BlockId(9);
    pub const FLOWER: BlockId = BlockId(10);
    pub const GLOWSTONE: BlockId = BlockId(11);
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Maps [`BlockId`] → [`BlockData`] with O(1) lookup by index and by name.
pub struct BlockRegistry {
    /// Dense array where `index == BlockId.0`.
    types: Vec<BlockData>,
    name_to_id: FxHashMap<String, BlockId>,
}

impl BlockRegistry {
    /// Creates a registry containing only air.
    pub fn new() -> Self {
        let air = BlockData::transparent_cube("air", 0, false);

        let mut name_to_id = FxHashMap::default();
        name_to_id.insert(air.name.clone(), BlockId::AIR);

        Self {
            types: vec![air],
            name_to_id,
        }
    }

    /// Creates a registry with the built-in block set, whose IDs match
    /// the constants in [`blocks`].
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        let defaults = [
            BlockData::solid("stone", 1),
            BlockData::solid("dirt", 2),
            BlockData::solid("grass", 3).with_top_bottom(4, 2),
            BlockData::solid("log", 5).with_top_bottom(6, 6),
            BlockData::transparent_cube("leaves", 7, true),
            BlockData::solid("sand", 8),
            BlockData::transparent_cube("water", 9, false),
            BlockData::transparent_cube("glass", 10, true),
            BlockData::cross("tall_grass", 11),
            BlockData::cross("flower", 12),
            BlockData::solid("glowstone", 13),
        ];
        for data in defaults {
            // Names are distinct and far below the ID limit.
            if let Err(err) = registry.register(data) {
                tracing::error!("built-in block rejected: {err}");
            }
        }
        registry
    }

    /// Registers a new block type and returns its ID.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateName`] if the name is taken, or
    /// [`RegistryError::RegistryFull`] once all IDs are used.
    pub fn register(&mut self, data: BlockData) -> Result<BlockId, RegistryError> {
        if self.name_to_id.contains_key(&data.name) {
            return Err(RegistryError::DuplicateName(data.name));
        }
        if self.types.len() > u16::MAX as usize {
            return Err(RegistryError::RegistryFull);
        }

        let id = BlockId(self.types.len() as u16);
        self.name_to_id.insert(data.name.clone(), id);
        self.types.push(data);
        Ok(id)
    }

    /// Returns the metadata for `id`.
    ///
    /// Unknown IDs resolve to air so stale data never panics the mesher.
    pub fn get_block_data(&self, id: BlockId) -> &BlockData {
        self.types.get(id.0 as usize).unwrap_or(&self.types[0])
    }

    /// Returns the ID for a named block, or `None` if not registered.
    pub fn lookup_by_name(&self, name: &str) -> Option<BlockId> {
        self.name_to_id.get(name).copied()
    }

    /// Returns the number of registered types, including air.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Returns `true` if only air is registered.
    pub fn is_empty(&self) -> bool {
        self.types.len() <= 1
    }

    /// Returns `true` if light passes through `id`, judged by its top face.
    pub fn is_transmissive(&self, id: BlockId) -> bool {
        id.is_air() || self.get_block_data(id).is_transparent(Face::TOP)
    }
}

impl Default for BlockRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
