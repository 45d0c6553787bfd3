//! The six axis-aligned block faces.

use glam::IVec3;

/// One of the six cardinal directions a block face can point.
///
/// The `repr(u8)` discriminant is the face index used by per-face block data
/// and by the packed face normal in meshes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Face {
    /// +X direction.
    PosX = 0,
    /// −X direction.
    NegX = 1,
    /// +Y direction (top).
    PosY = 2,
    /// −Y direction (bottom).
    NegY = 3,
    /// +Z direction.
    PosZ = 4,
    /// −Z direction.
    NegZ = 5,
}

impl Face {
    /// All six faces in index order.
    pub const ALL: [Face; 6] = [
        Self::PosX,
        Self::NegX,
        Self::PosY,
        Self::NegY,
        Self::PosZ,
        Self::NegZ,
    ];

    /// The face whose transparency decides light transmission.
    pub const TOP: Face = Face::PosY;

    /// Returns the unit offset towards the neighbor across this face.
    pub fn normal(self) -> IVec3 {
        match self {
            Self::PosX => IVec3::X,
            Self::NegX => IVec3::NEG_X,
            Self::PosY => IVec3::Y,
            Self::NegY => IVec3::NEG_Y,
            Self::PosZ => IVec3::Z,
            Self::NegZ => IVec3::NEG_Z,
        }
    }

    /// Returns the two in-plane axes `(u, v)` spanning this face.
    ///
    /// The pair is ordered so that `u × v` points along [`normal`](Self::normal),
    /// giving counter-clockwise winding when viewed from outside.
    pub fn tangents(self) -> (IVec3, IVec3) {
        match self {
            Self::PosX => (IVec3::NEG_Z, IVec3::Y),
            Self::NegX => (IVec3::Z, IVec3::Y),
            Self::PosY => (IVec3::Z, IVec3::X),
            Self::NegY => (IVec3::X, IVec3::Z),
            Self::PosZ => (IVec3::X, IVec3::Y),
            Self::NegZ => (IVec3::NEG_X, IVec3::Y),
        }
    }

    /// Returns the opposite face.
    pub fn opposite(self) -> Self {
        match self {
            Self::PosX => Self::NegX,
            Self::NegX => Self::PosX,
            Self::PosY => Self::NegY,
            Self::NegY => Self::PosY,
            Self::PosZ => Self::NegZ,
            Self::NegZ => Self::PosZ,
        }
    }

    /// Returns the face index (0–5).
    pub fn index(self) -> usize {
        self as usize
    }

    /// Returns the bit for this face inside a face mask.
    pub fn bit(self) -> u8 {
        1 << self as u8
    }
}
