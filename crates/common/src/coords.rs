use glam::{IVec3, Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::types::{Transform, WorldId};

/// Errors from building cell geometry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GeometryError {
    #[error("cell_bits must be in 1..=8, got {0}")]
    InvalidBits(u32),
}

/// Size of a cell expressed as a power of two block edge.
///
/// A cell with `bits = 4` spans 16 blocks per edge. Block space to cell space
/// is an arithmetic shift, so negative coordinates floor correctly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellGeometry {
    bits: u32,
}

impl CellGeometry {
    pub const DEFAULT: Self = Self { bits: 4 };

    pub fn new(bits: u32) -> Result<Self, GeometryError> {
        if (1..=8).contains(&bits) {
            Ok(Self { bits })
        } else {
            Err(GeometryError::InvalidBits(bits))
        }
    }

    pub fn bits(&self) -> u32 {
        self.bits
    }

    /// Blocks per cell edge.
    pub fn edge(&self) -> i32 {
        1 << self.bits
    }

    /// Cell index containing a block-space point.
    pub fn cell_of(&self, point: Vec3) -> IVec3 {
        let block = point.floor().as_ivec3();
        IVec3::new(
            block.x >> self.bits,
            block.y >> self.bits,
            block.z >> self.bits,
        )
    }

    /// Block-space base point (minimum corner) of a cell.
    pub fn base_of(&self, cell: IVec3) -> IVec3 {
        IVec3::new(cell.x << self.bits, cell.y << self.bits, cell.z << self.bits)
    }

    /// Smallest number of cells covering `blocks` blocks.
    pub fn cells_covering(&self, blocks: u32) -> u32 {
        let edge = self.edge() as u32;
        blocks.div_ceil(edge)
    }
}

impl Default for CellGeometry {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Distance metric shared by view and priority radii.
///
/// Both radii are compared in cell units under the same metric, so a cell is
/// never inside the priority area while outside the view area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    /// Max of the per-axis distances: a cube.
    #[default]
    Chebyshev,
    /// Sum of the per-axis distances: an octahedron.
    Manhattan,
    /// Straight-line distance: a sphere.
    Euclidean,
}

impl DistanceMetric {
    /// Whether `b` lies within `radius` cells of `a`.
    pub fn within(self, a: IVec3, b: IVec3, radius: u32) -> bool {
        let d = (b - a).abs().as_i64vec3();
        let r = radius as i64;
        match self {
            Self::Chebyshev => d.max_element() <= r,
            Self::Manhattan => d.x + d.y + d.z <= r,
            Self::Euclidean => d.x * d.x + d.y * d.y + d.z * d.z <= r * r,
        }
    }

    /// Distance between two block-space points.
    pub fn block_distance(self, a: Vec3, b: Vec3) -> f32 {
        let d = (b - a).abs();
        match self {
            Self::Chebyshev => d.max_element(),
            Self::Manhattan => d.x + d.y + d.z,
            Self::Euclidean => d.length(),
        }
    }
}

/// A cell of one world, addressed by integer cell indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellCoord {
    pub world: WorldId,
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl CellCoord {
    pub fn new(world: WorldId, index: IVec3) -> Self {
        Self {
            world,
            x: index.x,
            y: index.y,
            z: index.z,
        }
    }

    pub fn index(&self) -> IVec3 {
        IVec3::new(self.x, self.y, self.z)
    }

    /// Block-space base point of this cell.
    pub fn base(&self, geometry: CellGeometry) -> IVec3 {
        geometry.base_of(self.index())
    }

    /// Neighbouring cell at `delta` cells away in the same world.
    pub fn offset(&self, delta: IVec3) -> Self {
        Self::new(self.world, self.index() + delta)
    }
}

impl std::fmt::Display for CellCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// A block-space point inside a specific world.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub world: WorldId,
    pub point: Vec3,
}

impl Position {
    pub fn new(world: WorldId, point: Vec3) -> Self {
        Self { world, point }
    }

    /// Cell containing this position.
    pub fn cell(&self, geometry: CellGeometry) -> CellCoord {
        CellCoord::new(self.world, geometry.cell_of(self.point))
    }
}

/// Where a viewer stands and which way it faces.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub position: Position,
    pub rotation: Quat,
}

impl Placement {
    pub fn new(position: Position, rotation: Quat) -> Self {
        Self { position, rotation }
    }

    /// Placement at `point` in `world`, facing the identity rotation.
    pub fn at(world: WorldId, point: Vec3) -> Self {
        Self::new(Position::new(world, point), Quat::IDENTITY)
    }

    pub fn world(&self) -> WorldId {
        self.position.world
    }

    pub fn transform(&self) -> Transform {
        Transform::from_position_rotation(self.position.point, self.rotation)
    }
}
