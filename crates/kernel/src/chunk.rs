use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use viewsync_common::{CellCoord, CellGeometry, ViewerId};

use crate::observers::ObserverTable;

/// Material id used for empty space.
pub const AIR: u16 = 0;

/// A single block: material id plus material-specific auxiliary data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct BlockState {
    pub material: u16,
    pub aux: u16,
}

impl BlockState {
    pub const AIR: Self = Self {
        material: AIR,
        aux: 0,
    };

    pub fn new(material: u16, aux: u16) -> Self {
        Self { material, aux }
    }

    pub fn is_air(&self) -> bool {
        self.material == AIR
    }
}

/// Which parts of a chunk a snapshot carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotKind {
    /// Material ids only.
    Blocks,
    /// Material ids and auxiliary data.
    #[default]
    Full,
}

/// Immutable copy of a chunk's contents, safe to serialize off the tick thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkSnapshot {
    pub coord: CellCoord,
    pub edge: u32,
    pub kind: SnapshotKind,
    /// Material ids in x-major, then y, then z order.
    pub materials: Vec<u16>,
    /// Auxiliary data in the same order, present for [`SnapshotKind::Full`].
    pub aux: Option<Vec<u16>>,
}

impl ChunkSnapshot {
    /// True if every block is air.
    pub fn is_empty(&self) -> bool {
        self.materials.iter().all(|&m| m == AIR)
    }
}

/// A resident cell of the world.
///
/// Block storage sits behind a lock so that edits and snapshots can happen
/// from any thread; observer registration goes through the world's
/// [`ObserverTable`].
#[derive(Debug)]
pub struct Chunk {
    coord: CellCoord,
    edge: u32,
    blocks: RwLock<Vec<BlockState>>,
    observers: Arc<ObserverTable>,
}

impl Chunk {
    /// An all-air chunk.
    pub fn new(coord: CellCoord, geometry: CellGeometry, observers: Arc<ObserverTable>) -> Self {
        let edge = geometry.edge() as u32;
        let volume = (edge * edge * edge) as usize;
        Self::with_blocks(coord, edge, vec![BlockState::AIR; volume], observers)
    }

    pub(crate) fn with_blocks(
        coord: CellCoord,
        edge: u32,
        blocks: Vec<BlockState>,
        observers: Arc<ObserverTable>,
    ) -> Self {
        debug_assert_eq!(blocks.len(), (edge * edge * edge) as usize);
        Self {
            coord,
            edge,
            blocks: RwLock::new(blocks),
            observers,
        }
    }

    pub fn coord(&self) -> CellCoord {
        self.coord
    }

    /// Blocks per edge.
    pub fn edge(&self) -> u32 {
        self.edge
    }

    fn index(&self, x: u32, y: u32, z: u32) -> Option<usize> {
        if x >= self.edge || y >= self.edge || z >= self.edge {
            return None;
        }
        Some(((x * self.edge + y) * self.edge + z) as usize)
    }

    /// Block at local coordinates, or `None` outside the chunk.
    pub fn block(&self, x: u32, y: u32, z: u32) -> Option<BlockState> {
        let i = self.index(x, y, z)?;
        Some(self.blocks.read()[i])
    }

    /// Replace a block, returning the previous state.
    pub fn set_block(&self, x: u32, y: u32, z: u32, state: BlockState) -> Option<BlockState> {
        let i = self.index(x, y, z)?;
        let mut blocks = self.blocks.write();
        Some(std::mem::replace(&mut blocks[i], state))
    }

    pub(crate) fn blocks(&self) -> Vec<BlockState> {
        self.blocks.read().clone()
    }

    /// Register `viewer` as an observer. Idempotent.
    pub fn add_observer(&self, viewer: ViewerId) -> bool {
        self.observers.insert(viewer, self.coord)
    }

    /// Deregister `viewer`. Idempotent.
    pub fn remove_observer(&self, viewer: ViewerId) -> bool {
        self.observers.remove(viewer, self.coord)
    }

    pub fn is_observed_by(&self, viewer: ViewerId) -> bool {
        self.observers.contains(viewer, self.coord)
    }

    pub fn observer_count(&self) -> usize {
        self.observers.observer_count(self.coord)
    }

    /// Take an immutable snapshot of the chunk contents.
    pub fn snapshot(&self, kind: SnapshotKind) -> ChunkSnapshot {
        let blocks = self.blocks.read();
        let materials = blocks.iter().map(|b| b.material).collect();
        let aux = match kind {
            SnapshotKind::Blocks => None,
            SnapshotKind::Full => Some(blocks.iter().map(|b| b.aux).collect()),
        };
        ChunkSnapshot {
            coord: self.coord,
            edge: self.edge,
            kind,
            materials,
            aux,
        }
    }
}
