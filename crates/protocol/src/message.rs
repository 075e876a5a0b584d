use serde::{Deserialize, Serialize};
use viewsync_common::{CellCoord, EntityId, Transform, WorldId};
use viewsync_kernel::{ChunkSnapshot, WorldInfo};

/// What an entity update carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpdateAction {
    Transform,
}

/// Server-to-client messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Message {
    /// Contents of one cell.
    CellData {
        coord: CellCoord,
        snapshot: ChunkSnapshot,
    },
    /// The client may drop this cell.
    CellFree { coord: CellCoord },
    EntityTransformUpdate {
        entity: EntityId,
        transform: Transform,
        action: UpdateAction,
    },
    /// The client is (re)entering a world and must discard all cells.
    WorldChanged {
        world: WorldId,
        transform: Transform,
        info: WorldInfo,
    },
    /// A single block edit in a cell the client holds.
    BlockUpdate {
        coord: CellCoord,
        x: u32,
        y: u32,
        z: u32,
        material: u16,
        aux: u16,
    },
}

impl Message {
    /// Short name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CellData { .. } => "cell_data",
            Self::CellFree { .. } => "cell_free",
            Self::EntityTransformUpdate { .. } => "entity_transform_update",
            Self::WorldChanged { .. } => "world_changed",
            Self::BlockUpdate { .. } => "block_update",
        }
    }

    /// The cell this message concerns, if any.
    pub fn cell(&self) -> Option<CellCoord> {
        match self {
            Self::CellData { coord, .. }
            | Self::CellFree { coord }
            | Self::BlockUpdate { coord, .. } => Some(*coord),
            Self::EntityTransformUpdate { .. } | Self::WorldChanged { .. } => None,
        }
    }
}
