use viewsync_common::{CellCoord, EntityId, Transform};
use viewsync_kernel::{BlockChange, Chunk, SnapshotKind, WorldInfo};
use viewsync_stream::{SyncError, Synchronizer};

use crate::message::{Message, UpdateAction};
use crate::session::Session;

/// The default protocol: one `CellData` message per cell, no bundling, no
/// client-side init.
#[derive(Debug)]
pub struct BuiltinSynchronizer<S> {
    session: S,
    snapshot_kind: SnapshotKind,
}

impl<S: Session> BuiltinSynchronizer<S> {
    pub fn new(session: S, snapshot_kind: SnapshotKind) -> Self {
        Self {
            session,
            snapshot_kind,
        }
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    pub fn snapshot_kind(&self) -> SnapshotKind {
        self.snapshot_kind
    }
}

impl<S: Session> Synchronizer for BuiltinSynchronizer<S> {
    fn send_cell(&mut self, chunk: &Chunk) -> Result<Vec<CellCoord>, SyncError> {
        let coord = chunk.coord();
        self.session.send(Message::CellData {
            coord,
            snapshot: chunk.snapshot(self.snapshot_kind),
        })?;
        Ok(vec![coord])
    }

    fn free_cell(&mut self, cell: CellCoord) -> Result<(), SyncError> {
        self.session.send(Message::CellFree { coord: cell })?;
        Ok(())
    }

    fn send_position(&mut self, entity: EntityId, transform: Transform) -> Result<(), SyncError> {
        self.session.send(Message::EntityTransformUpdate {
            entity,
            transform,
            action: UpdateAction::Transform,
        })?;
        Ok(())
    }

    fn world_changed(&mut self, info: &WorldInfo, transform: Transform) -> Result<(), SyncError> {
        self.session.send(Message::WorldChanged {
            world: info.id,
            transform,
            info: info.clone(),
        })?;
        Ok(())
    }

    fn update_block(&mut self, change: &BlockChange) -> Result<(), SyncError> {
        self.session.send(Message::BlockUpdate {
            coord: change.cell,
            x: change.local.x,
            y: change.local.y,
            z: change.local.z,
            material: change.new.material,
            aux: change.new.aux,
        })?;
        Ok(())
    }
}
