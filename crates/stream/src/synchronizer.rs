use std::error::Error;
use viewsync_common::{CellCoord, EntityId, Transform, WorldId};
use viewsync_kernel::{BlockChange, Chunk, WorldInfo};

/// Errors surfaced by a reconciler pass.
///
/// Absent or ineligible cells are never errors; they are deferred. Only the
/// transport, or a world the store no longer knows, can fail a pass.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("transport error: {0}")]
    Transport(#[source] Box<dyn Error + Send + Sync>),
    #[error("unknown world {0:?}")]
    UnknownWorld(WorldId),
}

impl SyncError {
    /// Wrap any transport-layer error.
    pub fn transport(err: impl Error + Send + Sync + 'static) -> Self {
        Self::Transport(Box::new(err))
    }
}

/// Protocol hooks a reconciler calls to talk to one client.
///
/// Implementations own the session; the reconciler owns the bookkeeping.
pub trait Synchronizer {
    /// Whether `chunk` may be transmitted right now. Ineligible cells are
    /// retried on a later tick.
    fn can_send_cell(&self, chunk: &Chunk) -> bool {
        let _ = chunk;
        true
    }

    /// Transmit a cell. Returns every coordinate the transmission covered,
    /// which may include neighbours bundled into the same message.
    fn send_cell(&mut self, chunk: &Chunk) -> Result<Vec<CellCoord>, SyncError>;

    /// Tell the client to allocate a cell. A no-op for most protocols.
    fn init_cell(&mut self, cell: CellCoord) -> Result<(), SyncError> {
        let _ = cell;
        Ok(())
    }

    fn free_cell(&mut self, cell: CellCoord) -> Result<(), SyncError>;

    fn send_position(&mut self, entity: EntityId, transform: Transform) -> Result<(), SyncError>;

    fn world_changed(&mut self, info: &WorldInfo, transform: Transform) -> Result<(), SyncError>;

    fn update_block(&mut self, change: &BlockChange) -> Result<(), SyncError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("pipe closed")]
    struct PipeClosed;

    #[test]
    fn transport_error_keeps_source() {
        let err = SyncError::transport(PipeClosed);
        assert_eq!(err.to_string(), "transport error: pipe closed");
        assert!(err.source().is_some());
    }
}
