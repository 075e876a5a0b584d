#![allow(dead_code)]

use glam::{IVec3, Vec3};
use std::collections::HashSet;
use viewsync_common::{CellCoord, EntityId, Placement, Transform, WorldId};
use viewsync_kernel::{BlockChange, CellStore, Chunk, TickClock, Unbounded, WorldInfo};
use viewsync_stream::{StreamConfig, SyncError, Synchronizer, ViewerState, ViewerSync};

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    WorldChanged(WorldId),
    Init(CellCoord),
    Cell(CellCoord),
    Free(CellCoord),
    Position(Vec3),
    Block(CellCoord),
}

#[derive(Debug, thiserror::Error)]
#[error("session closed")]
pub struct SessionClosed;

/// Synchronizer that records every call, with knobs for failure and bundling.
#[derive(Debug, Default)]
pub struct Recorder {
    pub events: Vec<Event>,
    /// Fail the send attempt with this index (0-based), once.
    pub fail_send_at: Option<usize>,
    pub send_attempts: usize,
    /// Extra offsets each cell transmission also covers.
    pub bundle: Vec<IVec3>,
    /// Cells that are not eligible to send.
    pub refuse: HashSet<CellCoord>,
}

impl Recorder {
    pub fn cells_sent(&self) -> Vec<CellCoord> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::Cell(c) => Some(*c),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, pred: impl Fn(&Event) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}

impl Synchronizer for Recorder {
    fn can_send_cell(&self, chunk: &Chunk) -> bool {
        !self.refuse.contains(&chunk.coord())
    }

    fn send_cell(&mut self, chunk: &Chunk) -> Result<Vec<CellCoord>, SyncError> {
        let attempt = self.send_attempts;
        self.send_attempts += 1;
        if self.fail_send_at == Some(attempt) {
            self.fail_send_at = None;
            return Err(SyncError::transport(SessionClosed));
        }
        let cell = chunk.coord();
        self.events.push(Event::Cell(cell));
        let mut covered = vec![cell];
        covered.extend(self.bundle.iter().map(|d| cell.offset(*d)));
        Ok(covered)
    }

    fn init_cell(&mut self, cell: CellCoord) -> Result<(), SyncError> {
        self.events.push(Event::Init(cell));
        Ok(())
    }

    fn free_cell(&mut self, cell: CellCoord) -> Result<(), SyncError> {
        self.events.push(Event::Free(cell));
        Ok(())
    }

    fn send_position(&mut self, _: EntityId, transform: Transform) -> Result<(), SyncError> {
        self.events.push(Event::Position(transform.position));
        Ok(())
    }

    fn world_changed(&mut self, info: &WorldInfo, _: Transform) -> Result<(), SyncError> {
        self.events.push(Event::WorldChanged(info.id));
        Ok(())
    }

    fn update_block(&mut self, change: &BlockChange) -> Result<(), SyncError> {
        self.events.push(Event::Block(change.cell));
        Ok(())
    }
}

pub fn viewer(world: WorldId, point: Vec3, view: u32, config: StreamConfig) -> ViewerSync<Recorder> {
    viewer_with(world, point, view, config, Recorder::default())
}

pub fn viewer_with(
    world: WorldId,
    point: Vec3,
    view: u32,
    config: StreamConfig,
    recorder: Recorder,
) -> ViewerSync<Recorder> {
    let state = ViewerState::new(EntityId::new(), view).at(Placement::at(world, point));
    ViewerSync::new(config, state, recorder).expect("valid config")
}

/// One full tick: finalize, pre-snapshot, commit.
pub fn cycle(sync: &mut ViewerSync<Recorder>, store: &dyn CellStore) -> Result<(), SyncError> {
    cycle_with(sync, store, &Unbounded)
}

pub fn cycle_with(
    sync: &mut ViewerSync<Recorder>,
    store: &dyn CellStore,
    clock: &dyn TickClock,
) -> Result<(), SyncError> {
    sync.finalize_tick(store);
    let result = sync.pre_snapshot(store, clock);
    sync.commit_snapshot();
    result
}

/// Cycle until every queue is empty. Returns the number of ticks run.
pub fn run_until_idle(sync: &mut ViewerSync<Recorder>, store: &dyn CellStore, max_ticks: usize) -> usize {
    for tick in 1..=max_ticks {
        cycle(sync, store).expect("cycle");
        if tick > 1 && sync.queues().is_idle() {
            return tick;
        }
    }
    panic!("still streaming after {max_ticks} ticks");
}
