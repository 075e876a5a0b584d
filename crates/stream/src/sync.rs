use std::collections::HashSet;
use std::time::Instant;
use viewsync_common::{CellCoord, CellGeometry, Position, ViewerId};
use viewsync_kernel::{BlockChange, CellStore, Chunk, LoadOption, TickClock};

use crate::budget::{SendBudget, StreamStats};
use crate::config::{ConfigError, StreamConfig};
use crate::lifecycle::{LifecycleQueues, QueueKind, RecomputeSummary, ViewArea};
use crate::observer::ObserverRegistry;
use crate::queue::CellQueue;
use crate::synchronizer::{SyncError, Synchronizer};
use crate::viewer::ViewerState;

/// Reconciler phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// The client must be reset and told about its (new) world.
    WorldChanged,
    Steady,
}

/// Per-viewer tick reconciler.
///
/// Each tick the owner calls [`finalize_tick`](Self::finalize_tick) while the
/// world is still mutable, then [`pre_snapshot`](Self::pre_snapshot) to emit
/// messages, then [`commit_snapshot`](Self::commit_snapshot).
///
/// # Invariants
/// - `active ⊆ initialized` at every step.
/// - A cell is never in both the init and the free queue.
/// - A drain interrupted by a transport error leaves the failing cell and every
///   unprocessed cell queued.
pub struct ViewerSync<S> {
    config: StreamConfig,
    geometry: CellGeometry,
    state: ViewerState,
    sync: S,
    phase: Phase,
    queues: LifecycleQueues,
    /// Cells the client has allocated, in initialization order.
    initialized: CellQueue,
    active: HashSet<CellCoord>,
    /// Cells that could not be sent this tick.
    unsendable: HashSet<CellCoord>,
    observers: ObserverRegistry,
    budget: SendBudget,
    last_check: Option<Position>,
    force_sync: bool,
    tick_count: u64,
    stats: StreamStats,
    detached: bool,
}

impl<S: Synchronizer> ViewerSync<S> {
    pub fn new(config: StreamConfig, state: ViewerState, sync: S) -> Result<Self, ConfigError> {
        config.validate()?;
        let geometry = config.geometry();
        let budget = SendBudget::new(config.chunks_per_tick, config.priority_multiplier);
        Ok(Self {
            observers: ObserverRegistry::new(state.viewer()),
            config,
            geometry,
            state,
            sync,
            phase: Phase::Steady,
            queues: LifecycleQueues::new(),
            initialized: CellQueue::new(),
            active: HashSet::new(),
            unsendable: HashSet::new(),
            budget,
            last_check: None,
            force_sync: false,
            tick_count: 0,
            stats: StreamStats::default(),
            detached: false,
        })
    }

    fn assert_attached(&self) {
        assert!(!self.detached, "viewer {} used after detach", self.state.viewer());
    }

    /// Reconcile the viewer's wanted cells against its live placement and
    /// update observer registrations. Runs before the world snapshot.
    pub fn finalize_tick(&mut self, store: &dyn CellStore) {
        self.assert_attached();
        let _span = tracing::info_span!("finalize_tick", viewer = %self.state.viewer()).entered();
        let start = Instant::now();
        self.tick_count += 1;
        self.stats = StreamStats::default();

        let live = self.state.live();
        let world_swapped = match (self.state.stable(), live) {
            (None, _) => true,
            (Some(stable), Some(live)) => stable.world() != live.world(),
            (Some(_), None) => false,
        };
        if world_swapped && self.phase == Phase::Steady {
            tracing::debug!("world change detected");
            self.phase = Phase::WorldChanged;
        }
        if self.phase == Phase::WorldChanged {
            self.observers.clear_all(store);
            self.stats.phase_time += start.elapsed();
            return;
        }

        if let Some(live) = live {
            if self.needs_recompute(&live.position) {
                self.recompute(store, live.position);
            }
        }

        let leaving: Vec<CellCoord> = self
            .queues
            .free
            .iter()
            .filter(|c| self.initialized.contains(c))
            .collect();
        for cell in leaving {
            self.observers.unobserve(store, cell);
        }
        let entering: Vec<CellCoord> = self
            .queues
            .init
            .iter()
            .filter(|c| !self.initialized.contains(c))
            .collect();
        for cell in entering {
            self.observers.observe(store, cell);
        }

        let initialized = &self.initialized;
        let queues = &self.queues;
        let wanted = |c: &CellCoord| {
            (initialized.contains(c) || queues.init.contains(c)) && !queues.free.contains(c)
        };
        self.observers.retry_pending(store, wanted);
        self.observers.prune(store, wanted);

        self.stats.observed = self.observers.observed().len();
        self.stats.pending_observe = self.observers.pending().len();
        self.stats.phase_time += start.elapsed();
        tracing::trace!(
            observed = self.stats.observed,
            pending = self.stats.pending_observe,
            "finalize complete"
        );
    }

    fn needs_recompute(&self, position: &Position) -> bool {
        if self.state.view_distance_changed() {
            return true;
        }
        match &self.last_check {
            None => true,
            Some(last) if last.world != position.world => true,
            Some(last) => {
                last != position
                    && self.config.metric.block_distance(last.point, position.point)
                        > self.config.recompute_distance
            }
        }
    }

    fn view_area(&self, store: &dyn CellStore, position: &Position) -> ViewArea {
        let area = ViewArea::new(
            position.cell(self.geometry),
            self.state.view_distance(),
            self.config.priority_radius(),
            self.config.metric,
        );
        match store.world_info(position.world) {
            Some(info) => area.with_vertical_bounds(info.min_cell_y, info.max_cell_y),
            None => area,
        }
    }

    fn recompute(&mut self, store: &dyn CellStore, position: Position) -> RecomputeSummary {
        let _span = tracing::info_span!("recompute").entered();
        let area = self.view_area(store, &position);
        let summary = self
            .queues
            .recompute(&area, &self.initialized, &self.active);
        self.last_check = Some(position);
        self.stats.recomputed = true;
        tracing::debug!(
            center = %area.center,
            radius = area.view_radius,
            init = summary.init,
            priority = summary.priority,
            send = summary.send,
            free = summary.free,
            "queues recomputed"
        );
        summary
    }

    /// Emit this tick's messages: world reset, frees, inits, cell data within
    /// budget, and a position resync when requested. Runs against the stable
    /// placement, after [`finalize_tick`](Self::finalize_tick).
    pub fn pre_snapshot(
        &mut self,
        store: &dyn CellStore,
        clock: &dyn TickClock,
    ) -> Result<(), SyncError> {
        self.assert_attached();
        let _span = tracing::info_span!("pre_snapshot", viewer = %self.state.viewer()).entered();
        let start = Instant::now();
        let result = match self.phase {
            Phase::WorldChanged => self.enter_world(store),
            Phase::Steady => self.stream_cells(store, clock),
        };
        self.stats.phase_time += start.elapsed();
        result
    }

    fn enter_world(&mut self, store: &dyn CellStore) -> Result<(), SyncError> {
        let Some(placement) = self.state.live().or(self.state.stable()) else {
            tracing::debug!("world change postponed; viewer has no placement");
            return Ok(());
        };
        let world = placement.world();
        let info = store
            .world_info(world)
            .ok_or(SyncError::UnknownWorld(world))?;
        self.reset(store);
        self.sync.world_changed(&info, placement.transform())?;
        self.phase = Phase::Steady;
        tracing::debug!(world = %info.name, "world change sent");
        Ok(())
    }

    /// Forget everything the client was told.
    fn reset(&mut self, store: &dyn CellStore) {
        self.queues.clear();
        self.initialized.clear();
        self.active.clear();
        self.unsendable.clear();
        self.observers.clear_all(store);
        self.last_check = None;
    }

    fn stream_cells(&mut self, store: &dyn CellStore, clock: &dyn TickClock) -> Result<(), SyncError> {
        self.unsendable.clear();
        self.drain_free()?;

        let allowance = self.budget.begin_tick(!self.queues.priority.is_empty());
        tracing::trace!(allowance, carried = self.budget.chunks_sent(), "send budget");

        self.drain_init(store)?;
        self.drain_send(store, QueueKind::Priority, None)?;

        if self.force_sync && self.state.is_transform_dirty() {
            if let Some(stable) = self.state.stable() {
                self.sync.send_position(self.state.entity(), stable.transform())?;
                self.force_sync = false;
                tracing::debug!("position resynced");
            }
        }

        if self.queues.priority.is_empty() {
            self.drain_send(store, QueueKind::Send, Some(clock))?;
        }

        tracing::trace!(
            sent = self.stats.sent,
            bundled = self.stats.bundled,
            freed = self.stats.freed,
            initialized = self.stats.initialized,
            deferred = self.stats.deferred,
            "pre_snapshot complete"
        );
        Ok(())
    }

    fn drain_free(&mut self) -> Result<(), SyncError> {
        while let Some(cell) = self.queues.free.pop_front() {
            if !self.initialized.contains(&cell) {
                continue;
            }
            if let Err(err) = self.sync.free_cell(cell) {
                self.queues.free.push_front(cell);
                return Err(err);
            }
            self.initialized.remove(&cell);
            self.active.remove(&cell);
            self.stats.freed += 1;
            tracing::debug!(%cell, "cell freed");
        }
        Ok(())
    }

    fn drain_init(&mut self, store: &dyn CellStore) -> Result<(), SyncError> {
        let mut absent = Vec::new();
        let mut result = Ok(());
        while let Some(cell) = self.queues.init.pop_front() {
            if self.initialized.contains(&cell) {
                continue;
            }
            let Some(chunk) = store.cell(cell, LoadOption::MemoryOnly) else {
                absent.push(cell);
                continue;
            };
            if let Err(err) = self.initialize(&chunk) {
                self.queues.init.push_front(cell);
                result = Err(err);
                break;
            }
        }
        if !absent.is_empty() {
            tracing::debug!(count = absent.len(), "init deferred; cells not resident");
        }
        self.queues.init.extend_front(absent);
        result
    }

    /// Mark a cell initialized: notify, register the observer, and drop it from the init queue.
    fn initialize(&mut self, chunk: &Chunk) -> Result<(), SyncError> {
        let cell = chunk.coord();
        self.sync.init_cell(cell)?;
        self.observers.observe_chunk(chunk);
        self.initialized.push_back(cell);
        self.queues.init.remove(&cell);
        self.stats.initialized += 1;
        tracing::debug!(%cell, "cell initialized");
        Ok(())
    }

    /// Drain one send queue while budget (and time, if a clock is given) remain.
    /// Every step pops one entry; skipped cells go back to the head in order.
    fn drain_send(
        &mut self,
        store: &dyn CellStore,
        kind: QueueKind,
        clock: Option<&dyn TickClock>,
    ) -> Result<(), SyncError> {
        let mut skipped = Vec::new();
        let result = loop {
            if !self.budget.has_capacity() {
                break Ok(());
            }
            if let Some(clock) = clock {
                if !clock.has_time_remaining() {
                    self.stats.time_exhausted = true;
                    tracing::debug!(queued = self.queues.get(kind).len(), "tick time exhausted");
                    break Ok(());
                }
            }
            let Some(cell) = self.queues.get_mut(kind).pop_front() else {
                break Ok(());
            };
            match self.attempt_send(store, cell) {
                Ok(true) => {}
                Ok(false) => skipped.push(cell),
                Err(err) => {
                    self.queues.get_mut(kind).push_front(cell);
                    break Err(err);
                }
            }
        };
        self.stats.deferred += skipped.len();
        self.queues.get_mut(kind).extend_front(skipped);
        result
    }

    /// Try to transmit one cell. `Ok(false)` means it was skipped for this tick.
    fn attempt_send(&mut self, store: &dyn CellStore, cell: CellCoord) -> Result<bool, SyncError> {
        if self.unsendable.contains(&cell) {
            return Ok(false);
        }
        let Some(chunk) = store.cell(cell, LoadOption::LoadIfAbsent) else {
            self.unsendable.insert(cell);
            tracing::debug!(%cell, "send deferred; cell unavailable");
            return Ok(false);
        };
        if !self.sync.can_send_cell(&chunk) {
            self.unsendable.insert(cell);
            tracing::debug!(%cell, "send deferred; cell not eligible");
            return Ok(false);
        }
        if !self.initialized.contains(&cell) {
            self.initialize(&chunk)?;
        }

        let covered = self.sync.send_cell(&chunk)?;
        self.active.insert(cell);
        self.budget.record_sent(1);
        self.stats.sent += 1;
        tracing::debug!(%cell, "cell sent");

        for other in covered {
            if other == cell || !self.queues.remove_unsent(&other) {
                continue;
            }
            if self.initialized.contains(&other) {
                self.active.insert(other);
            }
            self.budget.record_sent(1);
            self.stats.bundled += 1;
            tracing::debug!(cell = %other, "cell sent in bundle");
        }
        Ok(true)
    }

    /// Copy live viewer values into the stable snapshot.
    pub fn commit_snapshot(&mut self) {
        self.assert_attached();
        self.state.commit_snapshot();
    }

    /// Reset the client as if it had just entered its world.
    pub fn force_respawn(&mut self) {
        self.assert_attached();
        tracing::debug!(viewer = %self.state.viewer(), "respawn forced");
        self.phase = Phase::WorldChanged;
    }

    /// Resend the viewer's own position at the next pass that sees it moved.
    pub fn force_sync(&mut self) {
        self.assert_attached();
        self.force_sync = true;
    }

    /// Forward a block edit if the client holds the cell's data.
    /// Returns whether a message was sent.
    pub fn update_block(&mut self, change: &BlockChange) -> Result<bool, SyncError> {
        self.assert_attached();
        if !self.active.contains(&change.cell) {
            return Ok(false);
        }
        self.sync.update_block(change)?;
        Ok(true)
    }

    /// Release every observer registration and drop all per-viewer state.
    /// Any later tick operation on this viewer panics.
    pub fn detach(&mut self, store: &dyn CellStore) {
        self.assert_attached();
        self.reset(store);
        self.detached = true;
        tracing::debug!(viewer = %self.state.viewer(), "viewer detached");
    }

    pub fn viewer(&self) -> ViewerId {
        self.state.viewer()
    }

    pub fn state(&self) -> &ViewerState {
        &self.state
    }

    /// Mutable access for moving the viewer or changing its view distance.
    pub fn state_mut(&mut self) -> &mut ViewerState {
        &mut self.state
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    pub fn active_cells(&self) -> &HashSet<CellCoord> {
        &self.active
    }

    pub fn initialized_cells(&self) -> &CellQueue {
        &self.initialized
    }

    pub fn observed_cells(&self) -> &HashSet<CellCoord> {
        self.observers.observed()
    }

    pub fn pending_observe(&self) -> &HashSet<CellCoord> {
        self.observers.pending()
    }

    pub fn unsendable(&self) -> &HashSet<CellCoord> {
        &self.unsendable
    }

    pub fn queues(&self) -> &LifecycleQueues {
        &self.queues
    }

    pub fn last_check(&self) -> Option<Position> {
        self.last_check
    }

    pub fn budget(&self) -> &SendBudget {
        &self.budget
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn stats(&self) -> &StreamStats {
        &self.stats
    }

    pub fn is_detached(&self) -> bool {
        self.detached
    }

    pub fn synchronizer(&self) -> &S {
        &self.sync
    }

    pub fn synchronizer_mut(&mut self) -> &mut S {
        &mut self.sync
    }
}

impl<S> std::fmt::Debug for ViewerSync<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewerSync")
            .field("viewer", &self.state.viewer())
            .field("phase", &self.phase)
            .field("initialized", &self.initialized.len())
            .field("active", &self.active.len())
            .field("tick_count", &self.tick_count)
            .finish_non_exhaustive()
    }
}
