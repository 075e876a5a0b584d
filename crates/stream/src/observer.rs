use std::collections::HashSet;
use viewsync_common::{CellCoord, ViewerId};
use viewsync_kernel::{CellStore, Chunk, LoadOption};

/// Result of an observe request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObserveOutcome {
    /// The viewer is now registered on the cell's chunk.
    Registered,
    /// The viewer already held a registration; nothing changed.
    AlreadyObserved,
    /// The chunk was not resident; the cell is pending and will be retried.
    Deferred,
}

/// Tracks which cells one viewer observes.
///
/// Registration never forces a load: a cell whose chunk is not in memory
/// goes to the pending set and is retried later. A cell is registered at most
/// once until it is unobserved again.
#[derive(Debug, Clone)]
pub struct ObserverRegistry {
    viewer: ViewerId,
    observed: HashSet<CellCoord>,
    pending: HashSet<CellCoord>,
}

impl ObserverRegistry {
    pub fn new(viewer: ViewerId) -> Self {
        Self {
            viewer,
            observed: HashSet::new(),
            pending: HashSet::new(),
        }
    }

    pub fn viewer(&self) -> ViewerId {
        self.viewer
    }

    pub fn observe(&mut self, store: &dyn CellStore, cell: CellCoord) -> ObserveOutcome {
        if self.observed.contains(&cell) {
            self.pending.remove(&cell);
            return ObserveOutcome::AlreadyObserved;
        }
        match store.cell(cell, LoadOption::MemoryOnly) {
            Some(chunk) => self.observe_chunk(&chunk),
            None => {
                self.pending.insert(cell);
                tracing::debug!(viewer = %self.viewer, %cell, "observe deferred; cell not resident");
                ObserveOutcome::Deferred
            }
        }
    }

    /// Register on a chunk the caller already holds.
    pub fn observe_chunk(&mut self, chunk: &Chunk) -> ObserveOutcome {
        let cell = chunk.coord();
        self.pending.remove(&cell);
        if !self.observed.insert(cell) {
            return ObserveOutcome::AlreadyObserved;
        }
        chunk.add_observer(self.viewer);
        tracing::debug!(viewer = %self.viewer, %cell, "observer registered");
        ObserveOutcome::Registered
    }

    /// Drop the registration on `cell`, and any pending request for it, even
    /// if the chunk has since been unloaded. Returns whether the cell was observed.
    pub fn unobserve(&mut self, store: &dyn CellStore, cell: CellCoord) -> bool {
        self.pending.remove(&cell);
        let was_observed = self.observed.remove(&cell);
        if let Some(table) = store.observer_table(cell.world) {
            table.remove(self.viewer, cell);
        }
        if was_observed {
            tracing::debug!(viewer = %self.viewer, %cell, "observer removed");
        }
        was_observed
    }

    /// Re-attempt every pending cell still wanted, without forcing loads.
    /// Unwanted pending cells are dropped. Returns how many got registered.
    pub fn retry_pending(
        &mut self,
        store: &dyn CellStore,
        wanted: impl Fn(&CellCoord) -> bool,
    ) -> usize {
        let pending: Vec<CellCoord> = self.pending.iter().copied().collect();
        let mut registered = 0;
        for cell in pending {
            if !wanted(&cell) {
                self.pending.remove(&cell);
                continue;
            }
            if let Some(chunk) = store.cell(cell, LoadOption::MemoryOnly) {
                if self.observe_chunk(&chunk) == ObserveOutcome::Registered {
                    registered += 1;
                }
            }
        }
        registered
    }

    /// Unobserve every observed cell no longer wanted. Returns how many.
    pub fn prune(&mut self, store: &dyn CellStore, wanted: impl Fn(&CellCoord) -> bool) -> usize {
        let stale: Vec<CellCoord> = self
            .observed
            .iter()
            .filter(|c| !wanted(c))
            .copied()
            .collect();
        for cell in &stale {
            self.unobserve(store, *cell);
        }
        stale.len()
    }

    /// Unobserve everything and forget pending requests.
    pub fn clear_all(&mut self, store: &dyn CellStore) {
        let observed: Vec<CellCoord> = self.observed.iter().copied().collect();
        for cell in observed {
            self.unobserve(store, cell);
        }
        self.pending.clear();
    }

    pub fn is_observed(&self, cell: &CellCoord) -> bool {
        self.observed.contains(cell)
    }

    pub fn is_pending(&self, cell: &CellCoord) -> bool {
        self.pending.contains(cell)
    }

    pub fn observed(&self) -> &HashSet<CellCoord> {
        &self.observed
    }

    pub fn pending(&self) -> &HashSet<CellCoord> {
        &self.pending
    }
}
