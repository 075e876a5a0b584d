use std::collections::BTreeMap;
use std::time::Instant;
use viewsync_common::ViewerId;
use viewsync_kernel::{BlockChange, CellStore, ObserverTable, TickClock};

use crate::budget::TickTimer;
use crate::sync::ViewerSync;
use crate::synchronizer::{SyncError, Synchronizer};

const TIMER_HISTORY: usize = 120;

/// Drives every attached viewer through the tick stages in lockstep.
///
/// Viewers are kept in a BTreeMap so each stage visits them in the same order.
pub struct ViewerHub<S> {
    viewers: BTreeMap<ViewerId, ViewerSync<S>>,
    timer: TickTimer,
}

impl<S: Synchronizer> ViewerHub<S> {
    pub fn new() -> Self {
        Self {
            viewers: BTreeMap::new(),
            timer: TickTimer::new(TIMER_HISTORY),
        }
    }

    /// Attach a viewer. Returns the viewer previously attached under the same id.
    pub fn attach(&mut self, viewer: ViewerSync<S>) -> Option<ViewerSync<S>> {
        let id = viewer.viewer();
        tracing::info!(viewer = %id, "viewer attached");
        self.viewers.insert(id, viewer)
    }

    /// Detach a viewer between ticks, releasing its observer registrations.
    pub fn detach(&mut self, id: ViewerId, store: &dyn CellStore) -> Option<ViewerSync<S>> {
        let mut viewer = self.viewers.remove(&id)?;
        viewer.detach(store);
        tracing::info!(viewer = %id, "viewer detached");
        Some(viewer)
    }

    pub fn get(&self, id: ViewerId) -> Option<&ViewerSync<S>> {
        self.viewers.get(&id)
    }

    pub fn get_mut(&mut self, id: ViewerId) -> Option<&mut ViewerSync<S>> {
        self.viewers.get_mut(&id)
    }

    pub fn viewers(&self) -> impl Iterator<Item = &ViewerSync<S>> {
        self.viewers.values()
    }

    pub fn len(&self) -> usize {
        self.viewers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.viewers.is_empty()
    }

    /// Run one tick: every viewer's `finalize_tick`, then every `pre_snapshot`,
    /// then every snapshot commit. A failing viewer does not stop the others;
    /// its error is logged and returned.
    pub fn tick(&mut self, store: &dyn CellStore, clock: &dyn TickClock) -> Vec<(ViewerId, SyncError)> {
        let _span = tracing::info_span!("hub_tick", viewers = self.viewers.len()).entered();
        let start = Instant::now();

        for viewer in self.viewers.values_mut() {
            viewer.finalize_tick(store);
        }

        let mut errors = Vec::new();
        for (id, viewer) in self.viewers.iter_mut() {
            if let Err(err) = viewer.pre_snapshot(store, clock) {
                tracing::warn!(viewer = %id, error = %err, "pre_snapshot failed");
                errors.push((*id, err));
            }
        }

        for viewer in self.viewers.values_mut() {
            viewer.commit_snapshot();
        }

        self.timer.record(start.elapsed());
        errors
    }

    /// Forward a block edit to every viewer observing its cell.
    pub fn broadcast_block_update(
        &mut self,
        observers: &ObserverTable,
        change: &BlockChange,
    ) -> Vec<(ViewerId, SyncError)> {
        let mut errors = Vec::new();
        for id in observers.observers_of(change.cell) {
            let Some(viewer) = self.viewers.get_mut(&id) else {
                continue;
            };
            if let Err(err) = viewer.update_block(change) {
                tracing::warn!(viewer = %id, error = %err, "block update failed");
                errors.push((id, err));
            }
        }
        errors
    }

    pub fn timer(&self) -> &TickTimer {
        &self.timer
    }
}

impl<S: Synchronizer> Default for ViewerHub<S> {
    fn default() -> Self {
        Self::new()
    }
}
