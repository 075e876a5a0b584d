use std::collections::HashSet;
use std::ops::RangeInclusive;
use viewsync_common::{CellCoord, DistanceMetric};

use crate::queue::CellQueue;
use crate::volume::{in_view_volume, viewable};

/// The area a viewer can see, in cell units, clipped to the world's
/// vertical cell bounds.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewArea {
    pub center: CellCoord,
    pub view_radius: u32,
    pub priority_radius: u32,
    pub metric: DistanceMetric,
    pub vertical: RangeInclusive<i32>,
}

impl ViewArea {
    /// A view area with no vertical limit.
    pub fn new(center: CellCoord, view_radius: u32, priority_radius: u32, metric: DistanceMetric) -> Self {
        Self {
            center,
            view_radius,
            priority_radius,
            metric,
            vertical: i32::MIN..=i32::MAX,
        }
    }

    pub fn with_vertical_bounds(mut self, min_cell_y: i32, max_cell_y: i32) -> Self {
        self.vertical = min_cell_y..=max_cell_y;
        self
    }

    pub fn contains(&self, cell: &CellCoord) -> bool {
        cell.world == self.center.world
            && self.vertical.contains(&cell.y)
            && in_view_volume(cell.index(), self.center.index(), self.view_radius, self.metric)
    }

    pub fn is_priority(&self, cell: &CellCoord) -> bool {
        cell.world == self.center.world
            && self
                .metric
                .within(self.center.index(), cell.index(), self.priority_radius)
    }

    /// Every visible cell inside the world, nearest first.
    pub fn cells(&self) -> impl Iterator<Item = CellCoord> + '_ {
        let world = self.center.world;
        viewable(self.center.index(), self.view_radius, self.metric)
            .filter(|i| self.vertical.contains(&i.y))
            .map(move |i| CellCoord::new(world, i))
    }
}

/// Which of the four lifecycle queues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueKind {
    Init,
    Priority,
    Send,
    Free,
}

/// The per-viewer delta between what the client has and what it should have.
///
/// Rebuilt from scratch by [`LifecycleQueues::recompute`] and drained by the
/// reconciler. A cell is never in both `init` and `free`.
#[derive(Debug, Clone, Default)]
pub struct LifecycleQueues {
    /// Cells the client must allocate.
    pub init: CellQueue,
    /// Unsent cells close to the viewer; drained before `send`.
    pub priority: CellQueue,
    /// Remaining unsent visible cells.
    pub send: CellQueue,
    /// Initialized cells that left the view.
    pub free: CellQueue,
}

/// Queue sizes right after a recompute.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecomputeSummary {
    pub init: usize,
    pub priority: usize,
    pub send: usize,
    pub free: usize,
}

impl LifecycleQueues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, kind: QueueKind) -> &CellQueue {
        match kind {
            QueueKind::Init => &self.init,
            QueueKind::Priority => &self.priority,
            QueueKind::Send => &self.send,
            QueueKind::Free => &self.free,
        }
    }

    pub fn get_mut(&mut self, kind: QueueKind) -> &mut CellQueue {
        match kind {
            QueueKind::Init => &mut self.init,
            QueueKind::Priority => &mut self.priority,
            QueueKind::Send => &mut self.send,
            QueueKind::Free => &mut self.free,
        }
    }

    pub fn clear(&mut self) {
        self.init.clear();
        self.priority.clear();
        self.send.clear();
        self.free.clear();
    }

    pub fn is_idle(&self) -> bool {
        self.init.is_empty() && self.priority.is_empty() && self.send.is_empty() && self.free.is_empty()
    }

    /// Remove `cell` from both send queues. Returns true if it was queued in either.
    pub fn remove_unsent(&mut self, cell: &CellCoord) -> bool {
        let in_priority = self.priority.remove(cell);
        let in_send = self.send.remove(cell);
        in_priority || in_send
    }

    /// Rebuild all four queues for a viewer standing at `area.center`.
    /// Cells leave in the order they were initialized.
    pub fn recompute(
        &mut self,
        area: &ViewArea,
        initialized: &CellQueue,
        active: &HashSet<CellCoord>,
    ) -> RecomputeSummary {
        self.clear();

        for cell in initialized.iter() {
            if !area.contains(&cell) {
                self.free.push_back(cell);
            }
        }

        for cell in area.cells() {
            if !active.contains(&cell) {
                if area.is_priority(&cell) {
                    self.priority.push_back(cell);
                } else {
                    self.send.push_back(cell);
                }
            }
            if !initialized.contains(&cell) {
                self.init.push_back(cell);
            }
        }

        RecomputeSummary {
            init: self.init.len(),
            priority: self.priority.len(),
            send: self.send.len(),
            free: self.free.len(),
        }
    }
}
