use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use viewsync_common::{CellCoord, ViewerId};

/// The viewer ↔ cell observation relation.
///
/// Stored as a set of `(viewer, cell)` pairs indexed from both sides, so the
/// world can ask "who watches this cell" and a viewer can ask "what do I
/// watch" without either side holding pointers into the other. Insert and
/// remove are idempotent and safe to call from several tick threads at once.
#[derive(Debug, Default)]
pub struct ObserverTable {
    inner: RwLock<Relation>,
}

#[derive(Debug, Default)]
struct Relation {
    by_cell: HashMap<CellCoord, HashSet<ViewerId>>,
    by_viewer: HashMap<ViewerId, HashSet<CellCoord>>,
}

impl ObserverTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `viewer` on `cell`. Returns false if the pair already existed.
    pub fn insert(&self, viewer: ViewerId, cell: CellCoord) -> bool {
        let mut rel = self.inner.write();
        let added = rel.by_cell.entry(cell).or_default().insert(viewer);
        if added {
            rel.by_viewer.entry(viewer).or_default().insert(cell);
        }
        added
    }

    /// Deregister `viewer` from `cell`. Returns false if the pair was absent.
    pub fn remove(&self, viewer: ViewerId, cell: CellCoord) -> bool {
        let mut rel = self.inner.write();
        let Some(viewers) = rel.by_cell.get_mut(&cell) else {
            return false;
        };
        let removed = viewers.remove(&viewer);
        if viewers.is_empty() {
            rel.by_cell.remove(&cell);
        }
        if removed {
            if let Some(cells) = rel.by_viewer.get_mut(&viewer) {
                cells.remove(&cell);
                if cells.is_empty() {
                    rel.by_viewer.remove(&viewer);
                }
            }
        }
        removed
    }

    /// Drop every registration held by `viewer`. Returns how many were dropped.
    pub fn remove_viewer(&self, viewer: ViewerId) -> usize {
        let mut rel = self.inner.write();
        let Some(cells) = rel.by_viewer.remove(&viewer) else {
            return 0;
        };
        for cell in &cells {
            if let Some(viewers) = rel.by_cell.get_mut(cell) {
                viewers.remove(&viewer);
                if viewers.is_empty() {
                    rel.by_cell.remove(cell);
                }
            }
        }
        cells.len()
    }

    pub fn contains(&self, viewer: ViewerId, cell: CellCoord) -> bool {
        self.inner
            .read()
            .by_cell
            .get(&cell)
            .is_some_and(|v| v.contains(&viewer))
    }

    /// Whether anybody observes `cell`.
    pub fn is_observed(&self, cell: CellCoord) -> bool {
        self.inner.read().by_cell.contains_key(&cell)
    }

    pub fn observers_of(&self, cell: CellCoord) -> Vec<ViewerId> {
        self.inner
            .read()
            .by_cell
            .get(&cell)
            .map(|v| v.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn observed_by(&self, viewer: ViewerId) -> Vec<CellCoord> {
        self.inner
            .read()
            .by_viewer
            .get(&viewer)
            .map(|c| c.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn observer_count(&self, cell: CellCoord) -> usize {
        self.inner.read().by_cell.get(&cell).map_or(0, |v| v.len())
    }

    /// Total number of `(viewer, cell)` pairs.
    pub fn len(&self) -> usize {
        self.inner.read().by_cell.values().map(|v| v.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().by_cell.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::IVec3;
    use std::sync::Arc;
    use viewsync_common::WorldId;

    fn cell(world: WorldId, x: i32) -> CellCoord {
        CellCoord::new(world, IVec3::new(x, 0, 0))
    }

    #[test]
    fn insert_is_idempotent() {
        let table = ObserverTable::new();
        let viewer = ViewerId::new();
        let c = cell(WorldId::new(), 0);
        assert!(table.insert(viewer, c));
        assert!(!table.insert(viewer, c));
        assert_eq!(table.observer_count(c), 1);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn queryable_from_both_sides() {
        let table = ObserverTable::new();
        let world = WorldId::new();
        let (a, b) = (ViewerId::new(), ViewerId::new());
        table.insert(a, cell(world, 0));
        table.insert(a, cell(world, 1));
        table.insert(b, cell(world, 1));

        assert_eq!(table.observed_by(a).len(), 2);
        assert_eq!(table.observers_of(cell(world, 1)).len(), 2);
        assert!(table.contains(b, cell(world, 1)));
        assert!(!table.contains(b, cell(world, 0)));
    }

    #[test]
    fn remove_cleans_both_indexes() {
        let table = ObserverTable::new();
        let viewer = ViewerId::new();
        let c = cell(WorldId::new(), 3);
        table.insert(viewer, c);
        assert!(table.remove(viewer, c));
        assert!(!table.remove(viewer, c));
        assert!(!table.is_observed(c));
        assert!(table.observed_by(viewer).is_empty());
        assert!(table.is_empty());
    }

    #[test]
    fn remove_viewer_drops_all_pairs() {
        let table = ObserverTable::new();
        let world = WorldId::new();
        let (a, b) = (ViewerId::new(), ViewerId::new());
        for x in 0..5 {
            table.insert(a, cell(world, x));
        }
        table.insert(b, cell(world, 0));
        assert_eq!(table.remove_viewer(a), 5);
        assert_eq!(table.len(), 1);
        assert_eq!(table.observers_of(cell(world, 0)), vec![b]);
    }

    #[test]
    fn concurrent_registration_counts_once() {
        let table = Arc::new(ObserverTable::new());
        let world = WorldId::new();
        let viewers: Vec<ViewerId> = (0..8).map(|_| ViewerId::new()).collect();
        let handles: Vec<_> = viewers
            .iter()
            .map(|&v| {
                let table = Arc::clone(&table);
                std::thread::spawn(move || {
                    for x in 0..50 {
                        table.insert(v, cell(world, x));
                        table.insert(v, cell(world, x));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(table.len(), 8 * 50);
        assert_eq!(table.observer_count(cell(world, 7)), 8);
    }
}
