use std::collections::{HashMap, VecDeque};
use viewsync_common::CellCoord;

/// Insertion-ordered set of cells used as a work queue.
///
/// Drains pop from the front and push skipped cells back, so iteration never
/// observes its own mutations. Removal is O(1): the entry's ticket is
/// invalidated and the stale slot is skipped when it reaches the front.
#[derive(Debug, Clone, Default)]
pub struct CellQueue {
    order: VecDeque<(CellCoord, u64)>,
    live: HashMap<CellCoord, u64>,
    next_ticket: u64,
}

impl CellQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn ticket(&mut self) -> u64 {
        let t = self.next_ticket;
        self.next_ticket += 1;
        t
    }

    /// Append `cell` unless already queued.
    pub fn push_back(&mut self, cell: CellCoord) -> bool {
        if self.live.contains_key(&cell) {
            return false;
        }
        let t = self.ticket();
        self.live.insert(cell, t);
        self.order.push_back((cell, t));
        true
    }

    /// Put `cell` at the head unless already queued.
    pub fn push_front(&mut self, cell: CellCoord) -> bool {
        if self.live.contains_key(&cell) {
            return false;
        }
        let t = self.ticket();
        self.live.insert(cell, t);
        self.order.push_front((cell, t));
        true
    }

    /// Put `cells` at the head, keeping their relative order.
    pub fn extend_front(&mut self, cells: impl IntoIterator<Item = CellCoord>) {
        let cells: Vec<CellCoord> = cells.into_iter().collect();
        for cell in cells.into_iter().rev() {
            self.push_front(cell);
        }
    }

    pub fn pop_front(&mut self) -> Option<CellCoord> {
        while let Some((cell, t)) = self.order.pop_front() {
            if self.live.get(&cell) == Some(&t) {
                self.live.remove(&cell);
                return Some(cell);
            }
        }
        None
    }

    pub fn remove(&mut self, cell: &CellCoord) -> bool {
        let removed = self.live.remove(cell).is_some();
        if removed && self.order.len() > 2 * self.live.len() + 32 {
            let live = &self.live;
            self.order.retain(|(c, t)| live.get(c) == Some(t));
        }
        removed
    }

    pub fn contains(&self, cell: &CellCoord) -> bool {
        self.live.contains_key(cell)
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.live.clear();
    }

    /// Queued cells in order.
    pub fn iter(&self) -> impl Iterator<Item = CellCoord> + '_ {
        self.order
            .iter()
            .filter(|(c, t)| self.live.get(c) == Some(t))
            .map(|(c, _)| *c)
    }
}

impl Extend<CellCoord> for CellQueue {
    fn extend<I: IntoIterator<Item = CellCoord>>(&mut self, iter: I) {
        for cell in iter {
            self.push_back(cell);
        }
    }
}

impl FromIterator<CellCoord> for CellQueue {
    fn from_iter<I: IntoIterator<Item = CellCoord>>(iter: I) -> Self {
        let mut queue = Self::new();
        queue.extend(iter);
        queue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::IVec3;
    use viewsync_common::WorldId;

    fn cells(n: i32) -> Vec<CellCoord> {
        let world = WorldId::new();
        (0..n).map(|x| CellCoord::new(world, IVec3::new(x, 0, 0))).collect()
    }

    #[test]
    fn keeps_insertion_order_and_rejects_duplicates() {
        let c = cells(3);
        let mut q = CellQueue::new();
        assert!(q.push_back(c[1]));
        assert!(q.push_back(c[0]));
        assert!(!q.push_back(c[1]));
        assert_eq!(q.len(), 2);
        assert_eq!(q.iter().collect::<Vec<_>>(), vec![c[1], c[0]]);
    }

    #[test]
    fn remove_skips_stale_entries() {
        let c = cells(3);
        let mut q: CellQueue = c.iter().copied().collect();
        assert!(q.remove(&c[0]));
        assert!(!q.remove(&c[0]));
        assert_eq!(q.pop_front(), Some(c[1]));
        assert_eq!(q.pop_front(), Some(c[2]));
        assert_eq!(q.pop_front(), None);
    }

    #[test]
    fn reinserted_cell_takes_its_new_position() {
        let c = cells(3);
        let mut q: CellQueue = c.iter().copied().collect();
        q.remove(&c[0]);
        q.push_back(c[0]);
        assert_eq!(q.iter().collect::<Vec<_>>(), vec![c[1], c[2], c[0]]);
    }

    #[test]
    fn extend_front_preserves_order() {
        let c = cells(4);
        let mut q: CellQueue = vec![c[3]].into_iter().collect();
        q.extend_front(vec![c[0], c[1], c[2]]);
        assert_eq!(q.iter().collect::<Vec<_>>(), c);
    }

    #[test]
    fn mass_removal_compacts() {
        let c = cells(200);
        let mut q: CellQueue = c.iter().copied().collect();
        for cell in &c[..190] {
            q.remove(cell);
        }
        assert_eq!(q.len(), 10);
        assert!(q.order.len() <= 2 * q.len() + 32 + 1);
        assert_eq!(q.pop_front(), Some(c[190]));
    }

    #[test]
    fn clear_empties() {
        let mut q: CellQueue = cells(5).into_iter().collect();
        q.clear();
        assert!(q.is_empty());
        assert_eq!(q.pop_front(), None);
    }
}
