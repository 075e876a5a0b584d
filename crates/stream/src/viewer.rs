use viewsync_common::{EntityId, Placement, ViewerId};

/// What the simulation knows about one connected viewer.
///
/// `live` is where the viewer is now; `stable` is the placement as of the last
/// committed snapshot. Either may be missing while the viewer has no valid
/// position. View distance is measured in cells.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewerState {
    viewer: ViewerId,
    entity: EntityId,
    live: Option<Placement>,
    stable: Option<Placement>,
    view_distance: u32,
    prev_view_distance: u32,
    transform_dirty: bool,
}

impl ViewerState {
    pub fn new(entity: EntityId, view_distance: u32) -> Self {
        Self {
            viewer: ViewerId::new(),
            entity,
            live: None,
            stable: None,
            view_distance,
            prev_view_distance: view_distance,
            transform_dirty: false,
        }
    }

    /// Builder: start at `placement` (live only; it becomes stable on commit).
    pub fn at(mut self, placement: Placement) -> Self {
        self.live = Some(placement);
        self
    }

    pub fn viewer(&self) -> ViewerId {
        self.viewer
    }

    pub fn entity(&self) -> EntityId {
        self.entity
    }

    pub fn live(&self) -> Option<Placement> {
        self.live
    }

    pub fn stable(&self) -> Option<Placement> {
        self.stable
    }

    /// Move the viewer. Takes effect in the stable placement at the next commit.
    pub fn set_placement(&mut self, placement: Placement) {
        self.live = Some(placement);
    }

    /// Invalidate the live placement (e.g. while dead or in transit).
    pub fn clear_placement(&mut self) {
        self.live = None;
    }

    pub fn view_distance(&self) -> u32 {
        self.view_distance
    }

    pub fn prev_view_distance(&self) -> u32 {
        self.prev_view_distance
    }

    pub fn set_view_distance(&mut self, cells: u32) {
        self.view_distance = cells;
    }

    pub fn view_distance_changed(&self) -> bool {
        self.view_distance != self.prev_view_distance
    }

    /// Whether the last commit changed the stable placement.
    pub fn is_transform_dirty(&self) -> bool {
        self.transform_dirty
    }

    /// Copy the live values into the stable snapshot.
    pub fn commit_snapshot(&mut self) {
        self.transform_dirty = self.stable != self.live;
        self.stable = self.live;
        self.prev_view_distance = self.view_distance;
    }
}
