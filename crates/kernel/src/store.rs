use std::collections::BTreeMap;
use std::sync::Arc;
use viewsync_common::{CellCoord, WorldId};

use crate::chunk::Chunk;
use crate::observers::ObserverTable;
use crate::world::{LoadOption, World, WorldError, WorldInfo};

/// The world/chunk store as seen by the streaming engine.
///
/// Lookups never fail loudly: a cell that cannot be produced under the given
/// [`LoadOption`] is simply `None`, and callers defer.
pub trait CellStore {
    fn cell(&self, coord: CellCoord, load: LoadOption) -> Option<Arc<Chunk>>;

    fn world_info(&self, world: WorldId) -> Option<WorldInfo>;

    /// The observation relation of a world. Registrations are keyed by
    /// coordinate, so they outlive the residency of the chunk itself.
    fn observer_table(&self, world: WorldId) -> Option<&ObserverTable>;
}

impl CellStore for World {
    fn cell(&self, coord: CellCoord, load: LoadOption) -> Option<Arc<Chunk>> {
        if coord.world != self.id() {
            return None;
        }
        self.chunk(coord.index(), load)
    }

    fn world_info(&self, world: WorldId) -> Option<WorldInfo> {
        (world == self.id()).then(|| self.info().clone())
    }

    fn observer_table(&self, world: WorldId) -> Option<&ObserverTable> {
        (world == self.id()).then(|| self.observers().as_ref())
    }
}

/// Every world hosted by a server, keyed by id.
///
/// Uses BTreeMap for deterministic iteration order.
#[derive(Debug, Default)]
pub struct Universe {
    worlds: BTreeMap<WorldId, World>,
}

impl Universe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a world and return its id.
    pub fn insert(&mut self, world: World) -> WorldId {
        let id = world.id();
        self.worlds.insert(id, world);
        id
    }

    pub fn world(&self, id: WorldId) -> Result<&World, WorldError> {
        self.worlds.get(&id).ok_or(WorldError::UnknownWorld(id))
    }

    pub fn world_mut(&mut self, id: WorldId) -> Result<&mut World, WorldError> {
        self.worlds.get_mut(&id).ok_or(WorldError::UnknownWorld(id))
    }

    pub fn worlds(&self) -> impl Iterator<Item = &World> {
        self.worlds.values()
    }

    pub fn len(&self) -> usize {
        self.worlds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.worlds.is_empty()
    }

    /// Advance every world by one tick.
    pub fn step(&mut self) {
        for world in self.worlds.values_mut() {
            world.step();
        }
    }
}

impl CellStore for Universe {
    fn cell(&self, coord: CellCoord, load: LoadOption) -> Option<Arc<Chunk>> {
        self.worlds.get(&coord.world)?.chunk(coord.index(), load)
    }

    fn world_info(&self, world: WorldId) -> Option<WorldInfo> {
        self.worlds.get(&world).map(|w| w.info().clone())
    }

    fn observer_table(&self, world: WorldId) -> Option<&ObserverTable> {
        self.worlds.get(&world).map(|w| w.observers().as_ref())
    }
}
