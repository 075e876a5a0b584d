use glam::{IVec3, UVec3, Vec3};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use viewsync_common::{CellCoord, CellGeometry, WorldId};

use crate::chunk::{BlockState, Chunk};
use crate::observers::ObserverTable;

/// Material ids produced by the built-in terrain generator.
pub const STONE: u16 = 1;
pub const GRASS: u16 = 2;

/// How far a cell lookup may go to produce a chunk object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadOption {
    /// Only return cells already resident in memory.
    MemoryOnly,
    /// Bring the cell into memory from storage or the generator if needed.
    LoadIfAbsent,
}

/// Errors from world operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorldError {
    #[error("cell {0} is outside the world's vertical bounds")]
    OutOfBounds(CellCoord),
    #[error("unknown world {0:?}")]
    UnknownWorld(WorldId),
}

/// Descriptive metadata sent to clients entering the world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldInfo {
    pub id: WorldId,
    pub name: String,
    pub seed: u64,
    pub spawn: Vec3,
    /// Lowest cell layer (inclusive).
    pub min_cell_y: i32,
    /// Highest cell layer (inclusive).
    pub max_cell_y: i32,
}

/// A block edit, with enough context to notify observers of the cell.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BlockChange {
    pub cell: CellCoord,
    /// Block position local to the cell.
    pub local: UVec3,
    pub old: BlockState,
    pub new: BlockState,
}

/// An event record produced by every residency change or edit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WorldEvent {
    /// Cell became resident, either from storage or freshly generated.
    CellLoaded { cell: CellCoord, generated: bool },
    /// Cell left memory; its blocks went back to storage.
    CellUnloaded { cell: CellCoord },
    /// A block was edited.
    BlockChanged(BlockChange),
    /// Simulation advanced one tick with the given seed.
    Stepped { tick: u64, seed: u64 },
}

/// The authoritative state of one voxel world.
///
/// Cells are either resident (an `Arc<Chunk>` shared with every viewer that
/// fetched it), stored (unloaded blocks kept aside), or absent. Absent cells
/// within the vertical bounds are produced by the deterministic terrain
/// generator when generation is enabled.
#[derive(Debug)]
pub struct World {
    info: WorldInfo,
    geometry: CellGeometry,
    generation: bool,
    resident: RwLock<HashMap<IVec3, Arc<Chunk>>>,
    stored: RwLock<HashMap<IVec3, Vec<BlockState>>>,
    observers: Arc<ObserverTable>,
    tick: u64,
    /// Append-only event log of all mutations.
    event_log: Mutex<Vec<WorldEvent>>,
}

impl World {
    /// Create a generating world with the default cell geometry and bounds -4..=4.
    pub fn new(name: impl Into<String>, seed: u64) -> Self {
        Self {
            info: WorldInfo {
                id: WorldId::new(),
                name: name.into(),
                seed,
                spawn: Vec3::new(0.0, 1.0, 0.0),
                min_cell_y: -4,
                max_cell_y: 4,
            },
            geometry: CellGeometry::DEFAULT,
            generation: true,
            resident: RwLock::new(HashMap::new()),
            stored: RwLock::new(HashMap::new()),
            observers: Arc::new(ObserverTable::new()),
            tick: 0,
            event_log: Mutex::new(Vec::new()),
        }
    }

    pub fn with_geometry(mut self, geometry: CellGeometry) -> Self {
        self.geometry = geometry;
        self
    }

    pub fn with_vertical_bounds(mut self, min_cell_y: i32, max_cell_y: i32) -> Self {
        assert!(min_cell_y <= max_cell_y, "empty vertical bounds");
        self.info.min_cell_y = min_cell_y;
        self.info.max_cell_y = max_cell_y;
        self
    }

    pub fn with_spawn(mut self, spawn: Vec3) -> Self {
        self.info.spawn = spawn;
        self
    }

    /// Disable the generator: absent cells stay absent until [`World::generate`].
    pub fn without_generation(mut self) -> Self {
        self.generation = false;
        self
    }

    pub fn id(&self) -> WorldId {
        self.info.id
    }

    pub fn info(&self) -> &WorldInfo {
        &self.info
    }

    pub fn geometry(&self) -> CellGeometry {
        self.geometry
    }

    pub fn observers(&self) -> &Arc<ObserverTable> {
        &self.observers
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn seed(&self) -> u64 {
        self.info.seed
    }

    pub fn coord(&self, index: IVec3) -> CellCoord {
        CellCoord::new(self.info.id, index)
    }

    pub fn in_bounds(&self, index: IVec3) -> bool {
        (self.info.min_cell_y..=self.info.max_cell_y).contains(&index.y)
    }

    pub fn is_resident(&self, index: IVec3) -> bool {
        self.resident.read().contains_key(&index)
    }

    pub fn resident_count(&self) -> usize {
        self.resident.read().len()
    }

    /// Look up a cell, loading it only if `load` allows.
    pub fn chunk(&self, index: IVec3, load: LoadOption) -> Option<Arc<Chunk>> {
        if let Some(chunk) = self.resident.read().get(&index) {
            return Some(Arc::clone(chunk));
        }
        match load {
            LoadOption::MemoryOnly => None,
            LoadOption::LoadIfAbsent => self.bring_resident(index, self.generation),
        }
    }

    /// Make a cell resident, running the generator even if generation is disabled.
    pub fn generate(&self, index: IVec3) -> Result<Arc<Chunk>, WorldError> {
        if !self.in_bounds(index) {
            return Err(WorldError::OutOfBounds(self.coord(index)));
        }
        if let Some(chunk) = self.resident.read().get(&index) {
            return Ok(Arc::clone(chunk));
        }
        self.bring_resident(index, true)
            .ok_or(WorldError::OutOfBounds(self.coord(index)))
    }

    fn bring_resident(&self, index: IVec3, may_generate: bool) -> Option<Arc<Chunk>> {
        if !self.in_bounds(index) {
            return None;
        }
        let mut resident = self.resident.write();
        // Another thread may have loaded it between the read and write locks.
        if let Some(chunk) = resident.get(&index) {
            return Some(Arc::clone(chunk));
        }
        let stored = self.stored.write().remove(&index);
        let generated = stored.is_none();
        let blocks = match stored {
            Some(blocks) => blocks,
            None if may_generate => self.terrain(index),
            None => return None,
        };
        let coord = self.coord(index);
        let chunk = Arc::new(Chunk::with_blocks(
            coord,
            self.geometry.edge() as u32,
            blocks,
            Arc::clone(&self.observers),
        ));
        resident.insert(index, Arc::clone(&chunk));
        tracing::debug!(%coord, generated, "cell loaded");
        self.event_log
            .lock()
            .push(WorldEvent::CellLoaded { cell: coord, generated });
        Some(chunk)
    }

    /// Move a resident cell back to storage, observers or not.
    pub fn unload(&self, index: IVec3) -> bool {
        let Some(chunk) = self.resident.write().remove(&index) else {
            return false;
        };
        self.stored.write().insert(index, chunk.blocks());
        tracing::debug!(coord = %chunk.coord(), "cell unloaded");
        self.event_log
            .lock()
            .push(WorldEvent::CellUnloaded { cell: chunk.coord() });
        true
    }

    /// Unload every resident cell nobody observes. Returns the unloaded cells.
    pub fn unload_unobserved(&self) -> Vec<CellCoord> {
        let candidates: Vec<IVec3> = self
            .resident
            .read()
            .keys()
            .copied()
            .filter(|i| !self.observers.is_observed(self.coord(*i)))
            .collect();
        candidates
            .into_iter()
            .filter(|i| self.unload(*i))
            .map(|i| self.coord(i))
            .collect()
    }

    /// Edit a block at a world block position, loading its cell if needed.
    pub fn set_block(&self, block: IVec3, state: BlockState) -> Result<BlockChange, WorldError> {
        let index = self.geometry.cell_of(block.as_vec3());
        let cell = self.coord(index);
        let chunk = self
            .chunk(index, LoadOption::LoadIfAbsent)
            .ok_or(WorldError::OutOfBounds(cell))?;
        let local = (block - self.geometry.base_of(index)).as_uvec3();
        let old = chunk
            .set_block(local.x, local.y, local.z, state)
            .ok_or(WorldError::OutOfBounds(cell))?;
        let change = BlockChange {
            cell,
            local,
            old,
            new: state,
        };
        self.event_log.lock().push(WorldEvent::BlockChanged(change));
        Ok(change)
    }

    /// Drain and return the event log.
    pub fn drain_events(&self) -> Vec<WorldEvent> {
        std::mem::take(&mut *self.event_log.lock())
    }

    pub fn event_count(&self) -> usize {
        self.event_log.lock().len()
    }

    /// Advance the simulation by one tick.
    pub fn step(&mut self) {
        self.tick += 1;
        self.info.seed = splitmix64(self.info.seed);
        self.event_log.get_mut().push(WorldEvent::Stepped {
            tick: self.tick,
            seed: self.info.seed,
        });
    }

    /// Deterministic terrain: a noisy grass surface over stone around y = 0.
    fn terrain(&self, index: IVec3) -> Vec<BlockState> {
        let edge = self.geometry.edge();
        let base = self.geometry.base_of(index);
        let mut blocks = Vec::with_capacity((edge * edge * edge) as usize);
        for x in 0..edge {
            for y in 0..edge {
                for z in 0..edge {
                    let wx = base.x + x;
                    let wy = base.y + y;
                    let wz = base.z + z;
                    let height = self.surface_height(wx, wz);
                    let state = if wy < height {
                        BlockState::new(STONE, 0)
                    } else if wy == height {
                        BlockState::new(GRASS, 0)
                    } else {
                        BlockState::AIR
                    };
                    blocks.push(state);
                }
            }
        }
        blocks
    }

    fn surface_height(&self, x: i32, z: i32) -> i32 {
        let key = (x as u64).wrapping_mul(0x9e37_79b9) ^ (z as u64).rotate_left(32);
        (splitmix64(self.info.seed ^ key) % 4) as i32
    }
}

/// Splitmix64 ... a fast, high-quality deterministic PRNG step function.
/// Used to advance the world seed each tick and to derive terrain heights.
fn splitmix64(mut state: u64) -> u64 {
    state = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
    let mut z = state;
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}
