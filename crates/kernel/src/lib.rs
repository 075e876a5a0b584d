//! World Kernel: authoritative voxel world state shared by every viewer.
//!
//! # Invariants
//! - A cell is resident at most once; every lookup returns the same `Arc<Chunk>`.
//! - Observer registrations live in one relation table per world and are
//!   idempotent, so concurrent viewers may register and deregister freely.
//! - Unloading never evicts a cell somebody still observes unless forced.

pub mod chunk;
pub mod clock;
pub mod observers;
pub mod store;
pub mod world;

pub use chunk::{BlockState, Chunk, ChunkSnapshot, SnapshotKind};
pub use clock::{TickClock, TickDeadline, Unbounded};
pub use observers::ObserverTable;
pub use store::{CellStore, Universe};
pub use world::{BlockChange, LoadOption, World, WorldError, WorldEvent, WorldInfo};
