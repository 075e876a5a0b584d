//! Shared value types for the viewsync workspace.
//!
//! # Invariants
//! - Every type here is a plain value: `Copy` where possible, equality by value.
//! - Cell geometry is expressed once, in [`CellGeometry`], and every crate
//!   converts between block space and cell space through it.

pub mod coords;
pub mod types;

pub use coords::{CellCoord, CellGeometry, DistanceMetric, GeometryError, Placement, Position};
pub use types::{EntityId, Transform, ViewerId, WorldId};
