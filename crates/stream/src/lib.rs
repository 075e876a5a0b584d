//! Streaming: per-viewer cell lifecycle, observer registration and send budgets.
//!
//! # Invariants
//! - A client only ever holds data for cells it was told to initialize
//!   (`active ⊆ initialized`).
//! - Missing or ineligible cells are deferred, never errors; only the
//!   transport can fail a pass, and it leaves queued work intact.
//! - Cell transmissions per tick are bounded by the send budget, and the send
//!   queue also yields to the tick clock.
//!
//! # Tick order
//! [`ViewerSync::finalize_tick`] (world still mutable, live placement), then
//! [`ViewerSync::pre_snapshot`] (emits messages), then
//! [`ViewerSync::commit_snapshot`]. [`ViewerHub`] runs the stages for every
//! attached viewer.

mod budget;
mod config;
mod hub;
mod lifecycle;
mod observer;
mod queue;
mod sync;
mod synchronizer;
mod viewer;
pub mod volume;

pub use budget::{SendBudget, StreamStats, TickTimer};
pub use config::{ConfigError, StreamConfig};
pub use hub::ViewerHub;
pub use lifecycle::{LifecycleQueues, QueueKind, RecomputeSummary, ViewArea};
pub use observer::{ObserveOutcome, ObserverRegistry};
pub use queue::CellQueue;
pub use sync::{Phase, ViewerSync};
pub use synchronizer::{SyncError, Synchronizer};
pub use viewer::ViewerState;
pub use volume::{in_view_volume, viewable, ViewableVolume};

pub fn crate_info() -> &'static str {
    "viewsync-stream v0.1.0"
}
