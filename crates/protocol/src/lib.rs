//! Transport sender: wire messages, frame codec, sessions and the built-in
//! synchronizer.
//!
//! # Invariants
//! - Messages for one client are sent in the order the reconciler emits them.
//! - A frame never exceeds [`codec::MAX_FRAME_LEN`] payload bytes.

pub mod codec;
mod builtin;
mod error;
mod message;
mod session;

pub use builtin::BuiltinSynchronizer;
pub use codec::{decode_all, decode_frame, encode_frame};
pub use error::TransportError;
pub use message::{Message, UpdateAction};
pub use session::{ChannelSession, MemorySession, Session};
