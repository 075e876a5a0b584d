use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use std::sync::Arc;

use crate::codec::encode_frame;
use crate::error::TransportError;
use crate::message::Message;

/// An ordered, reliable, fire-and-forget message pipe to one client.
pub trait Session {
    fn send(&self, message: Message) -> Result<(), TransportError>;
}

impl<T: Session + ?Sized> Session for Arc<T> {
    fn send(&self, message: Message) -> Result<(), TransportError> {
        (**self).send(message)
    }
}

/// Session that keeps every message in memory. Can be closed to simulate a
/// dropped connection.
#[derive(Debug, Default)]
pub struct MemorySession {
    messages: Mutex<Vec<Message>>,
    closed: Mutex<bool>,
}

impl MemorySession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove and return everything sent so far.
    pub fn take(&self) -> Vec<Message> {
        std::mem::take(&mut *self.messages.lock())
    }

    pub fn messages(&self) -> Vec<Message> {
        self.messages.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.messages.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.lock().is_empty()
    }

    pub fn close(&self) {
        *self.closed.lock() = true;
    }

    pub fn reopen(&self) {
        *self.closed.lock() = false;
    }
}

impl Session for MemorySession {
    fn send(&self, message: Message) -> Result<(), TransportError> {
        if *self.closed.lock() {
            return Err(TransportError::Closed);
        }
        self.messages.lock().push(message);
        Ok(())
    }
}

/// Session that encodes each message into a frame and hands it to a channel,
/// typically drained by a network writer thread.
#[derive(Debug, Clone)]
pub struct ChannelSession {
    frames: Sender<Vec<u8>>,
}

impl ChannelSession {
    pub fn new(frames: Sender<Vec<u8>>) -> Self {
        Self { frames }
    }

    /// Unbounded session plus the receiving end of its frames.
    pub fn unbounded() -> (Self, Receiver<Vec<u8>>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (Self::new(tx), rx)
    }
}

impl Session for ChannelSession {
    fn send(&self, message: Message) -> Result<(), TransportError> {
        let frame = encode_frame(&message)?;
        tracing::trace!(kind = message.kind(), bytes = frame.len(), "frame queued");
        self.frames.send(frame).map_err(|_| TransportError::Closed)
    }
}
