use viewsync_stream::SyncError;

/// Errors from encoding or delivering messages.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("session closed")]
    Closed,
    #[error("CBOR serialization error: {0}")]
    Encode(String),
    #[error("CBOR deserialization error: {0}")]
    Decode(String),
    #[error("frame of {len} bytes exceeds the {max} byte limit")]
    FrameTooLarge { len: usize, max: usize },
}

impl From<TransportError> for SyncError {
    fn from(err: TransportError) -> Self {
        SyncError::transport(err)
    }
}
