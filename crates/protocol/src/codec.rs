//! Length-prefixed CBOR frames.
//!
//! Each frame is a 4-byte big-endian payload length followed by the CBOR
//! encoding of one [`Message`].

use crate::error::TransportError;
use crate::message::Message;

/// Largest accepted payload, in bytes.
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

const HEADER_LEN: usize = 4;

pub fn encode_frame(message: &Message) -> Result<Vec<u8>, TransportError> {
    let mut frame = vec![0; HEADER_LEN];
    ciborium::into_writer(message, &mut frame)
        .map_err(|e| TransportError::Encode(e.to_string()))?;
    let len = frame.len() - HEADER_LEN;
    if len > MAX_FRAME_LEN {
        return Err(TransportError::FrameTooLarge {
            len,
            max: MAX_FRAME_LEN,
        });
    }
    frame[..HEADER_LEN].copy_from_slice(&(len as u32).to_be_bytes());
    Ok(frame)
}

/// Decode the frame at the start of `buf`. Returns the message and the number
/// of bytes consumed.
pub fn decode_frame(buf: &[u8]) -> Result<(Message, usize), TransportError> {
    let Some(header) = buf.get(..HEADER_LEN) else {
        return Err(TransportError::Decode("truncated frame header".into()));
    };
    let mut len_bytes = [0; HEADER_LEN];
    len_bytes.copy_from_slice(header);
    let len = u32::from_be_bytes(len_bytes) as usize;
    if len > MAX_FRAME_LEN {
        return Err(TransportError::FrameTooLarge {
            len,
            max: MAX_FRAME_LEN,
        });
    }
    let end = HEADER_LEN + len;
    let Some(payload) = buf.get(HEADER_LEN..end) else {
        return Err(TransportError::Decode(format!(
            "truncated frame: need {len} payload bytes, have {}",
            buf.len() - HEADER_LEN
        )));
    };
    let message =
        ciborium::from_reader(payload).map_err(|e| TransportError::Decode(e.to_string()))?;
    Ok((message, end))
}

/// Decode every frame in a byte stream.
pub fn decode_all(mut buf: &[u8]) -> Result<Vec<Message>, TransportError> {
    let mut messages = Vec::new();
    while !buf.is_empty() {
        let (message, used) = decode_frame(buf)?;
        messages.push(message);
        buf = &buf[used..];
    }
    Ok(messages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::IVec3;
    use viewsync_common::{CellCoord, WorldId};

    fn free() -> Message {
        Message::CellFree {
            coord: CellCoord::new(WorldId::new(), IVec3::new(-3, 0, 7)),
        }
    }

    #[test]
    fn frame_header_is_payload_length() {
        let frame = encode_frame(&free()).unwrap();
        let len = u32::from_be_bytes([frame[0], frame[1], frame[2], frame[3]]) as usize;
        assert_eq!(len, frame.len() - 4);
    }

    #[test]
    fn decodes_consecutive_frames() {
        let a = free();
        let b = free();
        let mut stream = encode_frame(&a).unwrap();
        stream.extend(encode_frame(&b).unwrap());
        assert_eq!(decode_all(&stream).unwrap(), vec![a, b]);
    }

    #[test]
    fn truncated_frame_is_decode_error() {
        let frame = encode_frame(&free()).unwrap();
        let err = decode_frame(&frame[..frame.len() - 1]).unwrap_err();
        assert!(matches!(err, TransportError::Decode(_)));
        assert!(matches!(decode_frame(&frame[..2]), Err(TransportError::Decode(_))));
    }

    #[test]
    fn oversized_header_is_rejected() {
        let mut frame = ((MAX_FRAME_LEN + 1) as u32).to_be_bytes().to_vec();
        frame.extend([0; 8]);
        assert!(matches!(
            decode_frame(&frame),
            Err(TransportError::FrameTooLarge { .. })
        ));
    }

    #[test]
    fn garbage_payload_is_decode_error() {
        let mut frame = 3u32.to_be_bytes().to_vec();
        frame.extend([0xff, 0xff, 0xff]);
        assert!(matches!(decode_frame(&frame), Err(TransportError::Decode(_))));
    }
}
