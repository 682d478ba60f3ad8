//! Length-prefixed codec for TCP framing
//!
//! All messages are framed as:
//! ```text
//! [ 4 bytes: length (u32, big-endian) ][ N bytes: JSON payload ]
//! ```
//!
//! Message boundaries survive coalesced and split reads. Framing and payload
//! decoding are separate steps, so a frame with an undecodable payload can be
//! skipped without losing sync with the stream.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::protocol::MAX_FRAME_SIZE;

/// Errors that can occur during encoding/decoding
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Message too large: {0} bytes (max: {MAX_FRAME_SIZE})")]
    MessageTooLarge(usize),

    #[error("Invalid message length prefix: {0}")]
    InvalidLength(u32),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Encode a message into a length-prefixed byte buffer
pub fn encode<T: Serialize>(message: &T) -> Result<Bytes, CodecError> {
    let mut buf = BytesMut::new();
    encode_into(message, &mut buf)?;
    Ok(buf.freeze())
}

/// Encode a message directly into a provided buffer
pub fn encode_into<T: Serialize>(message: &T, buf: &mut BytesMut) -> Result<(), CodecError> {
    let payload = serde_json::to_vec(message)?;

    if payload.len() > MAX_FRAME_SIZE as usize {
        return Err(CodecError::MessageTooLarge(payload.len()));
    }

    buf.reserve(4 + payload.len());
    buf.put_u32(payload.len() as u32);
    buf.put_slice(&payload);

    Ok(())
}

/// Try to split one complete frame payload off the front of `buf`
///
/// Returns:
/// - `Ok(Some(payload))` if a complete frame was available
/// - `Ok(None)` if more data is needed
/// - `Err(...)` if the length prefix is invalid
pub fn decode_frame(buf: &mut BytesMut) -> Result<Option<Bytes>, CodecError> {
    // Need at least 4 bytes for the length prefix
    if buf.len() < 4 {
        return Ok(None);
    }

    // Peek at the length prefix without consuming
    let msg_len = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]);

    if msg_len > MAX_FRAME_SIZE {
        return Err(CodecError::InvalidLength(msg_len));
    }

    let total_len = 4 + msg_len as usize;
    if buf.len() < total_len {
        return Ok(None);
    }

    buf.advance(4);
    Ok(Some(buf.split_to(msg_len as usize).freeze()))
}

/// Try to decode one complete message from `buf`
pub fn decode<T: DeserializeOwned>(buf: &mut BytesMut) -> Result<Option<T>, CodecError> {
    match decode_frame(buf)? {
        Some(payload) => Ok(Some(serde_json::from_slice(&payload)?)),
        None => Ok(None),
    }
}

/// Decoder state machine for streaming decoding
#[derive(Debug, Default)]
pub struct FrameDecoder {
    /// Partial frame data being accumulated
    buffer: BytesMut,
}

impl FrameDecoder {
    /// Create a new frame decoder
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(4096),
        }
    }

    /// Add data to the decoder buffer
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Try to split off the next frame payload
    ///
    /// Call this repeatedly until it returns `Ok(None)` to drain all complete frames
    pub fn next_frame(&mut self) -> Result<Option<Bytes>, CodecError> {
        decode_frame(&mut self.buffer)
    }

    /// Try to decode the next frame as a typed message
    pub fn decode_next<T: DeserializeOwned>(&mut self) -> Result<Option<T>, CodecError> {
        decode(&mut self.buffer)
    }

    /// Get the current buffer length (for debugging)
    pub fn buffer_len(&self) -> usize {
        self.buffer.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Ack, Command, CommandMessage, RawCommand, Target};

    fn enable_frame() -> Bytes {
        encode(&Command::Enable { target: Target::Both }.to_message()).expect("encode failed")
    }

    #[test]
    fn test_length_prefix() {
        let encoded = enable_frame();
        let len_prefix = u32::from_be_bytes([encoded[0], encoded[1], encoded[2], encoded[3]]);
        assert_eq!(len_prefix as usize, encoded.len() - 4);
    }

    #[test]
    fn test_partial_decode() {
        let encoded = enable_frame();

        let mut buf = BytesMut::from(&encoded[..5]);
        let result = decode_frame(&mut buf).expect("decode should not fail on partial data");
        assert!(result.is_none(), "should return None for partial data");

        // Buffer should be unchanged (data not consumed)
        assert_eq!(buf.len(), 5);
    }

    #[test]
    fn test_frame_decoder_split_read() {
        let encoded = enable_frame();
        let mut decoder = FrameDecoder::new();

        decoder.extend(&encoded[..3]);
        assert!(decoder.next_frame().expect("decode error").is_none());

        decoder.extend(&encoded[3..]);
        let message: CommandMessage = decoder
            .decode_next()
            .expect("decode error")
            .expect("should have message");

        assert_eq!(message.action.as_deref(), Some("enable"));
        assert_eq!(decoder.buffer_len(), 0);
    }

    #[test]
    fn test_coalesced_frames() {
        let mut decoder = FrameDecoder::new();
        decoder.extend(&enable_frame());
        decoder.extend(&encode(&Ack::ok()).expect("encode failed"));

        assert!(decoder.next_frame().expect("decode error").is_some());
        let ack: Ack = decoder.decode_next().expect("decode error").expect("no ack");
        assert!(ack.is_ok());
        assert!(decoder.next_frame().expect("decode error").is_none());
    }

    #[test]
    fn test_garbage_payload_keeps_sync() {
        let mut buf = BytesMut::new();
        buf.put_u32(3);
        buf.put_slice(b"{{{");
        buf.extend_from_slice(&enable_frame());

        let garbage = decode_frame(&mut buf).expect("framing is valid").expect("frame");
        assert!(RawCommand::decode(&garbage).is_err());

        let next: CommandMessage = decode(&mut buf).expect("decode error").expect("frame");
        assert_eq!(next.action.as_deref(), Some("enable"));
    }

    #[test]
    fn test_message_too_large() {
        let mut buf = BytesMut::new();
        buf.put_u32(MAX_FRAME_SIZE + 1);
        buf.put_bytes(0, 100);

        let result = decode_frame(&mut buf);
        assert!(matches!(result, Err(CodecError::InvalidLength(_))));
    }
}
