//! Frame encoding and decoding.
//!
//! Every transfer on the bus, in either direction, is one frame:
//! a length byte, the two command-id bytes MSB first, then `length`
//! payload bytes in little-endian field order. The largest payload is
//! 255 bytes, so a frame fits in a fixed 258-byte buffer and never
//! allocates.

use bytes::BufMut;

use crate::constants::SRSP_OFFSET;
use crate::error::ModuleError;

/// Bytes of header in front of the payload: length + command id.
pub const FRAME_HEADER_LEN: usize = 3;

/// Largest payload a frame can carry (the length field is one byte).
pub const MAX_FRAME_PAYLOAD: usize = 255;

/// The synchronous response id paired with a request id.
pub fn srsp_id(request: u16) -> u16 {
    request | SRSP_OFFSET
}

/// A single protocol frame, owned and fixed-size.
///
/// One `Frame` serves as both the outgoing request and, after the
/// exchange, the incoming response; the transport overwrites it in
/// place. Callers that need to keep response data across a subsequent
/// request must copy it out first.
#[derive(Clone)]
pub struct Frame {
    buf: [u8; FRAME_HEADER_LEN + MAX_FRAME_PAYLOAD],
}

impl Default for Frame {
    fn default() -> Self {
        Frame::new()
    }
}

impl Frame {
    /// An all-zero frame. As written to the wire this is a poll: a
    /// request for whatever asynchronous indication the module has
    /// queued.
    pub fn new() -> Self {
        Frame {
            buf: [0; FRAME_HEADER_LEN + MAX_FRAME_PAYLOAD],
        }
    }

    /// Fill in a request. Fails if the payload exceeds what the
    /// one-byte length field can describe.
    pub fn set(&mut self, command: u16, payload: &[u8]) -> Result<(), ModuleError> {
        if payload.len() > MAX_FRAME_PAYLOAD {
            return Err(ModuleError::InvalidLength {
                max: MAX_FRAME_PAYLOAD,
                actual: payload.len(),
            });
        }
        let mut buf = &mut self.buf[..];
        buf.put_u8(payload.len() as u8);
        buf.put_u16(command); // command id travels MSB first
        buf.put_slice(payload);
        Ok(())
    }

    /// Payload length declared by the header.
    pub fn length(&self) -> usize {
        self.buf[0] as usize
    }

    /// Command id from the header.
    pub fn command(&self) -> u16 {
        u16::from_be_bytes([self.buf[1], self.buf[2]])
    }

    /// The payload bytes the header declares.
    pub fn payload(&self) -> &[u8] {
        &self.buf[FRAME_HEADER_LEN..FRAME_HEADER_LEN + self.length()]
    }

    /// The frame as it appears on the wire: header plus payload.
    pub fn wire(&self) -> &[u8] {
        &self.buf[..FRAME_HEADER_LEN + self.length()]
    }

    /// Mutable view of the whole on-wire frame, for the full-duplex
    /// transfer that clocks the request out.
    pub fn wire_mut(&mut self) -> &mut [u8] {
        let end = FRAME_HEADER_LEN + self.length();
        &mut self.buf[..end]
    }

    /// Whether the header is all zeroes (a poll, or a cleared frame).
    pub fn is_poll(&self) -> bool {
        self.buf[..FRAME_HEADER_LEN] == [0, 0, 0]
    }

    /// Zero the header, turning the frame into a poll.
    pub fn clear_header(&mut self) {
        self.buf[..FRAME_HEADER_LEN].fill(0);
    }

    /// Mutable view of the header, for the transport to read the
    /// module's response header into.
    pub fn header_mut(&mut self) -> &mut [u8] {
        &mut self.buf[..FRAME_HEADER_LEN]
    }

    /// Mutable view of exactly the payload bytes the header declares,
    /// for the transport to read the module's response payload into.
    pub fn payload_mut(&mut self) -> &mut [u8] {
        let len = self.length();
        &mut self.buf[FRAME_HEADER_LEN..FRAME_HEADER_LEN + len]
    }

    /// The status byte convention: the first payload byte of most
    /// synchronous responses. Zero means success.
    pub fn status(&self) -> Option<u8> {
        self.payload().first().copied()
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("command", &format_args!("0x{:04X}", self.command()))
            .field("length", &self.length())
            .field("payload", &self.payload())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_lays_out_header_then_payload() {
        let mut frame = Frame::new();
        frame.set(0x2605, &[0x83, 0x02, 0x34, 0x12]).unwrap();
        assert_eq!(frame.wire(), &[4, 0x26, 0x05, 0x83, 0x02, 0x34, 0x12]);
        assert_eq!(frame.command(), 0x2605);
        assert_eq!(frame.length(), 4);
        assert_eq!(frame.payload(), &[0x83, 0x02, 0x34, 0x12]);
    }

    #[test]
    fn oversized_payload_is_rejected() {
        let mut frame = Frame::new();
        let payload = [0u8; MAX_FRAME_PAYLOAD + 1];
        assert_eq!(
            frame.set(0x2401, &payload),
            Err(ModuleError::InvalidLength {
                max: MAX_FRAME_PAYLOAD,
                actual: MAX_FRAME_PAYLOAD + 1,
            })
        );
    }

    #[test]
    fn cleared_header_is_a_poll() {
        let mut frame = Frame::new();
        assert!(frame.is_poll());
        frame.set(0x2102, &[]).unwrap();
        assert!(!frame.is_poll());
        frame.clear_header();
        assert!(frame.is_poll());
    }

    #[test]
    fn srsp_id_sets_the_response_bit() {
        assert_eq!(srsp_id(0x2605), 0x6605);
        assert_eq!(srsp_id(0x2102), 0x6102);
        assert_eq!(srsp_id(0x2401), 0x6401);
    }

    #[test]
    fn status_is_first_payload_byte() {
        let mut frame = Frame::new();
        frame.set(0x6605, &[0x00]).unwrap();
        assert_eq!(frame.status(), Some(0x00));
        frame.set(0x6605, &[]).unwrap();
        assert_eq!(frame.status(), None);
    }
}
