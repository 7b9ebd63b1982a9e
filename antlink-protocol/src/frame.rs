//! Frame encoding and decoding for the ANT serial protocol.
//!
//! Frame format:
//! - SYNC (1 byte): 0xA4 synchronization byte
//! - LENGTH (1 byte): payload length minus one (the message ID is implied)
//! - PAYLOAD (1-29 bytes): message ID followed by message data
//! - CHECKSUM (1 byte): XOR of SYNC, LENGTH and all PAYLOAD bytes

use heapless::Vec;

/// Frame synchronization byte
pub const SYNC_BYTE: u8 = 0xA4;

/// Size of the transmit frame buffer in bytes
pub const FRAME_CAPACITY: usize = 32;

/// SYNC + LENGTH + CHECKSUM
pub const FRAME_OVERHEAD: usize = 3;

/// Maximum payload size in bytes (message ID included)
pub const MAX_PAYLOAD_SIZE: usize = FRAME_CAPACITY - FRAME_OVERHEAD;

/// Errors that can occur during frame parsing or encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameError {
    /// Payload has no message ID byte
    EmptyPayload,
    /// Payload exceeds [`MAX_PAYLOAD_SIZE`]
    PayloadTooLarge,
    /// Buffer too small for encoding
    BufferTooSmall,
    /// Received LENGTH byte implies a payload above [`MAX_PAYLOAD_SIZE`]
    InvalidLength,
    /// Checksum mismatch
    InvalidChecksum,
    /// Unknown message ID or data too short for its message
    InvalidMessage,
}

/// XOR of all bytes
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0, |acc, &byte| acc ^ byte)
}

fn check_payload(payload: &[u8]) -> Result<(), FrameError> {
    if payload.is_empty() {
        return Err(FrameError::EmptyPayload);
    }
    if payload.len() > MAX_PAYLOAD_SIZE {
        return Err(FrameError::PayloadTooLarge);
    }
    Ok(())
}

/// Encode a payload into `out`
///
/// Returns the number of bytes written (payload length + [`FRAME_OVERHEAD`]).
pub fn encode(payload: &[u8], out: &mut [u8]) -> Result<usize, FrameError> {
    check_payload(payload)?;

    let frame_len = payload.len() + FRAME_OVERHEAD;
    if out.len() < frame_len {
        return Err(FrameError::BufferTooSmall);
    }

    out[0] = SYNC_BYTE;
    out[1] = (payload.len() - 1) as u8;
    out[2..2 + payload.len()].copy_from_slice(payload);
    out[frame_len - 1] = checksum(&out[..frame_len - 1]);

    Ok(frame_len)
}

/// Fixed-capacity transmit buffer holding one complete frame
///
/// Rebuilt from scratch on every [`build`](Self::build); nothing carries
/// over between frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameBuffer {
    bytes: [u8; FRAME_CAPACITY],
    len: usize,
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameBuffer {
    pub const fn new() -> Self {
        Self {
            bytes: [0; FRAME_CAPACITY],
            len: 0,
        }
    }

    /// Wrap `payload` as SYNC + LENGTH + PAYLOAD + CHECKSUM
    ///
    /// On error the previous contents are left untouched.
    pub fn build(&mut self, payload: &[u8]) -> Result<&[u8], FrameError> {
        self.len = encode(payload, &mut self.bytes)?;
        Ok(self.as_bytes())
    }

    /// The encoded frame
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// A parsed frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Message ID followed by message data
    pub payload: Vec<u8, MAX_PAYLOAD_SIZE>,
}

impl Frame {
    /// Create a frame from a payload
    pub fn new(payload: &[u8]) -> Result<Self, FrameError> {
        check_payload(payload)?;

        let mut payload_vec = Vec::new();
        payload_vec
            .extend_from_slice(payload)
            .map_err(|_| FrameError::PayloadTooLarge)?;

        Ok(Self {
            payload: payload_vec,
        })
    }

    /// Message ID (first payload byte)
    pub fn msg_id(&self) -> u8 {
        self.payload.first().copied().unwrap_or_default()
    }

    /// Message data after the ID
    pub fn data(&self) -> &[u8] {
        self.payload.get(1..).unwrap_or(&[])
    }

    /// Encode this frame into a byte buffer
    pub fn encode(&self, buffer: &mut [u8]) -> Result<usize, FrameError> {
        encode(&self.payload, buffer)
    }
}

/// State machine for parsing frames from the received byte stream
#[derive(Debug, Clone)]
pub struct FrameParser {
    state: ParseState,
    buffer: Vec<u8, MAX_PAYLOAD_SIZE>,
    length_byte: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseState {
    /// Waiting for SYNC byte
    WaitingForSync,
    /// Got SYNC, waiting for LENGTH
    WaitingForLength,
    /// Reading payload bytes
    ReadingPayload,
    /// Waiting for CHECKSUM
    WaitingForChecksum,
}

impl Default for FrameParser {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameParser {
    /// Create a new frame parser
    pub const fn new() -> Self {
        Self {
            state: ParseState::WaitingForSync,
            buffer: Vec::new(),
            length_byte: 0,
        }
    }

    /// Reset the parser state
    pub fn reset(&mut self) {
        self.state = ParseState::WaitingForSync;
        self.buffer.clear();
        self.length_byte = 0;
    }

    fn expected_payload_len(&self) -> usize {
        self.length_byte as usize + 1
    }

    /// Feed a single byte to the parser
    ///
    /// Returns `Ok(Some(frame))` when a complete valid frame is parsed,
    /// `Ok(None)` when more bytes are needed, or `Err` on parse error.
    pub fn feed(&mut self, byte: u8) -> Result<Option<Frame>, FrameError> {
        match self.state {
            ParseState::WaitingForSync => {
                if byte == SYNC_BYTE {
                    self.state = ParseState::WaitingForLength;
                }
                // Silently ignore non-SYNC bytes while waiting
                Ok(None)
            }
            ParseState::WaitingForLength => {
                // A repeated SYNC restarts the frame; it is never a valid length
                if byte == SYNC_BYTE {
                    return Ok(None);
                }
                if byte as usize + 1 > MAX_PAYLOAD_SIZE {
                    self.reset();
                    return Err(FrameError::InvalidLength);
                }
                self.length_byte = byte;
                self.buffer.clear();
                self.state = ParseState::ReadingPayload;
                Ok(None)
            }
            ParseState::ReadingPayload => {
                // Cannot overflow: the length was bounded above
                let _ = self.buffer.push(byte);
                if self.buffer.len() == self.expected_payload_len() {
                    self.state = ParseState::WaitingForChecksum;
                }
                Ok(None)
            }
            ParseState::WaitingForChecksum => {
                let expected = SYNC_BYTE ^ self.length_byte ^ checksum(&self.buffer);
                if byte != expected {
                    self.reset();
                    return Err(FrameError::InvalidChecksum);
                }

                let frame = Frame {
                    payload: self.buffer.clone(),
                };

                self.reset();
                Ok(Some(frame))
            }
        }
    }

    /// Feed multiple bytes to the parser
    ///
    /// Returns the first complete frame found, if any.
    /// Remaining bytes after a complete frame are not consumed.
    pub fn feed_bytes(&mut self, bytes: &[u8]) -> Result<Option<Frame>, FrameError> {
        for &byte in bytes {
            if let Some(frame) = self.feed(byte)? {
                return Ok(Some(frame));
            }
        }
        Ok(None)
    }
}
