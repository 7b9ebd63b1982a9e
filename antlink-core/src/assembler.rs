//! Frame assembler
//!
//! Owns the transmit frame buffer and the cursor that drains it into the
//! bit engine one byte at a time.

use antlink_protocol::{FrameBuffer, FrameError};

/// Transmit frame buffer plus drain cursor
#[derive(Debug, Clone, Default)]
pub struct FrameAssembler {
    buffer: FrameBuffer,
    cursor: usize,
}

impl FrameAssembler {
    pub const fn new() -> Self {
        Self {
            buffer: FrameBuffer::new(),
            cursor: 0,
        }
    }

    /// Rebuild the buffer around `payload` and rewind the cursor
    ///
    /// Returns the frame length. On error nothing changes.
    pub fn build(&mut self, payload: &[u8]) -> Result<usize, FrameError> {
        let len = self.buffer.build(payload)?.len();
        self.cursor = 0;
        Ok(len)
    }

    /// Next byte to transmit, in buffer order
    pub fn next_byte(&mut self) -> Option<u8> {
        let byte = self.buffer.as_bytes().get(self.cursor).copied()?;
        self.cursor += 1;
        Some(byte)
    }

    /// Bytes not yet handed out
    pub fn remaining(&self) -> usize {
        self.buffer.len() - self.cursor
    }

    /// The current frame
    pub fn frame(&self) -> &[u8] {
        self.buffer.as_bytes()
    }
}
