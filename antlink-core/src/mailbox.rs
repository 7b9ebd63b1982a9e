//! Received-byte mailbox
//!
//! One slot between the receive interrupt and the main flow. A byte that
//! completes before the previous one was taken overwrites it; the loss is
//! counted, not prevented.

/// Single-slot, overwrite-on-write byte mailbox
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Mailbox {
    slot: Option<u8>,
    overruns: u32,
}

impl Mailbox {
    pub const fn new() -> Self {
        Self {
            slot: None,
            overruns: 0,
        }
    }

    /// Store a completed byte
    ///
    /// Returns `true` if an unread byte was overwritten.
    pub fn deposit(&mut self, byte: u8) -> bool {
        let overwrote = self.slot.replace(byte).is_some();
        if overwrote {
            self.overruns = self.overruns.wrapping_add(1);
        }
        overwrote
    }

    /// Consume the waiting byte
    pub fn take(&mut self) -> Option<u8> {
        self.slot.take()
    }

    pub fn peek(&self) -> Option<u8> {
        self.slot
    }

    /// Bytes lost to overwrites since creation
    pub fn overruns(&self) -> u32 {
        self.overruns
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_mailbox() {
        let mut mailbox = Mailbox::new();
        assert_eq!(mailbox.peek(), None);
        assert_eq!(mailbox.take(), None);
    }

    #[test]
    fn test_take_consumes() {
        let mut mailbox = Mailbox::new();
        assert!(!mailbox.deposit(0x40));
        assert_eq!(mailbox.peek(), Some(0x40));
        assert_eq!(mailbox.take(), Some(0x40));
        assert_eq!(mailbox.take(), None);
        assert_eq!(mailbox.overruns(), 0);
    }

    #[test]
    fn test_overwrite_counts_overrun() {
        let mut mailbox = Mailbox::new();
        mailbox.deposit(0x01);
        assert!(mailbox.deposit(0x02));
        assert!(mailbox.deposit(0x03));

        assert_eq!(mailbox.take(), Some(0x03));
        assert_eq!(mailbox.overruns(), 2);
    }
}
