//! Bit timing engine
//!
//! Emulates a full-duplex 8N1 UART on one capture/compare timer. Each
//! direction is an explicit state machine advanced only from its own
//! interrupt handler:
//!
//! ```text
//! TX:  Idle ──try_transmit──► Shifting{10} ──compare──► … ──► Shifting{0} ──compare──► Idle
//! RX:  AwaitingStartEdge ──capture──► Sampling{8} ──compare──► … ──► AwaitingStartEdge
//! ```
//!
//! The TX handler programs the level the pin takes at the *next* compare
//! match, so the hardware applies every edge exactly on a deadline. The RX
//! handler reads the level the channel latched at the compare instant.

use antlink_hal::{CaptureCompareTimer, InputMode, Level, OutputMode};

use crate::config::BitTiming;

/// Start bit + 8 data bits + stop bit
pub const TX_FRAME_BITS: u8 = 10;

/// Data bits sampled per received byte
pub const RX_DATA_BITS: u8 = 8;

/// Frame a byte for shifting out LSB first: start bit (0) in bit 0, data in
/// bits 1..=8, stop bit (1) in bit 9
pub const fn frame_byte(byte: u8) -> u16 {
    ((byte as u16) | 0x100) << 1
}

/// Transmit channel state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TxState {
    /// Line held at mark, compare interrupt disabled
    Idle,
    /// A byte is in flight; `remaining` levels are still to be programmed
    Shifting { remaining: u8 },
}

/// Receive channel state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RxState {
    /// Capturing on the falling edge of a start bit
    AwaitingStartEdge,
    /// Sampling data bits mid-period; `remaining` samples to go
    Sampling { remaining: u8 },
}

/// The transmitter still has a byte in flight
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TxBusy;

/// Timer-driven UART shift registers
pub struct BitEngine<T> {
    timer: T,
    timing: BitTiming,
    tx: TxState,
    tx_shift: u16,
    rx: RxState,
    rx_shift: u8,
}

impl<T: CaptureCompareTimer> BitEngine<T> {
    pub const fn new(timer: T, timing: BitTiming) -> Self {
        Self {
            timer,
            timing,
            tx: TxState::Idle,
            tx_shift: 0,
            rx: RxState::AwaitingStartEdge,
            rx_shift: 0,
        }
    }

    /// Idle the TX line at mark, arm start-edge capture and start the timer
    pub fn init(&mut self) {
        self.timer.set_tx_mode(OutputMode::Hold(Level::High));
        self.timer.set_rx_mode(InputMode::CaptureFallingEdge);
        self.tx = TxState::Idle;
        self.rx = RxState::AwaitingStartEdge;
        self.timer.start();
    }

    /// Arm the transmitter with `byte`
    ///
    /// Refuses while a byte is in flight; the shift register is never
    /// touched in that case. Bits are emitted by subsequent compare
    /// interrupts.
    pub fn try_transmit(&mut self, byte: u8) -> Result<(), TxBusy> {
        if self.tx_busy() {
            return Err(TxBusy);
        }

        let first = self.timer.counter().wrapping_add(self.timing.bit_period);
        self.timer.set_tx_deadline(first);
        self.timer.set_tx_mode(OutputMode::DriveOnMatch(Level::High));
        self.tx_shift = frame_byte(byte);
        self.tx = TxState::Shifting {
            remaining: TX_FRAME_BITS,
        };
        Ok(())
    }

    /// TX compare interrupt: program the next bit level
    pub fn on_tx_compare(&mut self) {
        let next = self
            .timer
            .tx_deadline()
            .wrapping_add(self.timing.bit_period);
        self.timer.set_tx_deadline(next);

        match self.tx {
            TxState::Idle => {}
            TxState::Shifting { remaining: 0 } => {
                // Stop bit is on the line
                self.timer.set_tx_mode(OutputMode::Hold(Level::High));
                self.tx = TxState::Idle;
            }
            TxState::Shifting { remaining } => {
                let level = Level::from_bit(self.tx_shift & 0x01 != 0);
                self.timer.set_tx_mode(OutputMode::DriveOnMatch(level));
                self.tx_shift >>= 1;
                self.tx = TxState::Shifting {
                    remaining: remaining - 1,
                };
            }
        }
    }

    /// RX capture/compare interrupt
    ///
    /// Returns the byte once all data bits are sampled. The stop bit is not
    /// checked, and any falling edge while awaiting is taken as a start bit.
    pub fn on_rx_event(&mut self) -> Option<u8> {
        match self.rx {
            RxState::AwaitingStartEdge => {
                let captured = self.timer.rx_deadline();
                self.timer
                    .set_rx_deadline(captured.wrapping_add(self.timing.first_sample_offset()));
                self.timer.set_rx_mode(InputMode::SampleOnMatch);
                self.rx = RxState::Sampling {
                    remaining: RX_DATA_BITS,
                };
                None
            }
            RxState::Sampling { remaining } => {
                let next = self
                    .timer
                    .rx_deadline()
                    .wrapping_add(self.timing.bit_period);
                self.timer.set_rx_deadline(next);

                self.rx_shift >>= 1;
                if self.timer.rx_latch().is_high() {
                    self.rx_shift |= 0x80;
                }

                let remaining = remaining.saturating_sub(1);
                if remaining == 0 {
                    self.timer.set_rx_mode(InputMode::CaptureFallingEdge);
                    self.rx = RxState::AwaitingStartEdge;
                    Some(self.rx_shift)
                } else {
                    self.rx = RxState::Sampling { remaining };
                    None
                }
            }
        }
    }

    /// Whether a byte is still being shifted out
    pub fn tx_busy(&self) -> bool {
        matches!(self.tx, TxState::Shifting { .. })
    }

    pub fn tx_state(&self) -> TxState {
        self.tx
    }

    pub fn rx_state(&self) -> RxState {
        self.rx
    }

    pub fn timing(&self) -> BitTiming {
        self.timing
    }

    pub fn timer(&self) -> &T {
        &self.timer
    }

    pub fn timer_mut(&mut self) -> &mut T {
        &mut self.timer
    }
}
