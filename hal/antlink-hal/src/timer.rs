//! Capture/compare timer abstraction
//!
//! The software UART needs exactly one free-running timer with two
//! independent channels:
//!
//! - the TX channel drives the output pin to a programmed level when the
//!   counter reaches its compare deadline, then raises an interrupt
//! - the RX channel either captures the counter on a falling edge of the
//!   input pin, or raises an interrupt at its deadline with the pin level
//!   latched at that exact instant
//!
//! Letting the hardware apply output levels and latch input levels keeps
//! bit edges locked to the timer regardless of interrupt latency.

/// Counter value of the free-running timer.
///
/// Deadlines are compared for equality against a wrapping counter, so all
/// arithmetic on `Ticks` must use `wrapping_add`.
pub type Ticks = u16;

/// Logic level on a line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Level {
    Low,
    /// Mark / idle state of a UART line
    #[default]
    High,
}

impl Level {
    /// Level for a data bit (`true` = mark)
    pub const fn from_bit(bit: bool) -> Self {
        if bit {
            Level::High
        } else {
            Level::Low
        }
    }

    pub const fn is_high(self) -> bool {
        matches!(self, Level::High)
    }

    pub const fn is_low(self) -> bool {
        matches!(self, Level::Low)
    }
}

/// Behaviour of the TX (compare/output) channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OutputMode {
    /// Pin forced to the level immediately; compare interrupt disabled
    Hold(Level),
    /// Pin driven to the level at the next compare match; interrupt enabled
    DriveOnMatch(Level),
}

impl OutputMode {
    /// Whether this mode raises an interrupt on compare match
    pub const fn interrupt_enabled(self) -> bool {
        matches!(self, OutputMode::DriveOnMatch(_))
    }
}

/// Behaviour of the RX (capture/compare) channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InputMode {
    /// Capture the counter into the channel register on a falling edge
    /// and raise an interrupt
    CaptureFallingEdge,
    /// Raise an interrupt at the deadline with the pin level latched
    /// synchronously to the compare event
    SampleOnMatch,
}

/// Free-running timer with one output-compare and one capture/compare channel
///
/// Implementations own the peripheral registers. Both channels share the
/// counter, so their interrupt handlers never run concurrently on a
/// single-core target.
pub trait CaptureCompareTimer {
    /// Start the counter in free-running (continuous) mode
    fn start(&mut self);

    /// Current counter value
    fn counter(&self) -> Ticks;

    /// Program the TX channel's compare deadline
    fn set_tx_deadline(&mut self, at: Ticks);

    /// TX channel's current compare deadline
    fn tx_deadline(&self) -> Ticks;

    /// Reconfigure the TX channel
    fn set_tx_mode(&mut self, mode: OutputMode);

    /// Program the RX channel's compare deadline
    fn set_rx_deadline(&mut self, at: Ticks);

    /// RX channel register: the compare deadline, or the captured counter
    /// value right after a capture event
    fn rx_deadline(&self) -> Ticks;

    /// Reconfigure the RX channel
    fn set_rx_mode(&mut self, mode: InputMode);

    /// Level latched by the RX channel at its last compare event
    fn rx_latch(&self) -> Level;
}
