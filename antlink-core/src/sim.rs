//! Software timer and interrupt-injection harness
//!
//! [`SimTimer`] models the two-channel timer one counter tick at a time:
//! compare matches drive the TX pin, falling edges on the RX pin are
//! captured, and RX compare events latch the pin level. The free functions
//! advance a [`Transport`] and dispatch whatever interrupts a tick raised,
//! TX before RX, the way a shared timer vector would.

use antlink_hal::{CaptureCompareTimer, InputMode, Level, OutputMode, Ticks};

use crate::engine::{frame_byte, TX_FRAME_BITS};
use crate::transport::Transport;

/// Interrupts raised by one tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Pending {
    pub tx: bool,
    pub rx: bool,
}

/// Cycle-level model of a capture/compare timer and its two pins
#[derive(Debug, Clone)]
pub struct SimTimer {
    counter: Ticks,
    running: bool,
    tx_deadline: Ticks,
    tx_mode: OutputMode,
    rx_deadline: Ticks,
    rx_mode: InputMode,
    rx_latch: Level,
    tx_pin: Level,
    rx_pin: Level,
    last_rx_pin: Level,
    loopback: bool,
}

impl Default for SimTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl SimTimer {
    /// Stopped timer, both lines at mark
    pub const fn new() -> Self {
        Self {
            counter: 0,
            running: false,
            tx_deadline: 0,
            tx_mode: OutputMode::Hold(Level::High),
            rx_deadline: 0,
            rx_mode: InputMode::CaptureFallingEdge,
            rx_latch: Level::High,
            tx_pin: Level::High,
            rx_pin: Level::High,
            last_rx_pin: Level::High,
            loopback: false,
        }
    }

    /// TX pin wired straight to the RX pin
    pub const fn with_loopback() -> Self {
        let mut timer = Self::new();
        timer.loopback = true;
        timer
    }

    pub fn tx_pin(&self) -> Level {
        self.tx_pin
    }

    pub fn rx_pin(&self) -> Level {
        self.rx_pin
    }

    pub fn tx_mode(&self) -> OutputMode {
        self.tx_mode
    }

    pub fn rx_mode(&self) -> InputMode {
        self.rx_mode
    }

    /// Drive the RX pin from outside (ignored in loopback)
    pub fn drive_rx(&mut self, level: Level) {
        if !self.loopback {
            self.rx_pin = level;
        }
    }

    /// Advance the counter by one and report the interrupts it raised
    pub fn tick(&mut self) -> Pending {
        let mut pending = Pending::default();
        if !self.running {
            return pending;
        }

        self.counter = self.counter.wrapping_add(1);

        if let OutputMode::DriveOnMatch(level) = self.tx_mode {
            if self.counter == self.tx_deadline {
                self.tx_pin = level;
                pending.tx = true;
            }
        }

        if self.loopback {
            self.rx_pin = self.tx_pin;
        }

        match self.rx_mode {
            InputMode::CaptureFallingEdge => {
                if self.last_rx_pin.is_high() && self.rx_pin.is_low() {
                    self.rx_deadline = self.counter;
                    pending.rx = true;
                }
            }
            InputMode::SampleOnMatch => {
                if self.counter == self.rx_deadline {
                    self.rx_latch = self.rx_pin;
                    pending.rx = true;
                }
            }
        }
        self.last_rx_pin = self.rx_pin;

        pending
    }
}

impl CaptureCompareTimer for SimTimer {
    fn start(&mut self) {
        self.running = true;
    }

    fn counter(&self) -> Ticks {
        self.counter
    }

    fn set_tx_deadline(&mut self, at: Ticks) {
        self.tx_deadline = at;
    }

    fn tx_deadline(&self) -> Ticks {
        self.tx_deadline
    }

    fn set_tx_mode(&mut self, mode: OutputMode) {
        if let OutputMode::Hold(level) = mode {
            self.tx_pin = level;
        }
        self.tx_mode = mode;
    }

    fn set_rx_deadline(&mut self, at: Ticks) {
        self.rx_deadline = at;
    }

    fn rx_deadline(&self) -> Ticks {
        self.rx_deadline
    }

    fn set_rx_mode(&mut self, mode: InputMode) {
        self.rx_mode = mode;
    }

    fn rx_latch(&self) -> Level {
        self.rx_latch
    }
}

/// Advance one tick and run the interrupt handlers it raised
pub fn step(transport: &Transport<SimTimer>) -> Pending {
    let pending = transport.with_timer(SimTimer::tick);
    if pending.tx {
        transport.on_tx_interrupt();
    }
    if pending.rx {
        transport.on_rx_interrupt();
    }
    pending
}

pub fn run(transport: &Transport<SimTimer>, ticks: u32) {
    for _ in 0..ticks {
        step(transport);
    }
}

/// Clock one 8N1 byte onto the RX pin at the link's bit period, as the
/// radio module would
pub fn drive_byte(transport: &Transport<SimTimer>, byte: u8) {
    let bit_period = transport.timing().bit_period as u32;
    let framed = frame_byte(byte);

    for bit in 0..TX_FRAME_BITS {
        let level = Level::from_bit((framed >> bit) & 1 != 0);
        transport.with_timer(|timer| timer.drive_rx(level));
        run(transport, bit_period);
    }
}
