//! Link configuration and bit timing
//!
//! The bit period is expressed in timer ticks and derived once from the
//! timer clock and the fixed baud rate of the radio module.

use antlink_hal::{Ticks, UartConfig};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Timer clock the default timing assumes (1 MHz)
pub const DEFAULT_CLOCK_HZ: u32 = 1_000_000;

/// Line rate of the radio module
pub const DEFAULT_BAUDRATE: u32 = 4800;

/// Shortest usable bit period; below this the interrupt handlers cannot
/// reprogram a channel before its next deadline
pub const MIN_BIT_PERIOD: Ticks = 4;

/// Errors from validating a [`LinkConfig`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Baud rate of zero
    ZeroBaudrate,
    /// Only 8 data bits, no parity, one stop bit can be shifted
    UnsupportedFormat,
    /// Bit period shorter than [`MIN_BIT_PERIOD`]
    BitPeriodTooShort,
    /// One and a half bit periods do not fit in the 16-bit counter
    BitPeriodTooLong,
}

/// Software UART link configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LinkConfig {
    /// Frequency of the timer counter in Hz
    pub clock_hz: u32,
    /// Line settings
    pub uart: UartConfig,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            clock_hz: DEFAULT_CLOCK_HZ,
            uart: UartConfig::default(),
        }
    }
}

/// Bit timing in timer ticks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BitTiming {
    /// One bit period
    pub bit_period: Ticks,
    /// Half a bit period, used to land the first sample mid-bit
    pub half_bit: Ticks,
}

impl Default for BitTiming {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl BitTiming {
    /// 4800 baud on a 1 MHz timer clock
    pub const DEFAULT: Self = Self {
        bit_period: (DEFAULT_CLOCK_HZ / DEFAULT_BAUDRATE) as Ticks,
        half_bit: (DEFAULT_CLOCK_HZ / (DEFAULT_BAUDRATE * 2)) as Ticks,
    };

    /// Derive and validate the timing for a configuration
    pub fn from_config(config: &LinkConfig) -> Result<Self, ConfigError> {
        let baud = config.uart.baudrate;
        if baud == 0 {
            return Err(ConfigError::ZeroBaudrate);
        }
        if !config.uart.is_8n1() {
            return Err(ConfigError::UnsupportedFormat);
        }

        let bit_period = config.clock_hz / baud;
        let half_bit = config.clock_hz / baud.saturating_mul(2);

        if bit_period < MIN_BIT_PERIOD as u32 {
            return Err(ConfigError::BitPeriodTooShort);
        }
        // The start edge schedules its first sample 1.5 bit periods out
        if bit_period + half_bit > Ticks::MAX as u32 {
            return Err(ConfigError::BitPeriodTooLong);
        }

        Ok(Self {
            bit_period: bit_period as Ticks,
            half_bit: half_bit as Ticks,
        })
    }

    /// Offset from a captured start edge to the middle of the first data bit
    pub const fn first_sample_offset(&self) -> Ticks {
        self.bit_period.wrapping_add(self.half_bit)
    }

    /// Minimum line time for `bytes` bytes of 10 bits each, in ticks
    pub const fn line_ticks(&self, bytes: usize) -> u32 {
        bytes as u32 * 10 * self.bit_period as u32
    }
}
