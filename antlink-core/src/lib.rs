//! Software UART transport for ANT radio modules
//!
//! This crate turns one two-channel capture/compare timer into a full-duplex
//! 8N1 serial link and layers the ANT sync/length/checksum framing on top:
//!
//! - Bit timing engine driven by compare and capture interrupts
//! - Frame assembler feeding the engine one byte at a time
//! - Single-slot receive mailbox with overrun accounting
//! - [`Transport`] context object shared between main flow and interrupts
//! - Deterministic host simulator (`sim` feature)

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

#[macro_use]
mod fmt;

pub mod assembler;
pub mod config;
pub mod engine;
pub mod mailbox;
#[cfg(any(test, feature = "sim"))]
pub mod sim;
pub mod transport;

pub use assembler::FrameAssembler;
pub use config::{BitTiming, ConfigError, LinkConfig};
pub use engine::{BitEngine, RxState, TxBusy, TxState};
pub use mailbox::Mailbox;
pub use transport::{LinkStats, Transport};
