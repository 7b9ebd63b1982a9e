//! Antlink Hardware Abstraction Layer
//!
//! This crate defines the hardware traits the software UART is written
//! against. A chip-specific binding implements [`timer::CaptureCompareTimer`]
//! for one timer peripheral; the host simulator in `antlink-core` implements
//! it in software.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  Sequencer (application main loop)      │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  antlink-core (engine + transport)      │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  antlink-hal (this crate - traits)      │
//! └─────────────────────────────────────────┘
//!                     │
//!         ┌───────────┴───────────┐
//!         ▼                       ▼
//! ┌───────────────┐       ┌───────────────┐
//! │  chip timer   │       │   SimTimer    │
//! └───────────────┘       └───────────────┘
//! ```
//!
//! # Traits
//!
//! - [`timer::CaptureCompareTimer`] - Two-channel timer driving the line
//! - [`uart::UartTx`], [`uart::UartRx`] - Byte-stream view of the link

#![no_std]
#![deny(unsafe_code)]

pub mod timer;
pub mod uart;

// Re-export key traits at crate root for convenience
pub use timer::{CaptureCompareTimer, InputMode, Level, OutputMode, Ticks};
pub use uart::{DataBits, Parity, StopBits, UartConfig, UartRx, UartTx};
