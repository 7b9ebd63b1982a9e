//! ANT serial message framing
//!
//! This crate defines the byte-level frame exchanged with the radio module
//! over the software UART. Every message is wrapped as:
//! ```text
//! ┌──────┬────────┬────────────────┬──────────┐
//! │ SYNC │ LENGTH │ PAYLOAD        │ CHECKSUM │
//! │ 1B   │ 1B     │ 1–29B          │ 1B       │
//! └──────┴────────┴────────────────┴──────────┘
//! ```
//!
//! The first payload byte is the message ID; LENGTH counts the bytes after
//! it (payload length minus one). CHECKSUM is the XOR of every byte before it.
//!
//! [`messages`] builds the channel setup and broadcast payloads sent to the
//! radio and parses its startup and channel response messages.

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

pub mod frame;
pub mod messages;

pub use frame::{
    checksum, encode, Frame, FrameBuffer, FrameError, FrameParser, FRAME_CAPACITY,
    FRAME_OVERHEAD, MAX_PAYLOAD_SIZE, SYNC_BYTE,
};
pub use messages::{ChannelConfig, HostMessage, PowerPage, RadioMessage};
