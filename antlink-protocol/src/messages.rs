//! ANT message payloads
//!
//! Message types are divided into two categories:
//! - Host → Radio: channel configuration commands and broadcast data
//! - Radio → Host: startup notification and channel responses/events
//!
//! Multi-byte fields are little-endian, except in the crank torque
//! frequency page, which the bicycle power profile defines as big-endian.

use crate::frame::{Frame, FrameError};

// Message IDs: Host → Radio
pub const MSG_ASSIGN_CHANNEL: u8 = 0x42;
pub const MSG_CHANNEL_PERIOD: u8 = 0x43;
pub const MSG_CHANNEL_RF_FREQUENCY: u8 = 0x45;
pub const MSG_NETWORK_KEY: u8 = 0x46;
pub const MSG_RESET: u8 = 0x4A;
pub const MSG_OPEN_CHANNEL: u8 = 0x4B;
pub const MSG_BROADCAST_DATA: u8 = 0x4E;
pub const MSG_CHANNEL_ID: u8 = 0x51;

// Message IDs: Radio → Host
pub const MSG_CHANNEL_EVENT: u8 = 0x40;
pub const MSG_STARTUP: u8 = 0x6F;

// Bicycle power data page numbers
pub const PAGE_POWER_ONLY: u8 = 0x10;
pub const PAGE_STANDARD_CRANK_TORQUE: u8 = 0x12;
pub const PAGE_CRANK_TORQUE_FREQUENCY: u8 = 0x20;

/// Bidirectional master channel
pub const CHANNEL_TYPE_MASTER: u8 = 0x10;

/// ANT+ bicycle power sensor
pub const DEVICE_TYPE_BIKE_POWER: u8 = 0x0B;

pub const NETWORK_KEY_SIZE: usize = 8;

/// Size of a broadcast data page
pub const PAGE_SIZE: usize = 8;

/// Largest host payload: broadcast ID + channel + one data page
const MAX_HOST_PAYLOAD: usize = 2 + PAGE_SIZE;

/// Bicycle power data pages carried by broadcast messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PowerPage {
    /// Page 0x10
    PowerOnly {
        event_count: u8,
        pedal_power: u8,
        cadence: u8,
        accumulated_power: u16,
        instantaneous_power: u16,
    },
    /// Page 0x12
    StandardCrankTorque {
        event_count: u8,
        crank_ticks: u8,
        cadence: u8,
        accumulated_period: u16,
        accumulated_torque: u16,
    },
    /// Page 0x20
    CrankTorqueFrequency {
        event_count: u8,
        slope: u16,
        time_stamp: u16,
        torque_ticks: u16,
    },
}

impl PowerPage {
    pub fn page_number(&self) -> u8 {
        match self {
            PowerPage::PowerOnly { .. } => PAGE_POWER_ONLY,
            PowerPage::StandardCrankTorque { .. } => PAGE_STANDARD_CRANK_TORQUE,
            PowerPage::CrankTorqueFrequency { .. } => PAGE_CRANK_TORQUE_FREQUENCY,
        }
    }

    /// Encode the 8-byte page, page number first
    pub fn to_bytes(&self) -> [u8; PAGE_SIZE] {
        match *self {
            PowerPage::PowerOnly {
                event_count,
                pedal_power,
                cadence,
                accumulated_power,
                instantaneous_power,
            } => {
                let [acc_lo, acc_hi] = accumulated_power.to_le_bytes();
                let [inst_lo, inst_hi] = instantaneous_power.to_le_bytes();
                [
                    PAGE_POWER_ONLY,
                    event_count,
                    pedal_power,
                    cadence,
                    acc_lo,
                    acc_hi,
                    inst_lo,
                    inst_hi,
                ]
            }
            PowerPage::StandardCrankTorque {
                event_count,
                crank_ticks,
                cadence,
                accumulated_period,
                accumulated_torque,
            } => {
                let [period_lo, period_hi] = accumulated_period.to_le_bytes();
                let [torque_lo, torque_hi] = accumulated_torque.to_le_bytes();
                [
                    PAGE_STANDARD_CRANK_TORQUE,
                    event_count,
                    crank_ticks,
                    cadence,
                    period_lo,
                    period_hi,
                    torque_lo,
                    torque_hi,
                ]
            }
            PowerPage::CrankTorqueFrequency {
                event_count,
                slope,
                time_stamp,
                torque_ticks,
            } => {
                let [slope_hi, slope_lo] = slope.to_be_bytes();
                let [stamp_hi, stamp_lo] = time_stamp.to_be_bytes();
                let [ticks_hi, ticks_lo] = torque_ticks.to_be_bytes();
                [
                    PAGE_CRANK_TORQUE_FREQUENCY,
                    event_count,
                    slope_hi,
                    slope_lo,
                    stamp_hi,
                    stamp_lo,
                    ticks_hi,
                    ticks_lo,
                ]
            }
        }
    }
}

/// Messages from the host to the radio module
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HostMessage {
    /// Software reset of the radio
    Reset,
    /// Load a network key
    SetNetworkKey {
        network: u8,
        key: [u8; NETWORK_KEY_SIZE],
    },
    /// Bind a channel to a type and network
    AssignChannel {
        channel: u8,
        channel_type: u8,
        network: u8,
    },
    /// RF frequency as an offset from 2400 MHz
    SetChannelRfFrequency { channel: u8, frequency: u8 },
    /// Message period in 1/32768 s units
    SetChannelPeriod { channel: u8, period: u16 },
    /// Device number, device type and transmission type
    SetChannelId {
        channel: u8,
        device_number: u16,
        device_type: u8,
        transmission_type: u8,
    },
    OpenChannel { channel: u8 },
    /// Broadcast one data page on an open channel
    Broadcast { channel: u8, page: PowerPage },
}

impl HostMessage {
    /// Encode this message into a frame
    pub fn to_frame(&self) -> Result<Frame, FrameError> {
        let mut buf = [0u8; MAX_HOST_PAYLOAD];
        let len = self.write_payload(&mut buf);
        Frame::new(&buf[..len])
    }

    pub fn msg_id(&self) -> u8 {
        match self {
            HostMessage::Reset => MSG_RESET,
            HostMessage::SetNetworkKey { .. } => MSG_NETWORK_KEY,
            HostMessage::AssignChannel { .. } => MSG_ASSIGN_CHANNEL,
            HostMessage::SetChannelRfFrequency { .. } => MSG_CHANNEL_RF_FREQUENCY,
            HostMessage::SetChannelPeriod { .. } => MSG_CHANNEL_PERIOD,
            HostMessage::SetChannelId { .. } => MSG_CHANNEL_ID,
            HostMessage::OpenChannel { .. } => MSG_OPEN_CHANNEL,
            HostMessage::Broadcast { .. } => MSG_BROADCAST_DATA,
        }
    }

    fn write_payload(&self, buf: &mut [u8; MAX_HOST_PAYLOAD]) -> usize {
        buf[0] = self.msg_id();
        let body = &mut buf[1..];

        match *self {
            // The reset command carries one filler byte
            HostMessage::Reset => put(body, &[0x00]),
            HostMessage::SetNetworkKey { network, key } => {
                body[0] = network;
                body[1..=NETWORK_KEY_SIZE].copy_from_slice(&key);
                1 + NETWORK_KEY_SIZE + 1
            }
            HostMessage::AssignChannel {
                channel,
                channel_type,
                network,
            } => put(body, &[channel, channel_type, network]),
            HostMessage::SetChannelRfFrequency { channel, frequency } => {
                put(body, &[channel, frequency])
            }
            HostMessage::SetChannelPeriod { channel, period } => {
                let [lo, hi] = period.to_le_bytes();
                put(body, &[channel, lo, hi])
            }
            HostMessage::SetChannelId {
                channel,
                device_number,
                device_type,
                transmission_type,
            } => {
                let [lo, hi] = device_number.to_le_bytes();
                put(body, &[channel, lo, hi, device_type, transmission_type])
            }
            HostMessage::OpenChannel { channel } => put(body, &[channel]),
            HostMessage::Broadcast { channel, page } => {
                body[0] = channel;
                body[1..=PAGE_SIZE].copy_from_slice(&page.to_bytes());
                MAX_HOST_PAYLOAD
            }
        }
    }
}

/// Copy `bytes` after the message ID; returns the full payload length
fn put(body: &mut [u8], bytes: &[u8]) -> usize {
    body[..bytes.len()].copy_from_slice(bytes);
    bytes.len() + 1
}

/// Messages parsed from radio-originated frames
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RadioMessage {
    /// Sent once after power-up or reset
    Startup { reason: u8 },
    /// Response to a command (`msg_id` is the command's ID) or a channel
    /// event (`msg_id` is 0x01)
    ChannelResponse { channel: u8, msg_id: u8, code: u8 },
}

impl RadioMessage {
    /// Parse a message from a frame
    pub fn from_frame(frame: &Frame) -> Result<Self, FrameError> {
        let data = frame.data();
        match frame.msg_id() {
            MSG_STARTUP => {
                let reason = data.first().copied().ok_or(FrameError::InvalidMessage)?;
                Ok(RadioMessage::Startup { reason })
            }
            MSG_CHANNEL_EVENT => match *data {
                [channel, msg_id, code, ..] => Ok(RadioMessage::ChannelResponse {
                    channel,
                    msg_id,
                    code,
                }),
                _ => Err(FrameError::InvalidMessage),
            },
            _ => Err(FrameError::InvalidMessage),
        }
    }
}

/// Settings for one broadcast channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelConfig {
    pub channel: u8,
    pub channel_type: u8,
    pub network: u8,
    pub network_key: [u8; NETWORK_KEY_SIZE],
    /// Offset from 2400 MHz
    pub rf_frequency: u8,
    /// 1/32768 s units
    pub period: u16,
    pub device_number: u16,
    pub device_type: u8,
    pub transmission_type: u8,
}

impl Default for ChannelConfig {
    /// Bicycle power master on channel 0, 2457 MHz, about 4 Hz
    fn default() -> Self {
        Self {
            channel: 0,
            channel_type: CHANNEL_TYPE_MASTER,
            network: 0,
            network_key: [0; NETWORK_KEY_SIZE],
            rf_frequency: 0x39,
            period: 0x1FF6,
            device_number: 0x0031,
            device_type: DEVICE_TYPE_BIKE_POWER,
            transmission_type: 0x05,
        }
    }
}

impl ChannelConfig {
    /// Commands that bring the channel up, in the order the radio expects
    pub fn setup_messages(&self) -> [HostMessage; 7] {
        [
            HostMessage::Reset,
            HostMessage::SetNetworkKey {
                network: self.network,
                key: self.network_key,
            },
            HostMessage::AssignChannel {
                channel: self.channel,
                channel_type: self.channel_type,
                network: self.network,
            },
            HostMessage::SetChannelRfFrequency {
                channel: self.channel,
                frequency: self.rf_frequency,
            },
            HostMessage::SetChannelPeriod {
                channel: self.channel,
                period: self.period,
            },
            HostMessage::SetChannelId {
                channel: self.channel,
                device_number: self.device_number,
                device_type: self.device_type,
                transmission_type: self.transmission_type,
            },
            HostMessage::OpenChannel {
                channel: self.channel,
            },
        ]
    }

    /// Broadcast `page` on this channel
    pub fn broadcast(&self, page: PowerPage) -> HostMessage {
        HostMessage::Broadcast {
            channel: self.channel,
            page,
        }
    }
}
