//! CPH protocol constants

use std::time::Duration;

/// Frame start marker, ASCII `RF`
pub const FRAME_HEADER: [u8; 2] = [0x52, 0x46];

/// Header, type, address, code and length field
pub const FRAME_PREFIX_LEN: usize = 8;

/// Smallest complete frame: prefix plus checksum, no parameters
pub const MIN_FRAME_LENGTH: usize = FRAME_PREFIX_LEN + 1;

/// Largest parameter block the 16-bit length field can describe
pub const MAX_PARAMS_LEN: usize = u16::MAX as usize;

/// Largest parameter block accepted from a reader
///
/// A declared length beyond this is treated as a corrupt header rather than
/// waited for.
pub const DEFAULT_MAX_INBOUND_PARAMS: usize = 1024;

/// Broadcast/default reader address
pub const DEFAULT_ADDRESS: u16 = 0x0000;

/// TCP server port readers listen on out of the box
pub const DEFAULT_PORT: u16 = 6000;

/// How long a command waits for its response by default
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Name under which the CPH v4.0.1 protocol is registered
pub const CPH_PROTOCOL_NAME: &str = "cph_v4.0.1";

/// TLV tags
pub mod tags {
    pub const EPC: u8 = 0x01;
    pub const USER_DATA: u8 = 0x02;
    pub const RESERVE_DATA: u8 = 0x03;
    pub const TID_DATA: u8 = 0x04;
    /// Signed dBm
    pub const RSSI: u8 = 0x05;
    /// Year (u16) month day hour minute second
    pub const TIME: u8 = 0x06;
    pub const STATUS: u8 = 0x07;
    pub const OPERATION: u8 = 0x08;
    pub const ANT_NO: u8 = 0x0A;
    pub const BAUD_RATE: u8 = 0x0B;
    pub const ISO_6B_TAG: u8 = 0x10;
    pub const SOFTWARE_VERSION: u8 = 0x20;
    pub const DEVICE_TYPE: u8 = 0x21;
    pub const WORKING_PARAM: u8 = 0x23;
    pub const TRANSPORT_PARAM: u8 = 0x24;
    pub const ADVANCE_PARAM: u8 = 0x25;
    pub const SINGLE_PARAMETER: u8 = 0x26;
    pub const RELAY: u8 = 0x27;
    pub const AUDIO_TEXT: u8 = 0x28;
    pub const EXT_PARAM: u8 = 0x29;
    /// Container holding the TLVs of one tag read
    pub const SINGLE_TAG: u8 = 0x50;
    pub const DEVICE_NO: u8 = 0x52;
    pub const MODBUS_ADDRESS: u8 = 0x53;
    pub const MODBUS_PARITY: u8 = 0x54;
    pub const MODBUS_STOP_BITS: u8 = 0x55;
    pub const MODBUS_PROTOCOL: u8 = 0x56;
    pub const TEMPERATURE: u8 = 0x70;
}

/// Parameter types carried inside [`tags::SINGLE_PARAMETER`]
pub mod param_types {
    /// 1 byte, dBm
    pub const POWER: u8 = 0x01;
    /// 1 byte, 0 = off, 1 = on
    pub const BUZZER: u8 = 0x02;
    /// 1 byte, seconds
    pub const TAG_FILTER_TIME: u8 = 0x03;
    /// Mixer gain, IF amplifier gain, threshold (u16)
    pub const MODEM: u8 = 0x04;

    pub const MAX_POWER_DBM: u8 = 33;
}

/// Operation codes inside [`tags::OPERATION`]
pub mod operations {
    pub const READ: u8 = 0x00;
    pub const WRITE: u8 = 0x01;
    pub const LOCK: u8 = 0x02;
    pub const KILL: u8 = 0x03;
}
