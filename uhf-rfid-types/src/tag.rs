//! Tag reads and tag memory selectors

use std::fmt;

use chrono::NaiveDateTime;

use crate::error::{Error, Result};

/// One tag observation reported by the reader
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagRead {
    /// EPC as uppercase hex
    pub epc: String,

    /// TID as uppercase hex, when the reader was configured to report it
    pub tid: Option<String>,

    /// Raw user bank contents
    pub user_data: Option<Vec<u8>>,

    /// Signal strength in dBm
    pub rssi: Option<i8>,

    /// Antenna the tag was seen on
    pub antenna: Option<u8>,

    /// Reader clock at the time of the read
    pub timestamp: Option<NaiveDateTime>,

    /// 4-byte time value, big-endian, as sent by readers that do not report
    /// a calendar time
    pub raw_time: Option<u32>,
}

impl TagRead {
    pub fn new(epc: impl Into<String>) -> Self {
        Self {
            epc: epc.into(),
            tid: None,
            user_data: None,
            rssi: None,
            antenna: None,
            timestamp: None,
            raw_time: None,
        }
    }
}

impl fmt::Display for TagRead {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tag[EPC: {}", self.epc)?;
        if let Some(rssi) = self.rssi {
            write!(f, ", RSSI: {} dBm", rssi)?;
        }
        if let Some(antenna) = self.antenna {
            write!(f, ", ant: {}", antenna)?;
        }
        write!(f, "]")
    }
}

/// Gen2 memory bank
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MemoryBank {
    Reserved = 0x00,
    Epc = 0x01,
    Tid = 0x02,
    User = 0x03,
}

impl From<MemoryBank> for u8 {
    fn from(bank: MemoryBank) -> u8 {
        bank as u8
    }
}

impl TryFrom<u8> for MemoryBank {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0x00 => Ok(Self::Reserved),
            0x01 => Ok(Self::Epc),
            0x02 => Ok(Self::Tid),
            0x03 => Ok(Self::User),
            _ => Err(Error::Parse(format!("Unknown memory bank: 0x{:02X}", value))),
        }
    }
}

/// Lock action applied by the lock command
///
/// Each variant names the memory area and the resulting permission.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum LockType {
    WriteEpcOpen = 0x00,
    WriteEpcPassword = 0x01,
    WriteEpcPermanent = 0x02,
    AccessEpcOpen = 0x03,
    WriteUserPassword = 0x04,
    WriteUserPermanent = 0x05,
    AccessUserOpen = 0x06,
    AccessPwdPassword = 0x07,
    AccessPwdPermanent = 0x08,
    AccessAccessOpen = 0x09,
    KillPwdPassword = 0x0A,
    KillPwdPermanent = 0x0B,
    AccessKillOpen = 0x0C,
}

impl From<LockType> for u8 {
    fn from(lock: LockType) -> u8 {
        lock as u8
    }
}

impl TryFrom<u8> for LockType {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0x00 => Ok(Self::WriteEpcOpen),
            0x01 => Ok(Self::WriteEpcPassword),
            0x02 => Ok(Self::WriteEpcPermanent),
            0x03 => Ok(Self::AccessEpcOpen),
            0x04 => Ok(Self::WriteUserPassword),
            0x05 => Ok(Self::WriteUserPermanent),
            0x06 => Ok(Self::AccessUserOpen),
            0x07 => Ok(Self::AccessPwdPassword),
            0x08 => Ok(Self::AccessPwdPermanent),
            0x09 => Ok(Self::AccessAccessOpen),
            0x0A => Ok(Self::KillPwdPassword),
            0x0B => Ok(Self::KillPwdPermanent),
            0x0C => Ok(Self::AccessKillOpen),
            _ => Err(Error::Parse(format!("Unknown lock type: 0x{:02X}", value))),
        }
    }
}

/// Relay output action
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RelayState {
    Off = 0x00,
    On = 0x01,
    /// Close, then release after the configured relay time
    Pulse = 0x02,
}

impl From<RelayState> for u8 {
    fn from(state: RelayState) -> u8 {
        state as u8
    }
}

impl TryFrom<u8> for RelayState {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0x00 => Ok(Self::Off),
            0x01 => Ok(Self::On),
            0x02 => Ok(Self::Pulse),
            _ => Err(Error::Parse(format!("Unknown relay state: 0x{:02X}", value))),
        }
    }
}

/// 32-bit Gen2 access or kill password
#[derive(Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct AccessPassword(pub [u8; 4]);

impl AccessPassword {
    /// The factory default, all zeroes
    pub const DEFAULT: Self = Self([0; 4]);

    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }
}

impl From<u32> for AccessPassword {
    fn from(value: u32) -> Self {
        Self(value.to_be_bytes())
    }
}

impl TryFrom<&[u8]> for AccessPassword {
    type Error = Error;

    fn try_from(value: &[u8]) -> Result<Self> {
        let bytes: [u8; 4] = value.try_into().map_err(|_| {
            Error::Validation(format!("Password must be 4 bytes, got {}", value.len()))
        })?;
        Ok(Self(bytes))
    }
}

// Never print the secret itself.
impl fmt::Debug for AccessPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessPassword(****)")
    }
}
