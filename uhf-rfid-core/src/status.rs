//! Reader status codes carried in the STATUS TLV

use std::fmt;

/// Result status reported by the reader
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Status {
    Success,
    ParameterUnsupported,
    ParameterLenError,
    ParameterContextError,
    UnsupportedCommand,
    DeviceAddressError,
    ChecksumError,
    UnsupportedTlvType,
    FlashError,
    InternalError,
    /// A code this library does not know
    Unknown(u8),
}

impl Status {
    pub fn code(self) -> u8 {
        match self {
            Self::Success => 0x00,
            Self::ParameterUnsupported => 0x14,
            Self::ParameterLenError => 0x15,
            Self::ParameterContextError => 0x16,
            Self::UnsupportedCommand => 0x17,
            Self::DeviceAddressError => 0x18,
            Self::ChecksumError => 0x20,
            Self::UnsupportedTlvType => 0x21,
            Self::FlashError => 0x22,
            Self::InternalError => 0xFF,
            Self::Unknown(code) => code,
        }
    }

    pub fn is_success(self) -> bool {
        self == Self::Success
    }

    /// Human-readable description from the protocol manual
    pub fn message(self) -> &'static str {
        match self {
            Self::Success => "Command completed successfully",
            Self::ParameterUnsupported => "Unsupported parameter type",
            Self::ParameterLenError => "Incorrect parameter length",
            Self::ParameterContextError => "Incorrect parameter content",
            Self::UnsupportedCommand => "Command code not supported by the reader",
            Self::DeviceAddressError => "Device address does not match the reader",
            Self::ChecksumError => "Reader rejected the frame checksum",
            Self::UnsupportedTlvType => "Unsupported TLV type",
            Self::FlashError => "Failed to write parameters to flash",
            Self::InternalError => "Unspecified internal reader error",
            Self::Unknown(_) => "Unknown status code",
        }
    }
}

impl From<u8> for Status {
    fn from(code: u8) -> Self {
        match code {
            0x00 => Self::Success,
            0x14 => Self::ParameterUnsupported,
            0x15 => Self::ParameterLenError,
            0x16 => Self::ParameterContextError,
            0x17 => Self::UnsupportedCommand,
            0x18 => Self::DeviceAddressError,
            0x20 => Self::ChecksumError,
            0x21 => Self::UnsupportedTlvType,
            0x22 => Self::FlashError,
            0xFF => Self::InternalError,
            other => Self::Unknown(other),
        }
    }
}

impl From<Status> for u8 {
    fn from(status: Status) -> u8 {
        status.code()
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "status 0x{:02X} ({})", self.code(), self.message())
    }
}
