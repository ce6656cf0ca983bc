//! Error types for uhf-rfid-core

use crate::frame::Frame;
use crate::layout::RecordKind;
use crate::session::ConnectionStatus;
use crate::status::Status;

/// Result type alias for protocol operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core protocol errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Bytes before the next `RF` header were skipped
    #[error("No frame header found, skipped {skipped} bytes")]
    MissingHeader { skipped: usize },

    /// Checksum verification failed
    #[error("Checksum mismatch: expected 0x{expected:02X}, received 0x{received:02X}")]
    ChecksumMismatch { expected: u8, received: u8 },

    /// Frame type byte is not command, response or notification
    #[error("Unknown frame type: 0x{0:02X}")]
    UnknownFrameType(u8),

    /// Parameter block does not fit the 16-bit length field
    #[error("Payload too large: {size} bytes (max: {max} bytes)")]
    PayloadTooLarge { size: usize, max: usize },

    /// TLV length runs past the end of the buffer
    #[error("TLV 0x{tag:02X} declares {declared} bytes but only {available} remain")]
    TlvOverrun {
        tag: u8,
        declared: usize,
        available: usize,
    },

    /// Non-zero bytes too short to form a TLV
    #[error("{len} trailing bytes at offset {offset} do not form a TLV")]
    TlvTrailingBytes { offset: usize, len: usize },

    /// TLV value does not fit the 8-bit length field
    #[error("TLV 0x{tag:02X} value is {len} bytes (max: 255 bytes)")]
    TlvValueTooLong { tag: u8, len: usize },

    /// A required TLV is absent from the response
    #[error("Missing TLV 0x{tag:02X} in response")]
    MissingTag { tag: u8 },

    /// Parameter record has the wrong size for its layout
    #[error("{kind} record must be {expected} bytes, got {actual}")]
    RecordLength {
        kind: RecordKind,
        expected: usize,
        actual: usize,
    },

    /// Parameter field exceeds its declared range
    #[error("{kind}.{field} = {value} is out of range (max: {max})")]
    FieldOutOfRange {
        kind: RecordKind,
        field: &'static str,
        value: u32,
        max: u32,
    },

    /// Layout names a field the record does not have
    #[error("{kind} has no field named {field}")]
    UnknownField { kind: RecordKind, field: &'static str },

    /// No layout registered for a record kind
    #[error("No layout registered for {0} records")]
    MissingLayout(RecordKind),

    /// Response payload could not be interpreted
    #[error("Decoding error: {0}")]
    Decoding(String),

    /// Request payload could not be built
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// Caller supplied an argument outside its valid range
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Reader reported a non-success status
    #[error("Reader returned {status} for {frame}")]
    Command { status: Status, frame: Frame },

    /// No protocol registered under this name
    #[error("Unknown protocol: {0}")]
    UnknownProtocol(String),

    /// Connection state change not allowed from the current state
    #[error("Invalid connection transition: {from} -> {to}")]
    InvalidTransition {
        from: ConnectionStatus,
        to: ConnectionStatus,
    },

    #[error("Type error: {0}")]
    Types(#[from] uhf_rfid_types::Error),
}

impl Error {
    /// Corrupt or malformed bytes on the wire
    pub fn is_framing(&self) -> bool {
        matches!(
            self,
            Self::MissingHeader { .. }
                | Self::ChecksumMismatch { .. }
                | Self::UnknownFrameType(_)
                | Self::TlvTrailingBytes { .. }
        )
    }

    /// A well-framed payload whose contents could not be decoded
    pub fn is_decoding(&self) -> bool {
        matches!(
            self,
            Self::TlvOverrun { .. }
                | Self::MissingTag { .. }
                | Self::RecordLength { .. }
                | Self::Decoding(_)
                | Self::Types(uhf_rfid_types::Error::Parse(_))
        )
    }

    /// A request that could not be serialized
    pub fn is_encoding(&self) -> bool {
        matches!(
            self,
            Self::PayloadTooLarge { .. }
                | Self::TlvValueTooLong { .. }
                | Self::FieldOutOfRange { .. }
                | Self::UnknownField { .. }
                | Self::MissingLayout(_)
                | Self::Encoding(_)
        )
    }

    /// Caller input rejected before anything was sent
    pub fn is_invalid_argument(&self) -> bool {
        matches!(
            self,
            Self::InvalidArgument(_) | Self::Types(uhf_rfid_types::Error::Validation(_))
        )
    }

    /// Status reported by the reader, if this is a command error
    pub fn status(&self) -> Option<Status> {
        match self {
            Self::Command { status, .. } => Some(*status),
            _ => None,
        }
    }
}
