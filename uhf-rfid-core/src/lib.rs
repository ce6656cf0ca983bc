//! # uhf-rfid-core
//!
//! Protocol primitives for UHF RFID readers speaking CPH v4.0.1.
//!
//! This crate has no I/O. It provides:
//! - Frame encoding and stream extraction with resynchronisation
//! - The TLV parameter codec and fixed-format record layouts
//! - Request builders and response decoders for every reader command
//! - The [`Protocol`] trait and a name-keyed [`ProtocolRegistry`]
//! - The connection state machine shared by the transport layer
//!
//! ```
//! use uhf_rfid_core::{frame, Extracted};
//!
//! let wire = hex::decode("524600000040000028").unwrap();
//! match frame::try_extract(&wire) {
//!     Extracted::Frame { frame, .. } => assert_eq!(frame.code, 0x40),
//!     other => panic!("unexpected {:?}", other),
//! }
//! ```

pub mod checksum;
pub mod command;
pub mod constants;
pub mod error;
pub mod frame;
pub mod layout;
pub mod params;
pub mod protocol;
pub mod request;
pub mod response;
pub mod session;
pub mod status;
pub mod tlv;

pub use command::{Command, NotificationCategory, NotificationCode};
pub use error::{Error, Result};
pub use frame::{Extracted, Frame, FrameType};
pub use layout::{FieldSpec, FieldWidth, RecordKind, RecordLayout};
pub use params::{ParamCodec, ParameterRecord};
pub use protocol::{CphProtocol, Protocol, ProtocolRegistry};
pub use session::{ConnectionStatus, Session, StatusObserver};
pub use status::Status;
pub use tlv::TlvList;
