//! # uhf-rfid
//!
//! Async client for UHF RFID readers speaking the CPH protocol.
//!
//! ## Features
//!
//! - Frame and TLV codec with resynchronisation on corrupt input
//! - One command in flight at a time, with per-command timeouts
//! - Tag reads and heartbeats delivered to registered observers
//! - TCP transport, plus an in-memory mock for tests
//!
//! ## Quick Start
//!
//! ```no_run
//! use uhf_rfid::{MemoryBank, AccessPassword, Reader};
//!
//! #[tokio::main]
//! async fn main() -> uhf_rfid::Result<()> {
//!     let reader = Reader::tcp("192.168.1.178", 6000);
//!
//!     reader
//!         .with_connection(|reader| async move {
//!             println!("Firmware {}", reader.get_version().await?);
//!
//!             reader.set_power(25).await?;
//!             let tid = reader
//!                 .read_tag_memory(MemoryBank::Tid, 0, 6, AccessPassword::default())
//!                 .await?;
//!             println!("TID {:02X?}", &tid[..]);
//!             Ok(())
//!         })
//!         .await
//! }
//! ```

pub mod dispatcher;
pub mod error;
pub mod reader;

pub use dispatcher::{DispatchConfig, Dispatcher, Notification, ObserverHandle, Response};
pub use error::{Error, Result};
pub use reader::{Reader, ReaderConfig};

pub use uhf_rfid_core::{
    Command, ConnectionStatus, CphProtocol, Frame, NotificationCategory, ParamCodec, Protocol,
    ProtocolRegistry, RecordKind, RecordLayout, Status, StatusObserver,
};
pub use uhf_rfid_transport::{MockHandle, MockTransport, TcpTransport, Transport};
pub use uhf_rfid_types::{
    AccessPassword, AdvanceParams, DataFlagParams, DeviceInfo, ExtParams, LockType, MemoryBank,
    ModbusParams, ModemParams, RelayState, TagRead, TransportParams, UsbDataParams, WorkingParams,
};
