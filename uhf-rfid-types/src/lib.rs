//! Value types shared by the uhf-rfid crates
//!
//! Everything in here is plain data: device identity, tag reads, memory
//! bank and lock selectors, and the structured parameter records a reader
//! stores. Byte layouts live in `uhf-rfid-core`.

pub mod device_info;
pub mod error;
pub mod params;
pub mod tag;

pub use device_info::DeviceInfo;
pub use error::{Error, Result};
pub use params::{
    AdvanceParams, DataFlagParams, ExtParams, ModbusParams, ModemParams, TransportParams,
    UsbDataParams, WorkingParams,
};
pub use tag::{AccessPassword, LockType, MemoryBank, RelayState, TagRead};
