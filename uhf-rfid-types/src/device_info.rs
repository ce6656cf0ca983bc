//! Reader identity as reported by the version query

use std::fmt;

/// Reader identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Firmware version, e.g. `4.0.1`
    pub software_version: String,

    /// Vendor device type byte, when reported
    pub device_type: Option<u8>,
}

impl DeviceInfo {
    pub fn new(software_version: impl Into<String>) -> Self {
        Self {
            software_version: software_version.into(),
            device_type: None,
        }
    }

    pub fn with_device_type(mut self, device_type: u8) -> Self {
        self.device_type = Some(device_type);
        self
    }
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.device_type {
            Some(kind) => write!(f, "Reader[FW: {}, type: 0x{:02X}]", self.software_version, kind),
            None => write!(f, "Reader[FW: {}]", self.software_version),
        }
    }
}
