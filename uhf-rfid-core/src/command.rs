//! CPH command and notification codes

use std::fmt;

use crate::error::{Error, Result};

/// Host-to-reader command codes
///
/// All commands of the CPH v4.0.1 protocol manual.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Command {
    // Device control
    Reboot = 0x10,
    SetDefaultParam = 0x12,

    // Inventory
    StartInventory = 0x21,
    ActiveInventory = 0x22,
    StopInventory = 0x23,

    // Tag memory
    WriteTag = 0x30,
    ReadTag = 0x31,
    WriteWiegand = 0x32,
    LockTag = 0x33,
    WriteEpc = 0x35,

    // Parameter blocks
    QueryExtParam = 0x3E,
    SetExtParam = 0x3F,
    GetVersion = 0x40,
    SetWorkingParam = 0x41,
    QueryWorkingParam = 0x42,
    QueryTransportParam = 0x43,
    SetTransportParam = 0x44,
    QueryAdvanceParam = 0x45,
    SetAdvanceParam = 0x46,
    SetParameter = 0x48,
    QueryParameter = 0x49,

    // Clock and peripherals
    QueryRtcTime = 0x4A,
    SetRtcTime = 0x4B,
    RelayOp = 0x4C,
    AudioPlay = 0x4D,
    VerifyTag = 0x4E,

    // Output configuration
    SetUsbData = 0x50,
    QueryUsbData = 0x51,
    SetDataFlag = 0x52,
    QueryDataFlag = 0x53,
    SetModbusParam = 0x54,
    QueryModbusParam = 0x55,

    UploadRecordStatus = 0x72,
    PrepareUpdate = 0xF4,
}

impl Command {
    /// Get command name
    pub fn name(self) -> &'static str {
        match self {
            Self::Reboot => "CMD_REBOOT",
            Self::SetDefaultParam => "CMD_SET_DEFAULT_PARAM",
            Self::StartInventory => "CMD_START_INVENTORY",
            Self::ActiveInventory => "CMD_ACTIVE_INVENTORY",
            Self::StopInventory => "CMD_STOP_INVENTORY",
            Self::WriteTag => "CMD_WRITE_TAG",
            Self::ReadTag => "CMD_READ_TAG",
            Self::WriteWiegand => "CMD_WRITE_WIEGAND",
            Self::LockTag => "CMD_LOCK_TAG",
            Self::WriteEpc => "CMD_WRITE_EPC",
            Self::QueryExtParam => "CMD_QUERY_EXT_PARAM",
            Self::SetExtParam => "CMD_SET_EXT_PARAM",
            Self::GetVersion => "CMD_GET_VERSION",
            Self::SetWorkingParam => "CMD_SET_WORKING_PARAM",
            Self::QueryWorkingParam => "CMD_QUERY_WORKING_PARAM",
            Self::QueryTransportParam => "CMD_QUERY_TRANSPORT_PARAM",
            Self::SetTransportParam => "CMD_SET_TRANSPORT_PARAM",
            Self::QueryAdvanceParam => "CMD_QUERY_ADVANCE_PARAM",
            Self::SetAdvanceParam => "CMD_SET_ADVANCE_PARAM",
            Self::SetParameter => "CMD_SET_PARAMETER",
            Self::QueryParameter => "CMD_QUERY_PARAMETER",
            Self::QueryRtcTime => "CMD_QUERY_RTC_TIME",
            Self::SetRtcTime => "CMD_SET_RTC_TIME",
            Self::RelayOp => "CMD_RELAY_OP",
            Self::AudioPlay => "CMD_AUDIO_PLAY",
            Self::VerifyTag => "CMD_VERIFY_TAG",
            Self::SetUsbData => "CMD_SET_USB_DATA",
            Self::QueryUsbData => "CMD_QUERY_USB_DATA",
            Self::SetDataFlag => "CMD_SET_DATA_FLAG",
            Self::QueryDataFlag => "CMD_QUERY_DATA_FLAG",
            Self::SetModbusParam => "CMD_SET_MODBUS_PARAM",
            Self::QueryModbusParam => "CMD_QUERY_MODBUS_PARAM",
            Self::UploadRecordStatus => "CMD_UPLOAD_RECORD_STATUS",
            Self::PrepareUpdate => "CMD_PREPARE_UPDATE",
        }
    }

    /// The raw wire code
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl From<Command> for u8 {
    fn from(cmd: Command) -> u8 {
        cmd as u8
    }
}

impl TryFrom<u8> for Command {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0x10 => Ok(Self::Reboot),
            0x12 => Ok(Self::SetDefaultParam),
            0x21 => Ok(Self::StartInventory),
            0x22 => Ok(Self::ActiveInventory),
            0x23 => Ok(Self::StopInventory),
            0x30 => Ok(Self::WriteTag),
            0x31 => Ok(Self::ReadTag),
            0x32 => Ok(Self::WriteWiegand),
            0x33 => Ok(Self::LockTag),
            0x35 => Ok(Self::WriteEpc),
            0x3E => Ok(Self::QueryExtParam),
            0x3F => Ok(Self::SetExtParam),
            0x40 => Ok(Self::GetVersion),
            0x41 => Ok(Self::SetWorkingParam),
            0x42 => Ok(Self::QueryWorkingParam),
            0x43 => Ok(Self::QueryTransportParam),
            0x44 => Ok(Self::SetTransportParam),
            0x45 => Ok(Self::QueryAdvanceParam),
            0x46 => Ok(Self::SetAdvanceParam),
            0x48 => Ok(Self::SetParameter),
            0x49 => Ok(Self::QueryParameter),
            0x4A => Ok(Self::QueryRtcTime),
            0x4B => Ok(Self::SetRtcTime),
            0x4C => Ok(Self::RelayOp),
            0x4D => Ok(Self::AudioPlay),
            0x4E => Ok(Self::VerifyTag),
            0x50 => Ok(Self::SetUsbData),
            0x51 => Ok(Self::QueryUsbData),
            0x52 => Ok(Self::SetDataFlag),
            0x53 => Ok(Self::QueryDataFlag),
            0x54 => Ok(Self::SetModbusParam),
            0x55 => Ok(Self::QueryModbusParam),
            0x72 => Ok(Self::UploadRecordStatus),
            0xF4 => Ok(Self::PrepareUpdate),
            _ => Err(Error::Decoding(format!("Unknown command code: 0x{:02X}", value))),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(0x{:02X})", self.name(), *self as u8)
    }
}

/// Reader-to-host notification codes
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum NotificationCode {
    TagUploaded = 0x80,
    OfflineTagUploaded = 0x81,
    RecordUploaded = 0x82,
    Heartbeat = 0x90,
}

impl NotificationCode {
    pub fn name(self) -> &'static str {
        match self {
            Self::TagUploaded => "NOTIF_TAG_UPLOADED",
            Self::OfflineTagUploaded => "NOTIF_OFFLINE_TAG_UPLOADED",
            Self::RecordUploaded => "NOTIF_RECORD_UPLOADED",
            Self::Heartbeat => "NOTIF_HEARTBEAT",
        }
    }

    pub fn category(self) -> NotificationCategory {
        match self {
            Self::TagUploaded | Self::OfflineTagUploaded => NotificationCategory::TagRead,
            Self::RecordUploaded => NotificationCategory::RecordUpload,
            Self::Heartbeat => NotificationCategory::Heartbeat,
        }
    }
}

impl TryFrom<u8> for NotificationCode {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0x80 => Ok(Self::TagUploaded),
            0x81 => Ok(Self::OfflineTagUploaded),
            0x82 => Ok(Self::RecordUploaded),
            0x90 => Ok(Self::Heartbeat),
            _ => Err(Error::Decoding(format!("Unknown notification code: 0x{:02X}", value))),
        }
    }
}

impl fmt::Display for NotificationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(0x{:02X})", self.name(), *self as u8)
    }
}

/// Routing key for notification observers
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum NotificationCategory {
    /// Live and buffered (offline) tag reads
    TagRead,
    /// Stored access records
    RecordUpload,
    Heartbeat,
}

impl fmt::Display for NotificationCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::TagRead => "tag-read",
            Self::RecordUpload => "record-upload",
            Self::Heartbeat => "heartbeat",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_command_conversion() {
        assert_eq!(u8::from(Command::GetVersion), 0x40);
        assert_eq!(Command::try_from(0x23).unwrap(), Command::StopInventory);
        assert_eq!(Command::LockTag.code(), 0x33);
    }

    #[test]
    fn test_command_display() {
        assert_eq!(Command::StartInventory.to_string(), "CMD_START_INVENTORY(0x21)");
    }

    #[test]
    fn test_unknown_command() {
        assert!(Command::try_from(0x99).is_err());
        assert!(Command::try_from(0x80).is_err());
    }

    #[test]
    fn test_notification_categories() {
        assert_eq!(
            NotificationCode::try_from(0x80).unwrap().category(),
            NotificationCategory::TagRead
        );
        assert_eq!(
            NotificationCode::try_from(0x81).unwrap().category(),
            NotificationCategory::TagRead
        );
        assert_eq!(
            NotificationCode::RecordUploaded.category(),
            NotificationCategory::RecordUpload
        );
        assert_eq!(
            NotificationCode::Heartbeat.category(),
            NotificationCategory::Heartbeat
        );
        assert!(NotificationCode::try_from(0x40).is_err());
    }
}
