//! Reader parameter records
//!
//! These are plain settings blocks with the factory defaults a reader ships
//! with. Field meanings follow the vendor manual where it is explicit; the
//! wire layout of each record is defined separately and can be overridden
//! per device model.

use std::net::Ipv4Addr;

use crate::error::{Error, Result};

/// Extended parameters: relay behaviour and tag verification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExtParams {
    /// 0 = automatic, 1 = manual
    pub relay_mode: u8,
    /// Seconds the relay stays closed
    pub relay_time: u8,
    /// 0 = off, 1 = verify tags against `verify_pwd`
    pub verify_flag: u8,
    pub verify_pwd: u16,
}

/// Working parameters: inventory timing, work mode, Wiegand and ISO 18000-6B output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkingParams {
    pub read_duration: u16,
    pub read_interval: u16,
    /// 0 = answer, 1 = active, 2 = trigger
    pub work_mode: u8,
    /// Bitmask selecting which fields are uploaded with each tag
    pub tag_upload_flag: u16,
    pub trigger_mode_output: u8,
    /// 0 = Wiegand 26, 1 = Wiegand 34
    pub wiegand_protocol: u8,
    pub wiegand_interval: u16,
    pub wiegand_pulse_width: u16,
    pub wiegand_pulse_interval: u16,
    pub iso_area: u8,
    pub iso_addr: u8,
    pub iso_word_count: u8,
}

impl Default for WorkingParams {
    fn default() -> Self {
        Self {
            read_duration: 300,
            read_interval: 50,
            work_mode: 0,
            tag_upload_flag: 0,
            trigger_mode_output: 0,
            wiegand_protocol: 0,
            wiegand_interval: 0,
            wiegand_pulse_width: 0,
            wiegand_pulse_interval: 0,
            iso_area: 0,
            iso_addr: 0,
            iso_word_count: 0,
        }
    }
}

/// Transport parameters: which host link the reader uses and how it is addressed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportParams {
    /// 0 = RS232, 1 = RS485, 2 = TCP server, 3 = TCP client, 4 = WiFi server, 5 = WiFi client
    pub transport_type: u8,
    pub uart_baud_rate: u32,
    /// 0 = static address, 1 = DHCP
    pub net_dhcp_flag: u32,
    pub net_ip: Ipv4Addr,
    pub net_mask: Ipv4Addr,
    pub net_gateway: Ipv4Addr,
    pub net_remote_ip: Ipv4Addr,
    pub net_local_port: u16,
    pub net_remote_port: u16,
    /// Seconds between heartbeats, 0 disables them
    pub heartbeat_interval: u8,
}

impl Default for TransportParams {
    fn default() -> Self {
        Self {
            transport_type: 0,
            uart_baud_rate: 115_200,
            net_dhcp_flag: 0,
            net_ip: Ipv4Addr::new(192, 168, 1, 178),
            net_mask: Ipv4Addr::new(255, 255, 255, 0),
            net_gateway: Ipv4Addr::new(192, 168, 1, 1),
            net_remote_ip: Ipv4Addr::new(192, 168, 1, 100),
            net_local_port: 6000,
            net_remote_port: 6001,
            heartbeat_interval: 0,
        }
    }
}

/// Advanced RF parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdvanceParams {
    pub rf_link_profile: u8,
    pub rf_region: u8,
    pub rf_spectrum_start: u32,
    pub rf_spectrum_end: u32,
    /// Bitmask of antennas used for inventory
    pub rf_inventory_ant_flag: u32,
    /// Gen2 session S0..S3
    pub rf_inventory_session: u8,
    /// Gen2 target, 0 = A, 1 = B
    pub rf_inventory_target: u8,
    pub rf_fm0_div: u8,
    pub rf_miller_type: u8,
    pub rf_filter_coefficient: u8,
    pub rf_tari: u8,
    /// Write power in dBm
    pub rf_write_power: u16,
    pub rf_carrier_flag: u8,
}

impl Default for AdvanceParams {
    fn default() -> Self {
        Self {
            rf_link_profile: 0,
            rf_region: 0,
            rf_spectrum_start: 0,
            rf_spectrum_end: 0,
            rf_inventory_ant_flag: 0,
            rf_inventory_session: 0,
            rf_inventory_target: 0,
            rf_fm0_div: 0,
            rf_miller_type: 0,
            rf_filter_coefficient: 0,
            rf_tari: 0,
            rf_write_power: 30,
            rf_carrier_flag: 0,
        }
    }
}

/// USB keyboard-emulation output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UsbDataParams {
    pub usb_enable: u8,
    pub data_interval: u8,
    pub keyboard_layout: u8,
}

/// Output data selection and format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DataFlagParams {
    pub data_flag: u16,
    /// 0 = hex, 1 = decimal
    pub data_format: u8,
}

/// Modbus slave settings
///
/// Baud rate, parity and stop bits are vendor codes, not literal values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModbusParams {
    pub address: u8,
    pub baud_rate_code: u32,
    pub parity_code: u8,
    pub stop_bits_code: u8,
    pub protocol_code: Option<u8>,
}

impl ModbusParams {
    pub const MIN_ADDRESS: u8 = 1;
    pub const MAX_ADDRESS: u8 = 247;

    pub fn validate(&self) -> Result<()> {
        if !(Self::MIN_ADDRESS..=Self::MAX_ADDRESS).contains(&self.address) {
            return Err(Error::Validation(format!(
                "Modbus address must be {}..={}, got {}",
                Self::MIN_ADDRESS,
                Self::MAX_ADDRESS,
                self.address
            )));
        }
        Ok(())
    }
}

impl Default for ModbusParams {
    fn default() -> Self {
        Self {
            address: 1,
            baud_rate_code: 0,
            parity_code: 0,
            stop_bits_code: 0,
            protocol_code: None,
        }
    }
}

/// Receiver modem tuning carried as a single parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ModemParams {
    pub mixer_gain: u8,
    pub if_amp_gain: u8,
    pub threshold: u16,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_factory_defaults() {
        let working = WorkingParams::default();
        assert_eq!(working.read_duration, 300);
        assert_eq!(working.read_interval, 50);

        let transport = TransportParams::default();
        assert_eq!(transport.uart_baud_rate, 115_200);
        assert_eq!(transport.net_ip, Ipv4Addr::new(192, 168, 1, 178));
        assert_eq!(transport.net_local_port, 6000);

        assert_eq!(AdvanceParams::default().rf_write_power, 30);
    }

    #[test]
    fn test_modbus_address_range() {
        assert!(ModbusParams::default().validate().is_ok());

        let params = ModbusParams { address: 0, ..Default::default() };
        assert!(matches!(params.validate(), Err(Error::Validation(_))));

        let params = ModbusParams { address: 248, ..Default::default() };
        assert!(params.validate().is_err());
    }
}
