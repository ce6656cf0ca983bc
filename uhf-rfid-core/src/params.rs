//! Fixed-format parameter record codec
//!
//! Records map their fields to and from named `u32` values; the
//! [`RecordLayout`] registered for the record kind decides order, width and
//! range on the wire. `decode(encode(r)) == r` holds for every record whose
//! fields are within the layout's declared ranges.

use std::collections::HashMap;
use std::net::Ipv4Addr;

use byteorder::{BigEndian, ByteOrder};
use bytes::{BufMut, Bytes, BytesMut};
use tracing::{trace, warn};

use uhf_rfid_types::{
    AdvanceParams, DataFlagParams, ExtParams, TransportParams, UsbDataParams, WorkingParams,
};

use crate::error::{Error, Result};
use crate::layout::{FieldWidth, RecordKind, RecordLayout};

/// Named field values read off the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldValues {
    kind: RecordKind,
    values: Vec<(&'static str, u32)>,
}

impl FieldValues {
    fn new(kind: RecordKind) -> Self {
        Self {
            kind,
            values: Vec::new(),
        }
    }

    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    pub fn get(&self, name: &str) -> Option<u32> {
        self.values
            .iter()
            .find(|(field, _)| *field == name)
            .map(|(_, value)| *value)
    }

    fn narrow<T: TryFrom<u32>>(&self, name: &'static str, default: T, max: u32) -> Result<T> {
        match self.get(name) {
            None => Ok(default),
            Some(value) => T::try_from(value).map_err(|_| Error::FieldOutOfRange {
                kind: self.kind,
                field: name,
                value,
                max,
            }),
        }
    }

    /// Field as `u8`, or `default` when the layout does not carry it
    pub fn u8(&self, name: &'static str, default: u8) -> Result<u8> {
        self.narrow(name, default, u8::MAX as u32)
    }

    pub fn u16(&self, name: &'static str, default: u16) -> Result<u16> {
        self.narrow(name, default, u16::MAX as u32)
    }

    pub fn u32(&self, name: &'static str, default: u32) -> Result<u32> {
        Ok(self.get(name).unwrap_or(default))
    }

    pub fn ipv4(&self, name: &'static str, default: Ipv4Addr) -> Result<Ipv4Addr> {
        Ok(self.get(name).map(Ipv4Addr::from).unwrap_or(default))
    }
}

/// A settings block exchanged through a [`RecordLayout`]
pub trait ParameterRecord: Sized + Default {
    const KIND: RecordKind;

    /// Every field this record has, by layout name
    fn to_fields(&self) -> Vec<(&'static str, u32)>;

    /// Rebuild from decoded fields; absent fields keep their defaults
    fn from_fields(fields: &FieldValues) -> Result<Self>;
}

impl ParameterRecord for ExtParams {
    const KIND: RecordKind = RecordKind::Ext;

    fn to_fields(&self) -> Vec<(&'static str, u32)> {
        vec![
            ("relay_mode", self.relay_mode.into()),
            ("relay_time", self.relay_time.into()),
            ("verify_flag", self.verify_flag.into()),
            ("verify_pwd", self.verify_pwd.into()),
        ]
    }

    fn from_fields(fields: &FieldValues) -> Result<Self> {
        let d = Self::default();
        Ok(Self {
            relay_mode: fields.u8("relay_mode", d.relay_mode)?,
            relay_time: fields.u8("relay_time", d.relay_time)?,
            verify_flag: fields.u8("verify_flag", d.verify_flag)?,
            verify_pwd: fields.u16("verify_pwd", d.verify_pwd)?,
        })
    }
}

impl ParameterRecord for WorkingParams {
    const KIND: RecordKind = RecordKind::Working;

    fn to_fields(&self) -> Vec<(&'static str, u32)> {
        vec![
            ("read_duration", self.read_duration.into()),
            ("read_interval", self.read_interval.into()),
            ("work_mode", self.work_mode.into()),
            ("tag_upload_flag", self.tag_upload_flag.into()),
            ("trigger_mode_output", self.trigger_mode_output.into()),
            ("wiegand_protocol", self.wiegand_protocol.into()),
            ("wiegand_interval", self.wiegand_interval.into()),
            ("wiegand_pulse_width", self.wiegand_pulse_width.into()),
            ("wiegand_pulse_interval", self.wiegand_pulse_interval.into()),
            ("iso_area", self.iso_area.into()),
            ("iso_addr", self.iso_addr.into()),
            ("iso_word_count", self.iso_word_count.into()),
        ]
    }

    fn from_fields(fields: &FieldValues) -> Result<Self> {
        let d = Self::default();
        Ok(Self {
            read_duration: fields.u16("read_duration", d.read_duration)?,
            read_interval: fields.u16("read_interval", d.read_interval)?,
            work_mode: fields.u8("work_mode", d.work_mode)?,
            tag_upload_flag: fields.u16("tag_upload_flag", d.tag_upload_flag)?,
            trigger_mode_output: fields.u8("trigger_mode_output", d.trigger_mode_output)?,
            wiegand_protocol: fields.u8("wiegand_protocol", d.wiegand_protocol)?,
            wiegand_interval: fields.u16("wiegand_interval", d.wiegand_interval)?,
            wiegand_pulse_width: fields.u16("wiegand_pulse_width", d.wiegand_pulse_width)?,
            wiegand_pulse_interval: fields
                .u16("wiegand_pulse_interval", d.wiegand_pulse_interval)?,
            iso_area: fields.u8("iso_area", d.iso_area)?,
            iso_addr: fields.u8("iso_addr", d.iso_addr)?,
            iso_word_count: fields.u8("iso_word_count", d.iso_word_count)?,
        })
    }
}

impl ParameterRecord for TransportParams {
    const KIND: RecordKind = RecordKind::Transport;

    fn to_fields(&self) -> Vec<(&'static str, u32)> {
        vec![
            ("transport_type", self.transport_type.into()),
            ("uart_baud_rate", self.uart_baud_rate),
            ("net_dhcp_flag", self.net_dhcp_flag),
            ("net_ip", self.net_ip.into()),
            ("net_mask", self.net_mask.into()),
            ("net_gateway", self.net_gateway.into()),
            ("net_remote_ip", self.net_remote_ip.into()),
            ("net_local_port", self.net_local_port.into()),
            ("net_remote_port", self.net_remote_port.into()),
            ("heartbeat_interval", self.heartbeat_interval.into()),
        ]
    }

    fn from_fields(fields: &FieldValues) -> Result<Self> {
        let d = Self::default();
        Ok(Self {
            transport_type: fields.u8("transport_type", d.transport_type)?,
            uart_baud_rate: fields.u32("uart_baud_rate", d.uart_baud_rate)?,
            net_dhcp_flag: fields.u32("net_dhcp_flag", d.net_dhcp_flag)?,
            net_ip: fields.ipv4("net_ip", d.net_ip)?,
            net_mask: fields.ipv4("net_mask", d.net_mask)?,
            net_gateway: fields.ipv4("net_gateway", d.net_gateway)?,
            net_remote_ip: fields.ipv4("net_remote_ip", d.net_remote_ip)?,
            net_local_port: fields.u16("net_local_port", d.net_local_port)?,
            net_remote_port: fields.u16("net_remote_port", d.net_remote_port)?,
            heartbeat_interval: fields.u8("heartbeat_interval", d.heartbeat_interval)?,
        })
    }
}

impl ParameterRecord for AdvanceParams {
    const KIND: RecordKind = RecordKind::Advance;

    fn to_fields(&self) -> Vec<(&'static str, u32)> {
        vec![
            ("rf_link_profile", self.rf_link_profile.into()),
            ("rf_region", self.rf_region.into()),
            ("rf_spectrum_start", self.rf_spectrum_start),
            ("rf_spectrum_end", self.rf_spectrum_end),
            ("rf_inventory_ant_flag", self.rf_inventory_ant_flag),
            ("rf_inventory_session", self.rf_inventory_session.into()),
            ("rf_inventory_target", self.rf_inventory_target.into()),
            ("rf_fm0_div", self.rf_fm0_div.into()),
            ("rf_miller_type", self.rf_miller_type.into()),
            ("rf_filter_coefficient", self.rf_filter_coefficient.into()),
            ("rf_tari", self.rf_tari.into()),
            ("rf_write_power", self.rf_write_power.into()),
            ("rf_carrier_flag", self.rf_carrier_flag.into()),
        ]
    }

    fn from_fields(fields: &FieldValues) -> Result<Self> {
        let d = Self::default();
        Ok(Self {
            rf_link_profile: fields.u8("rf_link_profile", d.rf_link_profile)?,
            rf_region: fields.u8("rf_region", d.rf_region)?,
            rf_spectrum_start: fields.u32("rf_spectrum_start", d.rf_spectrum_start)?,
            rf_spectrum_end: fields.u32("rf_spectrum_end", d.rf_spectrum_end)?,
            rf_inventory_ant_flag: fields.u32("rf_inventory_ant_flag", d.rf_inventory_ant_flag)?,
            rf_inventory_session: fields.u8("rf_inventory_session", d.rf_inventory_session)?,
            rf_inventory_target: fields.u8("rf_inventory_target", d.rf_inventory_target)?,
            rf_fm0_div: fields.u8("rf_fm0_div", d.rf_fm0_div)?,
            rf_miller_type: fields.u8("rf_miller_type", d.rf_miller_type)?,
            rf_filter_coefficient: fields.u8("rf_filter_coefficient", d.rf_filter_coefficient)?,
            rf_tari: fields.u8("rf_tari", d.rf_tari)?,
            rf_write_power: fields.u16("rf_write_power", d.rf_write_power)?,
            rf_carrier_flag: fields.u8("rf_carrier_flag", d.rf_carrier_flag)?,
        })
    }
}

impl ParameterRecord for UsbDataParams {
    const KIND: RecordKind = RecordKind::UsbData;

    fn to_fields(&self) -> Vec<(&'static str, u32)> {
        vec![
            ("usb_enable", self.usb_enable.into()),
            ("data_interval", self.data_interval.into()),
            ("keyboard_layout", self.keyboard_layout.into()),
        ]
    }

    fn from_fields(fields: &FieldValues) -> Result<Self> {
        let d = Self::default();
        Ok(Self {
            usb_enable: fields.u8("usb_enable", d.usb_enable)?,
            data_interval: fields.u8("data_interval", d.data_interval)?,
            keyboard_layout: fields.u8("keyboard_layout", d.keyboard_layout)?,
        })
    }
}

impl ParameterRecord for DataFlagParams {
    const KIND: RecordKind = RecordKind::DataFlag;

    fn to_fields(&self) -> Vec<(&'static str, u32)> {
        vec![
            ("data_flag", self.data_flag.into()),
            ("data_format", self.data_format.into()),
        ]
    }

    fn from_fields(fields: &FieldValues) -> Result<Self> {
        let d = Self::default();
        Ok(Self {
            data_flag: fields.u16("data_flag", d.data_flag)?,
            data_format: fields.u8("data_format", d.data_format)?,
        })
    }
}

/// Registry of record layouts keyed by record kind
///
/// # Examples
///
/// ```
/// use uhf_rfid_core::params::ParamCodec;
/// use uhf_rfid_types::ExtParams;
///
/// let codec = ParamCodec::cph();
/// let record = ExtParams { relay_mode: 1, relay_time: 5, verify_flag: 0, verify_pwd: 0x1234 };
///
/// let bytes = codec.encode(&record).unwrap();
/// assert_eq!(&bytes[..], &[0x01, 0x05, 0x00, 0x12, 0x34]);
/// assert_eq!(codec.decode::<ExtParams>(&bytes).unwrap(), record);
/// ```
#[derive(Debug, Clone)]
pub struct ParamCodec {
    layouts: HashMap<RecordKind, RecordLayout>,
}

impl ParamCodec {
    /// Codec with no layouts registered
    pub fn empty() -> Self {
        Self {
            layouts: HashMap::new(),
        }
    }

    /// Codec with the default CPH v4.0.1 tables
    pub fn cph() -> Self {
        RecordKind::ALL
            .into_iter()
            .fold(Self::empty(), |codec, kind| codec.with_layout(RecordLayout::cph(kind)))
    }

    /// Register or replace the layout for `layout.kind`
    pub fn with_layout(mut self, layout: RecordLayout) -> Self {
        self.layouts.insert(layout.kind, layout);
        self
    }

    pub fn layout(&self, kind: RecordKind) -> Result<&RecordLayout> {
        self.layouts.get(&kind).ok_or(Error::MissingLayout(kind))
    }

    /// Encode `record` into its fixed-length wire form
    ///
    /// # Errors
    ///
    /// - [`Error::FieldOutOfRange`] if a value exceeds its field's range
    /// - [`Error::UnknownField`] if the layout names a field the record lacks
    /// - [`Error::MissingLayout`] if no layout is registered
    pub fn encode<R: ParameterRecord>(&self, record: &R) -> Result<Bytes> {
        let layout = self.layout(R::KIND)?;
        if !layout.verified {
            warn!("Encoding {} with an unverified byte layout", R::KIND);
        }

        let values = record.to_fields();
        let mut buf = BytesMut::with_capacity(layout.byte_len());

        for spec in &layout.fields {
            let value = values
                .iter()
                .find(|(name, _)| *name == spec.name)
                .map(|(_, value)| *value)
                .ok_or(Error::UnknownField {
                    kind: R::KIND,
                    field: spec.name,
                })?;

            // `max` is public, so never trust it past the field width
            let max = spec.max.min(spec.width.max_value());
            if value > max {
                return Err(Error::FieldOutOfRange {
                    kind: R::KIND,
                    field: spec.name,
                    value,
                    max,
                });
            }

            match spec.width {
                FieldWidth::U8 => buf.put_u8(value as u8),
                FieldWidth::U16 => buf.put_u16(value as u16),
                FieldWidth::U32 => buf.put_u32(value),
            }
        }

        trace!("Encoded {}: {:02X?}", R::KIND, &buf[..]);
        Ok(buf.freeze())
    }

    /// Decode a record from exactly `layout.byte_len()` bytes
    pub fn decode<R: ParameterRecord>(&self, data: &[u8]) -> Result<R> {
        let layout = self.layout(R::KIND)?;
        if !layout.verified {
            warn!("Decoding {} with an unverified byte layout", R::KIND);
        }

        let expected = layout.byte_len();
        if data.len() != expected {
            return Err(Error::RecordLength {
                kind: R::KIND,
                expected,
                actual: data.len(),
            });
        }

        let mut fields = FieldValues::new(R::KIND);
        let mut offset = 0;
        for spec in &layout.fields {
            let raw = &data[offset..offset + spec.width.size()];
            let value = match spec.width {
                FieldWidth::U8 => raw[0] as u32,
                FieldWidth::U16 => BigEndian::read_u16(raw) as u32,
                FieldWidth::U32 => BigEndian::read_u32(raw),
            };
            fields.values.push((spec.name, value));
            offset += spec.width.size();
        }

        R::from_fields(&fields)
    }
}

impl Default for ParamCodec {
    fn default() -> Self {
        Self::cph()
    }
}
