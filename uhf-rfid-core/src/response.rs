//! Decoders for response and notification parameter blocks

use byteorder::{BigEndian, ByteOrder};
use bytes::Bytes;
use chrono::{NaiveDate, NaiveDateTime};
use tracing::debug;

use uhf_rfid_types::{DeviceInfo, ModbusParams, ModemParams, TagRead};

use crate::constants::{param_types, tags};
use crate::error::{Error, Result};
use crate::params::{ParamCodec, ParameterRecord};
use crate::tlv::{self, TlvList};

/// Render a software version value
///
/// Printable ASCII is taken as-is; binary versions are dotted bytes, so
/// `04 00 01` becomes `4.0.1`.
pub fn format_version(raw: &[u8]) -> String {
    if !raw.is_empty() && raw.iter().all(|b| b.is_ascii_graphic() || *b == b' ') {
        return String::from_utf8_lossy(raw).into_owned();
    }

    raw.iter()
        .map(|b| b.to_string())
        .collect::<Vec<_>>()
        .join(".")
}

/// Firmware version and device type
pub fn device_info(params: &TlvList) -> Result<DeviceInfo> {
    let version = params.require(tags::SOFTWARE_VERSION)?;
    let mut info = DeviceInfo::new(format_version(version));

    if let Some(&device_type) = params.get(tags::DEVICE_TYPE).and_then(|v| v.first()) {
        info = info.with_device_type(device_type);
    }
    Ok(info)
}

/// Value of a single parameter response, after its echoed type byte
pub fn single_param(params: &TlvList, param_type: u8) -> Result<Bytes> {
    let value = params.require(tags::SINGLE_PARAMETER)?;

    match value.first() {
        Some(&echoed) if echoed == param_type => Ok(value.slice(1..)),
        Some(&echoed) => Err(Error::Decoding(format!(
            "Expected parameter type 0x{:02X}, reader answered 0x{:02X}",
            param_type, echoed
        ))),
        None => Err(Error::Decoding("Empty single parameter value".into())),
    }
}

fn single_byte(params: &TlvList, param_type: u8) -> Result<u8> {
    let value = single_param(params, param_type)?;
    value.first().copied().ok_or_else(|| {
        Error::Decoding(format!("Parameter 0x{:02X} carries no value", param_type))
    })
}

/// RF output power in dBm
pub fn power(params: &TlvList) -> Result<u8> {
    single_byte(params, param_types::POWER)
}

pub fn buzzer(params: &TlvList) -> Result<bool> {
    single_byte(params, param_types::BUZZER).map(|v| v != 0)
}

pub fn filter_time(params: &TlvList) -> Result<u8> {
    single_byte(params, param_types::TAG_FILTER_TIME)
}

pub fn modem(params: &TlvList) -> Result<ModemParams> {
    let value = single_param(params, param_types::MODEM)?;
    if value.len() != 4 {
        return Err(Error::Decoding(format!(
            "Modem parameters must be 4 bytes, got {}",
            value.len()
        )));
    }

    Ok(ModemParams {
        mixer_gain: value[0],
        if_amp_gain: value[1],
        threshold: BigEndian::read_u16(&value[2..4]),
    })
}

/// Decode the 7-byte `year(u16) month day hour minute second` form
pub fn parse_time(raw: &[u8]) -> Result<NaiveDateTime> {
    if raw.len() != 7 {
        return Err(Error::Decoding(format!(
            "Time value must be 7 bytes, got {}",
            raw.len()
        )));
    }

    let year = BigEndian::read_u16(&raw[0..2]) as i32;
    NaiveDate::from_ymd_opt(year, raw[2] as u32, raw[3] as u32)
        .and_then(|date| date.and_hms_opt(raw[4] as u32, raw[5] as u32, raw[6] as u32))
        .ok_or_else(|| Error::Decoding(format!("Invalid time value: {:02X?}", raw)))
}

/// Reader clock
pub fn rtc_time(params: &TlvList) -> Result<NaiveDateTime> {
    parse_time(params.require(tags::TIME)?)
}

/// Memory read back by the read command
///
/// The reader answers under the tag of the bank that was read.
pub fn tag_data(params: &TlvList) -> Result<Bytes> {
    [tags::USER_DATA, tags::EPC, tags::TID_DATA, tags::RESERVE_DATA]
        .into_iter()
        .find_map(|tag| params.get(tag).cloned())
        .ok_or_else(|| Error::Decoding("Read response carries no tag data".into()))
}

/// One tag report from an upload notification
///
/// Fields are taken from the single-tag container when present, otherwise
/// from the top level. A 7-byte time value becomes `timestamp`, a 4-byte one
/// is kept as `raw_time`, and any other length is ignored.
pub fn tag_read(params: &TlvList) -> Result<TagRead> {
    let inner;
    let fields = match params.get(tags::SINGLE_TAG) {
        Some(container) => {
            inner = tlv::decode(container)?;
            &inner
        }
        None => params,
    };

    let epc = fields.require(tags::EPC)?;
    let mut tag = TagRead::new(hex::encode_upper(epc));

    tag.tid = fields.get(tags::TID_DATA).map(hex::encode_upper);
    tag.user_data = fields.get(tags::USER_DATA).map(|v| v.to_vec());
    tag.rssi = fields
        .get(tags::RSSI)
        .and_then(|v| v.first())
        .map(|b| *b as i8);
    tag.antenna = fields.get(tags::ANT_NO).and_then(|v| v.first()).copied();
    match fields.get(tags::TIME) {
        Some(raw) if raw.len() == 7 => tag.timestamp = parse_time(raw).ok(),
        Some(raw) if raw.len() == 4 => tag.raw_time = Some(BigEndian::read_u32(raw)),
        Some(raw) => debug!("Ignoring {}-byte tag timestamp", raw.len()),
        None => {}
    }

    Ok(tag)
}

/// A parameter record carried under its layout's tag
pub fn record<R: ParameterRecord>(codec: &ParamCodec, params: &TlvList) -> Result<R> {
    let layout = codec.layout(R::KIND)?;
    let tag = layout.tag.ok_or_else(|| {
        Error::InvalidArgument(format!("{} has no TLV tag configured", R::KIND))
    })?;

    codec.decode(params.require(tag)?)
}

/// Modbus slave settings from their TLV group
pub fn modbus(params: &TlvList) -> Result<ModbusParams> {
    let byte = |tag: u8| -> Result<u8> {
        params
            .require(tag)?
            .first()
            .copied()
            .ok_or_else(|| Error::Decoding(format!("TLV 0x{:02X} is empty", tag)))
    };

    let baud = params.require(tags::BAUD_RATE)?;
    if baud.is_empty() || baud.len() > 4 {
        return Err(Error::Decoding(format!(
            "Baud rate code must be 1..=4 bytes, got {}",
            baud.len()
        )));
    }

    Ok(ModbusParams {
        address: byte(tags::MODBUS_ADDRESS)?,
        baud_rate_code: BigEndian::read_uint(baud, baud.len()) as u32,
        parity_code: byte(tags::MODBUS_PARITY)?,
        stop_bits_code: byte(tags::MODBUS_STOP_BITS)?,
        protocol_code: params.get(tags::MODBUS_PROTOCOL).and_then(|v| v.first()).copied(),
    })
}
