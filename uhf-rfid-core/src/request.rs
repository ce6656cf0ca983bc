//! Parameter blocks for host commands
//!
//! Every builder validates its inputs before producing bytes, so a payload
//! that comes out of here is always well-formed on the wire.

use bytes::{BufMut, Bytes, BytesMut};
use chrono::{Datelike, NaiveDateTime, Timelike};

use uhf_rfid_types::{AccessPassword, LockType, MemoryBank, ModbusParams, ModemParams, RelayState};

use crate::constants::{operations, param_types, tags};
use crate::error::{Error, Result};
use crate::params::{ParamCodec, ParameterRecord};
use crate::tlv::{self, MAX_VALUE_LEN};

/// Password, op type, bank, word pointer and word count
const OPERATION_HEADER_LEN: usize = 9;

/// Largest write that still fits a single operation TLV
pub const MAX_WRITE_BYTES: usize = (MAX_VALUE_LEN - OPERATION_HEADER_LEN) & !1;

pub const MIN_RTC_YEAR: i32 = 2000;
pub const MAX_RTC_YEAR: i32 = 9999;

fn operation(
    password: AccessPassword,
    op: u8,
    bank: u8,
    word_ptr: u16,
    word_count: u8,
    data: &[u8],
) -> Result<Bytes> {
    let mut value = BytesMut::with_capacity(OPERATION_HEADER_LEN + data.len());
    value.put_slice(password.as_bytes());
    value.put_u8(op);
    value.put_u8(bank);
    value.put_u16(word_ptr);
    value.put_u8(word_count);
    value.put_slice(data);

    tlv::encode(tags::OPERATION, &value)
}

/// Read `word_count` 16-bit words starting at `word_ptr`
pub fn read_tag(
    bank: MemoryBank,
    word_ptr: u16,
    word_count: u8,
    password: AccessPassword,
) -> Result<Bytes> {
    if word_count == 0 {
        return Err(Error::InvalidArgument(
            "Word count must be between 1 and 255".into(),
        ));
    }

    operation(password, operations::READ, bank.into(), word_ptr, word_count, &[])
}

/// Write `data` (whole words) starting at `word_ptr`
pub fn write_tag(
    bank: MemoryBank,
    word_ptr: u16,
    data: &[u8],
    password: AccessPassword,
) -> Result<Bytes> {
    if data.is_empty() {
        return Err(Error::InvalidArgument("Write data must not be empty".into()));
    }
    if data.len() % 2 != 0 {
        return Err(Error::InvalidArgument(format!(
            "Write data must be whole 16-bit words, got {} bytes",
            data.len()
        )));
    }
    if data.len() > MAX_WRITE_BYTES {
        return Err(Error::InvalidArgument(format!(
            "Write data too long: {} bytes (max: {} bytes)",
            data.len(),
            MAX_WRITE_BYTES
        )));
    }

    let word_count = (data.len() / 2) as u8;
    operation(password, operations::WRITE, bank.into(), word_ptr, word_count, data)
}

pub fn lock_tag(lock: LockType, password: AccessPassword) -> Result<Bytes> {
    operation(password, operations::LOCK, lock.into(), 0, 0, &[])
}

/// Permanently disable a tag; sent with the lock command
pub fn kill_tag(password: AccessPassword) -> Result<Bytes> {
    operation(password, operations::KILL, 0, 0, 0, &[])
}

/// Ask for one single parameter
pub fn query_parameter(param_type: u8) -> Result<Bytes> {
    tlv::encode(tags::SINGLE_PARAMETER, &[param_type])
}

/// Set one single parameter to a raw value
pub fn set_parameter(param_type: u8, value: &[u8]) -> Result<Bytes> {
    let mut buf = BytesMut::with_capacity(1 + value.len());
    buf.put_u8(param_type);
    buf.put_slice(value);
    tlv::encode(tags::SINGLE_PARAMETER, &buf)
}

/// RF output power in dBm
pub fn set_power(dbm: u8) -> Result<Bytes> {
    if dbm > param_types::MAX_POWER_DBM {
        return Err(Error::InvalidArgument(format!(
            "Power must be 0..={} dBm, got {}",
            param_types::MAX_POWER_DBM,
            dbm
        )));
    }
    set_parameter(param_types::POWER, &[dbm])
}

pub fn set_buzzer(enabled: bool) -> Result<Bytes> {
    set_parameter(param_types::BUZZER, &[u8::from(enabled)])
}

/// Duplicate filter window in seconds
pub fn set_filter_time(seconds: u8) -> Result<Bytes> {
    set_parameter(param_types::TAG_FILTER_TIME, &[seconds])
}

pub fn set_modem(modem: &ModemParams) -> Result<Bytes> {
    let [hi, lo] = modem.threshold.to_be_bytes();
    set_parameter(param_types::MODEM, &[modem.mixer_gain, modem.if_amp_gain, hi, lo])
}

/// Reader clock, second resolution
pub fn set_rtc_time(time: &NaiveDateTime) -> Result<Bytes> {
    let year = time.year();
    if !(MIN_RTC_YEAR..=MAX_RTC_YEAR).contains(&year) {
        return Err(Error::InvalidArgument(format!(
            "RTC year must be {}..={}, got {}",
            MIN_RTC_YEAR, MAX_RTC_YEAR, year
        )));
    }

    let mut value = BytesMut::with_capacity(7);
    value.put_u16(year as u16);
    value.put_u8(time.month() as u8);
    value.put_u8(time.day() as u8);
    value.put_u8(time.hour() as u8);
    value.put_u8(time.minute() as u8);
    value.put_u8(time.second() as u8);

    tlv::encode(tags::TIME, &value)
}

pub fn relay(state: RelayState) -> Result<Bytes> {
    tlv::encode(tags::RELAY, &[state.into()])
}

/// Text for the reader's speech/audio output, UTF-8 encoded
pub fn play_audio(text: &str) -> Result<Bytes> {
    let bytes = text.as_bytes();
    if bytes.is_empty() || bytes.len() > MAX_VALUE_LEN {
        return Err(Error::InvalidArgument(format!(
            "Audio text must be 1..={} bytes, got {}",
            MAX_VALUE_LEN,
            bytes.len()
        )));
    }
    tlv::encode(tags::AUDIO_TEXT, bytes)
}

/// A parameter record wrapped in the TLV tag its layout names
///
/// Layouts without a known tag are refused rather than guessed.
pub fn record<R: ParameterRecord>(codec: &ParamCodec, record: &R) -> Result<Bytes> {
    let layout = codec.layout(R::KIND)?;
    let tag = layout.tag.ok_or_else(|| {
        Error::InvalidArgument(format!(
            "{} has no TLV tag configured; supply one with ParamCodec::with_layout",
            R::KIND
        ))
    })?;

    let body = codec.encode(record)?;
    tlv::encode(tag, &body)
}

/// Modbus slave settings as a TLV group
pub fn modbus(params: &ModbusParams) -> Result<Bytes> {
    params.validate()?;

    let mut buf = BytesMut::with_capacity(20);
    tlv::encode_into(&mut buf, tags::MODBUS_ADDRESS, &[params.address])?;
    tlv::encode_into(&mut buf, tags::BAUD_RATE, &params.baud_rate_code.to_be_bytes())?;
    tlv::encode_into(&mut buf, tags::MODBUS_PARITY, &[params.parity_code])?;
    tlv::encode_into(&mut buf, tags::MODBUS_STOP_BITS, &[params.stop_bits_code])?;
    if let Some(protocol) = params.protocol_code {
        tlv::encode_into(&mut buf, tags::MODBUS_PROTOCOL, &[protocol])?;
    }
    Ok(buf.freeze())
}

/// Enable or disable uploading of stored access records
pub fn record_upload(enabled: bool) -> Result<Bytes> {
    tlv::encode(tags::STATUS, &[u8::from(enabled)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{RecordKind, RecordLayout};
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use uhf_rfid_types::{ExtParams, UsbDataParams};

    #[test]
    fn test_read_tag_payload() {
        let payload = read_tag(MemoryBank::Tid, 0, 6, AccessPassword::DEFAULT).unwrap();
        assert_eq!(
            &payload[..],
            &[0x08, 0x09, 0x00, 0x00, 0x00, 0x00, 0x00, 0x02, 0x00, 0x00, 0x06]
        );
    }

    #[test]
    fn test_read_tag_rejects_zero_words() {
        let err = read_tag(MemoryBank::User, 0, 0, AccessPassword::DEFAULT).unwrap_err();
        assert!(err.is_invalid_argument());
    }

    #[test]
    fn test_write_tag_payload() {
        let password = AccessPassword::from(0x1122_3344);
        let payload = write_tag(MemoryBank::User, 2, &[0xAB, 0xCD], password).unwrap();
        assert_eq!(
            &payload[..],
            &[0x08, 0x0B, 0x11, 0x22, 0x33, 0x44, 0x01, 0x03, 0x00, 0x02, 0x01, 0xAB, 0xCD]
        );
    }

    #[test]
    fn test_write_tag_validation() {
        let pwd = AccessPassword::DEFAULT;
        assert!(write_tag(MemoryBank::User, 0, &[], pwd).unwrap_err().is_invalid_argument());
        assert!(write_tag(MemoryBank::User, 0, &[0x01], pwd).is_err());
        assert!(write_tag(MemoryBank::User, 0, &[0u8; MAX_WRITE_BYTES + 2], pwd).is_err());
        assert!(write_tag(MemoryBank::User, 0, &[0u8; MAX_WRITE_BYTES], pwd).is_ok());
    }

    #[test]
    fn test_lock_and_kill() {
        let pwd = AccessPassword::from(0xDEAD_BEEF);

        let lock = lock_tag(LockType::WriteUserPermanent, pwd).unwrap();
        assert_eq!(&lock[6..8], &[operations::LOCK, 0x05]);

        let kill = kill_tag(pwd).unwrap();
        assert_eq!(
            &kill[..],
            &[0x08, 0x09, 0xDE, 0xAD, 0xBE, 0xEF, 0x03, 0x00, 0x00, 0x00, 0x00]
        );
    }

    #[test]
    fn test_single_parameters() {
        assert_eq!(&query_parameter(param_types::POWER).unwrap()[..], &[0x26, 0x01, 0x01]);
        assert_eq!(&set_power(25).unwrap()[..], &[0x26, 0x02, 0x01, 0x19]);
        assert_eq!(&set_buzzer(true).unwrap()[..], &[0x26, 0x02, 0x02, 0x01]);
        assert_eq!(&set_filter_time(3).unwrap()[..], &[0x26, 0x02, 0x03, 0x03]);

        let modem = ModemParams { mixer_gain: 3, if_amp_gain: 6, threshold: 0x01F4 };
        assert_eq!(
            &set_modem(&modem).unwrap()[..],
            &[0x26, 0x05, 0x04, 0x03, 0x06, 0x01, 0xF4]
        );
    }

    #[test]
    fn test_power_range() {
        assert!(set_power(33).is_ok());
        let err = set_power(34).unwrap_err();
        assert!(err.is_invalid_argument());
        assert!(err.to_string().contains("34"));
    }

    #[test]
    fn test_rtc_payload() {
        let time = NaiveDate::from_ymd_opt(2024, 3, 15)
            .unwrap()
            .and_hms_opt(14, 30, 5)
            .unwrap();
        assert_eq!(
            &set_rtc_time(&time).unwrap()[..],
            &[0x06, 0x07, 0x07, 0xE8, 0x03, 0x0F, 0x0E, 0x1E, 0x05]
        );

        let early = NaiveDate::from_ymd_opt(1999, 12, 31)
            .unwrap()
            .and_hms_opt(23, 59, 59)
            .unwrap();
        assert!(set_rtc_time(&early).unwrap_err().is_invalid_argument());
    }

    #[test]
    fn test_relay_and_audio() {
        assert_eq!(&relay(RelayState::Pulse).unwrap()[..], &[0x27, 0x01, 0x02]);
        assert_eq!(&play_audio("Hi").unwrap()[..], &[0x28, 0x02, b'H', b'i']);
        assert!(play_audio("").is_err());
        assert!(play_audio(&"x".repeat(256)).is_err());
    }

    #[test]
    fn test_record_wrapped_in_layout_tag() {
        let codec = ParamCodec::cph();
        let ext = ExtParams { relay_mode: 1, relay_time: 2, verify_flag: 1, verify_pwd: 0xBEEF };

        assert_eq!(
            &record(&codec, &ext).unwrap()[..],
            &[0x29, 0x05, 0x01, 0x02, 0x01, 0xBE, 0xEF]
        );
    }

    #[test]
    fn test_record_without_tag_is_refused() {
        let codec = ParamCodec::cph();
        let err = record(&codec, &UsbDataParams::default()).unwrap_err();
        assert!(err.is_invalid_argument());

        let codec = codec.with_layout(RecordLayout::cph(RecordKind::UsbData).with_tag(0x60));
        let payload = record(&codec, &UsbDataParams { usb_enable: 1, ..Default::default() }).unwrap();
        assert_eq!(&payload[..], &[0x60, 0x03, 0x01, 0x00, 0x00]);
    }

    #[test]
    fn test_modbus_group() {
        let params = ModbusParams {
            address: 10,
            baud_rate_code: 3,
            parity_code: 1,
            stop_bits_code: 0,
            protocol_code: None,
        };
        assert_eq!(
            &modbus(&params).unwrap()[..],
            &[
                0x53, 0x01, 0x0A, 0x0B, 0x04, 0x00, 0x00, 0x00, 0x03, 0x54, 0x01, 0x01, 0x55, 0x01,
                0x00
            ]
        );

        let with_protocol = ModbusParams { protocol_code: Some(2), ..params };
        assert_eq!(&modbus(&with_protocol).unwrap()[15..], &[0x56, 0x01, 0x02]);

        let bad = ModbusParams { address: 0, ..params };
        assert!(modbus(&bad).unwrap_err().is_invalid_argument());
    }

    #[test]
    fn test_record_upload() {
        assert_eq!(&record_upload(true).unwrap()[..], &[0x07, 0x01, 0x01]);
        assert_eq!(&record_upload(false).unwrap()[..], &[0x07, 0x01, 0x00]);
    }
}
