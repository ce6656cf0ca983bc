//! Byte layouts of fixed-format parameter records
//!
//! A layout is plain data: an ordered list of big-endian fields, the TLV tag
//! the record travels under and whether the layout has been confirmed
//! against vendor documentation. Only the extended parameter block is
//! confirmed; the others were reconstructed from field-level observation.
//! A reader model that disagrees gets a replacement table through
//! [`ParamCodec::with_layout`](crate::params::ParamCodec::with_layout).

use std::fmt;

use crate::constants::tags;

/// Parameter record families
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RecordKind {
    Ext,
    Working,
    Transport,
    Advance,
    UsbData,
    DataFlag,
}

impl RecordKind {
    pub const ALL: [RecordKind; 6] = [
        Self::Ext,
        Self::Working,
        Self::Transport,
        Self::Advance,
        Self::UsbData,
        Self::DataFlag,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Ext => "ExtParams",
            Self::Working => "WorkingParams",
            Self::Transport => "TransportParams",
            Self::Advance => "AdvanceParams",
            Self::UsbData => "UsbDataParams",
            Self::DataFlag => "DataFlagParams",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Width of one big-endian field
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FieldWidth {
    U8,
    U16,
    U32,
}

impl FieldWidth {
    pub const fn size(self) -> usize {
        match self {
            Self::U8 => 1,
            Self::U16 => 2,
            Self::U32 => 4,
        }
    }

    pub const fn max_value(self) -> u32 {
        match self {
            Self::U8 => u8::MAX as u32,
            Self::U16 => u16::MAX as u32,
            Self::U32 => u32::MAX,
        }
    }
}

/// One field of a record layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub width: FieldWidth,
    /// Largest accepted value, never above the width's maximum
    pub max: u32,
}

impl FieldSpec {
    pub const fn new(name: &'static str, width: FieldWidth) -> Self {
        Self {
            name,
            width,
            max: width.max_value(),
        }
    }

    pub const fn u8(name: &'static str) -> Self {
        Self::new(name, FieldWidth::U8)
    }

    pub const fn u16(name: &'static str) -> Self {
        Self::new(name, FieldWidth::U16)
    }

    pub const fn u32(name: &'static str) -> Self {
        Self::new(name, FieldWidth::U32)
    }

    /// Narrow the accepted range
    pub const fn with_max(mut self, max: u32) -> Self {
        if max < self.max {
            self.max = max;
        }
        self
    }
}

/// Complete wire layout of one record kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordLayout {
    pub kind: RecordKind,
    /// TLV tag the record is wrapped in, if known
    pub tag: Option<u8>,
    /// Confirmed against vendor documentation
    pub verified: bool,
    pub fields: Vec<FieldSpec>,
}

impl RecordLayout {
    pub fn new(kind: RecordKind, tag: Option<u8>, fields: Vec<FieldSpec>) -> Self {
        Self {
            kind,
            tag,
            verified: false,
            fields,
        }
    }

    pub fn with_tag(mut self, tag: u8) -> Self {
        self.tag = Some(tag);
        self
    }

    pub fn with_verified(mut self, verified: bool) -> Self {
        self.verified = verified;
        self
    }

    /// Fixed encoded length in bytes
    pub fn byte_len(&self) -> usize {
        self.fields.iter().map(|f| f.width.size()).sum()
    }

    /// Default CPH v4.0.1 table for `kind`
    pub fn cph(kind: RecordKind) -> Self {
        match kind {
            RecordKind::Ext => Self::new(
                kind,
                Some(tags::EXT_PARAM),
                vec![
                    FieldSpec::u8("relay_mode").with_max(1),
                    FieldSpec::u8("relay_time"),
                    FieldSpec::u8("verify_flag").with_max(1),
                    FieldSpec::u16("verify_pwd"),
                ],
            )
            .with_verified(true),
            RecordKind::Working => Self::new(
                kind,
                Some(tags::WORKING_PARAM),
                vec![
                    FieldSpec::u16("read_duration"),
                    FieldSpec::u16("read_interval"),
                    FieldSpec::u8("work_mode").with_max(2),
                    FieldSpec::u16("tag_upload_flag"),
                    FieldSpec::u8("trigger_mode_output"),
                    FieldSpec::u8("wiegand_protocol"),
                    FieldSpec::u16("wiegand_interval"),
                    FieldSpec::u16("wiegand_pulse_width"),
                    FieldSpec::u16("wiegand_pulse_interval"),
                    FieldSpec::u8("iso_area"),
                    FieldSpec::u8("iso_addr"),
                    FieldSpec::u8("iso_word_count"),
                ],
            ),
            RecordKind::Transport => Self::new(
                kind,
                Some(tags::TRANSPORT_PARAM),
                vec![
                    FieldSpec::u8("transport_type").with_max(5),
                    FieldSpec::u32("uart_baud_rate"),
                    FieldSpec::u32("net_dhcp_flag").with_max(1),
                    FieldSpec::u32("net_ip"),
                    FieldSpec::u32("net_mask"),
                    FieldSpec::u32("net_gateway"),
                    FieldSpec::u32("net_remote_ip"),
                    FieldSpec::u16("net_local_port"),
                    FieldSpec::u16("net_remote_port"),
                    FieldSpec::u8("heartbeat_interval"),
                ],
            ),
            RecordKind::Advance => Self::new(
                kind,
                Some(tags::ADVANCE_PARAM),
                vec![
                    FieldSpec::u8("rf_link_profile").with_max(5),
                    FieldSpec::u8("rf_region"),
                    FieldSpec::u32("rf_spectrum_start"),
                    FieldSpec::u32("rf_spectrum_end"),
                    FieldSpec::u32("rf_inventory_ant_flag"),
                    FieldSpec::u8("rf_inventory_session").with_max(3),
                    FieldSpec::u8("rf_inventory_target").with_max(1),
                    FieldSpec::u8("rf_fm0_div"),
                    FieldSpec::u8("rf_miller_type"),
                    FieldSpec::u8("rf_filter_coefficient"),
                    FieldSpec::u8("rf_tari"),
                    FieldSpec::u16("rf_write_power"),
                    FieldSpec::u8("rf_carrier_flag").with_max(1),
                ],
            ),
            // No TLV tag is documented for these two.
            RecordKind::UsbData => Self::new(
                kind,
                None,
                vec![
                    FieldSpec::u8("usb_enable").with_max(1),
                    FieldSpec::u8("data_interval"),
                    FieldSpec::u8("keyboard_layout"),
                ],
            ),
            RecordKind::DataFlag => Self::new(
                kind,
                None,
                vec![
                    FieldSpec::u16("data_flag"),
                    FieldSpec::u8("data_format").with_max(1),
                ],
            ),
        }
    }
}
