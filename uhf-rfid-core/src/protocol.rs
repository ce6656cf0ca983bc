//! Protocol capability boundary and registry
//!
//! The dispatcher and reader only talk to a reader through [`Protocol`], so
//! another wire dialect can be plugged in without touching either.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use tracing::debug;

use crate::command::{NotificationCategory, NotificationCode};
use crate::constants::{CPH_PROTOCOL_NAME, DEFAULT_MAX_INBOUND_PARAMS};
use crate::error::{Error, Result};
use crate::frame::{self, Extracted, Frame, FrameType};
use crate::params::ParamCodec;
use crate::tlv::{self, TlvList};

/// Everything the connection layer needs from a wire protocol
pub trait Protocol: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    /// Wire bytes of a host command
    fn encode_command(&self, code: u8, address: u16, payload: &[u8]) -> Result<Bytes>;

    /// Take one frame off the front of an accumulation buffer
    fn try_extract_frame(&self, buf: &[u8]) -> Extracted;

    /// Split a frame's parameter block into TLVs
    fn decode_params(&self, frame: &Frame) -> Result<TlvList>;

    /// Fail with [`Error::Command`] if the reader reported an error
    fn check_status(&self, frame: &Frame, params: &TlvList) -> Result<()>;

    /// Observer route for an unsolicited frame code, if it is a notification
    fn notification_category_of(&self, code: u8) -> Option<NotificationCategory>;

    /// Whether `frame` answers a command sent with `code` to `address`
    fn is_response_to(&self, frame: &Frame, code: u8, address: u16) -> bool {
        frame.frame_type == FrameType::Response && frame.code == code && frame.address == address
    }

    /// Layouts for fixed-format parameter records
    fn param_codec(&self) -> &ParamCodec;
}

/// CPH v4.0.1
#[derive(Debug, Clone)]
pub struct CphProtocol {
    codec: ParamCodec,
    max_inbound_params: usize,
}

impl CphProtocol {
    pub fn new() -> Self {
        Self::default()
    }

    /// Treat inbound frames declaring more parameter bytes than this as corrupt
    pub fn with_max_inbound_params(mut self, max: usize) -> Self {
        self.max_inbound_params = max;
        self
    }

    /// Use different record layouts, e.g. for a reader model whose tables differ
    pub fn with_param_codec(mut self, codec: ParamCodec) -> Self {
        self.codec = codec;
        self
    }
}

impl Default for CphProtocol {
    fn default() -> Self {
        Self {
            codec: ParamCodec::default(),
            max_inbound_params: DEFAULT_MAX_INBOUND_PARAMS,
        }
    }
}

impl Protocol for CphProtocol {
    fn name(&self) -> &str {
        CPH_PROTOCOL_NAME
    }

    fn encode_command(&self, code: u8, address: u16, payload: &[u8]) -> Result<Bytes> {
        frame::encode_command(code, address, payload)
    }

    fn try_extract_frame(&self, buf: &[u8]) -> Extracted {
        frame::try_extract_bounded(buf, self.max_inbound_params)
    }

    fn decode_params(&self, frame: &Frame) -> Result<TlvList> {
        tlv::decode(&frame.params)
    }

    fn check_status(&self, frame: &Frame, params: &TlvList) -> Result<()> {
        match params.status() {
            Some(status) if !status.is_success() => {
                debug!("{} reported {}", frame, status);
                Err(Error::Command {
                    status,
                    frame: frame.clone(),
                })
            }
            _ => Ok(()),
        }
    }

    fn notification_category_of(&self, code: u8) -> Option<NotificationCategory> {
        NotificationCode::try_from(code)
            .ok()
            .map(NotificationCode::category)
    }

    fn param_codec(&self) -> &ParamCodec {
        &self.codec
    }
}

/// Builds a fresh protocol instance
pub type ProtocolConstructor = Box<dyn Fn() -> Arc<dyn Protocol> + Send + Sync>;

/// Protocol implementations by name
///
/// # Examples
///
/// ```
/// use uhf_rfid_core::protocol::ProtocolRegistry;
///
/// let registry = ProtocolRegistry::with_defaults();
/// let protocol = registry.create("cph_v4.0.1").unwrap();
/// assert_eq!(protocol.name(), "cph_v4.0.1");
/// assert!(registry.create("nope").is_err());
/// ```
#[derive(Default)]
pub struct ProtocolRegistry {
    constructors: BTreeMap<String, ProtocolConstructor>,
}

impl ProtocolRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with CPH v4.0.1 registered
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(CPH_PROTOCOL_NAME, || Arc::new(CphProtocol::new()));
        registry
    }

    /// Add or replace a constructor
    pub fn register<F>(&mut self, name: impl Into<String>, constructor: F)
    where
        F: Fn() -> Arc<dyn Protocol> + Send + Sync + 'static,
    {
        self.constructors.insert(name.into(), Box::new(constructor));
    }

    pub fn create(&self, name: &str) -> Result<Arc<dyn Protocol>> {
        self.constructors
            .get(name)
            .map(|constructor| constructor())
            .ok_or_else(|| Error::UnknownProtocol(name.to_string()))
    }

    pub fn names(&self) -> Vec<&str> {
        self.constructors.keys().map(String::as_str).collect()
    }
}

impl fmt::Debug for ProtocolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProtocolRegistry")
            .field("protocols", &self.names())
            .finish()
    }
}
