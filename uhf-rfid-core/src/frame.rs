//! CPH frame structure and stream extraction

use std::fmt;

use byteorder::{BigEndian, ByteOrder};
use bytes::{BufMut, Bytes, BytesMut};

use crate::{
    checksum,
    constants::{
        DEFAULT_MAX_INBOUND_PARAMS, FRAME_HEADER, FRAME_PREFIX_LEN, MAX_PARAMS_LEN, MIN_FRAME_LENGTH,
    },
    error::{Error, Result},
};

/// Direction and role of a frame
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FrameType {
    /// Host to reader
    Command = 0x00,
    /// Reader answer to a command
    Response = 0x01,
    /// Unsolicited reader report
    Notification = 0x02,
}

impl FrameType {
    pub fn name(self) -> &'static str {
        match self {
            Self::Command => "Command",
            Self::Response => "Response",
            Self::Notification => "Notification",
        }
    }
}

impl From<FrameType> for u8 {
    fn from(kind: FrameType) -> u8 {
        kind as u8
    }
}

impl TryFrom<u8> for FrameType {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0x00 => Ok(Self::Command),
            0x01 => Ok(Self::Response),
            0x02 => Ok(Self::Notification),
            _ => Err(Error::UnknownFrameType(value)),
        }
    }
}

impl fmt::Display for FrameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// CPH protocol frame
///
/// # Frame Structure
///
/// ```text
/// ┌────────┬──────┬─────────┬──────┬──────────┬──────────┬──────────┐
/// │ Header │ Type │ Address │ Code │ ParamLen │  Params  │ Checksum │
/// │  "RF"  │  1   │ 2 (BE)  │  1   │  2 (BE)  │ ParamLen │    1     │
/// └────────┴──────┴─────────┴──────┴──────────┴──────────┴──────────┘
/// ```
///
/// A `Frame` only ever comes out of [`try_extract`] after the header, length
/// and checksum all matched, or is built locally for sending.
///
/// # Examples
///
/// ```
/// use uhf_rfid_core::{Frame, FrameType};
///
/// let frame = Frame::command(0x40, 0x0000, Vec::<u8>::new());
/// let encoded = frame.encode().unwrap();
/// assert_eq!(&encoded[..], &[0x52, 0x46, 0x00, 0x00, 0x00, 0x40, 0x00, 0x00, 0x28]);
/// assert_eq!(frame.frame_type, FrameType::Command);
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct Frame {
    pub frame_type: FrameType,

    /// Reader address (0 = default/broadcast)
    pub address: u16,

    /// Command or notification code
    pub code: u8,

    /// TLV-encoded parameter block
    pub params: Bytes,
}

impl Frame {
    pub fn new(frame_type: FrameType, address: u16, code: u8, params: impl Into<Bytes>) -> Self {
        Self {
            frame_type,
            address,
            code,
            params: params.into(),
        }
    }

    /// Host-to-reader command frame
    pub fn command(code: u8, address: u16, params: impl Into<Bytes>) -> Self {
        Self::new(FrameType::Command, address, code, params)
    }

    fn put_body(&self, buf: &mut BytesMut) {
        buf.put_slice(&FRAME_HEADER);
        buf.put_u8(self.frame_type.into());
        buf.put_u16(self.address);
        buf.put_u8(self.code);
        buf.put_u16(self.params.len() as u16);
        buf.put_slice(&self.params);
    }

    /// Checksum this frame carries on the wire
    pub fn checksum(&self) -> u8 {
        let mut buf = BytesMut::with_capacity(self.size());
        self.put_body(&mut buf);
        checksum::calculate(&buf)
    }

    /// Encode frame to bytes
    ///
    /// # Errors
    ///
    /// [`Error::PayloadTooLarge`] if the parameters exceed the 16-bit length field.
    pub fn encode(&self) -> Result<BytesMut> {
        if self.params.len() > MAX_PARAMS_LEN {
            return Err(Error::PayloadTooLarge {
                size: self.params.len(),
                max: MAX_PARAMS_LEN,
            });
        }

        let mut buf = BytesMut::with_capacity(self.size());
        self.put_body(&mut buf);
        let checksum = checksum::calculate(&buf);
        buf.put_u8(checksum);

        Ok(buf)
    }

    /// Encoded size in bytes
    pub fn size(&self) -> usize {
        MIN_FRAME_LENGTH + self.params.len()
    }

    pub fn is_response(&self) -> bool {
        self.frame_type == FrameType::Response
    }

    pub fn is_notification(&self) -> bool {
        self.frame_type == FrameType::Notification
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("frame_type", &self.frame_type)
            .field("address", &format!("0x{:04X}", self.address))
            .field("code", &format!("0x{:02X}", self.code))
            .field("params", &hex::encode_upper(&self.params))
            .field("checksum", &format!("0x{:02X}", self.checksum()))
            .finish()
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Frame[{}](addr=0x{:04X}, code=0x{:02X}, len={})",
            self.frame_type,
            self.address,
            self.code,
            self.params.len()
        )
    }
}

/// Build the wire bytes of a host command
pub fn encode_command(code: u8, address: u16, payload: &[u8]) -> Result<Bytes> {
    Frame::command(code, address, Bytes::copy_from_slice(payload))
        .encode()
        .map(BytesMut::freeze)
}

/// Outcome of scanning an accumulation buffer
#[derive(Debug)]
pub enum Extracted {
    /// A valid frame; `consumed` bytes should be dropped from the buffer
    Frame { frame: Frame, consumed: usize },

    /// More bytes are needed; nothing was consumed
    Incomplete,

    /// `consumed` bytes (always at least one) are corrupt and must be dropped
    Invalid { consumed: usize, error: Error },
}

/// Try to take one frame off the front of `buf`
///
/// The caller appends received bytes to its buffer, calls this until it
/// returns [`Extracted::Incomplete`], and drops `consumed` bytes after every
/// `Frame` or `Invalid` result. A bad checksum or frame type only skips the
/// two header bytes so a genuine frame starting inside the bad span is found
/// on the next call. So does a declared parameter length above
/// [`DEFAULT_MAX_INBOUND_PARAMS`]; see [`try_extract_bounded`].
///
/// # Examples
///
/// ```
/// use uhf_rfid_core::frame::{try_extract, encode_command, Extracted};
///
/// let bytes = encode_command(0x21, 0x0000, &[]).unwrap();
///
/// assert!(matches!(try_extract(&bytes[..4]), Extracted::Incomplete));
/// match try_extract(&bytes) {
///     Extracted::Frame { frame, consumed } => {
///         assert_eq!(frame.code, 0x21);
///         assert_eq!(consumed, bytes.len());
///     }
///     other => panic!("unexpected {:?}", other),
/// }
/// ```
pub fn try_extract(buf: &[u8]) -> Extracted {
    try_extract_bounded(buf, DEFAULT_MAX_INBOUND_PARAMS)
}

/// [`try_extract`] with an explicit limit on the declared parameter length
pub fn try_extract_bounded(buf: &[u8], max_params_len: usize) -> Extracted {
    let start = match buf.windows(2).position(|w| w == FRAME_HEADER) {
        Some(start) => start,
        None => {
            // A lone trailing 'R' may be the first half of the next header.
            let keep = usize::from(buf.last() == Some(&FRAME_HEADER[0]));
            let skipped = buf.len() - keep;
            if skipped == 0 {
                return Extracted::Incomplete;
            }
            return Extracted::Invalid {
                consumed: skipped,
                error: Error::MissingHeader { skipped },
            };
        }
    };

    if start > 0 {
        return Extracted::Invalid {
            consumed: start,
            error: Error::MissingHeader { skipped: start },
        };
    }

    let Some(&type_byte) = buf.get(2) else {
        return Extracted::Incomplete;
    };
    let frame_type = match FrameType::try_from(type_byte) {
        Ok(frame_type) => frame_type,
        Err(error) => {
            return Extracted::Invalid {
                consumed: FRAME_HEADER.len(),
                error,
            };
        }
    };

    if buf.len() < FRAME_PREFIX_LEN {
        return Extracted::Incomplete;
    }

    let params_len = BigEndian::read_u16(&buf[6..8]) as usize;
    if params_len > max_params_len {
        return Extracted::Invalid {
            consumed: FRAME_HEADER.len(),
            error: Error::PayloadTooLarge {
                size: params_len,
                max: max_params_len,
            },
        };
    }
    let total = FRAME_PREFIX_LEN + params_len + 1;
    if buf.len() < total {
        return Extracted::Incomplete;
    }

    let expected = checksum::calculate(&buf[..total - 1]);
    let received = buf[total - 1];
    if expected != received {
        return Extracted::Invalid {
            consumed: FRAME_HEADER.len(),
            error: Error::ChecksumMismatch { expected, received },
        };
    }

    let frame = Frame {
        frame_type,
        address: BigEndian::read_u16(&buf[3..5]),
        code: buf[5],
        params: Bytes::copy_from_slice(&buf[FRAME_PREFIX_LEN..total - 1]),
    };

    Extracted::Frame {
        frame,
        consumed: total,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn unhex(s: &str) -> Vec<u8> {
        hex::decode(s).unwrap()
    }

    fn expect_frame(buf: &[u8]) -> (Frame, usize) {
        match try_extract(buf) {
            Extracted::Frame { frame, consumed } => (frame, consumed),
            other => panic!("Expected frame, got {:?}", other),
        }
    }

    #[test]
    fn test_encode_get_version() {
        let bytes = encode_command(0x40, 0x0000, &[]).unwrap();
        assert_eq!(bytes.as_ref(), unhex("524600000040000028").as_slice());
    }

    #[test]
    fn test_encode_with_address_and_params() {
        let bytes = encode_command(0x80, 0x0102, &[0xAA, 0xBB]).unwrap();
        assert_eq!(bytes.as_ref(), unhex("5246000102800002AABB7E").as_slice());
    }

    #[test]
    fn test_encode_payload_too_large() {
        let payload = vec![0u8; MAX_PARAMS_LEN + 1];
        let result = encode_command(0x30, 0, &payload);

        assert!(matches!(result, Err(Error::PayloadTooLarge { size, .. }) if size == MAX_PARAMS_LEN + 1));
    }

    #[test]
    fn test_extract_version_response() {
        let buf = unhex("524601000040000B0701002003040001210105C5");
        let (frame, consumed) = expect_frame(&buf);

        assert_eq!(consumed, buf.len());
        assert_eq!(frame.frame_type, FrameType::Response);
        assert_eq!(frame.address, 0);
        assert_eq!(frame.code, 0x40);
        assert_eq!(frame.params.as_ref(), unhex("0701002003040001210105").as_slice());
        assert_eq!(frame.checksum(), 0xC5);
    }

    #[test]
    fn test_extract_tag_notification() {
        let buf = unhex("52460200008000195017010CE2000017021701992390217D0501C306043D0000004C");
        let (frame, _) = expect_frame(&buf);

        assert!(frame.is_notification());
        assert_eq!(frame.code, 0x80);
        assert_eq!(frame.params.len(), 0x19);
    }

    #[test]
    fn test_extract_empty_and_partial() {
        assert!(matches!(try_extract(&[]), Extracted::Incomplete));
        assert!(matches!(try_extract(&[0x52]), Extracted::Incomplete));
        assert!(matches!(try_extract(&[0x52, 0x46]), Extracted::Incomplete));

        let buf = unhex("524601000040000B07010020");
        assert!(matches!(try_extract(&buf), Extracted::Incomplete));
    }

    #[test]
    fn test_extract_skips_leading_garbage() {
        let mut buf = vec![0x00, 0xFF, 0x13];
        buf.extend_from_slice(&unhex("524600000021000047"));

        match try_extract(&buf) {
            Extracted::Invalid { consumed, error } => {
                assert_eq!(consumed, 3);
                assert!(matches!(error, Error::MissingHeader { skipped: 3 }));
            }
            other => panic!("Expected invalid span, got {:?}", other),
        }

        let (frame, consumed) = expect_frame(&buf[3..]);
        assert_eq!(frame.code, 0x21);
        assert_eq!(consumed, 9);
    }

    #[test]
    fn test_extract_garbage_keeps_trailing_r() {
        match try_extract(&[0x01, 0x02, 0x52]) {
            Extracted::Invalid { consumed, .. } => assert_eq!(consumed, 2),
            other => panic!("Expected invalid span, got {:?}", other),
        }
    }

    #[test]
    fn test_extract_bad_checksum_resyncs_past_header() {
        let mut buf = unhex("524600000021000048");
        buf.extend_from_slice(&unhex("524600000040000028"));

        match try_extract(&buf) {
            Extracted::Invalid { consumed, error } => {
                assert_eq!(consumed, 2);
                assert!(matches!(
                    error,
                    Error::ChecksumMismatch { expected: 0x47, received: 0x48 }
                ));
            }
            other => panic!("Expected checksum failure, got {:?}", other),
        }

        // Rest of the bad frame is skipped as garbage, then the good one parses
        let rest = &buf[2..];
        let Extracted::Invalid { consumed, .. } = try_extract(rest) else {
            panic!("Expected garbage skip");
        };
        let (frame, _) = expect_frame(&rest[consumed..]);
        assert_eq!(frame.code, 0x40);
    }

    #[test]
    fn test_extract_implausible_length_is_skipped() {
        // Length 0x0003 of a start-inventory ack corrupted to 0x8003
        let mut buf = unhex("52460100002100030701003B");
        buf[6] ^= 0x80;
        buf.extend_from_slice(&unhex("524600000040000028"));

        match try_extract(&buf) {
            Extracted::Invalid { consumed, error } => {
                assert_eq!(consumed, 2);
                assert!(matches!(
                    error,
                    Error::PayloadTooLarge { size: 0x8003, max: DEFAULT_MAX_INBOUND_PARAMS }
                ));
            }
            other => panic!("Expected length failure, got {:?}", other),
        }

        let rest = &buf[2..];
        let Extracted::Invalid { consumed, .. } = try_extract(rest) else {
            panic!("Expected garbage skip");
        };
        let (frame, _) = expect_frame(&rest[consumed..]);
        assert_eq!(frame.code, 0x40);
    }

    #[test]
    fn test_extract_bounded_limit() {
        let bytes = encode_command(0x30, 0, &[0u8; 40]).unwrap();

        assert!(matches!(try_extract_bounded(&bytes, 40), Extracted::Frame { .. }));
        assert!(matches!(
            try_extract_bounded(&bytes, 39),
            Extracted::Invalid { consumed: 2, .. }
        ));
    }

    #[test]
    fn test_extract_unknown_frame_type() {
        let buf = unhex("524607000040000021");
        match try_extract(&buf) {
            Extracted::Invalid { consumed, error } => {
                assert_eq!(consumed, 2);
                assert!(matches!(error, Error::UnknownFrameType(0x07)));
            }
            other => panic!("Expected invalid type, got {:?}", other),
        }
    }

    #[test]
    fn test_consumed_bytes_are_gone() {
        let mut buf = BytesMut::from(&unhex("524600000021000047")[..]);
        let (_, consumed) = expect_frame(&buf);
        let _ = buf.split_to(consumed);

        assert!(matches!(try_extract(&buf), Extracted::Incomplete));
    }

    #[test]
    fn test_frame_display() {
        let frame = Frame::new(FrameType::Response, 0x0001, 0x21, vec![0x07, 0x01, 0x00]);
        assert_eq!(
            frame.to_string(),
            "Frame[Response](addr=0x0001, code=0x21, len=3)"
        );
    }

    proptest! {
        #[test]
        fn prop_encode_then_extract(
            code in any::<u8>(),
            address in any::<u16>(),
            payload in proptest::collection::vec(any::<u8>(), 0..300),
        ) {
            let bytes = encode_command(code, address, &payload).unwrap();
            let (frame, consumed) = expect_frame(&bytes);

            prop_assert_eq!(consumed, bytes.len());
            prop_assert_eq!(frame.code, code);
            prop_assert_eq!(frame.address, address);
            prop_assert_eq!(frame.params.as_ref(), payload.as_slice());
        }

        #[test]
        fn prop_arbitrary_split_yields_frame_once(
            payload in proptest::collection::vec(any::<u8>(), 0..64),
            cuts in proptest::collection::vec(any::<prop::sample::Index>(), 0..6),
        ) {
            let bytes = encode_command(0x31, 0x0000, &payload).unwrap();

            let mut points: Vec<usize> = cuts.iter().map(|ix| ix.index(bytes.len())).collect();
            points.push(bytes.len());
            points.sort_unstable();

            let mut buf = BytesMut::new();
            let mut frames = Vec::new();
            let mut fed = 0;
            for point in points {
                buf.extend_from_slice(&bytes[fed..point]);
                fed = point;
                loop {
                    match try_extract(&buf) {
                        Extracted::Frame { frame, consumed } => {
                            let _ = buf.split_to(consumed);
                            frames.push(frame);
                        }
                        Extracted::Incomplete => break,
                        Extracted::Invalid { error, .. } => {
                            prop_assert!(false, "unexpected framing failure: {}", error);
                        }
                    }
                }
            }

            prop_assert_eq!(frames.len(), 1);
            prop_assert_eq!(frames[0].params.as_ref(), payload.as_slice());
            prop_assert!(buf.is_empty());
        }

        #[test]
        fn prop_single_byte_corruption_is_rejected(
            payload in proptest::collection::vec(any::<u8>(), 0..32),
            position in any::<prop::sample::Index>(),
            flip in 1u8..=255,
        ) {
            let mut bytes = encode_command(0x48, 0x0000, &payload).unwrap().to_vec();
            let position = position.index(bytes.len());
            // A corrupted length field is covered separately below
            prop_assume!(position != 6 && position != 7);
            bytes[position] ^= flip;

            let is_invalid = matches!(try_extract(&bytes), Extracted::Invalid { .. });
            prop_assert!(is_invalid);
        }

        #[test]
        fn prop_corrupt_length_never_returns_original(
            payload in proptest::collection::vec(any::<u8>(), 1..32),
            high in any::<bool>(),
            flip in 1u8..=255,
        ) {
            let original = encode_command(0x48, 0x0000, &payload).unwrap().to_vec();
            let mut bytes = original.clone();
            bytes[if high { 6 } else { 7 }] ^= flip;

            if let Extracted::Frame { frame, consumed } = try_extract(&bytes) {
                prop_assert!(consumed != original.len() || frame.params.as_ref() != payload.as_slice());
            }
        }
    }
}
