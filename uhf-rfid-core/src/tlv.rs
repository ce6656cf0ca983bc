//! Type-length-value codec for frame parameter blocks
//!
//! Each entry is `tag(1) | len(1) | value(len)`. Parameter blocks may end in
//! zero padding, which is skipped. Tags this library does not interpret are
//! kept as raw bytes.

use bytes::{BufMut, Bytes, BytesMut};

use crate::constants::tags;
use crate::error::{Error, Result};
use crate::status::Status;

/// Largest value a single TLV can carry
pub const MAX_VALUE_LEN: usize = u8::MAX as usize;

/// Borrowed view of one TLV
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TlvRef<'a> {
    pub tag: u8,
    pub value: &'a [u8],
}

/// Lazy walker over a TLV block
///
/// Yields entries in order and stops after the first error.
///
/// # Examples
///
/// ```
/// use uhf_rfid_core::tlv;
///
/// let block = [0x07, 0x01, 0x00, 0x05, 0x01, 0xC3, 0x00, 0x00];
/// let tags: Vec<u8> = tlv::iter(&block).map(|t| t.unwrap().tag).collect();
/// assert_eq!(tags, vec![0x07, 0x05]);
/// ```
#[derive(Debug, Clone)]
pub struct TlvIter<'a> {
    data: &'a [u8],
    offset: usize,
    done: bool,
}

/// Walk `data` lazily
pub fn iter(data: &[u8]) -> TlvIter<'_> {
    TlvIter {
        data,
        offset: 0,
        done: false,
    }
}

impl<'a> Iterator for TlvIter<'a> {
    type Item = Result<TlvRef<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.offset >= self.data.len() {
            return None;
        }

        let rest = &self.data[self.offset..];
        if rest.iter().all(|b| *b == 0) {
            self.done = true;
            return None;
        }

        if rest.len() < 2 {
            self.done = true;
            return Some(Err(Error::TlvTrailingBytes {
                offset: self.offset,
                len: rest.len(),
            }));
        }

        let tag = rest[0];
        let declared = rest[1] as usize;
        if 2 + declared > rest.len() {
            self.done = true;
            return Some(Err(Error::TlvOverrun {
                tag,
                declared,
                available: rest.len() - 2,
            }));
        }

        self.offset += 2 + declared;
        Some(Ok(TlvRef {
            tag,
            value: &rest[2..2 + declared],
        }))
    }
}

/// Owned TLV entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tlv {
    pub tag: u8,
    pub value: Bytes,
}

/// Decoded parameter block, in wire order
///
/// Duplicate tags are kept; lookups return the first occurrence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TlvList {
    entries: Vec<Tlv>,
}

impl TlvList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, tag: u8, value: impl Into<Bytes>) {
        self.entries.push(Tlv {
            tag,
            value: value.into(),
        });
    }

    /// First value carried under `tag`
    pub fn get(&self, tag: u8) -> Option<&Bytes> {
        self.entries.iter().find(|t| t.tag == tag).map(|t| &t.value)
    }

    /// Like [`get`](Self::get), failing with [`Error::MissingTag`]
    pub fn require(&self, tag: u8) -> Result<&Bytes> {
        self.get(tag).ok_or(Error::MissingTag { tag })
    }

    pub fn contains(&self, tag: u8) -> bool {
        self.get(tag).is_some()
    }

    /// Reader status, if the block carries one
    pub fn status(&self) -> Option<Status> {
        self.get(tags::STATUS)
            .and_then(|v| v.first().copied())
            .map(Status::from)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tlv> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Serialize back to wire form
    pub fn encode(&self) -> Result<Bytes> {
        let mut buf = BytesMut::new();
        for entry in &self.entries {
            encode_into(&mut buf, entry.tag, &entry.value)?;
        }
        Ok(buf.freeze())
    }
}

/// Decode a whole parameter block
///
/// Values share the input buffer rather than being copied.
pub fn decode(data: &Bytes) -> Result<TlvList> {
    let mut list = TlvList::new();
    for entry in iter(data) {
        let entry = entry?;
        list.push(entry.tag, data.slice_ref(entry.value));
    }
    Ok(list)
}

/// Append one TLV to `buf`
pub fn encode_into(buf: &mut BytesMut, tag: u8, value: &[u8]) -> Result<()> {
    if value.len() > MAX_VALUE_LEN {
        return Err(Error::TlvValueTooLong {
            tag,
            len: value.len(),
        });
    }

    buf.reserve(2 + value.len());
    buf.put_u8(tag);
    buf.put_u8(value.len() as u8);
    buf.put_slice(value);
    Ok(())
}

/// Encode a single TLV
pub fn encode(tag: u8, value: &[u8]) -> Result<Bytes> {
    let mut buf = BytesMut::with_capacity(2 + value.len());
    encode_into(&mut buf, tag, value)?;
    Ok(buf.freeze())
}
