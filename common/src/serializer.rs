// Length-prefixed binary wire format, grounded in the `Reader`/`Writer`/
// `Serializer` trio used throughout tos_common (see
// common/src/kyc/data.rs, common/src/referral/record.rs,
// common/src/nft/storage.rs) even though the trait's own definition
// file was too large to retrieve — this module reconstructs it from
// its call sites so the sync crate's message codecs (spec.md §4.5)
// have the same "call `.write(writer)` / `T::read(reader)`" shape the
// rest of the corpus uses.

use std::convert::TryInto;

use thiserror::Error;

use crate::hash::{Hash, HASH_SIZE};

/// Upper bound on a length-prefixed list's declared element count. Guards
/// `Vec::with_capacity` (and the per-entry count inside `ModifiersMessage`,
/// which is wire-shaped as a list of id/bytes pairs) against a malicious or
/// corrupt length prefix driving an unbounded allocation before a single
/// element has actually been read.
pub const MAX_ARRAY_SIZE: usize = 1_000_000;

/// Upper bound on a single length-prefixed byte blob (a modifier body, a
/// `SyncInfo` payload). Independent of `maxPacketSize` (that's a sender-side
/// policy on the whole message); this is the reader's own defense against
/// trusting a declared length before the bytes are in hand.
pub const MAX_BYTES_SIZE: usize = 16 * 1024 * 1024;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReaderError {
    #[error("not enough bytes remaining to read")]
    InvalidSize,
    #[error("value out of the expected range")]
    InvalidValue,
    #[error("invalid hex string")]
    InvalidHex,
    #[error("array would exceed the configured maximum size")]
    ExceedsMaxArraySize,
    #[error("payload would exceed the configured maximum byte size")]
    ExceedsMaxBytesSize,
}

/// Cursor over an immutable byte slice. Every `read_*` method advances
/// the cursor and fails with `ReaderError::InvalidSize` rather than
/// panicking on short input — a peer can always hand us truncated
/// garbage.
pub struct Reader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    pub fn total_size(&self) -> usize {
        self.bytes.len()
    }

    pub fn size_left(&self) -> usize {
        self.bytes.len() - self.offset
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], ReaderError> {
        if self.size_left() < len {
            return Err(ReaderError::InvalidSize);
        }
        let slice = &self.bytes[self.offset..self.offset + len];
        self.offset += len;
        Ok(slice)
    }

    pub fn read_u8(&mut self) -> Result<u8, ReaderError> {
        Ok(self.take(1)?[0])
    }

    pub fn read_bool(&mut self) -> Result<bool, ReaderError> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            _ => Err(ReaderError::InvalidValue),
        }
    }

    pub fn read_u16(&mut self) -> Result<u16, ReaderError> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes(b.try_into().unwrap()))
    }

    pub fn read_u32(&mut self) -> Result<u32, ReaderError> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes(b.try_into().unwrap()))
    }

    pub fn read_u64(&mut self) -> Result<u64, ReaderError> {
        let b = self.take(8)?;
        Ok(u64::from_be_bytes(b.try_into().unwrap()))
    }

    pub fn read_u128(&mut self) -> Result<u128, ReaderError> {
        let b = self.take(16)?;
        Ok(u128::from_be_bytes(b.try_into().unwrap()))
    }

    pub fn read_bytes_ref(&mut self, len: usize) -> Result<&'a [u8], ReaderError> {
        self.take(len)
    }

    pub fn read_bytes<const N: usize>(&mut self, len: usize) -> Result<[u8; N], ReaderError> {
        if len != N {
            return Err(ReaderError::InvalidSize);
        }
        let slice = self.take(len)?;
        slice.try_into().map_err(|_| ReaderError::InvalidSize)
    }

    pub fn read_bytes_32(&mut self) -> Result<[u8; HASH_SIZE], ReaderError> {
        let slice = self.take(HASH_SIZE)?;
        slice.try_into().map_err(|_| ReaderError::InvalidSize)
    }

    pub fn read_hash(&mut self) -> Result<Hash, ReaderError> {
        Hash::read(self)
    }

    pub fn read_vec_u8(&mut self, len: usize) -> Result<Vec<u8>, ReaderError> {
        if len > MAX_BYTES_SIZE {
            return Err(ReaderError::ExceedsMaxBytesSize);
        }
        Ok(self.take(len)?.to_vec())
    }

    pub fn read_string(&mut self) -> Result<String, ReaderError> {
        let len = self.read_u16()? as usize;
        self.read_string_with_size(len)
    }

    pub fn read_string_with_size(&mut self, len: usize) -> Result<String, ReaderError> {
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| ReaderError::InvalidValue)
    }
}

pub struct Writer {
    bytes: Vec<u8>,
}

impl Default for Writer {
    fn default() -> Self {
        Self::new()
    }
}

impl Writer {
    pub fn new() -> Self {
        Self { bytes: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(capacity),
        }
    }

    pub fn bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn write_u8(&mut self, value: u8) {
        self.bytes.push(value);
    }

    pub fn write_bool(&mut self, value: bool) {
        self.write_u8(value as u8);
    }

    pub fn write_u16(&mut self, value: u16) {
        self.bytes.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_u32(&mut self, value: u32) {
        self.bytes.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_u64(&mut self, value: u64) {
        self.bytes.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_u128(&mut self, value: u128) {
        self.bytes.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.bytes.extend_from_slice(bytes);
    }

    pub fn write_hash(&mut self, hash: &Hash) {
        self.bytes.extend_from_slice(hash.as_bytes());
    }

    pub fn write_string(&mut self, value: &str) {
        self.write_u16(value.len() as u16);
        self.write_bytes(value.as_bytes());
    }
}

/// Implemented by every type that travels over the wire: modifier ids,
/// type tags, and the message bodies built from them in the `sync`
/// crate's `codec` module.
pub trait Serializer: Sized {
    fn read(reader: &mut Reader) -> Result<Self, ReaderError>;
    fn write(&self, writer: &mut Writer);
    fn size(&self) -> usize;

    fn to_bytes(&self) -> Vec<u8> {
        let mut writer = Writer::with_capacity(self.size());
        self.write(&mut writer);
        writer.bytes()
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, ReaderError> {
        let mut reader = Reader::new(bytes);
        Self::read(&mut reader)
    }
}

impl Serializer for u8 {
    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        reader.read_u8()
    }
    fn write(&self, writer: &mut Writer) {
        writer.write_u8(*self);
    }
    fn size(&self) -> usize {
        1
    }
}

impl Serializer for u16 {
    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        reader.read_u16()
    }
    fn write(&self, writer: &mut Writer) {
        writer.write_u16(*self);
    }
    fn size(&self) -> usize {
        2
    }
}

impl Serializer for u32 {
    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        reader.read_u32()
    }
    fn write(&self, writer: &mut Writer) {
        writer.write_u32(*self);
    }
    fn size(&self) -> usize {
        4
    }
}

impl Serializer for u64 {
    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        reader.read_u64()
    }
    fn write(&self, writer: &mut Writer) {
        writer.write_u64(*self);
    }
    fn size(&self) -> usize {
        8
    }
}

impl Serializer for bool {
    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        reader.read_bool()
    }
    fn write(&self, writer: &mut Writer) {
        writer.write_bool(*self);
    }
    fn size(&self) -> usize {
        1
    }
}

impl<T: Serializer> Serializer for Option<T> {
    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        if reader.read_bool()? {
            Ok(Some(T::read(reader)?))
        } else {
            Ok(None)
        }
    }

    fn write(&self, writer: &mut Writer) {
        match self {
            Some(value) => {
                writer.write_bool(true);
                value.write(writer);
            }
            None => writer.write_bool(false),
        }
    }

    fn size(&self) -> usize {
        1 + self.as_ref().map(Serializer::size).unwrap_or(0)
    }
}

/// Length-prefixed (u32 count) homogeneous list, used by the `Inv`/
/// `Request` codecs for their id lists (spec.md §4.5).
impl<T: Serializer> Serializer for Vec<T> {
    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        let len = reader.read_u32()? as usize;
        if len > MAX_ARRAY_SIZE {
            return Err(ReaderError::ExceedsMaxArraySize);
        }
        let mut items = Vec::with_capacity(len.min(4096));
        for _ in 0..len {
            items.push(T::read(reader)?);
        }
        Ok(items)
    }

    fn write(&self, writer: &mut Writer) {
        writer.write_u32(self.len() as u32);
        for item in self {
            item.write(writer);
        }
    }

    fn size(&self) -> usize {
        4 + self.iter().map(Serializer::size).sum::<usize>()
    }
}
