// Opaque fixed-width identifier, grounded in tos_common::crypto::hash::Hash.
// Used directly as the wire representation of a ModifierId (spec.md §3):
// canonical 32 bytes, ordered by byte value so ModifiersCache::findApplicable
// can pick a deterministic "lowest id" candidate.

use std::{
    convert::TryInto,
    fmt::{self, Display, Formatter},
    str::FromStr,
};

use serde::{Deserialize, Serialize};

use crate::serializer::{Reader, ReaderError, Serializer, Writer};

pub const HASH_SIZE: usize = 32;

#[derive(Eq, PartialEq, PartialOrd, Ord, Clone, Copy, Hash, Default, Serialize, Deserialize)]
pub struct Hash([u8; HASH_SIZE]);

impl Hash {
    pub const fn new(bytes: [u8; HASH_SIZE]) -> Self {
        Hash(bytes)
    }

    pub const fn zero() -> Self {
        Hash([0u8; HASH_SIZE])
    }

    pub fn as_bytes(&self) -> &[u8; HASH_SIZE] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Hash of an arbitrary byte slice, used by tests and by callers
    /// that need to derive a modifier id from its encoded bytes.
    pub fn hash(value: &[u8]) -> Self {
        Hash(blake3::hash(value).into())
    }
}

impl FromStr for Hash {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|_| "invalid hex string")?;
        let bytes: [u8; HASH_SIZE] = bytes.try_into().map_err(|_| "invalid hash length")?;
        Ok(Hash(bytes))
    }
}

impl Display for Hash {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", self.to_hex())
    }
}

impl Serializer for Hash {
    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        let bytes = reader.read_bytes_32()?;
        Ok(Hash(bytes))
    }

    fn write(&self, writer: &mut Writer) {
        writer.write_hash(self);
    }

    fn size(&self) -> usize {
        HASH_SIZE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_roundtrip() {
        let h = Hash::hash(b"modifier");
        let parsed: Hash = h.to_hex().parse().unwrap();
        assert_eq!(h, parsed);
    }

    #[test]
    fn ordering_is_byte_order() {
        let a = Hash::new([0u8; HASH_SIZE]);
        let mut max_bytes = [0u8; HASH_SIZE];
        max_bytes[0] = 1;
        let b = Hash::new(max_bytes);
        assert!(a < b);
    }
}
