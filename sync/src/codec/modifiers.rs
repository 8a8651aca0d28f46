use log::warn;
use netsync_common::{serializer::MAX_ARRAY_SIZE, Reader, ReaderError, Serializer, Writer};

use crate::{
    error::SyncError,
    modifier::{ModifierId, ModifierTypeId},
};

/// `(ModifierTypeId, map<ModifierId, bytes>)`, wire-interleaved as
/// `<id><len><bytes>` per entry, total packet bounded by
/// `maxPacketSize` (spec.md §4.5/§6).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModifiersMessage {
    pub type_id: ModifierTypeId,
    pub modifiers: Vec<(ModifierId, Vec<u8>)>,
}

impl ModifiersMessage {
    pub fn new(type_id: ModifierTypeId, modifiers: Vec<(ModifierId, Vec<u8>)>) -> Self {
        Self { type_id, modifiers }
    }

    /// Drops trailing entries until the encoded size fits
    /// `max_packet_size`, logging a warning on truncation rather than
    /// silently shipping a partial entry (spec.md §4.5/§7
    /// OversizedMessage).
    pub fn new_bounded(
        type_id: ModifierTypeId,
        modifiers: Vec<(ModifierId, Vec<u8>)>,
        max_packet_size: usize,
    ) -> Self {
        let mut kept = Vec::with_capacity(modifiers.len());
        let mut size = 1 + 4; // type_id + vec length prefix
        let mut dropped = 0usize;
        for (id, bytes) in modifiers {
            let entry_size = 32 + 4 + bytes.len();
            if size + entry_size > max_packet_size {
                dropped += 1;
                continue;
            }
            size += entry_size;
            kept.push((id, bytes));
        }
        if dropped > 0 {
            warn!(
                "{}: dropped {} modifier(s) to stay under the {}-byte packet limit",
                SyncError::OversizedMessage,
                dropped,
                max_packet_size
            );
        }
        Self {
            type_id,
            modifiers: kept,
        }
    }
}

impl Serializer for ModifiersMessage {
    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        let type_id = reader.read_u8()?;
        let len = reader.read_u32()? as usize;
        if len > MAX_ARRAY_SIZE {
            return Err(ReaderError::ExceedsMaxArraySize);
        }
        let mut modifiers = Vec::with_capacity(len.min(4096));
        for _ in 0..len {
            let id = ModifierId::read(reader)?;
            let body_len = reader.read_u32()? as usize;
            let bytes = reader.read_vec_u8(body_len)?;
            modifiers.push((id, bytes));
        }
        Ok(Self { type_id, modifiers })
    }

    fn write(&self, writer: &mut Writer) {
        writer.write_u8(self.type_id);
        writer.write_u32(self.modifiers.len() as u32);
        for (id, bytes) in &self.modifiers {
            id.write(writer);
            writer.write_u32(bytes.len() as u32);
            writer.write_bytes(bytes);
        }
    }

    fn size(&self) -> usize {
        1 + 4
            + self
                .modifiers
                .iter()
                .map(|(id, bytes)| id.size() + 4 + bytes.len())
                .sum::<usize>()
    }
}
