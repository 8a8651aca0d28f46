use log::warn;
use netsync_common::{Reader, ReaderError, Serializer, Writer};

use crate::{error::SyncError, modifier::{ModifierId, ModifierTypeId}};

/// `(ModifierTypeId, list<ModifierId>)`, size bounded by
/// `maxInvObjects` (spec.md §4.5). `Inv` and `Request` share this
/// exact wire shape and differ only by dispatch code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvMessage {
    pub type_id: ModifierTypeId,
    pub ids: Vec<ModifierId>,
}

impl InvMessage {
    pub fn new(type_id: ModifierTypeId, ids: Vec<ModifierId>) -> Self {
        Self { type_id, ids }
    }

    /// Refuses to emit more than `max_inv_objects` ids: truncates and
    /// logs a warning rather than silently splitting across messages
    /// (spec.md §4.5).
    pub fn new_bounded(type_id: ModifierTypeId, mut ids: Vec<ModifierId>, max_inv_objects: usize) -> Self {
        if ids.len() > max_inv_objects {
            warn!(
                "{}: truncating inv of {} ids down to the configured max of {}",
                SyncError::OversizedMessage,
                ids.len(),
                max_inv_objects
            );
            ids.truncate(max_inv_objects);
        }
        Self { type_id, ids }
    }
}

impl Serializer for InvMessage {
    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        let type_id = reader.read_u8()?;
        let ids = Vec::<ModifierId>::read(reader)?;
        Ok(Self { type_id, ids })
    }

    fn write(&self, writer: &mut Writer) {
        writer.write_u8(self.type_id);
        self.ids.write(writer);
    }

    fn size(&self) -> usize {
        1 + self.ids.size()
    }
}

/// Same wire shape as `InvMessage`, dispatched under a different
/// message code (spec.md §4.5).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestMessage {
    pub type_id: ModifierTypeId,
    pub ids: Vec<ModifierId>,
}

impl RequestMessage {
    pub fn new(type_id: ModifierTypeId, ids: Vec<ModifierId>) -> Self {
        Self { type_id, ids }
    }

    pub fn new_bounded(type_id: ModifierTypeId, mut ids: Vec<ModifierId>, max_inv_objects: usize) -> Self {
        if ids.len() > max_inv_objects {
            warn!(
                "{}: truncating request of {} ids down to the configured max of {}",
                SyncError::OversizedMessage,
                ids.len(),
                max_inv_objects
            );
            ids.truncate(max_inv_objects);
        }
        Self { type_id, ids }
    }
}

impl Serializer for RequestMessage {
    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        let type_id = reader.read_u8()?;
        let ids = Vec::<ModifierId>::read(reader)?;
        Ok(Self { type_id, ids })
    }

    fn write(&self, writer: &mut Writer) {
        writer.write_u8(self.type_id);
        self.ids.write(writer);
    }

    fn size(&self) -> usize {
        1 + self.ids.size()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netsync_common::Hash;

    #[test]
    fn roundtrip() {
        let original = InvMessage::new(7, vec![Hash::hash(b"x"), Hash::hash(b"y")]);
        let decoded = InvMessage::from_bytes(&original.to_bytes()).unwrap();
        assert_eq!(original, decoded);
    }

    #[test]
    fn truncates_and_warns_when_over_budget() {
        let ids: Vec<ModifierId> = (0..10u8).map(|b| Hash::new([b; 32])).collect();
        let bounded = InvMessage::new_bounded(1, ids, 3);
        assert_eq!(bounded.ids.len(), 3);
    }
}
