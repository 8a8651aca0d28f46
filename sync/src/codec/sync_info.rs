use netsync_common::{Reader, ReaderError, Serializer, Writer};

use crate::modifier::SyncInfo;

/// Consensus-opaque summary of the local chain tip(s) (spec.md §3/§6):
/// the core only needs to move the bytes around, not interpret them.
/// The message code is fixed here (`MSG_CODE_SYNC_INFO`); a consensus
/// plug-in that needs a different code is free to wrap this payload in
/// its own envelope before handing it to the network controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncInfoMessage {
    pub payload: SyncInfo,
}

impl SyncInfoMessage {
    pub fn new(payload: SyncInfo) -> Self {
        Self { payload }
    }
}

impl Serializer for SyncInfoMessage {
    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        let len = reader.read_u32()? as usize;
        let bytes = reader.read_vec_u8(len)?;
        Ok(Self {
            payload: SyncInfo::new(bytes),
        })
    }

    fn write(&self, writer: &mut Writer) {
        writer.write_u32(self.payload.0.len() as u32);
        writer.write_bytes(&self.payload.0);
    }

    fn size(&self) -> usize {
        4 + self.payload.0.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let original = SyncInfoMessage::new(SyncInfo::new(vec![9, 9, 9]));
        let decoded = SyncInfoMessage::from_bytes(&original.to_bytes()).unwrap();
        assert_eq!(original, decoded);
    }
}
