// Error taxonomy, grounded in tos_common/src/error.rs's per-concern
// thiserror enums and in the policy split spec.md §7 lays out: each
// kind maps to exactly one handling decision, never to a panic.

use netsync_common::ReaderError;
use thiserror::Error;

use crate::modifier::ModifierId;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("modifier {0} failed to deserialize or its declared id did not match its computed id")]
    MalformedModifier(ModifierId),

    #[error("no codec registered for modifier type {0}")]
    UnknownSerializer(u8),

    #[error("message arrived before the bootstrap reader handles were received")]
    ReaderUnavailable,

    #[error("outbound message exceeded configured limits and was truncated")]
    OversizedMessage,

    #[error(transparent)]
    Wire(#[from] ReaderError),

    #[error("network controller failed to deliver a message: {0}")]
    Network(String),

    #[error("inbound event channel closed")]
    ChannelClosed,
}
