// Network controller contract (spec.md §6). Transport, framing,
// handshake and the peer directory all live outside this crate; the
// synchronizer only needs somewhere to hand outbound messages with a
// fanout target, mirroring `ServiceControl`/`SendToNetwork`-shaped
// controllers in the pack (e.g. other_examples' ckb `sync/protocol.rs`
// uses a context with a similar broadcast/targeted split).

use async_trait::async_trait;

use crate::{codec::Message, error::SyncError, peer::PeerHandle};

#[derive(Debug, Clone)]
pub enum SendTarget {
    /// All connected peers (used for inv broadcasts, spec.md §4.4).
    Broadcast,
    SendToPeer(PeerHandle),
    SendToPeers(Vec<PeerHandle>),
    /// Used only for untargeted re-requests (spec.md §4.4
    /// `requestDownload`); peer selection is the network layer's call.
    SendToRandom,
}

#[async_trait]
pub trait NetworkController: Send + Sync {
    async fn send(&self, message: Message, target: SendTarget) -> Result<(), SyncError>;
}
