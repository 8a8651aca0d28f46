// Stable peer identity, grounded in tos_daemon's Peer
// (daemon/src/p2p/peer_list/peer.rs): a unique id, the remote address,
// and an outbound channel (`Tx = mpsc::Sender<Bytes>` there) used as
// the "outbound message sink" spec.md §3 requires PeerHandle to carry.
//
// The network transport itself (handshake, framing, connection
// lifecycle) is out of scope (spec.md §1) — `PeerHandle` only captures
// what the synchronizer needs to address a peer and attribute
// deliveries to it.

use std::{
    fmt,
    hash::{Hash as StdHash, Hasher},
    net::SocketAddr,
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
    },
};

use tokio::sync::mpsc;

use crate::codec::Message;

pub type OutboundSender = mpsc::Sender<Message>;

/// Graduated misbehavior weights (not in spec.md; supplements the bare
/// penalize-hook calls with a score a peer manager can threshold on),
/// mirroring `Peer::fail_count`'s `AtomicU8` bookkeeping in the teacher.
pub const MISBEHAVIOR_WEIGHT: u32 = 10;
pub const SPAM_WEIGHT: u32 = 5;
pub const NON_DELIVERY_WEIGHT: u32 = 1;

struct PeerHandleInner {
    id: u64,
    address: SocketAddr,
    outbound: OutboundSender,
    misbehavior_score: AtomicU32,
}

/// Cheaply cloneable handle to a connected peer. Equality and hashing
/// are by `id` alone, matching the teacher's `Peer` (compared by its
/// connection id, not by address, since a peer may reconnect from a
/// different ephemeral port).
#[derive(Clone)]
pub struct PeerHandle(Arc<PeerHandleInner>);

impl PeerHandle {
    pub fn new(id: u64, address: SocketAddr, outbound: OutboundSender) -> Self {
        Self(Arc::new(PeerHandleInner {
            id,
            address,
            outbound,
            misbehavior_score: AtomicU32::new(0),
        }))
    }

    pub fn id(&self) -> u64 {
        self.0.id
    }

    pub fn address(&self) -> SocketAddr {
        self.0.address
    }

    /// Best-effort direct send, bypassing the `NetworkController`
    /// fanout logic. The synchronizer itself always goes through
    /// `NetworkController::send` so that Broadcast/Random targeting
    /// stays in one place; this is exposed for tests and for direct
    /// single-peer replies where that indirection buys nothing.
    pub async fn send(&self, message: Message) -> bool {
        self.0.outbound.send(message).await.is_ok()
    }

    /// Current graduated misbehavior score. Purely observational — the
    /// core never acts on this itself (spec.md §7: "the core never
    /// disconnects on its own"); a peer manager built on `PenalizeHooks`
    /// is free to threshold on it.
    pub fn misbehavior_score(&self) -> u32 {
        self.0.misbehavior_score.load(Ordering::Relaxed)
    }

    pub fn record_misbehavior(&self) {
        self.0
            .misbehavior_score
            .fetch_add(MISBEHAVIOR_WEIGHT, Ordering::Relaxed);
    }

    pub fn record_spam(&self) {
        self.0
            .misbehavior_score
            .fetch_add(SPAM_WEIGHT, Ordering::Relaxed);
    }

    pub fn record_non_delivery(&self) {
        self.0
            .misbehavior_score
            .fetch_add(NON_DELIVERY_WEIGHT, Ordering::Relaxed);
    }
}

impl PartialEq for PeerHandle {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}

impl Eq for PeerHandle {}

impl StdHash for PeerHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.id.hash(state);
    }
}

impl fmt::Debug for PeerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Peer({}@{})", self.0.id, self.0.address)
    }
}

impl fmt::Display for PeerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.0.id, self.0.address)
    }
}
