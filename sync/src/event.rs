// Inbound event variants (spec.md §4.4 A/B + §5), grounded in the
// "Actor -> single-task event loop" redesign note (spec.md §9): peer
// messages and view-holder/peer-manager notifications become
// constructors of one typed enum instead of separate actor mailboxes,
// preserving the "one event at a time" ordering guarantee without an
// actor framework.

use std::sync::Arc;

use crate::{
    modifier::{ModifierBox, ModifierId, ModifierTypeId, SyncInfo},
    peer::PeerHandle,
    view::{HistoryReader, MempoolReader},
};

pub enum SyncEvent {
    // --- A. peer messages ---
    PeerSyncInfo {
        peer: PeerHandle,
        sync_info: SyncInfo,
    },
    PeerInv {
        peer: PeerHandle,
        type_id: ModifierTypeId,
        ids: Vec<ModifierId>,
    },
    PeerRequest {
        peer: PeerHandle,
        type_id: ModifierTypeId,
        ids: Vec<ModifierId>,
    },
    PeerModifiers {
        peer: PeerHandle,
        type_id: ModifierTypeId,
        modifiers: Vec<(ModifierId, Vec<u8>)>,
    },

    // --- B. view-holder / peer-manager events ---
    SuccessfulTransaction(ModifierBox),
    FailedTransaction(ModifierId),
    SyntacticallySuccessfulModifier(ModifierBox),
    SyntacticallyFailedModification(ModifierId),
    SemanticallySuccessfulModifier(ModifierBox),
    SemanticallyFailedModification(ModifierId),
    ChangedHistory(Arc<dyn HistoryReader>),
    ChangedMempool(Arc<dyn MempoolReader>),
    HandshakedPeer(PeerHandle),
    DisconnectedPeer(PeerHandle),
    DownloadRequest {
        type_id: ModifierTypeId,
        id: ModifierId,
    },

    // --- scheduler-delivered ticks/timers ---
    SendLocalSyncInfo,
    CheckDelivery {
        peer: Option<PeerHandle>,
        type_id: ModifierTypeId,
        id: ModifierId,
    },
}

impl std::fmt::Debug for SyncEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncEvent::PeerSyncInfo { peer, .. } => write!(f, "PeerSyncInfo({peer})"),
            SyncEvent::PeerInv { peer, ids, .. } => write!(f, "PeerInv({peer}, {} ids)", ids.len()),
            SyncEvent::PeerRequest { peer, ids, .. } => {
                write!(f, "PeerRequest({peer}, {} ids)", ids.len())
            }
            SyncEvent::PeerModifiers {
                peer, modifiers, ..
            } => write!(f, "PeerModifiers({peer}, {} items)", modifiers.len()),
            SyncEvent::SuccessfulTransaction(_) => write!(f, "SuccessfulTransaction"),
            SyncEvent::FailedTransaction(id) => write!(f, "FailedTransaction({id})"),
            SyncEvent::SyntacticallySuccessfulModifier(_) => {
                write!(f, "SyntacticallySuccessfulModifier")
            }
            SyncEvent::SyntacticallyFailedModification(id) => {
                write!(f, "SyntacticallyFailedModification({id})")
            }
            SyncEvent::SemanticallySuccessfulModifier(_) => {
                write!(f, "SemanticallySuccessfulModifier")
            }
            SyncEvent::SemanticallyFailedModification(id) => {
                write!(f, "SemanticallyFailedModification({id})")
            }
            SyncEvent::ChangedHistory(_) => write!(f, "ChangedHistory"),
            SyncEvent::ChangedMempool(_) => write!(f, "ChangedMempool"),
            SyncEvent::HandshakedPeer(peer) => write!(f, "HandshakedPeer({peer})"),
            SyncEvent::DisconnectedPeer(peer) => write!(f, "DisconnectedPeer({peer})"),
            SyncEvent::DownloadRequest { id, .. } => write!(f, "DownloadRequest({id})"),
            SyncEvent::SendLocalSyncInfo => write!(f, "SendLocalSyncInfo"),
            SyncEvent::CheckDelivery { id, peer, .. } => {
                write!(f, "CheckDelivery({id}, peer={peer:?})")
            }
        }
    }
}
