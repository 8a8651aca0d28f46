// External collaborator contracts (spec.md §6). The node view holder
// (history/mempool storage, application, persistence) and the
// network controller (transport, framing, connection handshake) are
// deliberately out of scope (spec.md §1) — these traits are the seams
// the synchronizer drives them through, grounded in how
// `P2pServer<S: Storage>` in the teacher is generic over a `Storage`
// trait rather than owning storage itself.

use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    cache::ModifiersCache,
    modifier::{ModifierBox, ModifierId, ModifierTypeId, PeerSyncStatus, SyncInfo},
};

/// Outcome of asking history whether a modifier can be applied right
/// now. `Permanent` is the only case that marks a modifier Invalid
/// (spec.md §4.4 `processExpectedModifier`); `Missing` means
/// dependencies aren't satisfied yet and the modifier belongs in the
/// cache, not a rejection.
#[derive(Debug, Clone)]
pub enum ApplicableResult {
    Applicable,
    Missing { reason: String },
    Permanent { reason: String },
}

/// Read-only snapshot of local chain history. Replaced wholesale on a
/// `ChangedHistory` event (spec.md §5: "reader-handle replacement is
/// synchronous with the event") rather than mutated in place.
pub trait HistoryReader: Send + Sync {
    fn compare(&self, sync_info: &SyncInfo) -> PeerSyncStatus;

    /// Ids we would send a `Younger` peer to catch it up, capped at
    /// `limit`. `None` means the comparison doesn't support computing
    /// a continuation (e.g. `Nonsense`).
    fn continuation_ids(
        &self,
        sync_info: &SyncInfo,
        limit: usize,
    ) -> Option<Vec<(ModifierTypeId, ModifierId)>>;

    fn sync_info(&self) -> SyncInfo;

    fn applicable_try(&self, modifier: &ModifierBox) -> ApplicableResult;

    fn contains(&self, id: &ModifierId) -> bool;

    fn modifier_by_id(&self, id: &ModifierId) -> Option<Vec<u8>>;
}

/// Read-only snapshot of the mempool.
pub trait MempoolReader: Send + Sync {
    fn get_all(&self, ids: &[ModifierId]) -> Vec<(ModifierId, Vec<u8>)>;
    fn contains(&self, id: &ModifierId) -> bool;
}

/// Decodes the raw bytes carried by a `Modifiers` message for one
/// modifier type into a `ModifierBox` (spec.md §4.4: "deserialize
/// using the type-indexed codec table").
pub trait ModifierCodec: Send + Sync {
    fn type_id(&self) -> ModifierTypeId;
    fn decode(&self, bytes: &[u8]) -> Result<ModifierBox, String>;
}

/// Outbound calls the synchronizer makes into the view holder
/// (spec.md §6).
#[async_trait]
pub trait ViewHolder: Send + Sync {
    /// The bootstrap request the synchronizer issues once at startup to
    /// receive its initial reader handles (spec.md §6
    /// `GetNodeViewChanges(history, state, vault, mempool)`). The `state`
    /// and `vault` components of that request are consensus/wallet
    /// concerns this crate never touches (spec.md §1 Non-goals); only the
    /// two readers the synchronizer actually drives are requested here.
    /// Until this resolves, any handler that needs a reader reports
    /// `SyncError::ReaderUnavailable` (spec.md §7) instead of touching a
    /// reader that was never set.
    async fn get_node_view_changes(&self) -> (Arc<dyn HistoryReader>, Arc<dyn MempoolReader>);

    async fn locally_generated_transaction(&self, tx: ModifierBox);

    /// Handed a read-only reference to the cache after its membership
    /// changed; the view holder is expected to call
    /// `ModifiersCache::find_applicable` in a loop and apply whatever
    /// it finds, which will eventually surface back as
    /// `SyntacticallySuccessfulModifier`/`SemanticallySuccessfulModifier`
    /// events.
    async fn changed_cache(&self, cache: Arc<ModifiersCache>);
}

/// Pluggable misbehavior policy (spec.md §7): the core never
/// disconnects on its own, it only records events through these
/// hooks and lets the peer manager apply graduated penalties.
pub trait PenalizeHooks: Send + Sync {
    fn penalize_misbehaving(&self, peer_id: u64);
    fn penalize_spamming(&self, peer_id: u64);
    fn penalize_non_delivering(&self, peer_id: u64);
}
