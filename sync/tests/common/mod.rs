use std::{
    collections::{HashMap, HashSet},
    net::SocketAddr,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use netsync_common::Hash;
use netsync_core::{
    ApplicableResult, HistoryReader, MempoolReader, Message, Modifier, ModifierBox, ModifierCodec,
    ModifierId, ModifierTypeId, NetworkController, PeerHandle, PeerSyncStatus, PenalizeHooks,
    SendTarget, SyncError, SyncInfo, ViewHolder,
};
use tokio::sync::mpsc;

pub fn hash(seed: &[u8]) -> ModifierId {
    Hash::hash(seed)
}

pub fn make_peer(id: u64) -> PeerHandle {
    let (tx, _rx) = mpsc::channel(16);
    let addr: SocketAddr = "127.0.0.1:9000".parse().unwrap();
    PeerHandle::new(id, addr, tx)
}

#[derive(Debug)]
pub struct TestModifier {
    pub id: ModifierId,
    pub type_id: ModifierTypeId,
}

impl Modifier for TestModifier {
    fn type_id(&self) -> ModifierTypeId {
        self.type_id
    }

    fn computed_id(&self) -> ModifierId {
        self.id
    }
}

/// Decodes a 32-byte payload as the *actual* id the modifier carries,
/// independent of whatever id a `ModifiersMessage` entry was keyed
/// under — lets tests construct an id/content mismatch for the
/// malformed-modifier path.
pub struct TestCodec {
    pub type_id: ModifierTypeId,
}

impl ModifierCodec for TestCodec {
    fn type_id(&self) -> ModifierTypeId {
        self.type_id
    }

    fn decode(&self, bytes: &[u8]) -> Result<ModifierBox, String> {
        if bytes.len() != 32 {
            return Err(format!("expected 32 bytes, got {}", bytes.len()));
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(bytes);
        Ok(Arc::new(TestModifier {
            id: Hash::new(arr),
            type_id: self.type_id,
        }))
    }
}

/// Configurable fake history. `parent_of` maps an id to the single
/// dependency it needs present in `applied` before it's applicable;
/// an id absent from the map is unconditionally applicable.
pub struct FakeHistory {
    pub applied: Mutex<HashSet<ModifierId>>,
    pub parent_of: HashMap<ModifierId, Option<ModifierId>>,
    pub compare_result: PeerSyncStatus,
    pub continuation: Option<Vec<(ModifierTypeId, ModifierId)>>,
}

impl FakeHistory {
    pub fn with_applied(ids: &[ModifierId]) -> Self {
        Self {
            applied: Mutex::new(ids.iter().copied().collect()),
            parent_of: HashMap::new(),
            compare_result: PeerSyncStatus::Unknown,
            continuation: None,
        }
    }
}

impl Default for FakeHistory {
    fn default() -> Self {
        Self::with_applied(&[])
    }
}

impl HistoryReader for FakeHistory {
    fn compare(&self, _sync_info: &SyncInfo) -> PeerSyncStatus {
        self.compare_result
    }

    fn continuation_ids(
        &self,
        _sync_info: &SyncInfo,
        _limit: usize,
    ) -> Option<Vec<(ModifierTypeId, ModifierId)>> {
        self.continuation.clone()
    }

    fn sync_info(&self) -> SyncInfo {
        SyncInfo::new(vec![0xAB])
    }

    fn applicable_try(&self, modifier: &ModifierBox) -> ApplicableResult {
        let id = modifier.computed_id();
        match self.parent_of.get(&id) {
            None | Some(None) => ApplicableResult::Applicable,
            Some(Some(parent)) => {
                if self.applied.lock().unwrap().contains(parent) {
                    ApplicableResult::Applicable
                } else {
                    ApplicableResult::Missing {
                        reason: "parent not yet applied".into(),
                    }
                }
            }
        }
    }

    fn contains(&self, id: &ModifierId) -> bool {
        self.applied.lock().unwrap().contains(id)
    }

    fn modifier_by_id(&self, _id: &ModifierId) -> Option<Vec<u8>> {
        None
    }
}

#[derive(Default)]
pub struct FakeMempool;

impl MempoolReader for FakeMempool {
    fn get_all(&self, _ids: &[ModifierId]) -> Vec<(ModifierId, Vec<u8>)> {
        Vec::new()
    }

    fn contains(&self, _id: &ModifierId) -> bool {
        false
    }
}

#[derive(Default)]
pub struct FakeNetwork {
    pub sent: Mutex<Vec<(Message, SendTarget)>>,
}

#[async_trait]
impl NetworkController for FakeNetwork {
    async fn send(&self, message: Message, target: SendTarget) -> Result<(), SyncError> {
        if let SendTarget::SendToPeer(peer) = &target {
            peer.send(message.clone()).await;
        }
        self.sent.lock().unwrap().push((message, target));
        Ok(())
    }
}

#[derive(Default)]
pub struct FakePenalize {
    pub misbehaving: Mutex<Vec<u64>>,
    pub spamming: Mutex<Vec<u64>>,
    pub non_delivering: Mutex<Vec<u64>>,
}

impl PenalizeHooks for FakePenalize {
    fn penalize_misbehaving(&self, peer_id: u64) {
        self.misbehaving.lock().unwrap().push(peer_id);
    }

    fn penalize_spamming(&self, peer_id: u64) {
        self.spamming.lock().unwrap().push(peer_id);
    }

    fn penalize_non_delivering(&self, peer_id: u64) {
        self.non_delivering.lock().unwrap().push(peer_id);
    }
}

/// Records every call instead of doing anything with it; used where a
/// scenario asserts the view holder must NOT be reached. Also answers
/// the bootstrap `GetNodeViewChanges` request with whatever readers it
/// was built with, defaulting to empty fakes.
pub struct RecordingViewHolder {
    pub locally_generated: Mutex<Vec<ModifierId>>,
    pub changed_cache_calls: Mutex<u32>,
    history: Arc<dyn HistoryReader>,
    mempool: Arc<dyn MempoolReader>,
}

impl Default for RecordingViewHolder {
    fn default() -> Self {
        Self::new(Arc::new(FakeHistory::default()), Arc::new(FakeMempool))
    }
}

impl RecordingViewHolder {
    pub fn new(history: Arc<dyn HistoryReader>, mempool: Arc<dyn MempoolReader>) -> Self {
        Self {
            locally_generated: Mutex::new(Vec::new()),
            changed_cache_calls: Mutex::new(0),
            history,
            mempool,
        }
    }
}

#[async_trait]
impl ViewHolder for RecordingViewHolder {
    async fn get_node_view_changes(&self) -> (Arc<dyn HistoryReader>, Arc<dyn MempoolReader>) {
        (self.history.clone(), self.mempool.clone())
    }

    async fn locally_generated_transaction(&self, tx: ModifierBox) {
        self.locally_generated.lock().unwrap().push(tx.computed_id());
    }

    async fn changed_cache(&self, _cache: Arc<netsync_core::ModifiersCache>) {
        *self.changed_cache_calls.lock().unwrap() += 1;
    }
}

/// Drives cache applicability to completion inline, simulating a view
/// holder that eagerly applies whatever becomes applicable and feeds
/// the resulting `SyntacticallySuccessfulModifier` events back.
///
/// `events` is wired in after construction via `set_events`, since the
/// synchronizer's own event sender only exists once `Synchronizer::new`
/// returns it, and the view holder has to be built before that call.
pub struct ApplyingViewHolder {
    pub history: Arc<FakeHistory>,
    events: Mutex<Option<mpsc::Sender<netsync_core::SyncEvent>>>,
}

impl ApplyingViewHolder {
    pub fn new(history: Arc<FakeHistory>) -> Self {
        Self {
            history,
            events: Mutex::new(None),
        }
    }

    pub fn set_events(&self, events: mpsc::Sender<netsync_core::SyncEvent>) {
        *self.events.lock().unwrap() = Some(events);
    }
}

#[async_trait]
impl ViewHolder for ApplyingViewHolder {
    async fn get_node_view_changes(&self) -> (Arc<dyn HistoryReader>, Arc<dyn MempoolReader>) {
        (self.history.clone(), Arc::new(FakeMempool))
    }

    async fn locally_generated_transaction(&self, _tx: ModifierBox) {}

    async fn changed_cache(&self, cache: Arc<netsync_core::ModifiersCache>) {
        let events = self.events.lock().unwrap().clone().expect("set_events not called");
        while let Some((id, modifier)) = cache.find_applicable(self.history.as_ref()).await {
            self.history.applied.lock().unwrap().insert(id);
            let _ = events
                .send(netsync_core::SyncEvent::SyntacticallySuccessfulModifier(modifier))
                .await;
        }
    }
}
