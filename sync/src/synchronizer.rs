// The orchestrator (spec.md §4.4): consumes peer messages and
// view-holder events from one bounded inbound queue and drives the
// trackers/cache, emitting outbound messages. Grounded in the
// `tokio::select!` + owned-state event loop shape of
// tos_daemon/src/p2p/chain_sync/mod.rs, simplified to the "single
// logical task, no internal locking" model spec.md §5 calls for:
// everything but `ModifiersCache` (intentionally shared with the view
// holder) lives as a plain field mutated through `&mut self`.

use std::{collections::HashMap, sync::Arc};

use log::{error, warn};
use metrics::counter;
use tokio::sync::mpsc;

use crate::{
    cache::{self, ModifiersCache},
    codec::{InvMessage, Message, ModifiersMessage, RequestMessage, SyncInfoMessage},
    config::SynchronizerConfig,
    error::SyncError,
    event::SyncEvent,
    modifier::{is_transaction_type, ModifierId, ModifierStatus, ModifierTypeId, PeerSyncStatus},
    network::{NetworkController, SendTarget},
    peer::PeerHandle,
    tracker::{DeliveryTracker, SyncTracker},
    view::{ApplicableResult, HistoryReader, MempoolReader, ModifierCodec, PenalizeHooks, ViewHolder},
};

pub struct Synchronizer {
    config: SynchronizerConfig,
    delivery: DeliveryTracker,
    sync_tracker: SyncTracker,
    cache: Arc<ModifiersCache>,
    history: Option<Arc<dyn HistoryReader>>,
    mempool: Option<Arc<dyn MempoolReader>>,
    network: Arc<dyn NetworkController>,
    view_holder: Arc<dyn ViewHolder>,
    penalize: Arc<dyn PenalizeHooks>,
    codecs: HashMap<ModifierTypeId, Arc<dyn ModifierCodec>>,
    events_tx: mpsc::Sender<SyncEvent>,
    events_rx: Option<mpsc::Receiver<SyncEvent>>,
}

impl Synchronizer {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: SynchronizerConfig,
        network: Arc<dyn NetworkController>,
        view_holder: Arc<dyn ViewHolder>,
        penalize: Arc<dyn PenalizeHooks>,
        codecs: Vec<Arc<dyn ModifierCodec>>,
    ) -> (Self, mpsc::Sender<SyncEvent>) {
        let (events_tx, events_rx) = mpsc::channel(config.event_queue_capacity);
        let delivery = DeliveryTracker::new(
            config.delivery_timeout(),
            config.max_delivery_checks,
            events_tx.clone(),
        );
        let sync_tracker = SyncTracker::new(config.sync_interval(), config.sync_status_refresh());
        let cache = cache::shared(config.max_modifiers_cache_size);
        let codecs = codecs.into_iter().map(|c| (c.type_id(), c)).collect();

        let sender = events_tx.clone();
        (
            Self {
                config,
                delivery,
                sync_tracker,
                cache,
                history: None,
                mempool: None,
                network,
                view_holder,
                penalize,
                codecs,
                events_tx,
                events_rx: Some(events_rx),
            },
            sender,
        )
    }

    pub fn event_sender(&self) -> mpsc::Sender<SyncEvent> {
        self.events_tx.clone()
    }

    /// Arms the periodic `SendLocalSyncInfo` tick (spec.md §4.2
    /// `scheduleSendSyncInfo`). Call once after construction; dropping
    /// the returned handle (or aborting it) stops the ticker.
    pub fn spawn_periodic_sync_broadcast(&self) -> tokio::task::JoinHandle<()> {
        SyncTracker::schedule_send_sync_info(self.config.sync_interval(), self.events_tx.clone())
    }

    /// Issues the `GetNodeViewChanges` bootstrap request (spec.md §6) and
    /// installs the returned reader handles. Idempotent: a later call just
    /// re-fetches and replaces both handles, same as a `ChangedHistory`/
    /// `ChangedMempool` event would. `run()` calls this once before
    /// entering the event loop; a test harness driving `handle_event`
    /// directly needs to call it explicitly.
    pub async fn bootstrap(&mut self) {
        let (history, mempool) = self.view_holder.get_node_view_changes().await;
        self.history = Some(history);
        self.mempool = Some(mempool);
    }

    /// Runs the event loop to completion (until every sender half of
    /// the inbound channel is dropped). Consumes `self`: this is meant
    /// to be the synchronizer's one owning task.
    pub async fn run(mut self) -> Result<(), SyncError> {
        self.bootstrap().await;
        let mut events_rx = self.events_rx.take().ok_or(SyncError::ChannelClosed)?;
        while let Some(event) = events_rx.recv().await {
            if let Err(err) = self.handle_event(event).await {
                error!("error handling sync event: {err}");
            }
        }
        Ok(())
    }

    pub async fn handle_event(&mut self, event: SyncEvent) -> Result<(), SyncError> {
        match event {
            SyncEvent::PeerSyncInfo { peer, sync_info } => self.on_peer_sync_info(peer, sync_info).await,
            SyncEvent::PeerInv { peer, type_id, ids } => self.on_peer_inv(peer, type_id, ids).await,
            SyncEvent::PeerRequest { peer, type_id, ids } => {
                self.on_peer_request(peer, type_id, ids).await
            }
            SyncEvent::PeerModifiers {
                peer,
                type_id,
                modifiers,
            } => self.on_peer_modifiers(peer, type_id, modifiers).await,

            SyncEvent::SuccessfulTransaction(tx) => {
                let id = tx.computed_id();
                self.delivery.to_applied(&id);
                self.broadcast_inv(tx.type_id(), id).await?;
                Ok(())
            }
            SyncEvent::FailedTransaction(id) => {
                self.delivery.to_unknown(&id);
                Ok(())
            }
            SyncEvent::SyntacticallySuccessfulModifier(modifier) => {
                let id = modifier.computed_id();
                self.delivery.to_applied(&id);
                self.cache.remove(&id).await;
                Ok(())
            }
            SyncEvent::SyntacticallyFailedModification(id) => {
                self.delivery.to_unknown(&id);
                Ok(())
            }
            SyncEvent::SemanticallySuccessfulModifier(modifier) => {
                let id = modifier.computed_id();
                self.broadcast_inv(modifier.type_id(), id).await
            }
            SyncEvent::SemanticallyFailedModification(_id) => {
                // policy hook for a future penalty (spec.md §9 open question); no state change today.
                Ok(())
            }
            SyncEvent::ChangedHistory(reader) => {
                self.history = Some(reader);
                Ok(())
            }
            SyncEvent::ChangedMempool(reader) => {
                self.mempool = Some(reader);
                Ok(())
            }
            SyncEvent::HandshakedPeer(peer) => {
                self.sync_tracker.update_status(&peer, PeerSyncStatus::Unknown);
                Ok(())
            }
            SyncEvent::DisconnectedPeer(peer) => {
                self.sync_tracker.clear_status(&peer);
                self.delivery.clear_expected_peer(peer.id());
                Ok(())
            }
            SyncEvent::DownloadRequest { type_id, id } => {
                if self.combined_status(type_id, &id).await? == ModifierStatus::Unknown {
                    self.request_download(type_id, vec![id]).await?;
                }
                Ok(())
            }
            SyncEvent::SendLocalSyncInfo => self.on_send_local_sync_info().await,
            SyncEvent::CheckDelivery { peer, type_id, id } => {
                self.on_check_delivery(peer, type_id, id).await
            }
        }
    }

    /// The bootstrap-delivered history handle, or `ReaderUnavailable`
    /// (spec.md §7) if `bootstrap()` hasn't resolved yet.
    fn history(&self) -> Result<&Arc<dyn HistoryReader>, SyncError> {
        self.history.as_ref().ok_or(SyncError::ReaderUnavailable)
    }

    /// The bootstrap-delivered mempool handle, or `ReaderUnavailable`
    /// (spec.md §7) if `bootstrap()` hasn't resolved yet.
    fn mempool(&self) -> Result<&Arc<dyn MempoolReader>, SyncError> {
        self.mempool.as_ref().ok_or(SyncError::ReaderUnavailable)
    }

    fn is_applied(&self, type_id: ModifierTypeId, id: &ModifierId) -> Result<bool, SyncError> {
        if is_transaction_type(type_id) {
            Ok(self.mempool()?.contains(id))
        } else {
            Ok(self.history()?.contains(id))
        }
    }

    async fn combined_status(
        &self,
        type_id: ModifierTypeId,
        id: &ModifierId,
    ) -> Result<ModifierStatus, SyncError> {
        if self.cache.contains(id).await {
            return Ok(ModifierStatus::Held);
        }
        Ok(self.delivery.status(id, self.is_applied(type_id, id)?))
    }

    /// Public view of a modifier id's current lifecycle state (spec.md
    /// §3), combining cache membership with the delivery tracker and
    /// the appropriate reader. Useful for introspection (metrics, RPC)
    /// and for driving the synchronizer from a test harness. Reports
    /// `Unknown` rather than propagating `ReaderUnavailable` — this is an
    /// introspection helper, not a protocol handler, and "can't tell yet"
    /// is indistinguishable from "not seen" to a caller just checking
    /// status.
    pub async fn status_of(&self, type_id: ModifierTypeId, id: &ModifierId) -> ModifierStatus {
        self.combined_status(type_id, id)
            .await
            .unwrap_or(ModifierStatus::Unknown)
    }

    /// Processes whatever events the synchronizer has queued onto its
    /// own inbound channel (e.g. `SyntacticallySuccessfulModifier` sent
    /// by a `ViewHolder::changed_cache` callback), up to `max` events.
    /// `run()` makes this unnecessary in production, where the event
    /// loop drains the channel continuously; a test harness that calls
    /// `handle_event` directly instead of spawning `run()` needs this
    /// to observe the second-order effects of its own handlers.
    pub async fn pump_pending_self_events(&mut self, max: usize) {
        let mut events_rx = match self.events_rx.take() {
            Some(rx) => rx,
            None => return,
        };
        for _ in 0..max {
            match events_rx.try_recv() {
                Ok(event) => {
                    if let Err(err) = self.handle_event(event).await {
                        error!("error handling self-queued sync event: {err}");
                    }
                }
                Err(_) => break,
            }
        }
        self.events_rx = Some(events_rx);
    }

    async fn on_peer_sync_info(&mut self, peer: PeerHandle, sync_info: crate::modifier::SyncInfo) -> Result<(), SyncError> {
        let history = self.history()?.clone();
        let status = history.compare(&sync_info);
        self.sync_tracker.update_status(&peer, status);

        match status {
            PeerSyncStatus::Nonsense => {
                warn!("peer {peer} returned a nonsense sync comparison");
            }
            PeerSyncStatus::Younger => {
                match history.continuation_ids(&sync_info, self.config.max_inv_objects) {
                    Some(continuation) if !continuation.is_empty() => {
                        let mut by_type: HashMap<ModifierTypeId, Vec<ModifierId>> = HashMap::new();
                        for (type_id, id) in continuation {
                            by_type.entry(type_id).or_default().push(id);
                        }
                        for (type_id, ids) in by_type {
                            let message = Message::Inv(InvMessage::new_bounded(
                                type_id,
                                ids,
                                self.config.max_inv_objects,
                            ));
                            self.network
                                .send(message, SendTarget::SendToPeer(peer.clone()))
                                .await?;
                        }
                    }
                    _ => warn!(
                        "peer {peer} compared Younger but history offered no continuation"
                    ),
                }
            }
            _ => {}
        }
        Ok(())
    }

    async fn on_peer_inv(
        &mut self,
        peer: PeerHandle,
        type_id: ModifierTypeId,
        ids: Vec<ModifierId>,
    ) -> Result<(), SyncError> {
        let mut unknown = Vec::with_capacity(ids.len());
        for id in ids {
            if self.combined_status(type_id, &id).await? == ModifierStatus::Unknown {
                unknown.push(id);
            }
        }
        if unknown.is_empty() {
            return Ok(());
        }
        let accepted = self.delivery.expect(&peer, type_id, &unknown);
        if accepted.is_empty() {
            return Ok(());
        }
        let message = Message::Request(RequestMessage::new_bounded(
            type_id,
            accepted,
            self.config.max_inv_objects,
        ));
        self.network
            .send(message, SendTarget::SendToPeer(peer))
            .await
    }

    async fn on_peer_request(
        &mut self,
        peer: PeerHandle,
        type_id: ModifierTypeId,
        ids: Vec<ModifierId>,
    ) -> Result<(), SyncError> {
        let found = if is_transaction_type(type_id) {
            self.mempool()?.get_all(&ids)
        } else {
            let history = self.history()?.clone();
            ids.into_iter()
                .filter_map(|id| history.modifier_by_id(&id).map(|bytes| (id, bytes)))
                .collect()
        };

        if found.is_empty() {
            return Ok(());
        }

        let message = Message::Modifiers(ModifiersMessage::new_bounded(
            type_id,
            found,
            self.config.max_packet_size,
        ));
        self.network
            .send(message, SendTarget::SendToPeer(peer))
            .await
    }

    async fn on_peer_modifiers(
        &mut self,
        peer: PeerHandle,
        type_id: ModifierTypeId,
        modifiers: Vec<(ModifierId, Vec<u8>)>,
    ) -> Result<(), SyncError> {
        let mut accepted = Vec::with_capacity(modifiers.len());
        let mut spam = 0u64;
        for (id, bytes) in modifiers {
            if self.delivery.on_receive(&id, &peer) {
                accepted.push((id, bytes));
            } else {
                spam += 1;
            }
        }
        if spam > 0 {
            counter!("netsync_modifiers_spam_total").increment(spam);
            peer.record_spam();
            self.penalize.penalize_spamming(peer.id());
        }
        if accepted.is_empty() {
            return Ok(());
        }

        let Some(codec) = self.codecs.get(&type_id).cloned() else {
            let err = SyncError::UnknownSerializer(type_id);
            error!("{err}; discarding {} payload(s)", accepted.len());
            return Ok(());
        };

        for (id, bytes) in accepted {
            match codec.decode(&bytes) {
                Err(reason) => {
                    let err = SyncError::MalformedModifier(id);
                    warn!("{err} from {peer}: {reason}");
                    counter!("netsync_modifiers_malformed_total").increment(1);
                    peer.record_misbehavior();
                    self.penalize.penalize_misbehaving(peer.id());
                    self.delivery.to_invalid(&id, type_id);
                }
                Ok(modifier) if modifier.computed_id() != id => {
                    let err = SyncError::MalformedModifier(id);
                    warn!("{err} from {peer}");
                    counter!("netsync_modifiers_malformed_total").increment(1);
                    peer.record_misbehavior();
                    self.penalize.penalize_misbehaving(peer.id());
                    self.delivery.to_invalid(&id, type_id);
                }
                Ok(modifier) if is_transaction_type(type_id) => {
                    self.view_holder.locally_generated_transaction(modifier).await;
                }
                Ok(modifier) => {
                    if let Err(err) = self.process_expected_modifier(&peer, id, modifier).await {
                        warn!("{err}; skipping modifier from {peer}");
                    }
                }
            }
        }

        if !is_transaction_type(type_id) {
            let report = self.cache.clean_overfull().await;
            if !report.is_empty() {
                counter!("netsync_cache_evictions_total").increment(report.len() as u64);
                for (evicted_type, count) in report.counts_by_type() {
                    counter!("netsync_cache_evictions_by_type_total", "type" => evicted_type.to_string())
                        .increment(count as u64);
                }
                for (id, _) in report {
                    self.delivery.to_unknown(&id);
                }
            }
            self.view_holder.changed_cache(self.cache.clone()).await;
        }

        Ok(())
    }

    async fn process_expected_modifier(
        &mut self,
        peer: &PeerHandle,
        id: ModifierId,
        modifier: crate::modifier::ModifierBox,
    ) -> Result<(), SyncError> {
        let history = self.history()?.clone();
        if self.cache.contains(&id).await || history.contains(&id) {
            error!("received {id} which is already cached or applied; ignoring");
            return Ok(());
        }

        match history.applicable_try(&modifier) {
            ApplicableResult::Permanent { reason } => {
                warn!("modifier {id} is permanently invalid: {reason}");
                self.delivery.to_invalid(&id, modifier.type_id());
                peer.record_misbehavior();
                self.penalize.penalize_misbehaving(peer.id());
            }
            ApplicableResult::Applicable | ApplicableResult::Missing { .. } => {
                self.cache.put(id, modifier).await;
            }
        }
        Ok(())
    }

    async fn on_send_local_sync_info(&mut self) -> Result<(), SyncError> {
        let sync_info = self.history()?.sync_info();
        for peer in self.sync_tracker.peers_to_sync_with() {
            let message = Message::SyncInfo(SyncInfoMessage::new(sync_info.clone()));
            self.network
                .send(message, SendTarget::SendToPeer(peer.clone()))
                .await?;
            self.sync_tracker.record_sync_sent(&peer);
        }
        Ok(())
    }

    async fn on_check_delivery(
        &mut self,
        peer: Option<PeerHandle>,
        type_id: ModifierTypeId,
        id: ModifierId,
    ) -> Result<(), SyncError> {
        let applied = self.is_applied(type_id, &id)?;
        if self.delivery.status(&id, applied) != ModifierStatus::Requested {
            // cancelled timers that still fire must be no-ops (spec.md §5).
            return Ok(());
        }

        match peer {
            Some(peer) => {
                peer.record_non_delivery();
                self.penalize.penalize_non_delivering(peer.id());
                counter!("netsync_delivery_timeouts_total").increment(1);
                self.delivery.reexpect(Some(&peer), type_id, &id);
                Ok(())
            }
            None => self.request_download(type_id, vec![id]).await,
        }
    }

    /// Untargeted re-request (spec.md §4.4 `requestDownload`):
    /// re-expects each id with no expected peer, then ships a single
    /// `Request` to a random connected peer containing whichever ids
    /// actually got re-armed.
    async fn request_download(
        &mut self,
        type_id: ModifierTypeId,
        ids: Vec<ModifierId>,
    ) -> Result<(), SyncError> {
        let accepted: Vec<ModifierId> = ids
            .into_iter()
            .filter(|id| self.delivery.reexpect(None, type_id, id))
            .collect();
        if accepted.is_empty() {
            return Ok(());
        }
        let message = Message::Request(RequestMessage::new_bounded(
            type_id,
            accepted,
            self.config.max_inv_objects,
        ));
        self.network.send(message, SendTarget::SendToRandom).await
    }

    async fn broadcast_inv(&self, type_id: ModifierTypeId, id: ModifierId) -> Result<(), SyncError> {
        let message = Message::Inv(InvMessage::new(type_id, vec![id]));
        self.network.send(message, SendTarget::Broadcast).await
    }
}
