// Per-peer comparison status and periodic sync-info broadcast
// scheduling (spec.md §4.2), grounded in the periodic `tokio::select!`
// + `interval` pattern tos_daemon/src/p2p/chain_sync/mod.rs uses for
// its own chain-sync ticking.

use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use tokio::sync::mpsc;

use crate::{event::SyncEvent, modifier::PeerSyncStatus, peer::PeerHandle};

struct PeerSyncState {
    status: PeerSyncStatus,
    last_sync_sent: Instant,
}

pub struct SyncTracker {
    peers: HashMap<u64, (PeerHandle, PeerSyncState)>,
    sync_interval: Duration,
    sync_status_refresh: Duration,
}

impl SyncTracker {
    pub fn new(sync_interval: Duration, sync_status_refresh: Duration) -> Self {
        Self {
            peers: HashMap::new(),
            sync_interval,
            sync_status_refresh,
        }
    }

    /// Upsert a peer's comparison status. `lastSyncSent` is only
    /// refreshed for a brand-new peer entry (first contact); refreshing
    /// it on every status update would let a peer that keeps replying
    /// `Nonsense` dodge the sync-interval cadence forever.
    pub fn update_status(&mut self, peer: &PeerHandle, status: PeerSyncStatus) {
        match self.peers.get_mut(&peer.id()) {
            Some((_, state)) => state.status = status,
            None => {
                self.peers.insert(
                    peer.id(),
                    (
                        peer.clone(),
                        PeerSyncState {
                            status,
                            last_sync_sent: Instant::now() - self.sync_interval,
                        },
                    ),
                );
            }
        }
    }

    pub fn clear_status(&mut self, peer: &PeerHandle) {
        self.peers.remove(&peer.id());
    }

    pub fn status_of(&self, peer: &PeerHandle) -> Option<PeerSyncStatus> {
        self.peers.get(&peer.id()).map(|(_, s)| s.status)
    }

    /// Peers whose `lastSyncSent` is older than `sync_interval`, with a
    /// hard minimum gap of `sync_status_refresh` since the last
    /// outbound sync to each (spec.md §4.2).
    pub fn peers_to_sync_with(&self) -> Vec<PeerHandle> {
        let now = Instant::now();
        self.peers
            .values()
            .filter(|(_, state)| {
                let since_last = now.duration_since(state.last_sync_sent);
                since_last >= self.sync_interval && since_last >= self.sync_status_refresh
            })
            .map(|(peer, _)| peer.clone())
            .collect()
    }

    /// Records that we just sent a sync-info to `peer`, enforcing the
    /// ordering guarantee (spec.md §4.2): a peer won't reappear in
    /// `peers_to_sync_with` until another full `sync_interval` elapses.
    pub fn record_sync_sent(&mut self, peer: &PeerHandle) {
        if let Some((_, state)) = self.peers.get_mut(&peer.id()) {
            state.last_sync_sent = Instant::now();
        }
    }

    /// Arms a periodic tick delivering `SendLocalSyncInfo` to the
    /// synchronizer's event queue. Returns the background task handle;
    /// dropping it stops the ticker.
    pub fn schedule_send_sync_info(
        interval: Duration,
        events: mpsc::Sender<SyncEvent>,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // tokio::time::interval fires immediately on first tick; skip it
            // so construction doesn't itself count as an elapsed interval.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if events.send(SyncEvent::SendLocalSyncInfo).await.is_err() {
                    break;
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use tokio::sync::mpsc;

    fn peer(id: u64) -> PeerHandle {
        let (tx, _rx) = mpsc::channel(8);
        let addr: SocketAddr = "127.0.0.1:9000".parse().unwrap();
        PeerHandle::new(id, addr, tx)
    }

    #[test]
    fn fresh_peer_is_immediately_eligible_for_sync() {
        let mut tracker = SyncTracker::new(Duration::from_millis(20), Duration::from_millis(5));
        let p1 = peer(1);
        tracker.update_status(&p1, PeerSyncStatus::Unknown);
        assert_eq!(tracker.peers_to_sync_with().len(), 1);
    }

    #[test]
    fn record_sync_sent_removes_peer_until_interval_elapses() {
        let mut tracker = SyncTracker::new(Duration::from_millis(50), Duration::from_millis(5));
        let p1 = peer(1);
        tracker.update_status(&p1, PeerSyncStatus::Unknown);
        assert_eq!(tracker.peers_to_sync_with().len(), 1);

        tracker.record_sync_sent(&p1);
        assert_eq!(tracker.peers_to_sync_with().len(), 0);
    }

    #[test]
    fn clear_status_removes_peer_on_disconnect() {
        let mut tracker = SyncTracker::new(Duration::from_millis(20), Duration::from_millis(5));
        let p1 = peer(1);
        tracker.update_status(&p1, PeerSyncStatus::Younger);
        tracker.clear_status(&p1);
        assert!(tracker.status_of(&p1).is_none());
        assert_eq!(tracker.peers_to_sync_with().len(), 0);
    }
}
