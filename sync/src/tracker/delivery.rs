// Per-id delivery status, retry scheduling and peer attribution
// (spec.md §4.1). Timer bookkeeping is grounded in
// tos_daemon/src/p2p/tracker/request.rs's `Request` (peer + timestamp
// + group id), generalized here to own the actual retry scheduling:
// spec.md §4.1 makes the tracker responsible for arming the timeout
// that delivers `CheckDelivery` back to the synchronizer, while the
// synchronizer (not the tracker) decides whether to retry or give up.

use std::{collections::HashMap, time::Duration};

use tokio::{sync::mpsc, task::JoinHandle};

use crate::{
    event::SyncEvent,
    modifier::{ModifierId, ModifierStatus, ModifierTypeId},
    peer::PeerHandle,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TrackedStatus {
    Requested,
    Received,
    Invalid,
}

struct TrackedEntry {
    status: TrackedStatus,
    attempts: u32,
    expected_peer: Option<PeerHandle>,
    type_id: ModifierTypeId,
    timer: Option<JoinHandle<()>>,
}

impl Drop for TrackedEntry {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

pub struct DeliveryTracker {
    entries: HashMap<ModifierId, TrackedEntry>,
    delivery_timeout: Duration,
    max_delivery_checks: u32,
    events: mpsc::Sender<SyncEvent>,
}

impl DeliveryTracker {
    pub fn new(
        delivery_timeout: Duration,
        max_delivery_checks: u32,
        events: mpsc::Sender<SyncEvent>,
    ) -> Self {
        Self {
            entries: HashMap::new(),
            delivery_timeout,
            max_delivery_checks,
            events,
        }
    }

    fn spawn_timer(
        &self,
        id: ModifierId,
        type_id: ModifierTypeId,
        peer: Option<PeerHandle>,
    ) -> JoinHandle<()> {
        let delay = self.delivery_timeout;
        let events = self.events.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = events
                .send(SyncEvent::CheckDelivery { peer, type_id, id })
                .await;
        })
    }

    /// The tracker's recorded status for `id`. Falls back to `applied`
    /// (supplied by the caller, who already knows which reader to
    /// consult for this modifier's type) to distinguish `Applied` from
    /// `Unknown` when nothing is tracked (spec.md §4.1).
    pub fn status(&self, id: &ModifierId, applied: bool) -> ModifierStatus {
        match self.entries.get(id).map(|e| e.status) {
            Some(TrackedStatus::Requested) => ModifierStatus::Requested,
            Some(TrackedStatus::Received) => ModifierStatus::Received,
            Some(TrackedStatus::Invalid) => ModifierStatus::Invalid,
            None if applied => ModifierStatus::Applied,
            None => ModifierStatus::Unknown,
        }
    }

    /// For every id currently `Unknown` or `Invalid` (by the tracker's
    /// own bookkeeping — callers are expected to have already screened
    /// out `Applied` ids via `status`), arms a fresh request: attempts
    /// = 1, `expectedPeer` = `peer`, and a delivery timer. Returns the
    /// subset of `ids` actually (re)armed; ids already `Requested`/
    /// `Received` are left untouched (spec.md §4.1 `expect`).
    pub fn expect(
        &mut self,
        peer: &PeerHandle,
        type_id: ModifierTypeId,
        ids: &[ModifierId],
    ) -> Vec<ModifierId> {
        let mut accepted = Vec::with_capacity(ids.len());
        for id in ids {
            let requestable = !matches!(
                self.entries.get(id).map(|e| e.status),
                Some(TrackedStatus::Requested) | Some(TrackedStatus::Received)
            );
            if !requestable {
                continue;
            }
            let timer = self.spawn_timer(id.clone(), type_id, Some(peer.clone()));
            self.entries.insert(
                id.clone(),
                TrackedEntry {
                    status: TrackedStatus::Requested,
                    attempts: 1,
                    expected_peer: Some(peer.clone()),
                    type_id,
                    timer: Some(timer),
                },
            );
            accepted.push(id.clone());
        }
        accepted
    }

    /// Retries (or starts, for an id never tracked before — e.g. an
    /// untargeted download) a request. `peer = None` preserves any
    /// existing `expectedPeer` rather than clearing it (spec.md §4.1
    /// edge policy). Returns `true` and reschedules the timer if
    /// `attempts < maxDeliveryChecks`; otherwise forgets the id
    /// (-> `Unknown`) and returns `false`.
    pub fn reexpect(
        &mut self,
        peer: Option<&PeerHandle>,
        type_id: ModifierTypeId,
        id: &ModifierId,
    ) -> bool {
        let attempts_so_far = self.entries.get(id).map(|e| e.attempts).unwrap_or(0);
        if attempts_so_far >= self.max_delivery_checks {
            self.entries.remove(id);
            return false;
        }

        let expected_peer = match peer {
            Some(p) => Some(p.clone()),
            None => self
                .entries
                .get(id)
                .and_then(|e| e.expected_peer.clone()),
        };
        let timer = self.spawn_timer(id.clone(), type_id, expected_peer.clone());
        self.entries.insert(
            id.clone(),
            TrackedEntry {
                status: TrackedStatus::Requested,
                attempts: attempts_so_far + 1,
                expected_peer,
                type_id,
                timer: Some(timer),
            },
        );
        true
    }

    /// `true` iff `id` was `Requested` and the sender matches the
    /// expected peer (or none was expected). On success, cancels the
    /// timer and transitions to `Received`. A `false` return classifies
    /// the arrival as spam (spec.md §4.1/§8 property 3).
    pub fn on_receive(&mut self, id: &ModifierId, peer: &PeerHandle) -> bool {
        let matches = match self.entries.get(id) {
            Some(entry) if entry.status == TrackedStatus::Requested => entry
                .expected_peer
                .as_ref()
                .map(|expected| expected == peer)
                .unwrap_or(true),
            _ => false,
        };
        if matches {
            if let Some(entry) = self.entries.get_mut(id) {
                if let Some(timer) = entry.timer.take() {
                    timer.abort();
                }
                entry.status = TrackedStatus::Received;
            }
        }
        matches
    }

    /// Clears `expected_peer` on every entry currently attributed to
    /// `peer_id` without forgetting the id itself (spec.md §5: "a
    /// disconnect during a request clears the expected peer; the next
    /// `CheckDelivery` for that id falls into the no-peer branch").
    pub fn clear_expected_peer(&mut self, peer_id: u64) {
        for entry in self.entries.values_mut() {
            if entry
                .expected_peer
                .as_ref()
                .is_some_and(|p| p.id() == peer_id)
            {
                entry.expected_peer = None;
            }
        }
    }

    pub fn to_applied(&mut self, id: &ModifierId) {
        self.entries.remove(id);
    }

    pub fn to_unknown(&mut self, id: &ModifierId) {
        self.entries.remove(id);
    }

    pub fn to_invalid(&mut self, id: &ModifierId, type_id: ModifierTypeId) {
        self.entries.insert(
            id.clone(),
            TrackedEntry {
                status: TrackedStatus::Invalid,
                attempts: 0,
                expected_peer: None,
                type_id,
                timer: None,
            },
        );
    }

    #[cfg(test)]
    pub fn attempts(&self, id: &ModifierId) -> Option<u32> {
        self.entries.get(id).map(|e| e.attempts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netsync_common::Hash;
    use std::{net::SocketAddr, time::Duration};
    use tokio::sync::mpsc;

    fn peer(id: u64) -> PeerHandle {
        let (tx, _rx) = mpsc::channel(8);
        let addr: SocketAddr = "127.0.0.1:9000".parse().unwrap();
        PeerHandle::new(id, addr, tx)
    }

    fn tracker() -> (DeliveryTracker, mpsc::Receiver<SyncEvent>) {
        let (tx, rx) = mpsc::channel(32);
        (
            DeliveryTracker::new(Duration::from_millis(30), 2, tx),
            rx,
        )
    }

    #[tokio::test]
    async fn expect_then_on_receive_marks_received_and_cancels_timer() {
        let (mut tracker, mut rx) = tracker();
        let p = peer(1);
        let id = Hash::hash(b"m");
        tracker.expect(&p, 1, &[id]);
        assert_eq!(tracker.status(&id, false), ModifierStatus::Requested);

        assert!(tracker.on_receive(&id, &p));
        assert_eq!(tracker.status(&id, false), ModifierStatus::Received);

        // the timer was cancelled: nothing should show up on the channel
        let res = tokio::time::timeout(Duration::from_millis(60), rx.recv()).await;
        assert!(res.is_err(), "CheckDelivery fired after receive cancelled the timer");
    }

    #[tokio::test]
    async fn on_receive_from_wrong_peer_is_spam() {
        let (mut tracker, _rx) = tracker();
        let expected = peer(1);
        let other = peer(2);
        let id = Hash::hash(b"m");
        tracker.expect(&expected, 1, &[id]);
        assert!(!tracker.on_receive(&id, &other));
        assert_eq!(tracker.status(&id, false), ModifierStatus::Requested);
    }

    #[tokio::test]
    async fn reexpect_forgets_after_max_attempts() {
        let (mut tracker, _rx) = tracker();
        let p = peer(1);
        let id = Hash::hash(b"m");
        tracker.expect(&p, 1, &[id]);
        assert_eq!(tracker.attempts(&id), Some(1));

        assert!(tracker.reexpect(None, 1, &id));
        assert_eq!(tracker.attempts(&id), Some(2));

        assert!(!tracker.reexpect(None, 1, &id));
        assert_eq!(tracker.status(&id, false), ModifierStatus::Unknown);
    }

    #[tokio::test]
    async fn reexpect_without_peer_preserves_expected_peer() {
        let (mut tracker, _rx) = tracker();
        let p = peer(1);
        let id = Hash::hash(b"m");
        tracker.expect(&p, 1, &[id]);
        tracker.reexpect(None, 1, &id);

        let other = peer(2);
        // the still-expected original peer is the only one allowed to deliver
        assert!(!tracker.on_receive(&id, &other));
        assert!(tracker.on_receive(&id, &p));
    }
}
