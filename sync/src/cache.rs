// Bounded buffer of received-but-not-yet-applicable modifiers
// (spec.md §4.3), grounded directly in
// tos_daemon/src/p2p/compact_block_cache.rs's `CompactBlockCache`:
// an `RwLock`-guarded map keyed by id, async accessors, and an
// eviction pass that walks insertion order. Unlike that cache (which
// expires on a TTL), this one evicts by capacity and hands evicted
// ids back to the caller so they can be demoted to `Unknown`
// (spec.md §4.4).

use std::{
    collections::HashMap,
    sync::Arc,
    time::Instant,
};

use tokio::sync::RwLock;

use crate::{
    modifier::{Modifier, ModifierBox, ModifierId, ModifierTypeId},
    view::{ApplicableResult, HistoryReader},
};

/// Outcome of a `clean_overfull` pass: which ids were evicted, and how
/// many of each modifier type, so a caller can log/meter eviction
/// pressure per type instead of just a bare count (not in spec.md;
/// supplements it per SPEC_FULL.md's ambient-observability expansion,
/// in the shape of `CompactBlockCache::cleanup_expired`'s report).
pub struct CacheCleanupReport {
    evicted: Vec<(ModifierId, ModifierBox)>,
}

impl CacheCleanupReport {
    fn new(evicted: Vec<(ModifierId, ModifierBox)>) -> Self {
        Self { evicted }
    }

    pub fn len(&self) -> usize {
        self.evicted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.evicted.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &ModifierId> {
        self.evicted.iter().map(|(id, _)| id)
    }

    pub fn into_evicted(self) -> Vec<(ModifierId, ModifierBox)> {
        self.evicted
    }

    /// Number of evicted entries per modifier type, for the
    /// eviction-pressure metrics SPEC_FULL.md's ambient stack expects.
    pub fn counts_by_type(&self) -> HashMap<ModifierTypeId, usize> {
        let mut counts = HashMap::new();
        for (_, modifier) in &self.evicted {
            *counts.entry(modifier.type_id()).or_insert(0) += 1;
        }
        counts
    }
}

impl IntoIterator for CacheCleanupReport {
    type Item = (ModifierId, ModifierBox);
    type IntoIter = std::vec::IntoIter<(ModifierId, ModifierBox)>;

    fn into_iter(self) -> Self::IntoIter {
        self.evicted.into_iter()
    }
}

struct CacheEntry {
    modifier: ModifierBox,
    inserted_at: Instant,
}

/// Capacity-bounded `ModifierId -> Modifier` map for persistent
/// modifiers whose dependencies are not yet in history.
///
/// Exposed behind `Arc` so it can be handed read-only (in practice:
/// shared, since eviction still needs `&self` through the lock) to
/// the view holder as described in spec.md §5.
pub struct ModifiersCache {
    entries: RwLock<HashMap<ModifierId, CacheEntry>>,
    capacity: usize,
}

impl ModifiersCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            capacity,
        }
    }

    pub async fn put(&self, id: ModifierId, modifier: ModifierBox) {
        let mut entries = self.entries.write().await;
        entries.insert(
            id,
            CacheEntry {
                modifier,
                inserted_at: Instant::now(),
            },
        );
    }

    pub async fn contains(&self, id: &ModifierId) -> bool {
        self.entries.read().await.contains_key(id)
    }

    pub async fn get(&self, id: &ModifierId) -> Option<ModifierBox> {
        self.entries.read().await.get(id).map(|e| e.modifier.clone())
    }

    pub async fn remove(&self, id: &ModifierId) -> Option<ModifierBox> {
        self.entries.write().await.remove(id).map(|e| e.modifier)
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Returns (and removes) a single cached modifier for which
    /// `history.applicable_try` now succeeds. When several qualify,
    /// the one with the lowest id (byte order) is chosen so tests are
    /// reproducible (spec.md §4.3).
    pub async fn find_applicable(
        &self,
        history: &dyn HistoryReader,
    ) -> Option<(ModifierId, ModifierBox)> {
        let candidate = {
            let entries = self.entries.read().await;
            let mut ids: Vec<&ModifierId> = entries.keys().collect();
            ids.sort();
            ids.into_iter().find_map(|id| {
                let entry = entries.get(id).expect("id came from this map");
                match history.applicable_try(&entry.modifier) {
                    ApplicableResult::Applicable => Some(id.clone()),
                    _ => None,
                }
            })
        };

        let id = candidate?;
        let mut entries = self.entries.write().await;
        entries.remove(&id).map(|e| (id, e.modifier))
    }

    /// Evicts the least-recently-inserted entries until `len <=
    /// capacity`, returning every evicted `(id, modifier)` pair so the
    /// caller can demote those ids to `Unknown`. Invariant: after this
    /// call returns, `len() <= capacity` (spec.md §4.3 invariant 3).
    pub async fn clean_overfull(&self) -> CacheCleanupReport {
        let mut entries = self.entries.write().await;
        if entries.len() <= self.capacity {
            return CacheCleanupReport::new(Vec::new());
        }

        let mut by_age: Vec<(ModifierId, Instant)> = entries
            .iter()
            .map(|(id, e)| (id.clone(), e.inserted_at))
            .collect();
        by_age.sort_by_key(|(_, inserted_at)| *inserted_at);

        let overflow = entries.len() - self.capacity;
        let mut evicted = Vec::with_capacity(overflow);
        for (id, _) in by_age.into_iter().take(overflow) {
            if let Some(entry) = entries.remove(&id) {
                evicted.push((id, entry.modifier));
            }
        }
        CacheCleanupReport::new(evicted)
    }
}

pub fn shared(capacity: usize) -> Arc<ModifiersCache> {
    Arc::new(ModifiersCache::new(capacity))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modifier::{Modifier, ModifierTypeId};
    use netsync_common::Hash;

    #[derive(Debug)]
    struct DummyModifier {
        id: ModifierId,
    }

    impl Modifier for DummyModifier {
        fn type_id(&self) -> ModifierTypeId {
            1
        }
        fn computed_id(&self) -> ModifierId {
            self.id
        }
    }

    struct AlwaysApplicable;
    impl HistoryReader for AlwaysApplicable {
        fn compare(&self, _: &crate::modifier::SyncInfo) -> crate::modifier::PeerSyncStatus {
            crate::modifier::PeerSyncStatus::Unknown
        }
        fn continuation_ids(
            &self,
            _: &crate::modifier::SyncInfo,
            _: usize,
        ) -> Option<Vec<(ModifierTypeId, ModifierId)>> {
            None
        }
        fn sync_info(&self) -> crate::modifier::SyncInfo {
            crate::modifier::SyncInfo::new(vec![])
        }
        fn applicable_try(&self, _: &ModifierBox) -> ApplicableResult {
            ApplicableResult::Applicable
        }
        fn contains(&self, _: &ModifierId) -> bool {
            false
        }
        fn modifier_by_id(&self, _: &ModifierId) -> Option<Vec<u8>> {
            None
        }
    }

    fn modifier(byte: u8) -> (ModifierId, ModifierBox) {
        let id = Hash::new([byte; 32]);
        (id, Arc::new(DummyModifier { id }))
    }

    #[tokio::test]
    async fn put_contains_remove() {
        let cache = ModifiersCache::new(10);
        let (id, m) = modifier(1);
        cache.put(id, m).await;
        assert!(cache.contains(&id).await);
        assert!(cache.remove(&id).await.is_some());
        assert!(!cache.contains(&id).await);
    }

    #[tokio::test]
    async fn clean_overfull_respects_capacity_and_returns_evicted() {
        let cache = ModifiersCache::new(2);
        for b in 1..=5u8 {
            let (id, m) = modifier(b);
            cache.put(id, m).await;
            // keep insertion order distinguishable
            tokio::time::sleep(std::time::Duration::from_millis(1)).await;
        }
        assert_eq!(cache.len().await, 5);

        let report = cache.clean_overfull().await;
        assert_eq!(report.len(), 3);
        assert!(!report.is_empty());
        assert_eq!(cache.len().await, 2);
        assert!(cache.len().await <= 2);
        assert_eq!(report.counts_by_type(), HashMap::from([(1u8, 3)]));

        // the three oldest (lowest byte, inserted first) were evicted
        let evicted_ids: Vec<u8> = report.ids().map(|id| id.as_bytes()[0]).collect();
        assert_eq!(evicted_ids, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn find_applicable_picks_lowest_id_deterministically() {
        let cache = ModifiersCache::new(10);
        let (id_hi, m_hi) = modifier(9);
        let (id_lo, m_lo) = modifier(2);
        cache.put(id_hi, m_hi).await;
        cache.put(id_lo, m_lo).await;

        let history = AlwaysApplicable;
        let (picked, _) = cache.find_applicable(&history).await.unwrap();
        assert_eq!(picked, id_lo);
        assert!(!cache.contains(&id_lo).await);
        assert!(cache.contains(&id_hi).await);
    }
}
