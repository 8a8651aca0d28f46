mod common;

use std::sync::Arc;

use common::{hash, TestModifier};
use netsync_common::{Hash, Serializer};
use netsync_core::{InvMessage, ModifierId, ModifiersCache, ModifiersMessage, SyncInfoMessage, SyncInfo};
use proptest::prelude::*;

fn arbitrary_id() -> impl Strategy<Value = ModifierId> {
    any::<[u8; 32]>().prop_map(Hash::new)
}

proptest! {
    /// spec.md §4.3 invariant 3: after `clean_overfull`, the cache never
    /// holds more entries than its configured capacity, for any sequence
    /// of distinct inserted ids.
    #[test]
    fn cache_never_exceeds_capacity_after_cleanup(
        ids in prop::collection::vec(arbitrary_id(), 0..40),
        capacity in 1usize..20,
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let cache = ModifiersCache::new(capacity);
            let mut seen = std::collections::HashSet::new();
            for id in ids {
                if seen.insert(id) {
                    cache.put(id, Arc::new(TestModifier { id, type_id: 1 })).await;
                }
            }
            cache.clean_overfull().await;
            prop_assert!(cache.len().await <= capacity);
            Ok(())
        })?;
    }

    /// spec.md §4.5: every wire message round-trips byte-for-byte
    /// through encode/decode for arbitrary id lists and payloads.
    #[test]
    fn inv_message_roundtrips(
        type_id in any::<u8>(),
        ids in prop::collection::vec(arbitrary_id(), 0..16),
    ) {
        let original = InvMessage::new(type_id, ids);
        let decoded = InvMessage::from_bytes(&original.to_bytes()).unwrap();
        prop_assert_eq!(original, decoded);
    }

    #[test]
    fn modifiers_message_roundtrips(
        type_id in any::<u8>(),
        entries in prop::collection::vec(
            (arbitrary_id(), prop::collection::vec(any::<u8>(), 0..64)),
            0..8,
        ),
    ) {
        let original = ModifiersMessage::new(type_id, entries);
        let decoded = ModifiersMessage::from_bytes(&original.to_bytes()).unwrap();
        prop_assert_eq!(original, decoded);
    }

    #[test]
    fn sync_info_message_roundtrips(payload in prop::collection::vec(any::<u8>(), 0..256)) {
        let original = SyncInfoMessage::new(SyncInfo::new(payload));
        let decoded = SyncInfoMessage::from_bytes(&original.to_bytes()).unwrap();
        prop_assert_eq!(original, decoded);
    }
}

#[test]
fn a_modifier_id_is_stable_under_hashing_the_same_bytes_twice() {
    // sanity check the id generator tests rely on: `hash(seed)` is
    // deterministic, which the cache/delivery-tracker property tests above
    // depend on implicitly through `arbitrary_id`'s use of raw byte arrays.
    assert_eq!(hash(b"same"), hash(b"same"));
    assert_ne!(hash(b"same"), hash(b"different"));
}
