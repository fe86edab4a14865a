//! Canonical chain resolution
//!
//! Walks parent roots back from a head through the root index. A missing
//! parent or header ends the walk quietly: while blocks are still arriving a
//! broken chain is normal, not an error.
//!
//! Canonical for an epoch means reachable from the head by parent descent.
//! Any other cached block in the epoch's slot range is non-canonical, even
//! when no competing block is known to be canonical.

use super::IndexerCache;
use crate::domain::{CachedBlock, Root};
use crate::ports::inbound::IndexerCacheApi;
use crate::ports::outbound::{CanonicalBlockMap, IndexerStore, Synchronizer, VoteAggregator};
use std::collections::BTreeMap;
use std::sync::Arc;

impl<S, A, Y> IndexerCache<S, A, Y>
where
    S: IndexerStore,
    A: VoteAggregator,
    Y: Synchronizer,
{
    /// Cached parent of `block`, provided it sits at a lower slot.
    fn cached_parent(&self, block: &CachedBlock) -> Option<Arc<CachedBlock>> {
        let parent = self.get_cached_block(&block.parent_root()?)?;
        (parent.slot < block.slot).then_some(parent)
    }

    /// Highest block of `epoch` on the chain ending in `head`
    /// (finalized root when `None`).
    pub fn last_canonical_block(&self, epoch: u64, head: Option<Root>) -> Option<Arc<CachedBlock>> {
        let head = head.or_else(|| self.state.read().finalized_root)?;
        let mut block = self.get_cached_block(&head)?;
        while self.epoch_of_slot(block.slot) > epoch {
            block = self.cached_parent(&block)?;
        }
        (self.epoch_of_slot(block.slot) == epoch).then_some(block)
    }

    /// Earliest cached block of `epoch` on the chain ending in `head`.
    pub fn first_canonical_block(
        &self,
        epoch: u64,
        head: Option<Root>,
    ) -> Option<Arc<CachedBlock>> {
        let mut block = self.last_canonical_block(epoch, head)?;
        while let Some(parent) = self.cached_parent(&block) {
            if self.epoch_of_slot(parent.slot) != epoch {
                break;
            }
            block = parent;
        }
        Some(block)
    }

    /// Deepest cached ancestor of the finalized root, where the cached
    /// finalized chain breaks off.
    pub(super) fn oldest_finalized_ancestor(&self) -> Option<Arc<CachedBlock>> {
        let head = self.state.read().finalized_root?;
        let mut block = self.get_cached_block(&head)?;
        while let Some(parent) = self.cached_parent(&block) {
            block = parent;
        }
        Some(block)
    }

    /// One block per filled slot of `epoch` on the chain ending in `head`.
    pub fn canonical_block_map(&self, epoch: u64, head: Option<Root>) -> CanonicalBlockMap {
        let mut canonical = BTreeMap::new();
        let mut next = self.last_canonical_block(epoch, head);
        while let Some(block) = next {
            if self.epoch_of_slot(block.slot) != epoch {
                break;
            }
            next = self.cached_parent(&block);
            canonical.insert(block.slot, block);
        }
        canonical
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{InMemoryIndexerStore, MockSynchronizer, MockVoteAggregator};
    use crate::config::IndexerCacheConfig;
    use crate::test_utils::{block_root, build_chain, insert_block};

    type TestCache = IndexerCache<InMemoryIndexerStore, MockVoteAggregator, MockSynchronizer>;

    async fn create_test_cache() -> Arc<TestCache> {
        IndexerCache::new(
            IndexerCacheConfig::default(),
            Arc::new(InMemoryIndexerStore::new()),
            Arc::new(MockVoteAggregator::default()),
            Arc::new(MockSynchronizer::default()),
        )
        .await
    }

    #[tokio::test]
    async fn test_full_epoch_map() {
        let cache = create_test_cache().await;
        let roots = build_chain(cache.as_ref(), 0..64, [0; 32]);
        let head = *roots.last().unwrap();

        let epoch0 = cache.canonical_block_map(0, Some(head));
        assert_eq!(epoch0.len(), 32);
        assert_eq!(*epoch0.keys().next().unwrap(), 0);
        assert_eq!(*epoch0.keys().last().unwrap(), 31);

        let epoch1 = cache.canonical_block_map(1, Some(head));
        assert_eq!(epoch1.len(), 32);
        assert_eq!(epoch1[&63].root, head);
    }

    #[tokio::test]
    async fn test_defaults_to_finalized_root() {
        let cache = create_test_cache().await;
        let roots = build_chain(cache.as_ref(), 0..40, [0; 32]);

        assert!(cache.last_canonical_block(0, None).is_none());

        cache.set_finalized_head(1, roots[39]);
        let last = cache.last_canonical_block(0, None).unwrap();
        assert_eq!(last.slot, 31);
        let first = cache.first_canonical_block(1, None).unwrap();
        assert_eq!(first.slot, 32);
    }

    #[tokio::test]
    async fn test_oldest_finalized_ancestor_ignores_detached_blocks() {
        let cache = create_test_cache().await;
        insert_block(cache.as_ref(), block_root(130, 0), 130, [0xEE; 32]);
        let live = build_chain(cache.as_ref(), 1600..1610, [0xAB; 32]);
        assert!(cache.oldest_finalized_ancestor().is_none());

        cache.set_finalized_head(50, live[9]);
        let oldest = cache.oldest_finalized_ancestor().unwrap();
        assert_eq!(oldest.root, live[0]);
        assert_eq!(oldest.slot, 1600);
    }

    #[tokio::test]
    async fn test_fork_excludes_competing_block() {
        let cache = create_test_cache().await;
        let roots = build_chain(cache.as_ref(), 0..10, [0; 32]);
        let fork_parent = block_root(8, 0);
        // Slot 10: A builds on slot 8, B on slot 9. The head descends from B.
        let a = insert_block(cache.as_ref(), block_root(10, 1), 10, fork_parent);
        let b = insert_block(cache.as_ref(), block_root(10, 0), 10, roots[9]);
        let head = insert_block(cache.as_ref(), block_root(11, 0), 11, b.root);

        let canonical = cache.canonical_block_map(0, Some(head.root));
        assert_eq!(canonical.len(), 12);
        assert_eq!(canonical[&10].root, b.root);
        assert!(canonical.values().all(|block| block.root != a.root));

        // From A's own tip, A is canonical and slot 9 is skipped.
        let from_a = cache.canonical_block_map(0, Some(a.root));
        assert_eq!(from_a[&10].root, a.root);
        assert!(!from_a.contains_key(&9));
    }

    #[tokio::test]
    async fn test_broken_chain_returns_none() {
        let cache = create_test_cache().await;
        build_chain(cache.as_ref(), 0..10, [0; 32]);
        // Gap: slot 40 points at a block that never arrived.
        let orphan_tip = insert_block(cache.as_ref(), block_root(40, 0), 40, [0xEE; 32]);

        assert!(cache.last_canonical_block(0, Some(orphan_tip.root)).is_none());
        assert!(cache.first_canonical_block(0, Some(orphan_tip.root)).is_none());
        assert!(cache.canonical_block_map(0, Some(orphan_tip.root)).is_empty());
    }

    #[tokio::test]
    async fn test_overshoot_returns_none() {
        let cache = create_test_cache().await;
        // Epoch 1 is empty: slot 64 builds directly on slot 31.
        let roots = build_chain(cache.as_ref(), 0..32, [0; 32]);
        let tip = insert_block(cache.as_ref(), block_root(64, 0), 64, roots[31]);

        assert!(cache.last_canonical_block(1, Some(tip.root)).is_none());
        assert_eq!(cache.last_canonical_block(0, Some(tip.root)).unwrap().slot, 31);
    }

    #[tokio::test]
    async fn test_missing_header_stops_walk() {
        let cache = create_test_cache().await;
        build_chain(cache.as_ref(), 0..5, [0; 32]);
        let (headless, _) = cache.create_or_get_cached_block(block_root(40, 0), 40);

        assert!(cache.last_canonical_block(0, Some(headless.root)).is_none());
        let own_epoch = cache.canonical_block_map(1, Some(headless.root));
        assert_eq!(own_epoch.len(), 1);
    }

    #[tokio::test]
    async fn test_first_block_with_empty_leading_slots() {
        let cache = create_test_cache().await;
        let roots = build_chain(cache.as_ref(), 0..30, [0; 32]);
        // Slots 32..=34 empty; epoch 1 starts at slot 35.
        let b35 = insert_block(cache.as_ref(), block_root(35, 0), 35, roots[29]);
        let b36 = insert_block(cache.as_ref(), block_root(36, 0), 36, b35.root);

        let first = cache.first_canonical_block(1, Some(b36.root)).unwrap();
        assert_eq!(first.slot, 35);
        assert_eq!(first.parent_root(), Some(roots[29]));
    }

    #[tokio::test]
    async fn test_self_referencing_parent_terminates() {
        let cache = create_test_cache().await;
        let looped = insert_block(cache.as_ref(), block_root(70, 0), 70, block_root(70, 0));

        assert!(cache.last_canonical_block(1, Some(looped.root)).is_none());
        assert_eq!(cache.canonical_block_map(2, Some(looped.root)).len(), 1);
    }
}
