//! # Finalization Pipeline Scenarios (qc-18)
//!
//! Drives full cache passes against the in-memory store.
//!
//! ## Test Categories
//!
//! 1. **End-to-end** - Linear chain, fork at a slot, exactly-once persistence
//! 2. **Restart** - Repopulating the cache from unfinalized rows
//! 3. **Failure** - Commit failures leave watermarks untouched
//! 4. **Modes** - Read-only instances, synchronizer hand-off at startup

use qc_18_indexer_cache::adapters::{InMemoryIndexerStore, MockSynchronizer, MockVoteAggregator};
use qc_18_indexer_cache::domain::{UnfinalizedBlockHeader, UnfinalizedDutyRef};
use qc_18_indexer_cache::test_utils::{block_root, build_chain, insert_block, make_header};
use qc_18_indexer_cache::{IndexerCache, IndexerCacheApi, IndexerCacheConfig, IndexerError};
use std::sync::Arc;

type TestCache = IndexerCache<InMemoryIndexerStore, MockVoteAggregator, MockSynchronizer>;

// =============================================================================
// TEST HELPERS
// =============================================================================

struct Pipeline {
    cache: Arc<TestCache>,
    store: Arc<InMemoryIndexerStore>,
    aggregator: Arc<MockVoteAggregator>,
    synchronizer: Arc<MockSynchronizer>,
}

async fn make_pipeline_with(config: IndexerCacheConfig, store: InMemoryIndexerStore) -> Pipeline {
    let store = Arc::new(store);
    let aggregator = Arc::new(MockVoteAggregator::default());
    let synchronizer = Arc::new(MockSynchronizer::default());
    let cache = IndexerCache::new(
        config,
        Arc::clone(&store),
        Arc::clone(&aggregator),
        Arc::clone(&synchronizer),
    )
    .await;
    Pipeline {
        cache,
        store,
        aggregator,
        synchronizer,
    }
}

async fn make_pipeline() -> Pipeline {
    make_pipeline_with(IndexerCacheConfig::default(), InMemoryIndexerStore::new()).await
}

// =============================================================================
// END-TO-END
// =============================================================================

#[tokio::test]
async fn test_two_epoch_chain_is_finalized_and_evicted() {
    let p = make_pipeline().await;
    let roots = build_chain(p.cache.as_ref(), 0..64, [0; 32]);

    p.cache.set_finalized_head(1, roots[63]);
    p.cache.run_cache_logic().await.unwrap();

    assert_eq!(p.store.persisted_epochs(), vec![0, 1]);
    assert_eq!(p.cache.processed_epoch(), 1);
    assert_eq!(p.cache.cleanup_epoch(), 1);
    assert_eq!(p.cache.cached_block_count(), 0);
    assert_eq!(p.cache.slot_bounds(), (-1, -1));
    assert_eq!(p.cache.epoch_stats_count(), 0);
    assert_eq!(p.store.sync_state_epoch(), Some(1));

    for root in &roots {
        let record = p.store.block_record(root).unwrap();
        assert!(!record.orphaned);
    }
    assert!(p.store.orphaned_roots().is_empty());
}

#[tokio::test]
async fn test_next_epoch_blocks_reach_aggregator() {
    let p = make_pipeline().await;
    let roots = build_chain(p.cache.as_ref(), 0..64, [0; 32]);

    p.cache.set_finalized_head(1, roots[63]);
    p.cache.run_cache_logic().await.unwrap();

    let epoch0 = p.aggregator.call_for(0).unwrap();
    assert_eq!(epoch0.slots.len(), 64);
    assert_eq!(epoch0.target_root, Some(roots[0]));
    let epoch1 = p.aggregator.call_for(1).unwrap();
    assert_eq!(epoch1.slots.len(), 32);
}

#[tokio::test]
async fn test_fork_block_is_archived_as_orphan() {
    let p = make_pipeline().await;
    let roots = build_chain(p.cache.as_ref(), 0..32, [0; 32]);
    let canonical = roots[10];
    let fork = insert_block(p.cache.as_ref(), block_root(10, 1), 10, roots[8]);

    p.cache.set_finalized_head(0, roots[31]);
    p.cache.run_cache_logic().await.unwrap();

    let record = p.store.epoch_record(0).unwrap();
    assert_eq!(record.blocks.len(), 32);
    assert!(record.blocks.iter().any(|b| b.root == canonical));
    assert!(record.blocks.iter().all(|b| b.root != fork.root));

    assert_eq!(p.store.orphaned_roots(), vec![fork.root]);
    assert!(p.store.block_record(&fork.root).unwrap().orphaned);
    assert!(!p.store.block_record(&canonical).unwrap().orphaned);
    assert_eq!(p.cache.cached_block_count(), 0);
}

#[tokio::test]
async fn test_each_epoch_persisted_exactly_once() {
    let p = make_pipeline().await;
    let roots = build_chain(p.cache.as_ref(), 0..64, [0; 32]);
    // Keep the cache non-empty so the second pass is not short-circuited.
    build_chain(p.cache.as_ref(), 64..70, roots[63]);

    p.cache.set_finalized_head(1, roots[63]);
    p.cache.run_cache_logic().await.unwrap();
    let commits = p.store.commit_count();

    p.cache.set_finalized_head(1, roots[63]);
    p.cache.run_cache_logic().await.unwrap();

    assert_eq!(p.store.persisted_epochs(), vec![0, 1]);
    assert_eq!(p.store.commit_count(), commits);
    assert_eq!(p.cache.cached_block_count(), 6);
}

#[tokio::test]
async fn test_late_duplicate_is_swept_once() {
    let p = make_pipeline().await;
    let roots = build_chain(p.cache.as_ref(), 0..40, [0; 32]);
    p.cache.set_finalized_head(0, roots[39]);
    p.cache.run_cache_logic().await.unwrap();
    assert_eq!(p.cache.cached_block_count(), 8);

    // A finalized block re-announced after its epoch was persisted.
    insert_block(p.cache.as_ref(), roots[5], 5, roots[4]);
    p.cache.run_cache_logic().await.unwrap();
    assert!(p.cache.get_cached_block(&roots[5]).is_none());
    assert!(p.store.orphaned_roots().is_empty());

    let commits = p.store.commit_count();
    p.cache.run_cache_logic().await.unwrap();
    assert_eq!(p.store.commit_count(), commits);
}

// =============================================================================
// RESTART
// =============================================================================

#[tokio::test]
async fn test_restart_restores_unfinalized_rows() {
    let headers: Vec<_> = (0..3u64)
        .map(|slot| {
            UnfinalizedBlockHeader::new(
                block_root(slot, 0),
                slot,
                &make_header(slot, [slot as u8; 32]),
            )
            .unwrap()
        })
        .chain(std::iter::once(UnfinalizedBlockHeader {
            root: [0xFF; 32],
            slot: 4,
            header: "{broken".to_string(),
        }))
        .collect();
    let duty_ref = UnfinalizedDutyRef {
        epoch: 0,
        dependent_root: [0xD0; 32],
    };
    let store = InMemoryIndexerStore::with_unfinalized(headers, vec![duty_ref]);
    let p = make_pipeline_with(IndexerCacheConfig::default(), store).await;

    assert_eq!(p.cache.cached_block_count(), 3);
    for slot in 0..3 {
        let block = p.cache.get_cached_block(&block_root(slot, 0)).unwrap();
        assert!(block.is_in_db());
        assert_eq!(block.parent_root(), Some([slot as u8; 32]));
    }
    assert!(p.cache.get_cached_block(&[0xFF; 32]).is_none());

    let stats = p.cache.get_epoch_stats(0, Some(&[0xD0; 32])).unwrap();
    assert!(stats.duties_in_db());
}

// =============================================================================
// FAILURE
// =============================================================================

#[tokio::test]
async fn test_commit_failure_is_retried_on_next_pass() {
    let p = make_pipeline().await;
    let roots = build_chain(p.cache.as_ref(), 0..64, [0; 32]);
    p.cache.set_finalized_head(1, roots[63]);

    p.store.fail_next_commit();
    let result = p.cache.run_cache_logic().await;
    assert!(matches!(result, Err(IndexerError::TransactionCommit { .. })));
    assert_eq!(p.cache.processed_epoch(), -1);
    assert_eq!(p.cache.cleanup_epoch(), -1);
    assert_eq!(p.cache.cached_block_count(), 64);

    p.cache.run_cache_logic().await.unwrap();
    assert_eq!(p.store.persisted_epochs(), vec![0, 1]);
    assert_eq!(p.cache.cached_block_count(), 0);
}

#[tokio::test]
async fn test_failed_second_epoch_keeps_first() {
    let p = make_pipeline().await;
    let roots = build_chain(p.cache.as_ref(), 0..64, [0; 32]);
    p.cache.set_finalized_head(0, roots[31]);
    p.cache.run_cache_logic().await.unwrap();
    assert_eq!(p.cache.processed_epoch(), 0);

    p.cache.set_finalized_head(1, roots[63]);
    p.store.fail_next_begin();
    assert!(p.cache.run_cache_logic().await.is_err());
    assert_eq!(p.cache.processed_epoch(), 0);
    assert_eq!(p.store.sync_state_epoch(), Some(0));
    assert_eq!(p.cache.cached_block_count(), 32);
}

// =============================================================================
// MODES
// =============================================================================

#[tokio::test]
async fn test_read_only_mode_only_evicts() {
    let config = IndexerCacheConfig {
        write_db: false,
        ..IndexerCacheConfig::default()
    };
    let p = make_pipeline_with(config, InMemoryIndexerStore::new()).await;
    let roots = build_chain(p.cache.as_ref(), 0..70, [0; 32]);
    p.cache.create_or_get_epoch_stats(0, Some([0; 32]));
    p.cache.create_or_get_epoch_stats(2, Some(roots[63]));

    p.cache.set_finalized_head(1, roots[63]);
    p.cache.run_cache_logic().await.unwrap();

    assert_eq!(p.store.commit_count(), 0);
    assert!(p.aggregator.calls().is_empty());
    assert_eq!(p.cache.cleanup_epoch(), 1);
    assert_eq!(p.cache.cached_block_count(), 6);
    assert_eq!(p.cache.epoch_stats_count(), 1);
}

#[tokio::test]
async fn test_uncached_history_is_handed_to_synchronizer() {
    let store = InMemoryIndexerStore::new();
    store.put_sync_state("indexer.syncstate", 3);
    let p = make_pipeline_with(IndexerCacheConfig::default(), store).await;
    // Live cache only reaches back to epoch 10.
    let roots = build_chain(p.cache.as_ref(), 320..352, [0xAB; 32]);

    p.cache.set_finalized_head(10, roots[31]);
    p.cache.run_cache_logic().await.unwrap();

    assert_eq!(p.synchronizer.started_from(), vec![4]);
    assert_eq!(p.cache.processed_epoch(), 10);
    assert!(p.store.persisted_epochs().is_empty());
    assert!(p.store.orphaned_roots().is_empty());
    assert_eq!(p.cache.cached_block_count(), 0);

    // Live processing continues from the tip; the synchronizer owns the
    // watermark while it runs.
    let tip = build_chain(p.cache.as_ref(), 352..384, roots[31]);
    p.cache.set_finalized_head(11, tip[31]);
    p.cache.run_cache_logic().await.unwrap();
    assert_eq!(p.store.persisted_epochs(), vec![11]);
    assert_eq!(p.store.sync_state_epoch(), Some(3));
}

#[tokio::test]
async fn test_restart_after_downtime_backfills_through_synchronizer() {
    let store = InMemoryIndexerStore::new();
    store.put_sync_state("indexer.syncstate", 3);
    let p = make_pipeline_with(IndexerCacheConfig::default(), store).await;
    // A stale unfinalized block from before the downtime, then the live
    // chain 46 epochs later.
    let stale = insert_block(p.cache.as_ref(), block_root(130, 0), 130, [0xEE; 32]);
    let live = build_chain(p.cache.as_ref(), 1600..1664, [0xAB; 32]);

    p.cache.set_finalized_head(51, live[63]);
    p.cache.run_cache_logic().await.unwrap();

    assert_eq!(p.synchronizer.started_from(), vec![4]);
    assert!(p.store.persisted_epochs().is_empty());
    assert_eq!(p.store.sync_state_epoch(), Some(3));
    assert!(p.store.orphan_record(&stale.root).is_none());
    assert_eq!(p.cache.processed_epoch(), 51);
    assert_eq!(p.cache.cached_block_count(), 0);
}
