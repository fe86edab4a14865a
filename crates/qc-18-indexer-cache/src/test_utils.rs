//! Block tree builders shared by unit and scenario tests.

use crate::domain::{BeaconBlockHeader, CachedBlock, Root, SignedBlockHeader};
use crate::ports::inbound::IndexerCacheApi;
use std::sync::Arc;

/// Deterministic root for the block at `slot` on fork `fork` (0 = main chain).
pub fn block_root(slot: u64, fork: u8) -> Root {
    let mut root = [0u8; 32];
    root[..8].copy_from_slice(&slot.to_be_bytes());
    root[30] = 0xB1;
    root[31] = fork;
    root
}

pub fn make_header(slot: u64, parent_root: Root) -> SignedBlockHeader {
    SignedBlockHeader {
        message: BeaconBlockHeader {
            slot,
            proposer_index: slot % 64,
            parent_root,
            state_root: [0x55; 32],
            body_root: [0x66; 32],
        },
        signature: vec![0; 96],
    }
}

/// Register a block with its header, the way head following does.
pub fn insert_block<C: IndexerCacheApi + ?Sized>(
    cache: &C,
    root: Root,
    slot: u64,
    parent_root: Root,
) -> Arc<CachedBlock> {
    let (block, _) = cache.create_or_get_cached_block(root, slot);
    block.set_header(make_header(slot, parent_root));
    block
}

/// Insert a linear main-chain block for every slot in `slots`, each child
/// pointing at the previous one. Returns the roots in slot order.
pub fn build_chain<C: IndexerCacheApi + ?Sized>(
    cache: &C,
    slots: impl IntoIterator<Item = u64>,
    first_parent: Root,
) -> Vec<Root> {
    let mut parent = first_parent;
    let mut roots = Vec::new();
    for slot in slots {
        let root = block_root(slot, 0);
        insert_block(cache, root, slot, parent);
        roots.push(root);
        parent = root;
    }
    roots
}
