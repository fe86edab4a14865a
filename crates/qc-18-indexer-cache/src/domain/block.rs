//! Cached block entity
//!
//! One observed beacon block. Blocks reference their parent only by root;
//! the parent itself lives in the cache's root index, never inside the child.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// 32-byte content-derived block identifier.
pub type Root = [u8; 32];

/// Render a root the way block explorers display it.
pub fn format_root(root: &Root) -> String {
    format!("0x{}", hex::encode(root))
}

/// Render an optional root, empty roots as `0x`.
pub fn format_opt_root(root: Option<&Root>) -> String {
    root.map(format_root).unwrap_or_else(|| "0x".to_string())
}

/// Beacon block header message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeaconBlockHeader {
    pub slot: u64,
    pub proposer_index: u64,
    pub parent_root: Root,
    pub state_root: Root,
    pub body_root: Root,
}

/// Header plus proposer signature, as served by the chain client.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedBlockHeader {
    pub message: BeaconBlockHeader,
    pub signature: Vec<u8>,
}

impl SignedBlockHeader {
    pub fn parent_root(&self) -> Root {
        self.message.parent_root
    }
}

#[derive(Debug, Default)]
struct CachedBlockPayload {
    header: Option<SignedBlockHeader>,
    is_in_db: bool,
}

/// A block held in the unfinalized cache.
///
/// `root` and `slot` are immutable. The header arrives later than the block
/// announcement, so it sits behind the block's own lock; readers walking the
/// parent chain only hold that lock long enough to copy the parent root.
#[derive(Debug)]
pub struct CachedBlock {
    pub root: Root,
    pub slot: u64,
    payload: RwLock<CachedBlockPayload>,
}

impl CachedBlock {
    pub fn new(root: Root, slot: u64) -> Self {
        Self {
            root,
            slot,
            payload: RwLock::new(CachedBlockPayload::default()),
        }
    }

    /// Parent root, `None` until the header has been fetched.
    pub fn parent_root(&self) -> Option<Root> {
        self.payload
            .read()
            .header
            .as_ref()
            .map(SignedBlockHeader::parent_root)
    }

    pub fn header(&self) -> Option<SignedBlockHeader> {
        self.payload.read().header.clone()
    }

    /// Attach the fetched header. The first header wins; the parent link is
    /// read-only once set.
    pub fn set_header(&self, header: SignedBlockHeader) -> bool {
        let mut payload = self.payload.write();
        if payload.header.is_some() {
            return false;
        }
        payload.header = Some(header);
        true
    }

    /// Whether the unfinalized representation of this block is already stored.
    pub fn is_in_db(&self) -> bool {
        self.payload.read().is_in_db
    }

    /// Restore path: header and in-db flag are set together under one lock.
    pub(crate) fn restore(&self, header: SignedBlockHeader) {
        let mut payload = self.payload.write();
        payload.header = Some(header);
        payload.is_in_db = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(slot: u64, parent: Root) -> SignedBlockHeader {
        SignedBlockHeader {
            message: BeaconBlockHeader {
                slot,
                proposer_index: 7,
                parent_root: parent,
                state_root: [0; 32],
                body_root: [0; 32],
            },
            signature: vec![0; 96],
        }
    }

    #[test]
    fn test_parent_root_absent_until_header_set() {
        let block = CachedBlock::new([1; 32], 10);
        assert!(block.parent_root().is_none());

        assert!(block.set_header(header(10, [9; 32])));
        assert_eq!(block.parent_root(), Some([9; 32]));
    }

    #[test]
    fn test_header_is_write_once() {
        let block = CachedBlock::new([1; 32], 10);
        assert!(block.set_header(header(10, [9; 32])));
        assert!(!block.set_header(header(10, [8; 32])));
        assert_eq!(block.parent_root(), Some([9; 32]));
    }

    #[test]
    fn test_restore_marks_in_db() {
        let block = CachedBlock::new([1; 32], 10);
        block.restore(header(10, [9; 32]));
        assert!(block.is_in_db());
        assert!(block.header().is_some());
    }

    #[test]
    fn test_format_root() {
        let rendered = format_root(&[0xab; 32]);
        assert!(rendered.starts_with("0xabab"));
        assert_eq!(rendered.len(), 66);
        assert_eq!(format_opt_root(None), "0x");
    }
}
