//! Ports module for the Indexer Cache

pub mod inbound;
pub mod outbound;

pub use inbound::IndexerCacheApi;
pub use outbound::{
    CanonicalBlockMap, IndexerStore, StoreTransaction, Synchronizer, VoteAggregator,
};
