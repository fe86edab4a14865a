//! # Adapters Layer (Hexagonal Architecture)
//!
//! Outbound port implementations that need no external system: the
//! in-memory store and recording collaborators.

mod collaborators;
mod store;

pub use collaborators::{AggregationCall, MockSynchronizer, MockVoteAggregator};
pub use store::{InMemoryIndexerStore, InMemoryTransaction};
