//! # agentdb-temporal
//!
//! The time index of the episode store: an order-32 B+ tree keyed by
//! epoch-millisecond timestamps whose leaves hold episode-id buckets and
//! form a doubly linked chain, so range scans walk sideways instead of
//! re-descending. Nodes live in an arena of slots addressed by index,
//! which keeps parent/child/sibling references free of ownership cycles.

pub mod btree;
pub mod snapshot;

pub use btree::{TimeIndex, TimeIndexStats, DEFAULT_ORDER};
pub use snapshot::{persist, restore, TIME_INDEX_VERSION};
