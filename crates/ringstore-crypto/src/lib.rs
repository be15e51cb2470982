//! Hashing primitives for RingStore.
//!
//! Provides a domain-separated BLAKE3 hasher used for two jobs: computing
//! the [`ContentHash`](ringstore_types::ContentHash) that gates updates,
//! and placing keys and vnodes on the ring.

pub mod hasher;

pub use hasher::ContentHasher;
