//! Provides a byte budgeted LRU store for cached values.
//!
//! An LRU store drops the least recently used entry once the sum of all key and value lengths
//! grows beyond its budget. Values only have to report their length via [ByteSize], so the store
//! is independent of how values are represented. Within ringcache, the values are
//! [ByteView]s, immutable and cheaply clonable byte buffers.
//!
//! The store is a plain data structure without any internal synchronization. A
//! [Group](crate::group::Group) owns one store per cache namespace and serializes all accesses.
mod byte_view;
mod lru_store;

pub use byte_view::ByteView;
pub use lru_store::ByteSize;
pub use lru_store::EvictionCallback;
pub use lru_store::LRUStore;
