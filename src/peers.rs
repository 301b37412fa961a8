//! Defines the capabilities a [Group](crate::group::Group) needs to consult its peers.
//!
//! A [PeerPicker] decides which peer owns a key and a [PeerGetter] fetches a value from that
//! peer. Within ringcache, [HttpPool](crate::http::HttpPool) is the picker and
//! [HttpGetter](crate::http::HttpGetter) the getter, but tests or alternative transports can
//! provide their own implementations.
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::CacheError;

/// Locates the peer which owns a given key.
pub trait PeerPicker: Send + Sync {
    /// Returns the getter of the owning peer or **None** if the key is owned by this node itself
    /// (or no peers are known at all).
    fn pick_peer(&self, key: &str) -> Option<Arc<dyn PeerGetter>>;
}

/// Fetches values from a remote peer.
#[async_trait]
pub trait PeerGetter: Send + Sync {
    /// Fetches the value for the given key within the given group from the remote peer.
    async fn get(&self, group: &str, key: &str) -> Result<Bytes, CacheError>;

    /// Returns the base URL (or another printable address) of the remote peer.
    fn address(&self) -> &str;
}
