//! Cache of peer public keys.
//!
//! [`PublicKeyCache`] maps node identifiers to their public keys. It is filled
//! lazily through a [`PublicKeyFetcher`] and is shared by every inbound
//! verification on the node.
//!
//! # Cache Strategy
//!
//! - **Population**: on the first lookup of a node (fetch on miss)
//! - **Expiry**: none, entries live for the process lifetime
//! - **Invalidation**: an assertion that fails to open triggers
//!   [`fetch_and_store`](PublicKeyCache::fetch_and_store), which overwrites
//!   the entry. Entries are never removed.
//!
//! An entry may be stale but never corrupt: a failed fetch leaves the previous
//! entry in place.

use std::sync::Arc;

use fail::fail_point;
use moka::future::Cache;

use crate::{
    error::Result,
    fetch::PublicKeyFetcher,
    keys::NodePublicKey,
};

/// Concurrent map of node id → public key.
///
/// Backed by a [`moka::future::Cache`] without TTL or capacity bound, which
/// shards its storage internally so unrelated nodes never contend on a single
/// lock. Concurrent misses for the same node may each fetch; the last write
/// wins and every write is a complete key.
pub struct PublicKeyCache {
    keys: Cache<String, NodePublicKey>,
    fetcher: Arc<dyn PublicKeyFetcher>,
}

impl PublicKeyCache {
    /// Creates an empty cache backed by `fetcher`.
    #[must_use]
    pub fn new(fetcher: Arc<dyn PublicKeyFetcher>) -> Self {
        Self { keys: Cache::builder().build(), fetcher }
    }

    /// Returns the cached key of `node_id`, if any. Never fetches.
    pub async fn get(&self, node_id: &str) -> Option<NodePublicKey> {
        self.keys.get(node_id).await
    }

    /// Returns whether a key for `node_id` is cached.
    #[must_use]
    pub fn contains(&self, node_id: &str) -> bool {
        self.keys.contains_key(node_id)
    }

    /// Fetches the current key of `node_id` and stores it, replacing any
    /// previous entry.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::RemoteKeyFetch`](crate::error::AuthError::RemoteKeyFetch) if resolution, the request, or
    /// key decoding fails. The cache is not modified in that case.
    #[tracing::instrument(skip(self))]
    pub async fn fetch_and_store(&self, node_id: &str) -> Result<NodePublicKey> {
        fail_point!("key-cache-before-fetch", |_| {
            Err(crate::error::AuthError::remote_key_fetch(
                node_id,
                "injected failure before fetch",
            ))
        });

        match self.fetcher.fetch(node_id).await {
            Ok(key) => {
                self.keys.insert(node_id.to_owned(), key).await;
                tracing::debug!("stored public key");
                Ok(key)
            },
            Err(err) => {
                tracing::warn!(error = %err, "public key fetch failed, cache unchanged");
                Err(err)
            },
        }
    }

    /// Returns the cached key of `node_id`, fetching it on a miss.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::RemoteKeyFetch`](crate::error::AuthError::RemoteKeyFetch) if the key is not cached and
    /// cannot be fetched.
    #[tracing::instrument(skip(self))]
    pub async fn get_or_fetch(&self, node_id: &str) -> Result<NodePublicKey> {
        if let Some(key) = self.keys.get(node_id).await {
            tracing::debug!(cache = "hit", "public key cache hit");
            return Ok(key);
        }
        tracing::debug!(cache = "miss", "no key cached for node, fetching now");
        self.fetch_and_store(node_id).await
    }

    /// Returns the number of cached keys.
    ///
    /// Eventually consistent, call `sync` first in tests.
    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.keys.entry_count()
    }

    /// Inserts a key directly, bypassing the fetcher.
    #[cfg(any(test, feature = "testutil"))]
    pub async fn insert(&self, node_id: &str, key: NodePublicKey) {
        self.keys.insert(node_id.to_owned(), key).await;
    }

    /// Applies pending cache maintenance so counts are exact.
    #[cfg(any(test, feature = "testutil"))]
    pub async fn sync(&self) {
        self.keys.run_pending_tasks().await;
    }
}
