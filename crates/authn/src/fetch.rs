//! Fetching a peer's public key over the key-exchange endpoint.
//!
//! The cluster membership service and the HTTP client live outside this
//! crate. They plug in through [`NodeAddressResolver`] and [`HttpGetClient`];
//! [`RemoteKeyFetcher`] combines them into a [`PublicKeyFetcher`] for the
//! [`PublicKeyCache`](crate::PublicKeyCache).
//!
//! ```text
//! node id → resolve_base_url → GET {base}/admin/info/key?wt=json&omitHeader=true
//!         → {"key": "..."} → NodePublicKey
//! ```

use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    error::{AuthError, FetchError, Result},
    keys::NodePublicKey,
    responder::{KEY_EXCHANGE_PATH, KEY_EXCHANGE_QUERY, KeyExchangeResponse},
};

/// Maps a node identifier to its base URL.
#[async_trait]
pub trait NodeAddressResolver: Send + Sync {
    /// Returns the base URL (scheme, host, port and context path) of `node_id`.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::UnknownNode`] if the node is not a cluster member.
    async fn resolve_base_url(&self, node_id: &str) -> std::result::Result<String, FetchError>;
}

/// Issues an outbound GET and returns the response body.
///
/// Timeouts and cancellation are the implementation's responsibility.
#[async_trait]
pub trait HttpGetClient: Send + Sync {
    /// Fetches `url`.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Transport`] or [`FetchError::Timeout`].
    async fn get(&self, url: &str) -> std::result::Result<Vec<u8>, FetchError>;
}

/// Source of peer public keys for the cache.
#[async_trait]
pub trait PublicKeyFetcher: Send + Sync {
    /// Obtains the current public key of `node_id`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::RemoteKeyFetch`] on any failure.
    async fn fetch(&self, node_id: &str) -> Result<NodePublicKey>;
}

/// Fetches keys from peers' key-exchange endpoints.
#[derive(Clone)]
pub struct RemoteKeyFetcher {
    resolver: Arc<dyn NodeAddressResolver>,
    client: Arc<dyn HttpGetClient>,
}

impl RemoteKeyFetcher {
    /// Creates a fetcher from the membership resolver and HTTP client.
    #[must_use]
    pub fn new(resolver: Arc<dyn NodeAddressResolver>, client: Arc<dyn HttpGetClient>) -> Self {
        Self { resolver, client }
    }
}

/// Builds the key-exchange URL for a peer's base URL.
#[must_use]
pub fn key_exchange_url(base_url: &str) -> String {
    format!("{}{KEY_EXCHANGE_PATH}?{KEY_EXCHANGE_QUERY}", base_url.trim_end_matches('/'))
}

/// Parses a key-exchange response body into a public key.
///
/// # Errors
///
/// Returns [`AuthError::RemoteKeyFetch`] if the body is not JSON, has no
/// `key` field, or the key does not decode.
pub fn parse_key_exchange_body(node_id: &str, body: &[u8]) -> Result<NodePublicKey> {
    let response: KeyExchangeResponse = serde_json::from_slice(body).map_err(|e| {
        AuthError::remote_key_fetch(node_id, format!("unreadable key-exchange response: {e}"))
    })?;

    let Some(key) = response.key else {
        return Err(AuthError::remote_key_fetch(node_id, "response has no 'key' field"));
    };

    NodePublicKey::from_export_string(&key)
        .map_err(|e| AuthError::remote_key_fetch(node_id, format!("undecodable key: {e}")))
}

#[async_trait]
impl PublicKeyFetcher for RemoteKeyFetcher {
    async fn fetch(&self, node_id: &str) -> Result<NodePublicKey> {
        let base_url = self
            .resolver
            .resolve_base_url(node_id)
            .await
            .map_err(|e| AuthError::remote_key_fetch_with_source(node_id, e))?;

        let url = key_exchange_url(&base_url);
        tracing::debug!(node_id, url = %url, "fetching public key");

        let body = self
            .client
            .get(&url)
            .await
            .map_err(|e| AuthError::remote_key_fetch_with_source(node_id, e))?;

        let key = parse_key_exchange_body(node_id, &body)?;
        tracing::info!(node_id, key = %key.to_export_string(), "obtained public key from node");
        Ok(key)
    }
}
