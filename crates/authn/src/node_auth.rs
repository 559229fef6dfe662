//! Per-node wiring of the authentication components.
//!
//! [`NodeAuthenticator`] owns the node's key pair and the shared key cache and
//! hands out the two interception points plus the key-exchange responder. It
//! is constructed once at node startup and shared via `Arc`.

use std::sync::Arc;

use crate::{
    config::PkiAuthConfig,
    error::Result,
    fetch::PublicKeyFetcher,
    inbound::{InboundOutcome, InboundRequest, InboundVerifier},
    key_cache::PublicKeyCache,
    keys::NodeKeyPair,
    outbound::{CallContext, OutboundRequest, OutboundStamper},
    responder::{KeyExchangeResponse, key_exchange_response},
};

/// The authentication state of one cluster node.
pub struct NodeAuthenticator {
    config: PkiAuthConfig,
    key_pair: Arc<NodeKeyPair>,
    stamper: OutboundStamper,
    verifier: InboundVerifier,
}

impl NodeAuthenticator {
    /// Validates `config`, generates the node key pair, and wires the cache
    /// to `fetcher`.
    ///
    /// # Errors
    ///
    /// - [`AuthError::Config`](crate::AuthError::Config) if `config` is invalid
    /// - [`AuthError::KeyGeneration`](crate::AuthError::KeyGeneration) if no key
    ///   pair can be generated; the node must not start
    pub fn new(config: PkiAuthConfig, fetcher: Arc<dyn PublicKeyFetcher>) -> Result<Self> {
        let key_pair = NodeKeyPair::generate()?;
        Self::with_key_pair(config, key_pair, fetcher)
    }

    /// Like [`new`](Self::new) with an existing key pair.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Config`](crate::AuthError::Config) if `config` is invalid.
    pub fn with_key_pair(
        config: PkiAuthConfig,
        key_pair: NodeKeyPair,
        fetcher: Arc<dyn PublicKeyFetcher>,
    ) -> Result<Self> {
        config.validate()?;

        let key_pair = Arc::new(key_pair);
        let cache = Arc::new(PublicKeyCache::new(fetcher));
        let stamper = OutboundStamper::new(&config, Arc::clone(&key_pair));
        let verifier = InboundVerifier::new(&config, cache);

        tracing::info!(
            node_id = config.node_id(),
            enabled = config.enabled(),
            max_validity_ms = config.max_validity_millis(),
            public_key = %key_pair.public_key_export_string(),
            "node authentication initialized"
        );

        Ok(Self { config, key_pair, stamper, verifier })
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &PkiAuthConfig {
        &self.config
    }

    /// Returns the node key pair.
    #[must_use]
    pub fn key_pair(&self) -> &Arc<NodeKeyPair> {
        &self.key_pair
    }

    /// Returns the shared public key cache.
    #[must_use]
    pub fn cache(&self) -> &Arc<PublicKeyCache> {
        self.verifier.cache()
    }

    /// Returns the outbound interception point.
    #[must_use]
    pub fn stamper(&self) -> &OutboundStamper {
        &self.stamper
    }

    /// Returns the inbound interception point.
    #[must_use]
    pub fn verifier(&self) -> &InboundVerifier {
        &self.verifier
    }

    /// Stamps an outbound request, see [`OutboundStamper::stamp`].
    pub fn stamp(&self, request: &mut dyn OutboundRequest, context: &CallContext) -> bool {
        self.stamper.stamp(request, context)
    }

    /// Authenticates an inbound request, see [`InboundVerifier::authenticate`].
    pub async fn authenticate<R>(&self, request: &mut R) -> InboundOutcome
    where
        R: InboundRequest + ?Sized,
    {
        self.verifier.authenticate(request).await
    }

    /// Returns the key-exchange response for this node.
    #[must_use]
    pub fn key_exchange_response(&self) -> KeyExchangeResponse {
        key_exchange_response(&self.key_pair)
    }
}
