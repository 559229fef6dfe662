//! # Cluster PKI Node Authentication
//!
//! Node-to-node authentication for a clustered service, without a shared
//! secret or certificate authority.
//!
//! This crate provides:
//! - **Node key pair**: one Ed25519 key pair per node, public half exported
//! - **Identity assertions**: `"<principal> <millis>"` sealed with the sender's key
//! - **Public key cache**: peer keys fetched on demand, refreshed when stale
//! - **Interception points**: outbound stamping and inbound verification
//!
//! ## Flow
//!
//! ```text
//! node A: OutboundStamper ── SolrAuth: "<nodeA> <base64 assertion>" ──► node B: InboundVerifier
//!                                                                        │ key of A cached?
//! node A: key-exchange responder ◄── GET /admin/info/key (on miss) ──────┘
//! ```
//!
//! Failures never abort a request. They leave it unauthenticated and
//! downstream authorization decides whether that is acceptable.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use cluster_pki_authn::{
//!     CallContext, NodeAuthenticator, PkiAuthConfig, RemoteKeyFetcher,
//!     fetch::{HttpGetClient, NodeAddressResolver},
//! };
//!
//! # async fn example(
//! #     resolver: Arc<dyn NodeAddressResolver>,
//! #     client: Arc<dyn HttpGetClient>,
//! # ) -> Result<(), Box<dyn std::error::Error>> {
//! let config = PkiAuthConfig::builder().node_id("10.0.0.1:8983_solr").build()?;
//! let fetcher = Arc::new(RemoteKeyFetcher::new(resolver, client));
//! let auth = NodeAuthenticator::new(config, fetcher)?;
//!
//! // Outbound: the calling pipeline supplies the acting user explicitly.
//! let header = auth.stamper().stamp_header(&CallContext::for_user("alice"));
//!
//! // Inbound: verify the header of a received request.
//! let principal = auth.verifier().verify(header.as_deref()).await?;
//! println!("request acts as {principal}");
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

/// Identity assertion codec and header format.
pub mod assertion;
/// Authentication configuration.
pub mod config;
/// Authentication error types.
pub mod error;
/// Remote public key fetching.
pub mod fetch;
/// Inbound request verification.
pub mod inbound;
/// Peer public key cache.
pub mod key_cache;
/// Node key pair and public keys.
pub mod keys;
/// Per-node wiring.
pub mod node_auth;
/// Outbound request stamping.
pub mod outbound;
/// Authenticated principals.
pub mod principal;
/// Key-exchange endpoint.
pub mod responder;
/// Test doubles for collaborators.
#[cfg(any(test, feature = "testutil"))]
pub mod testutil;

// Re-export key types for convenience
pub use assertion::{Assertion, decode, encode};
pub use config::{DEFAULT_MAX_VALIDITY, PKI_AUTH_HEADER, PkiAuthConfig};
pub use error::{AuthError, FetchError, Result};
pub use fetch::{PublicKeyFetcher, RemoteKeyFetcher};
pub use inbound::{InboundOutcome, InboundRequest, InboundVerifier};
pub use key_cache::PublicKeyCache;
pub use keys::{MAX_SEALED_PAYLOAD, NodeKeyPair, NodePublicKey};
pub use node_auth::NodeAuthenticator;
pub use outbound::{CallContext, OutboundRequest, OutboundStamper};
pub use principal::{NODE_IS_USER, Principal};
pub use responder::{KEY_EXCHANGE_PATH, KeyExchangeResponse};
