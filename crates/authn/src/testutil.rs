//! Shared test utilities for node authentication.
//!
//! In-memory stand-ins for the collaborators this crate depends on: the
//! membership resolver, the HTTP client, the key fetcher, and inbound/outbound
//! requests. Feature-gated behind `testutil` to keep them out of production
//! builds.
//!
//! # Usage
//!
//! ```toml
//! [dev-dependencies]
//! cluster-pki-authn = { path = "../authn", features = ["testutil"] }
//! ```

use std::{
    collections::HashMap,
    sync::atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::{
    error::{AuthError, FetchError, Result},
    fetch::{HttpGetClient, NodeAddressResolver, PublicKeyFetcher},
    inbound::InboundRequest,
    keys::NodePublicKey,
    outbound::OutboundRequest,
    principal::Principal,
};

/// Resolver backed by a fixed node id → base URL table.
#[derive(Default)]
pub struct StaticResolver {
    urls: RwLock<HashMap<String, String>>,
}

impl StaticResolver {
    /// Creates an empty resolver. Every lookup fails until nodes are inserted.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `node_id` at `base_url`.
    pub fn insert(&self, node_id: &str, base_url: &str) {
        self.urls.write().insert(node_id.to_owned(), base_url.to_owned());
    }
}

#[async_trait]
impl NodeAddressResolver for StaticResolver {
    async fn resolve_base_url(&self, node_id: &str) -> std::result::Result<String, FetchError> {
        self.urls.read().get(node_id).cloned().ok_or_else(|| FetchError::unknown_node(node_id))
    }
}

/// HTTP client that serves scripted bodies per URL.
///
/// Unscripted URLs fail with a transport error, like an unreachable peer.
#[derive(Default)]
pub struct ScriptedHttpClient {
    bodies: RwLock<HashMap<String, Vec<u8>>>,
    requests: AtomicUsize,
}

impl ScriptedHttpClient {
    /// Creates a client with no scripted responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serves `body` for `url`, replacing any previous script.
    pub fn respond(&self, url: &str, body: Vec<u8>) {
        self.bodies.write().insert(url.to_owned(), body);
    }

    /// Makes `url` unreachable again.
    pub fn fail(&self, url: &str) {
        self.bodies.write().remove(url);
    }

    /// Returns the number of GETs issued so far.
    #[must_use]
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HttpGetClient for ScriptedHttpClient {
    async fn get(&self, url: &str) -> std::result::Result<Vec<u8>, FetchError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        self.bodies
            .read()
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::transport(format!("connection refused: {url}")))
    }
}

/// Key fetcher that returns configured keys and counts calls.
#[derive(Default)]
pub struct CountingFetcher {
    keys: RwLock<HashMap<String, NodePublicKey>>,
    fetches: AtomicUsize,
}

impl CountingFetcher {
    /// Creates a fetcher that knows no keys.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent fetches of `node_id` return `key`.
    pub fn set_key(&self, node_id: &str, key: NodePublicKey) {
        self.keys.write().insert(node_id.to_owned(), key);
    }

    /// Makes subsequent fetches of `node_id` fail.
    pub fn remove_key(&self, node_id: &str) {
        self.keys.write().remove(node_id);
    }

    /// Returns the number of fetches so far.
    #[must_use]
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PublicKeyFetcher for CountingFetcher {
    async fn fetch(&self, node_id: &str) -> Result<NodePublicKey> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.keys
            .read()
            .get(node_id)
            .copied()
            .ok_or_else(|| AuthError::remote_key_fetch(node_id, "node unreachable"))
    }
}

/// Outbound request that records the headers set on it.
#[derive(Debug, Default)]
pub struct RecordingRequest {
    /// Headers set by interceptors.
    pub headers: HashMap<String, String>,
}

impl RecordingRequest {
    /// Creates a request with no headers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value of header `name`.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }
}

impl OutboundRequest for RecordingRequest {
    fn set_header(&mut self, name: &str, value: String) {
        self.headers.insert(name.to_owned(), value);
    }
}

/// Inbound request with a path, headers, and the principal attached to it.
#[derive(Debug, Default)]
pub struct TestInboundRequest {
    /// Request path.
    pub path: String,
    /// Request headers.
    pub headers: HashMap<String, String>,
    /// Principal attached by the verifier.
    pub principal: Option<Principal>,
}

impl TestInboundRequest {
    /// Creates a request for `path` with no headers.
    #[must_use]
    pub fn new(path: &str) -> Self {
        Self { path: path.to_owned(), ..Self::default() }
    }

    /// Adds a header.
    #[must_use]
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_owned(), value.to_owned());
        self
    }
}

impl InboundRequest for TestInboundRequest {
    fn path(&self) -> &str {
        &self.path
    }

    fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    fn set_principal(&mut self, principal: Principal) {
        self.principal = Some(principal);
    }
}

/// Asserts that a [`Result<T, AuthError>`] is an `Err` matching the given variant.
///
/// ```no_run
/// // Requires the `testutil` feature to be enabled.
/// use cluster_pki_authn::{assert_auth_error, error::AuthError};
///
/// let result: Result<(), AuthError> = Err(AuthError::DecryptionFailure);
/// assert_auth_error!(result, DecryptionFailure);
/// ```
#[macro_export]
macro_rules! assert_auth_error {
    ($result:expr, $variant:ident) => {
        match &$result {
            Err($crate::error::AuthError::$variant { .. }) => {},
            other => panic!(
                "expected Err(AuthError::{}), got: {:?}",
                stringify!($variant),
                other
            ),
        }
    };
}
