//! Inbound request verification.
//!
//! [`InboundVerifier`] runs on every inbound request. It reads the assertion
//! header, resolves the sender's public key, opens the assertion, enforces
//! the replay window, and attaches the resulting [`Principal`].
//!
//! # State Machine
//!
//! ```text
//! key-exchange path ─────────────────────────────► Bypassed
//! no header ─────────────────────────────────────► Unauthenticated(MissingHeader)
//! "<node> <b64>" unparseable ────────────────────► Unauthenticated(MalformedHeader)
//! key = cache.get_or_fetch(node)
//! decode(cipher, key)
//!   ├─ DecryptionFailure / no key ─► refresh key ─► decode again
//!   │                                                ├─ error ─► Unauthenticated(..)
//!   │                                                └─ ok ────┐
//!   ├─ MalformedAssertion ───────────────────────► Unauthenticated(..)
//!   └─ ok ─────────────────────────────────────────────────────┤
//! received - timestamp > max_validity ───────────► Unauthenticated(StaleAssertion)
//! otherwise ─────────────────────────────────────► Authenticated(principal)
//! ```
//!
//! No outcome rejects the request. Unauthenticated requests continue without a
//! principal and downstream authorization decides.

use std::sync::Arc;

use chrono::Utc;

use crate::{
    assertion::{Assertion, ParsedHeader, decode, parse_header},
    config::PkiAuthConfig,
    error::{AuthError, Result},
    key_cache::PublicKeyCache,
    keys::NodePublicKey,
    principal::Principal,
    responder::is_key_exchange_path,
};

/// A request received by the HTTP server.
pub trait InboundRequest {
    /// Returns the request path.
    fn path(&self) -> &str;

    /// Returns the value of header `name`, if present.
    fn header(&self, name: &str) -> Option<&str>;

    /// Attaches the authenticated principal for downstream authorization.
    fn set_principal(&mut self, principal: Principal);
}

/// Result of [`InboundVerifier::authenticate`].
#[derive(Debug)]
pub enum InboundOutcome {
    /// The request targets the key-exchange endpoint and was not inspected.
    Bypassed,
    /// The assertion verified and the principal was attached.
    Authenticated(Principal),
    /// Verification failed. The request continues without a principal.
    Unauthenticated(AuthError),
}

impl InboundOutcome {
    /// Returns the attached principal, if any.
    #[must_use]
    pub fn principal(&self) -> Option<&Principal> {
        match self {
            Self::Authenticated(principal) => Some(principal),
            Self::Bypassed | Self::Unauthenticated(_) => None,
        }
    }
}

/// Verifies identity assertions on inbound requests.
pub struct InboundVerifier {
    header_name: String,
    max_validity_millis: i64,
    cache: Arc<PublicKeyCache>,
}

impl InboundVerifier {
    /// Creates a verifier sharing `cache` with the rest of the node.
    #[must_use]
    pub fn new(config: &PkiAuthConfig, cache: Arc<PublicKeyCache>) -> Self {
        Self {
            header_name: config.header_name().to_owned(),
            max_validity_millis: config.max_validity_millis(),
            cache,
        }
    }

    /// Returns the key cache.
    #[must_use]
    pub fn cache(&self) -> &Arc<PublicKeyCache> {
        &self.cache
    }

    /// Authenticates `request` and attaches its principal on success.
    ///
    /// Never fails: every error is logged and reported as
    /// [`InboundOutcome::Unauthenticated`].
    pub async fn authenticate<R>(&self, request: &mut R) -> InboundOutcome
    where
        R: InboundRequest + ?Sized,
    {
        if is_key_exchange_path(request.path()) {
            tracing::debug!(path = request.path(), "key-exchange request, skipping verification");
            return InboundOutcome::Bypassed;
        }

        let header = request.header(&self.header_name).map(str::to_owned);
        match self.verify(header.as_deref()).await {
            Ok(principal) => {
                request.set_principal(principal.clone());
                InboundOutcome::Authenticated(principal)
            },
            Err(err) => InboundOutcome::Unauthenticated(err),
        }
    }

    /// Verifies a header value received now.
    ///
    /// # Errors
    ///
    /// See [`verify_at`](Self::verify_at).
    pub async fn verify(&self, header: Option<&str>) -> Result<Principal> {
        self.verify_at(header, Utc::now().timestamp_millis()).await
    }

    /// Verifies a header value received at `received_at_millis`.
    ///
    /// # Errors
    ///
    /// - [`AuthError::MissingHeader`] if `header` is `None`
    /// - [`AuthError::MalformedHeader`] if it is not `"<nodeId> <base64>"`
    /// - [`AuthError::RemoteKeyFetch`] if the sender's key cannot be obtained
    /// - [`AuthError::DecryptionFailure`] if the assertion does not open even
    ///   with a freshly fetched key
    /// - [`AuthError::MalformedAssertion`] if the assertion content is invalid
    /// - [`AuthError::StaleAssertion`] if the assertion is older than the
    ///   validity window
    #[tracing::instrument(skip(self, header), fields(header_present = header.is_some()))]
    pub async fn verify_at(
        &self,
        header: Option<&str>,
        received_at_millis: i64,
    ) -> Result<Principal> {
        let Some(header) = header else {
            tracing::error!(header = %self.header_name, "no authentication header present");
            return Err(AuthError::MissingHeader);
        };

        let parsed = parse_header(header).inspect_err(|err| {
            tracing::error!(error = %err, "invalid authentication header");
        })?;

        let assertion = self.decipher(&parsed).await.inspect_err(|err| {
            tracing::error!(
                sender = %parsed.sender_node_id,
                error = %err,
                "could not decipher authentication header, no principal set"
            );
        })?;

        let age_ms = received_at_millis.saturating_sub(assertion.timestamp_millis);
        if age_ms > self.max_validity_millis {
            tracing::warn!(
                sender = %parsed.sender_node_id,
                age_ms,
                max_ms = self.max_validity_millis,
                "stale identity assertion"
            );
            return Err(AuthError::stale_assertion(age_ms, self.max_validity_millis));
        }

        let principal = assertion.resolve_principal();
        tracing::debug!(
            sender = %parsed.sender_node_id,
            principal = %principal,
            "request authenticated"
        );
        Ok(principal)
    }

    /// Opens the assertion, refreshing the sender's key once if needed.
    async fn decipher(&self, parsed: &ParsedHeader) -> Result<Assertion> {
        let sender = parsed.sender_node_id.as_str();

        let cached = match self.cache.get_or_fetch(sender).await {
            Ok(key) => Some(key),
            Err(err) => {
                tracing::warn!(sender, error = %err, "no public key available for sender");
                None
            },
        };

        match decode_with_key(&parsed.cipher, cached.as_ref()) {
            Err(err) if err.is_refreshable() => {
                tracing::warn!(sender, "failed to open assertion, retrying with a refreshed key");
                let refreshed = self.cache.fetch_and_store(sender).await?;
                decode_with_key(&parsed.cipher, Some(&refreshed))
            },
            result => result,
        }
    }
}

/// Decodes with `key`; a missing key counts as a decryption failure so the
/// caller refreshes it.
fn decode_with_key(cipher: &[u8], key: Option<&NodePublicKey>) -> Result<Assertion> {
    match key {
        Some(key) => decode(cipher, key),
        None => Err(AuthError::DecryptionFailure),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::{
        assertion::{encode, format_header},
        keys::NodeKeyPair,
        principal::NODE_IS_USER,
        testutil::{CountingFetcher, TestInboundRequest},
    };

    const NOW: i64 = 1_700_000_000_000;
    const SENDER: &str = "node-a:8983_solr";

    struct Fixture {
        sender: NodeKeyPair,
        fetcher: Arc<CountingFetcher>,
        verifier: InboundVerifier,
    }

    fn fixture() -> Fixture {
        let sender = NodeKeyPair::generate().unwrap();
        let fetcher = Arc::new(CountingFetcher::new());
        fetcher.set_key(SENDER, sender.public_key());
        let cache = Arc::new(PublicKeyCache::new(fetcher.clone()));
        let config = PkiAuthConfig::builder().node_id("node-b:8983_solr").build().unwrap();
        Fixture { sender, fetcher, verifier: InboundVerifier::new(&config, cache) }
    }

    fn header(pair: &NodeKeyPair, principal: &str, timestamp: i64) -> String {
        format_header(SENDER, &encode(principal, timestamp, pair).unwrap())
    }

    #[tokio::test]
    async fn test_user_principal_attached() {
        let f = fixture();
        let value = header(&f.sender, "alice", NOW);

        let principal = f.verifier.verify_at(Some(&value), NOW + 10).await.unwrap();
        assert_eq!(principal, Principal::User("alice".into()));
        assert_eq!(f.fetcher.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_node_sentinel_attached_as_node() {
        let f = fixture();
        let value = header(&f.sender, NODE_IS_USER, NOW);

        let principal = f.verifier.verify_at(Some(&value), NOW).await.unwrap();
        assert_eq!(principal, Principal::Node);
    }

    #[tokio::test]
    async fn test_replay_window_boundary() {
        let f = fixture();
        let max = 5000;

        let fresh = header(&f.sender, "alice", NOW - max + 1);
        assert!(f.verifier.verify_at(Some(&fresh), NOW).await.is_ok());

        let exact = header(&f.sender, "alice", NOW - max);
        assert!(f.verifier.verify_at(Some(&exact), NOW).await.is_ok());

        let stale = header(&f.sender, "alice", NOW - max - 1);
        let result = f.verifier.verify_at(Some(&stale), NOW).await;
        assert!(matches!(
            result,
            Err(AuthError::StaleAssertion { age_ms: 5001, max_ms: 5000 })
        ));
    }

    #[tokio::test]
    async fn test_future_timestamp_accepted() {
        let f = fixture();
        let value = header(&f.sender, "alice", NOW + 2_000);
        assert!(f.verifier.verify_at(Some(&value), NOW).await.is_ok());
    }

    #[tokio::test]
    async fn test_missing_and_malformed_headers() {
        let f = fixture();

        assert!(matches!(f.verifier.verify_at(None, NOW).await, Err(AuthError::MissingHeader)));
        assert!(matches!(
            f.verifier.verify_at(Some("node-a"), NOW).await,
            Err(AuthError::MalformedHeader(_))
        ));
        assert_eq!(f.fetcher.fetch_count(), 0);
    }

    #[tokio::test]
    async fn test_stale_cached_key_is_refreshed() {
        let f = fixture();
        let old = NodeKeyPair::generate().unwrap();
        f.verifier.cache().insert(SENDER, old.public_key()).await;

        let value = header(&f.sender, "alice", NOW);
        let principal = f.verifier.verify_at(Some(&value), NOW).await.unwrap();

        assert_eq!(principal, Principal::User("alice".into()));
        assert_eq!(f.fetcher.fetch_count(), 1);
        assert_eq!(f.verifier.cache().get(SENDER).await, Some(f.sender.public_key()));
    }

    #[tokio::test]
    async fn test_forged_assertion_fails_after_one_refresh() {
        let f = fixture();
        let forger = NodeKeyPair::generate().unwrap();
        let value = header(&forger, "admin", NOW);

        let result = f.verifier.verify_at(Some(&value), NOW).await;
        assert!(matches!(result, Err(AuthError::DecryptionFailure)));
        // initial miss + exactly one forced refresh
        assert_eq!(f.fetcher.fetch_count(), 2);
    }

    #[tokio::test]
    async fn test_malformed_assertion_is_not_retried() {
        let f = fixture();
        let cipher = f.sender.seal(b"alice yesterday").unwrap();
        let value = format_header(SENDER, &cipher);

        let result = f.verifier.verify_at(Some(&value), NOW).await;
        assert!(matches!(result, Err(AuthError::MalformedAssertion(_))));
        assert_eq!(f.fetcher.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_unreachable_sender() {
        let f = fixture();
        f.fetcher.remove_key(SENDER);
        let value = header(&f.sender, "alice", NOW);

        let result = f.verifier.verify_at(Some(&value), NOW).await;
        assert!(matches!(result, Err(AuthError::RemoteKeyFetch { .. })));
        assert_eq!(f.fetcher.fetch_count(), 2);
    }

    #[tokio::test]
    async fn test_authenticate_attaches_principal() {
        let f = fixture();
        let value = header(&f.sender, "alice", Utc::now().timestamp_millis());
        let mut request =
            TestInboundRequest::new("/solr/collection1/select").with_header("SolrAuth", &value);

        let outcome = f.verifier.authenticate(&mut request).await;
        assert_eq!(outcome.principal(), Some(&Principal::User("alice".into())));
        assert_eq!(request.principal, Some(Principal::User("alice".into())));
    }

    #[tokio::test]
    async fn test_authenticate_passes_through_without_header() {
        let f = fixture();
        let mut request = TestInboundRequest::new("/solr/collection1/select");

        let outcome = f.verifier.authenticate(&mut request).await;
        assert!(matches!(outcome, InboundOutcome::Unauthenticated(AuthError::MissingHeader)));
        assert!(request.principal.is_none());
    }

    #[tokio::test]
    async fn test_authenticate_bypasses_key_exchange() {
        let f = fixture();
        let mut request =
            TestInboundRequest::new("/solr/admin/info/key").with_header("SolrAuth", "garbage");

        let outcome = f.verifier.authenticate(&mut request).await;
        assert!(matches!(outcome, InboundOutcome::Bypassed));
        assert!(request.principal.is_none());
        assert_eq!(f.fetcher.fetch_count(), 0);
    }
}
