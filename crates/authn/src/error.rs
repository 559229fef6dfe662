//! Authentication error types.
//!
//! This module defines the errors produced while generating node keys,
//! sealing and opening identity assertions, fetching peer public keys, and
//! verifying inbound headers.
//!
//! None of these errors abort a request. The interceptors log them and degrade
//! to "unauthenticated", leaving the accept/reject decision to downstream
//! authorization.

use std::sync::Arc;

use thiserror::Error;

/// A shared error type for source chain tracking.
pub type BoxError = Arc<dyn std::error::Error + Send + Sync>;

/// Errors reported by the collaborators that fetch a peer's public key.
///
/// Resolver and HTTP client implementations map their internal failures to
/// these variants. The key cache wraps them as the source of
/// [`AuthError::RemoteKeyFetch`].
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FetchError {
    /// The node identifier could not be mapped to a base URL.
    #[error("Cannot resolve node: {node_id}")]
    UnknownNode {
        /// Node identifier that failed to resolve.
        node_id: String,
    },

    /// The HTTP request failed or returned an unusable status.
    #[error("Transport error: {message}")]
    Transport {
        /// Description of the transport failure.
        message: String,
        /// The underlying client error, if any.
        #[source]
        source: Option<BoxError>,
    },

    /// The request exceeded the client's time limit.
    #[error("Request timeout")]
    Timeout,
}

impl FetchError {
    /// Creates a new `UnknownNode` error.
    #[must_use]
    pub fn unknown_node(node_id: impl Into<String>) -> Self {
        Self::UnknownNode { node_id: node_id.into() }
    }

    /// Creates a new `Transport` error with the given message.
    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport { message: message.into(), source: None }
    }

    /// Creates a new `Transport` error with a message and source error.
    #[must_use]
    pub fn transport_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Transport { message: message.into(), source: Some(Arc::new(source)) }
    }

    /// Creates a new `Timeout` error.
    #[must_use]
    pub fn timeout() -> Self {
        Self::Timeout
    }
}

/// Node authentication errors.
///
/// # Non-exhaustive
///
/// This enum is marked `#[non_exhaustive]`. Downstream match expressions must
/// include a wildcard arm (`_ =>`).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AuthError {
    /// The node key pair could not be generated. Fatal at startup.
    #[error("Key generation failed: {message}")]
    KeyGeneration {
        /// Description of the failure.
        message: String,
    },

    /// The public key of a peer could not be obtained.
    #[error("Failed to fetch public key of node {node_id}: {message}")]
    RemoteKeyFetch {
        /// Node whose key was requested.
        node_id: String,
        /// Description of the failure.
        message: String,
        /// The collaborator error that caused the failure, if any.
        #[source]
        source: Option<FetchError>,
    },

    /// The sealed assertion does not match the public key.
    ///
    /// Wrong or stale key, truncated or corrupted bytes, or tampering. This
    /// is the only error that triggers a forced key refresh.
    #[error("Assertion could not be opened with the sender's public key")]
    DecryptionFailure,

    /// The assertion opened but its content is not `"<principal> <millis>"`.
    #[error("Malformed assertion: {0}")]
    MalformedAssertion(String),

    /// The assertion is older than the validity window.
    #[error("Stale assertion: age {age_ms} ms exceeds {max_ms} ms")]
    StaleAssertion {
        /// Milliseconds between creation and receipt.
        age_ms: i64,
        /// Configured validity window in milliseconds.
        max_ms: i64,
    },

    /// The request carries no authentication header.
    #[error("Missing authentication header")]
    MissingHeader,

    /// The header is not `"<nodeId> <base64>"`.
    #[error("Malformed authentication header: {0}")]
    MalformedHeader(String),

    /// A public key string could not be decoded.
    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),

    /// A principal name cannot be carried in an assertion.
    #[error("Invalid principal: {0}")]
    InvalidPrincipal(String),

    /// The plaintext exceeds the sealing capacity.
    #[error("Payload too large: {len} bytes exceeds {max} bytes")]
    PayloadTooLarge {
        /// Plaintext length.
        len: usize,
        /// Maximum plaintext length.
        max: usize,
    },

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl AuthError {
    /// Creates a new `KeyGeneration` error.
    #[must_use]
    pub fn key_generation(message: impl Into<String>) -> Self {
        Self::KeyGeneration { message: message.into() }
    }

    /// Creates a new `RemoteKeyFetch` error without a collaborator source.
    #[must_use]
    pub fn remote_key_fetch(node_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::RemoteKeyFetch { node_id: node_id.into(), message: message.into(), source: None }
    }

    /// Creates a new `RemoteKeyFetch` error caused by a collaborator failure.
    #[must_use]
    pub fn remote_key_fetch_with_source(node_id: impl Into<String>, source: FetchError) -> Self {
        Self::RemoteKeyFetch {
            node_id: node_id.into(),
            message: source.to_string(),
            source: Some(source),
        }
    }

    /// Creates a new `MalformedAssertion` error.
    #[must_use]
    pub fn malformed_assertion(message: impl Into<String>) -> Self {
        Self::MalformedAssertion(message.into())
    }

    /// Creates a new `StaleAssertion` error.
    #[must_use]
    pub fn stale_assertion(age_ms: i64, max_ms: i64) -> Self {
        Self::StaleAssertion { age_ms, max_ms }
    }

    /// Creates a new `MalformedHeader` error.
    #[must_use]
    pub fn malformed_header(message: impl Into<String>) -> Self {
        Self::MalformedHeader(message.into())
    }

    /// Creates a new `InvalidPublicKey` error.
    #[must_use]
    pub fn invalid_public_key(message: impl Into<String>) -> Self {
        Self::InvalidPublicKey(message.into())
    }

    /// Creates a new `InvalidPrincipal` error.
    #[must_use]
    pub fn invalid_principal(message: impl Into<String>) -> Self {
        Self::InvalidPrincipal(message.into())
    }

    /// Creates a new `Config` error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Returns `true` when refreshing the sender's key may fix the failure.
    ///
    /// A structurally bad payload cannot be fixed by a new key, so only
    /// [`AuthError::DecryptionFailure`] qualifies.
    #[must_use]
    pub fn is_refreshable(&self) -> bool {
        matches!(self, Self::DecryptionFailure)
    }
}

/// Result type alias for authentication operations.
pub type Result<T> = std::result::Result<T, AuthError>;
