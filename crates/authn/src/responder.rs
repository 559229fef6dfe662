//! Key-exchange responder.
//!
//! Peers fetch this node's public key from [`KEY_EXCHANGE_PATH`]. The
//! endpoint must be reachable without an assertion header, otherwise two nodes
//! that do not yet know each other's keys could never authenticate.

use serde::{Deserialize, Serialize};

use crate::{
    error::{AuthError, Result},
    keys::NodeKeyPair,
};

/// Path of the key-exchange endpoint, relative to a node's base URL.
pub const KEY_EXCHANGE_PATH: &str = "/admin/info/key";

/// Query string requesting a minimal JSON body.
pub const KEY_EXCHANGE_QUERY: &str = "wt=json&omitHeader=true";

/// Body of the key-exchange endpoint: `{"key": "<public key>"}`.
///
/// Unknown fields are tolerated so that peers may wrap the key in their
/// usual response envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyExchangeResponse {
    /// The public key export string, absent in a broken response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

/// Builds the response for this node.
#[must_use]
pub fn key_exchange_response(key_pair: &NodeKeyPair) -> KeyExchangeResponse {
    KeyExchangeResponse { key: Some(key_pair.public_key_export_string()) }
}

/// Serializes the response body.
///
/// # Errors
///
/// Returns [`AuthError::Config`] if JSON serialization fails.
pub fn key_exchange_body(key_pair: &NodeKeyPair) -> Result<Vec<u8>> {
    serde_json::to_vec(&key_exchange_response(key_pair))
        .map_err(|e| AuthError::config(format!("key-exchange serialization: {e}")))
}

/// Returns `true` if `path` addresses the key-exchange endpoint.
///
/// Query strings are ignored, so callers may pass a raw request URI.
#[must_use]
pub fn is_key_exchange_path(path: &str) -> bool {
    let path = path.split_once('?').map_or(path, |(path, _)| path);
    path.ends_with(KEY_EXCHANGE_PATH)
}
