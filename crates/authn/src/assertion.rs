//! Identity assertion codec and header wire format.
//!
//! An assertion is the plaintext `"<principal> <timestampMillis>"` sealed with
//! the sender's private key. On the wire it travels in a single header:
//!
//! ```text
//! SolrAuth: <senderNodeId> <base64(sealed assertion)>
//! ```
//!
//! Decoding distinguishes two failures. [`AuthError::DecryptionFailure`] means
//! the key is wrong or stale and is worth a refresh.
//! [`AuthError::MalformedAssertion`] means the payload opened but is not in
//! the expected shape, which a new key cannot fix.

use base64::{Engine, engine::general_purpose::STANDARD};

use crate::{
    error::{AuthError, Result},
    keys::{NodeKeyPair, NodePublicKey},
    principal::Principal,
};

/// A decoded identity assertion.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Assertion {
    /// The claimed principal name, [`NODE_IS_USER`](crate::NODE_IS_USER) for the node itself.
    pub principal: String,
    /// Creation time in milliseconds since the Unix epoch.
    pub timestamp_millis: i64,
}

impl Assertion {
    /// Resolves the claimed name to a [`Principal`].
    #[must_use]
    pub fn resolve_principal(&self) -> Principal {
        Principal::from_claimed(&self.principal)
    }
}

/// Seals `"<principal> <timestamp_millis>"` with the local key pair.
///
/// # Errors
///
/// - [`AuthError::InvalidPrincipal`] if `principal` is empty or contains
///   whitespace, since it could not be split back out
/// - [`AuthError::PayloadTooLarge`] if the plaintext exceeds the sealing capacity
pub fn encode(principal: &str, timestamp_millis: i64, key_pair: &NodeKeyPair) -> Result<Vec<u8>> {
    if principal.is_empty() {
        return Err(AuthError::invalid_principal("principal name is empty"));
    }
    if principal.chars().any(char::is_whitespace) {
        return Err(AuthError::invalid_principal(format!(
            "principal '{principal}' contains whitespace"
        )));
    }

    let plaintext = format!("{principal} {timestamp_millis}");
    key_pair.seal(plaintext.as_bytes())
}

/// Opens a sealed assertion with the sender's public key and parses it.
///
/// # Errors
///
/// - [`AuthError::DecryptionFailure`] if the envelope does not verify under `public_key`
/// - [`AuthError::MalformedAssertion`] if the plaintext is not UTF-8, has fewer
///   than two tokens, or the timestamp is not an integer
pub fn decode(cipher: &[u8], public_key: &NodePublicKey) -> Result<Assertion> {
    let plaintext = public_key.open(cipher)?;
    let plaintext = String::from_utf8(plaintext)
        .map_err(|_| AuthError::malformed_assertion("payload is not valid UTF-8"))?;

    let Some((principal, timestamp)) = plaintext.trim().split_once(' ') else {
        return Err(AuthError::malformed_assertion("expected '<principal> <timestamp>'"));
    };
    if principal.is_empty() {
        return Err(AuthError::malformed_assertion("empty principal"));
    }

    let timestamp_millis = timestamp
        .parse::<i64>()
        .map_err(|_| AuthError::malformed_assertion(format!("invalid timestamp '{timestamp}'")))?;

    Ok(Assertion { principal: principal.to_owned(), timestamp_millis })
}

/// A header split into its sender and sealed assertion.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedHeader {
    /// Node that claims to have sent the request.
    pub sender_node_id: String,
    /// The sealed assertion bytes.
    pub cipher: Vec<u8>,
}

/// Builds the header value `"<sender_node_id> <base64(cipher)>"`.
#[must_use]
pub fn format_header(sender_node_id: &str, cipher: &[u8]) -> String {
    format!("{sender_node_id} {}", STANDARD.encode(cipher))
}

/// Splits a header value into sender and sealed assertion.
///
/// Tokens are whitespace-separated; tokens beyond the second are ignored.
///
/// # Errors
///
/// Returns [`AuthError::MalformedHeader`] if there are fewer than two tokens
/// or the second token is not base64.
pub fn parse_header(value: &str) -> Result<ParsedHeader> {
    let mut tokens = value.split_whitespace();
    let (Some(sender_node_id), Some(cipher_b64)) = (tokens.next(), tokens.next()) else {
        return Err(AuthError::malformed_header("expected '<nodeId> <base64 assertion>'"));
    };

    let cipher = STANDARD
        .decode(cipher_b64)
        .map_err(|e| AuthError::malformed_header(format!("assertion is not base64: {e}")))?;

    Ok(ParsedHeader { sender_node_id: sender_node_id.to_owned(), cipher })
}
