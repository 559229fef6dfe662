//! Node key pair and peer public keys.
//!
//! Every node owns one Ed25519 key pair for its whole lifetime. Assertions are
//! *sealed* with the private key: the envelope is the 64-byte signature
//! followed by the plaintext, so any holder of the public key can recover and
//! authenticate the plaintext while only the key owner can produce it.
//!
//! ```text
//! sealed = signature(plaintext) [64 bytes] || plaintext [<= 245 bytes]
//! ```
//!
//! Only the public half ever leaves the process, as a base64url string
//! (no padding) of the raw 32-byte key.

use std::fmt;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use ed25519_dalek::{
    PUBLIC_KEY_LENGTH, SECRET_KEY_LENGTH, SIGNATURE_LENGTH, Signature, Signer, SigningKey,
    VerifyingKey,
};
use rand_core::{OsRng, RngCore};
use zeroize::Zeroizing;

use crate::error::{AuthError, Result};

/// Maximum plaintext length accepted by [`NodeKeyPair::seal`].
///
/// Same as the block capacity of a 2048-bit RSA key with PKCS#1 v1.5 padding.
pub const MAX_SEALED_PAYLOAD: usize = 245;

/// The local node's key pair.
///
/// Generated once at startup and never rotated. The private key is zeroized
/// on drop and never printed.
pub struct NodeKeyPair {
    signing_key: SigningKey,
    public_key: NodePublicKey,
}

impl NodeKeyPair {
    /// Generates a fresh key pair from the operating system RNG.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::KeyGeneration`] if the RNG is unavailable. The
    /// node cannot start without a key pair.
    pub fn generate() -> Result<Self> {
        let mut secret: Zeroizing<[u8; SECRET_KEY_LENGTH]> =
            Zeroizing::new([0u8; SECRET_KEY_LENGTH]);
        OsRng
            .try_fill_bytes(&mut secret[..])
            .map_err(|e| AuthError::key_generation(format!("os rng: {e}")))?;
        Ok(Self::from_secret_bytes(&secret))
    }

    /// Builds a key pair from 32 secret bytes.
    ///
    /// Used by nodes that persist their key and by deterministic tests.
    #[must_use]
    pub fn from_secret_bytes(secret: &[u8; SECRET_KEY_LENGTH]) -> Self {
        let signing_key = SigningKey::from_bytes(secret);
        let public_key = NodePublicKey { verifying_key: signing_key.verifying_key() };
        Self { signing_key, public_key }
    }

    /// Returns the public half.
    #[must_use]
    pub fn public_key(&self) -> NodePublicKey {
        self.public_key
    }

    /// Returns the public key in its transport encoding.
    #[must_use]
    pub fn public_key_export_string(&self) -> String {
        self.public_key.to_export_string()
    }

    /// Seals `plaintext` so that any holder of the public key can open it.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::PayloadTooLarge`] if `plaintext` exceeds
    /// [`MAX_SEALED_PAYLOAD`].
    pub fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        if plaintext.len() > MAX_SEALED_PAYLOAD {
            return Err(AuthError::PayloadTooLarge {
                len: plaintext.len(),
                max: MAX_SEALED_PAYLOAD,
            });
        }

        let signature = self.signing_key.sign(plaintext);
        let mut sealed = Vec::with_capacity(SIGNATURE_LENGTH + plaintext.len());
        sealed.extend_from_slice(&signature.to_bytes());
        sealed.extend_from_slice(plaintext);
        Ok(sealed)
    }
}

impl fmt::Debug for NodeKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeKeyPair").field("public_key", &self.public_key).finish_non_exhaustive()
    }
}

/// A peer's public key.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct NodePublicKey {
    verifying_key: VerifyingKey,
}

impl NodePublicKey {
    /// Decodes a key published by a peer's key-exchange endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidPublicKey`] if the string is not base64url,
    /// has the wrong length, or is not a valid Ed25519 point.
    pub fn from_export_string(encoded: &str) -> Result<Self> {
        let bytes = URL_SAFE_NO_PAD
            .decode(encoded.trim().as_bytes())
            .map_err(|e| AuthError::invalid_public_key(format!("base64 decode: {e}")))?;

        let bytes: [u8; PUBLIC_KEY_LENGTH] = bytes.as_slice().try_into().map_err(|_| {
            AuthError::invalid_public_key(format!(
                "expected {PUBLIC_KEY_LENGTH} bytes, got {}",
                bytes.len()
            ))
        })?;

        let verifying_key = VerifyingKey::from_bytes(&bytes)
            .map_err(|e| AuthError::invalid_public_key(format!("invalid Ed25519 key: {e}")))?;

        Ok(Self { verifying_key })
    }

    /// Encodes the key for transport.
    #[must_use]
    pub fn to_export_string(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.verifying_key.as_bytes())
    }

    /// Opens an envelope produced by [`NodeKeyPair::seal`].
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::DecryptionFailure`] when the envelope is too short
    /// or the signature does not verify under this key.
    pub fn open(&self, sealed: &[u8]) -> Result<Vec<u8>> {
        if sealed.len() < SIGNATURE_LENGTH {
            return Err(AuthError::DecryptionFailure);
        }
        let (signature_bytes, plaintext) = sealed.split_at(SIGNATURE_LENGTH);

        let signature_bytes: [u8; SIGNATURE_LENGTH] =
            signature_bytes.try_into().map_err(|_| AuthError::DecryptionFailure)?;
        let signature = Signature::from_bytes(&signature_bytes);

        self.verifying_key
            .verify_strict(plaintext, &signature)
            .map_err(|_| AuthError::DecryptionFailure)?;

        Ok(plaintext.to_vec())
    }
}

impl fmt::Debug for NodePublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("NodePublicKey").field(&self.to_export_string()).finish()
    }
}
