//! Fuzz target for authentication header parsing and assertion decoding.
//!
//! Feeds arbitrary byte strings as header values and sealed payloads. Every
//! result must be either `Ok(...)` or `Err(AuthError)`, never a panic.

#![no_main]

use std::sync::LazyLock;

use cluster_pki_authn::{NodeKeyPair, assertion};
use libfuzzer_sys::fuzz_target;

static KEY_PAIR: LazyLock<NodeKeyPair> =
    LazyLock::new(|| NodeKeyPair::from_secret_bytes(&[42u8; 32]));

fuzz_target!(|data: &[u8]| {
    let public_key = KEY_PAIR.public_key();

    // Raw bytes as a sealed assertion: must fail cleanly unless validly sealed.
    let _ = assertion::decode(data, &public_key);

    // Validly sealed arbitrary plaintext exercises the payload parser.
    if let Ok(sealed) = KEY_PAIR.seal(data) {
        let _ = assertion::decode(&sealed, &public_key);
    }

    let Ok(value) = std::str::from_utf8(data) else {
        return;
    };

    if let Ok(parsed) = assertion::parse_header(value) {
        let _ = assertion::decode(&parsed.cipher, &public_key);
    }
});
