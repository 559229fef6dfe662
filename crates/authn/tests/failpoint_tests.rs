#![allow(clippy::expect_used, clippy::panic)]
//! Integration tests for fail-point injection in the authn crate.
//!
//! These tests require both `failpoints` and `testutil` features:
//! ```bash
//! cargo test -p cluster-pki-authn --features failpoints,testutil --test failpoint_tests
//! ```

use std::sync::Arc;

use cluster_pki_authn::{
    InboundVerifier, NodeKeyPair, PkiAuthConfig, PublicKeyCache, assert_auth_error,
    assertion::{encode, format_header},
    testutil::CountingFetcher,
};

const NOW: i64 = 1_700_000_000_000;

fn setup() -> (Arc<PublicKeyCache>, NodeKeyPair) {
    let sender = NodeKeyPair::generate().expect("key generation");
    let fetcher = Arc::new(CountingFetcher::new());
    fetcher.set_key("fp-node", sender.public_key());
    (Arc::new(PublicKeyCache::new(fetcher)), sender)
}

#[tokio::test]
async fn cache_fetch_failpoint_returns_error() {
    let scenario = fail::FailScenario::setup();
    let (cache, _) = setup();

    fail::cfg("key-cache-before-fetch", "return").expect("failed to configure fail point");

    let result = cache.get_or_fetch("fp-node").await;
    assert_auth_error!(result, RemoteKeyFetch);
    assert!(cache.get("fp-node").await.is_none(), "failed fetch must not populate the cache");

    scenario.teardown();
}

#[tokio::test]
async fn verifier_degrades_when_fetch_fails() {
    let scenario = fail::FailScenario::setup();
    let (cache, sender) = setup();
    let config = PkiAuthConfig::builder().node_id("fp-receiver").build().expect("config");
    let verifier = InboundVerifier::new(&config, cache);
    let header = format_header("fp-node", &encode("alice", NOW, &sender).expect("encode"));

    fail::cfg("key-cache-before-fetch", "return").expect("failed to configure fail point");

    let result = verifier.verify_at(Some(&header), NOW).await;
    assert_auth_error!(result, RemoteKeyFetch);

    scenario.teardown();
}

#[tokio::test]
async fn cache_fetch_without_failpoint_succeeds() {
    let scenario = fail::FailScenario::setup();
    let (cache, sender) = setup();

    let result = cache.get_or_fetch("fp-node").await;
    assert_eq!(result.expect("fetch should succeed"), sender.public_key());

    scenario.teardown();
}
