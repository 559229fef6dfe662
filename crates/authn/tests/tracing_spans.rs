//! Integration test verifying that `#[instrument]` annotations produce the
//! expected spans on the verification path.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::{Arc, Mutex};

use cluster_pki_authn::{
    InboundVerifier, NodeKeyPair, PkiAuthConfig, PublicKeyCache,
    assertion::{encode, format_header},
    testutil::CountingFetcher,
};
use tracing::Subscriber;
use tracing_subscriber::{layer::SubscriberExt, registry::LookupSpan};

// ---------------------------------------------------------------------------
// Collecting layer: records span names as they are created
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
struct SpanCollector {
    spans: Arc<Mutex<Vec<String>>>,
}

impl<S> tracing_subscriber::Layer<S> for SpanCollector
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(
        &self,
        _attrs: &tracing::span::Attributes<'_>,
        id: &tracing::span::Id,
        ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        if let Some(span) = ctx.span(id) {
            self.spans.lock().expect("lock poisoned").push(span.name().to_owned());
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn verify_creates_verification_and_cache_spans() {
    let collector = SpanCollector::default();
    let spans = Arc::clone(&collector.spans);

    let subscriber = tracing_subscriber::registry().with(collector);
    let _guard = tracing::subscriber::set_default(subscriber);

    let sender = NodeKeyPair::generate().unwrap();
    let fetcher = Arc::new(CountingFetcher::new());
    fetcher.set_key("node-a", sender.public_key());
    let cache = Arc::new(PublicKeyCache::new(fetcher));
    let config = PkiAuthConfig::builder().node_id("node-b").build().unwrap();
    let verifier = InboundVerifier::new(&config, cache);

    let header = format_header("node-a", &encode("alice", 1_000, &sender).unwrap());
    verifier.verify_at(Some(&header), 1_000).await.expect("verify should succeed");

    let recorded = spans.lock().expect("lock poisoned");
    for expected in ["verify_at", "get_or_fetch", "fetch_and_store"] {
        assert!(
            recorded.iter().any(|s| s == expected),
            "expected a '{expected}' span, got: {recorded:?}"
        );
    }
}

#[tokio::test]
async fn missing_header_still_creates_verification_span() {
    let collector = SpanCollector::default();
    let spans = Arc::clone(&collector.spans);

    let subscriber = tracing_subscriber::registry().with(collector);
    let _guard = tracing::subscriber::set_default(subscriber);

    let cache = Arc::new(PublicKeyCache::new(Arc::new(CountingFetcher::new())));
    let config = PkiAuthConfig::builder().node_id("node-b").build().unwrap();
    let verifier = InboundVerifier::new(&config, cache);

    assert!(verifier.verify_at(None, 0).await.is_err());

    let recorded = spans.lock().expect("lock poisoned");
    assert!(recorded.iter().any(|s| s == "verify_at"), "got: {recorded:?}");
    assert!(!recorded.iter().any(|s| s == "get_or_fetch"), "got: {recorded:?}");
}
