//! Outbound request stamping.
//!
//! [`OutboundStamper`] runs once per inter-node request before it is sent and
//! attaches the identity assertion header. It never fails the request: when
//! no assertion can be produced the request simply goes out without one.

use std::sync::Arc;

use chrono::Utc;

use crate::{
    assertion::{encode, format_header},
    config::PkiAuthConfig,
    keys::NodeKeyPair,
    principal::NODE_IS_USER,
};

/// A request the HTTP client is about to send.
pub trait OutboundRequest {
    /// Sets header `name` to `value`, replacing any previous value.
    fn set_header(&mut self, name: &str, value: String);
}

/// Who is making an outbound call, supplied by the calling pipeline.
///
/// Only [`CallContext::NodeInitiated`] asserts the node's own identity. A
/// call forwarded while serving an anonymous request carries no header, so the
/// peer treats it as unauthenticated rather than as the node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CallContext {
    /// A call made while serving an inbound request.
    Request {
        /// The request's authenticated end user, `None` if anonymous.
        principal: Option<String>,
    },
    /// A call the node makes on its own behalf, outside any request.
    NodeInitiated,
    /// A call from outside the cluster's request handling (tools, tests
    /// calling code directly).
    External,
}

impl CallContext {
    /// A call made on behalf of end user `name`.
    #[must_use]
    pub fn for_user(name: impl Into<String>) -> Self {
        Self::Request { principal: Some(name.into()) }
    }

    /// A call made while serving a request whose user is `principal`.
    #[must_use]
    pub fn for_request(principal: Option<String>) -> Self {
        Self::Request { principal }
    }

    /// A call the node makes on its own behalf.
    #[must_use]
    pub fn internal() -> Self {
        Self::NodeInitiated
    }

    /// A call from outside the cluster's request handling.
    #[must_use]
    pub fn external() -> Self {
        Self::External
    }

    /// Returns the principal name to assert, or `None` to send no header.
    #[must_use]
    pub fn acting_principal(&self) -> Option<&str> {
        match self {
            Self::Request { principal } => principal.as_deref(),
            Self::NodeInitiated => Some(NODE_IS_USER),
            Self::External => None,
        }
    }
}

/// Attaches identity assertions to outbound inter-node requests.
pub struct OutboundStamper {
    node_id: String,
    header_name: String,
    enabled: bool,
    key_pair: Arc<NodeKeyPair>,
}

impl OutboundStamper {
    /// Creates a stamper for this node.
    #[must_use]
    pub fn new(config: &PkiAuthConfig, key_pair: Arc<NodeKeyPair>) -> Self {
        Self {
            node_id: config.node_id().to_owned(),
            header_name: config.header_name().to_owned(),
            enabled: config.enabled(),
            key_pair,
        }
    }

    /// Returns the header name this stamper sets.
    #[must_use]
    pub fn header_name(&self) -> &str {
        &self.header_name
    }

    /// Builds the header value for a call made now, or `None` if the call
    /// should not be stamped.
    #[must_use]
    pub fn stamp_header(&self, context: &CallContext) -> Option<String> {
        self.stamp_header_at(context, Utc::now().timestamp_millis())
    }

    /// Builds the header value for a call made at `now_millis`.
    #[must_use]
    pub fn stamp_header_at(&self, context: &CallContext, now_millis: i64) -> Option<String> {
        if !self.enabled {
            return None;
        }

        let principal = context.acting_principal()?;

        match encode(principal, now_millis, &self.key_pair) {
            Ok(cipher) => Some(format_header(&self.node_id, &cipher)),
            Err(err) => {
                tracing::warn!(
                    node_id = %self.node_id,
                    error = %err,
                    "could not build identity assertion, sending request without it"
                );
                None
            },
        }
    }

    /// Stamps `request`. Returns whether a header was attached.
    pub fn stamp(&self, request: &mut dyn OutboundRequest, context: &CallContext) -> bool {
        match self.stamp_header(context) {
            Some(value) => {
                request.set_header(&self.header_name, value);
                true
            },
            None => false,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::{assertion::parse_header, testutil::RecordingRequest};

    fn stamper(enabled: bool) -> (OutboundStamper, Arc<NodeKeyPair>) {
        let config =
            PkiAuthConfig::builder().node_id("node-a:8983_solr").enabled(enabled).build().unwrap();
        let key_pair = Arc::new(NodeKeyPair::generate().unwrap());
        (OutboundStamper::new(&config, key_pair.clone()), key_pair)
    }

    #[test]
    fn test_acting_principal() {
        assert_eq!(CallContext::for_user("alice").acting_principal(), Some("alice"));
        assert_eq!(CallContext::internal().acting_principal(), Some("$"));
        assert_eq!(CallContext::external().acting_principal(), None);
        assert_eq!(CallContext::for_request(Some("bob".into())).acting_principal(), Some("bob"));
        assert_eq!(CallContext::for_request(None).acting_principal(), None);
    }

    #[test]
    fn test_anonymous_request_is_not_stamped_as_node() {
        let (stamper, _) = stamper(true);
        let mut request = RecordingRequest::new();

        assert!(!stamper.stamp(&mut request, &CallContext::for_request(None)));
        assert!(request.headers.is_empty());
        assert!(stamper.stamp_header_at(&CallContext::for_request(None), 1234).is_none());
    }

    #[test]
    fn test_user_call_is_stamped() {
        let (stamper, key_pair) = stamper(true);
        let mut request = RecordingRequest::new();

        assert!(stamper.stamp(&mut request, &CallContext::for_user("alice")));

        let value = request.header("SolrAuth").expect("header set");
        let parsed = parse_header(value).unwrap();
        assert_eq!(parsed.sender_node_id, "node-a:8983_solr");

        let assertion = crate::assertion::decode(&parsed.cipher, &key_pair.public_key()).unwrap();
        assert_eq!(assertion.principal, "alice");
    }

    #[test]
    fn test_internal_call_uses_node_sentinel() {
        let (stamper, key_pair) = stamper(true);
        let value = stamper.stamp_header_at(&CallContext::internal(), 1234).unwrap();

        let parsed = parse_header(&value).unwrap();
        let assertion = crate::assertion::decode(&parsed.cipher, &key_pair.public_key()).unwrap();
        assert_eq!(assertion.principal, NODE_IS_USER);
        assert_eq!(assertion.timestamp_millis, 1234);
    }

    #[test]
    fn test_external_call_is_not_stamped() {
        let (stamper, _) = stamper(true);
        let mut request = RecordingRequest::new();

        assert!(!stamper.stamp(&mut request, &CallContext::external()));
        assert!(request.headers.is_empty());
    }

    #[test]
    fn test_disabled_stamper_does_nothing() {
        let (stamper, _) = stamper(false);
        let mut request = RecordingRequest::new();

        assert!(!stamper.stamp(&mut request, &CallContext::for_user("alice")));
        assert!(!stamper.stamp(&mut request, &CallContext::internal()));
        assert!(request.headers.is_empty());
    }

    #[test]
    fn test_unencodable_principal_sends_no_header() {
        let (stamper, _) = stamper(true);
        let mut request = RecordingRequest::new();

        assert!(!stamper.stamp(&mut request, &CallContext::for_user("John Smith")));
        assert!(!stamper.stamp(&mut request, &CallContext::for_user("x".repeat(400))));
        assert!(request.headers.is_empty());
    }

    #[test]
    fn test_custom_header_name() {
        let config =
            PkiAuthConfig::builder().node_id("node-a").header_name("X-Node-Auth").build().unwrap();
        let stamper = OutboundStamper::new(&config, Arc::new(NodeKeyPair::generate().unwrap()));
        let mut request = RecordingRequest::new();

        assert!(stamper.stamp(&mut request, &CallContext::internal()));
        assert!(request.header("X-Node-Auth").is_some());
        assert_eq!(stamper.header_name(), "X-Node-Auth");
    }
}
