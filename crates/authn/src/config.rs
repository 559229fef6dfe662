//! Configuration for node-to-node authentication.
//!
//! [`PkiAuthConfig`] is deserialized by the embedding service from whatever
//! source it uses (file, environment) or built programmatically with the
//! builder. Both paths go through [`PkiAuthConfig::validate`].

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AuthError, Result};

/// Header carrying the identity assertion.
pub const PKI_AUTH_HEADER: &str = "SolrAuth";

/// Default validity window for an assertion (5 seconds).
pub const DEFAULT_MAX_VALIDITY: Duration = Duration::from_millis(5_000);

/// Node authentication settings.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use cluster_pki_authn::PkiAuthConfig;
///
/// let config = PkiAuthConfig::builder()
///     .node_id("10.0.0.1:8983_solr")
///     .max_validity(Duration::from_secs(10))
///     .build()?;
///
/// assert!(config.enabled());
/// assert_eq!(config.header_name(), "SolrAuth");
/// # Ok::<(), cluster_pki_authn::AuthError>(())
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PkiAuthConfig {
    /// This node's identifier as known to cluster membership.
    pub(crate) node_id: String,

    /// Whether outbound requests are stamped.
    ///
    /// Disable when another inter-node scheme is active cluster-wide.
    #[serde(default = "default_enabled")]
    pub(crate) enabled: bool,

    /// Maximum age of an assertion at the time it is verified.
    #[serde(with = "humantime_serde", default = "default_max_validity")]
    pub(crate) max_validity: Duration,

    /// Header name used on both interception points.
    #[serde(default = "default_header_name")]
    pub(crate) header_name: String,
}

fn default_enabled() -> bool {
    true
}

fn default_max_validity() -> Duration {
    DEFAULT_MAX_VALIDITY
}

fn default_header_name() -> String {
    PKI_AUTH_HEADER.to_owned()
}

#[bon::bon]
impl PkiAuthConfig {
    /// Creates a new configuration, validating all fields.
    ///
    /// # Optional Fields
    ///
    /// * `enabled` - Stamp outbound requests (default: true).
    /// * `max_validity` - Replay window (default: 5 seconds).
    /// * `header_name` - Header name (default: `SolrAuth`).
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Config`] if validation fails, see [`validate`](Self::validate).
    #[builder]
    pub fn new(
        #[builder(into)] node_id: String,
        #[builder(default = true)] enabled: bool,
        #[builder(default = DEFAULT_MAX_VALIDITY)] max_validity: Duration,
        #[builder(into, default = PKI_AUTH_HEADER.to_owned())] header_name: String,
    ) -> Result<Self> {
        let config = Self { node_id, enabled, max_validity, header_name };
        config.validate()?;
        Ok(config)
    }

    /// Checks a configuration, including one obtained through serde.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Config`] if:
    /// - `node_id` is empty or contains whitespace (it is the first header token)
    /// - `max_validity` is zero or does not fit in `i64` milliseconds
    /// - `header_name` is empty
    pub fn validate(&self) -> Result<()> {
        if self.node_id.is_empty() {
            return Err(AuthError::config("node_id cannot be empty"));
        }
        if self.node_id.chars().any(char::is_whitespace) {
            return Err(AuthError::config("node_id cannot contain whitespace"));
        }
        if self.max_validity.is_zero() {
            return Err(AuthError::config("max_validity must be greater than zero"));
        }
        if i64::try_from(self.max_validity.as_millis()).is_err() {
            return Err(AuthError::config("max_validity is too large"));
        }
        if self.header_name.is_empty() {
            return Err(AuthError::config("header_name cannot be empty"));
        }
        Ok(())
    }

    /// Returns this node's identifier.
    #[must_use]
    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    /// Returns whether outbound stamping is enabled.
    #[must_use]
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Returns the replay window.
    #[must_use]
    pub fn max_validity(&self) -> Duration {
        self.max_validity
    }

    /// Returns the replay window in milliseconds.
    #[must_use]
    pub fn max_validity_millis(&self) -> i64 {
        i64::try_from(self.max_validity.as_millis()).unwrap_or(i64::MAX)
    }

    /// Returns the header name.
    #[must_use]
    pub fn header_name(&self) -> &str {
        &self.header_name
    }
}
