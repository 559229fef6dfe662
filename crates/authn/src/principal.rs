//! Principals attached to authenticated inbound requests.

use std::fmt;

/// Reserved principal name meaning "the sending node itself".
pub const NODE_IS_USER: &str = "$";

/// The identity a verified request acts as.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Principal {
    /// A cluster member acting on its own behalf.
    Node,
    /// An end user on whose behalf a peer forwarded the request.
    User(String),
}

impl Principal {
    /// Maps a claimed name from an assertion to a principal.
    ///
    /// [`NODE_IS_USER`] becomes [`Principal::Node`], never a user named `"$"`.
    #[must_use]
    pub fn from_claimed(name: &str) -> Self {
        if name == NODE_IS_USER { Self::Node } else { Self::User(name.to_owned()) }
    }

    /// Returns the name carried on the wire.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Node => NODE_IS_USER,
            Self::User(name) => name,
        }
    }

    /// Returns `false` for internal node traffic, which skips authorization.
    #[must_use]
    pub fn needs_authorization(&self) -> bool {
        !matches!(self, Self::Node)
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinel_maps_to_node() {
        assert_eq!(Principal::from_claimed("$"), Principal::Node);
        assert_eq!(Principal::Node.name(), "$");
        assert!(!Principal::Node.needs_authorization());
    }

    #[test]
    fn test_other_names_map_to_user() {
        let principal = Principal::from_claimed("alice");
        assert_eq!(principal, Principal::User("alice".into()));
        assert_eq!(principal.to_string(), "alice");
        assert!(principal.needs_authorization());
    }

    #[test]
    fn test_sentinel_lookalikes_are_users() {
        assert_eq!(Principal::from_claimed("$$"), Principal::User("$$".into()));
        assert_eq!(Principal::from_claimed("node"), Principal::User("node".into()));
    }
}
