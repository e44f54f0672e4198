//! Browsing identities.
//!
//! Every cart belongs to exactly one identity. An identity is either an
//! anonymous token generated on the device, or the stable id handed out by the
//! authentication provider once sign-in completes.

use serde::{Deserialize, Serialize};

use super::id::{AnonymousId, UserId};

/// The actor whose cart is currently active.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Identity {
    /// Locally generated, device-scoped identity.
    Anonymous(AnonymousId),
    /// Identity supplied by the authentication provider.
    Authenticated(UserId),
}

/// Discriminant of an [`Identity`], useful for logging and session bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityKind {
    Anonymous,
    Authenticated,
}

impl Identity {
    /// The raw identity string used to key persisted carts.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Anonymous(id) => id.as_str(),
            Self::Authenticated(id) => id.as_str(),
        }
    }

    /// Which variant this identity is.
    #[must_use]
    pub const fn kind(&self) -> IdentityKind {
        match self {
            Self::Anonymous(_) => IdentityKind::Anonymous,
            Self::Authenticated(_) => IdentityKind::Authenticated,
        }
    }

    /// Whether the identity came from the authentication provider.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }

    /// The authenticated user id, if any.
    #[must_use]
    pub const fn user_id(&self) -> Option<&UserId> {
        match self {
            Self::Authenticated(id) => Some(id),
            Self::Anonymous(_) => None,
        }
    }

    /// Whether moving from `self` to `next` is an anonymous → authenticated
    /// sign-in. This is the only transition that triggers a cart migration.
    #[must_use]
    pub const fn is_sign_in_to(&self, next: &Self) -> bool {
        matches!((self, next), (Self::Anonymous(_), Self::Authenticated(_)))
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_kind() {
        let anon = Identity::Anonymous(AnonymousId::new("anon-1"));
        let user = Identity::Authenticated(UserId::new("user_1"));
        assert_eq!(anon.kind(), IdentityKind::Anonymous);
        assert_eq!(user.kind(), IdentityKind::Authenticated);
        assert!(!anon.is_authenticated());
        assert!(user.is_authenticated());
        assert_eq!(user.user_id().map(UserId::as_str), Some("user_1"));
        assert!(anon.user_id().is_none());
    }

    #[test]
    fn test_sign_in_transition_is_one_way() {
        let anon = Identity::Anonymous(AnonymousId::new("anon-1"));
        let user = Identity::Authenticated(UserId::new("user_1"));
        let other = Identity::Authenticated(UserId::new("user_2"));

        assert!(anon.is_sign_in_to(&user));
        assert!(!user.is_sign_in_to(&anon));
        assert!(!user.is_sign_in_to(&other));
        assert!(!anon.is_sign_in_to(&anon));
    }

    #[test]
    fn test_identity_serde_shape() {
        let user = Identity::Authenticated(UserId::new("user_1"));
        let json = serde_json::to_value(&user).unwrap_or_default();
        assert_eq!(
            json,
            serde_json::json!({ "kind": "authenticated", "id": "user_1" })
        );
    }
}
