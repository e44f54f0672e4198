//! Session-related types.
//!
//! The cart itself lives in the session under the device storage keys
//! (`anonymousUserId`, `cart_<identity>`). This module holds the extra state
//! the web layer keeps alongside it.

use tower_sessions::Session;

use threadline_core::IdentityKind;

/// Session keys used by the web layer.
pub mod keys {
    /// Kind of identity seen on the previous request in this session. Used to
    /// detect the anonymous → authenticated transition exactly once.
    pub const LAST_IDENTITY_KIND: &str = "last_identity_kind";
}

/// Read the identity kind recorded on the previous request.
///
/// # Errors
///
/// Returns an error if the session store cannot be read.
pub async fn last_identity_kind(
    session: &Session,
) -> Result<Option<IdentityKind>, tower_sessions::session::Error> {
    session.get(keys::LAST_IDENTITY_KIND).await
}

/// Record the identity kind for the next request.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_last_identity_kind(
    session: &Session,
    kind: IdentityKind,
) -> Result<(), tower_sessions::session::Error> {
    session.insert(keys::LAST_IDENTITY_KIND, kind).await
}
