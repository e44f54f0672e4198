//! Newtype tokens for type-safe references.
//!
//! Use the `define_token!` macro to create type-safe string wrappers that
//! prevent accidentally mixing tokens from different domains (an item key is
//! never a cart token, even though both are opaque strings).

/// Macro to define a type-safe opaque string token.
///
/// Creates a newtype wrapper around `String` with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `PartialEq`, `Eq`, `Hash`
/// - Conversion methods: `new()`, `as_str()`
/// - `From<String>`, `From<&str>` and `AsRef<str>` implementations
///
/// Passing `generate` as a second argument adds a `generate()` constructor
/// that returns a fresh UUID v4 token.
///
/// # Example
///
/// ```rust
/// # use threadline_core::define_token;
/// define_token!(OrderRef);
/// define_token!(DraftKey, generate);
///
/// let order = OrderRef::new("cs_test_123");
/// let draft = DraftKey::generate();
///
/// // These are different types, so this won't compile:
/// // let _: OrderRef = draft;
/// assert_eq!(order.as_str(), "cs_test_123");
/// assert_eq!(draft.as_str().len(), 36);
/// ```
#[macro_export]
macro_rules! define_token {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, ::serde::Serialize, ::serde::Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap an existing token value.
            #[must_use]
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Get the token as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_owned())
            }
        }

        impl From<$name> for String {
            fn from(token: $name) -> Self {
                token.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
    ($name:ident, generate) => {
        $crate::define_token!($name);

        impl $name {
            /// Generate a fresh random (UUID v4) token.
            #[must_use]
            pub fn generate() -> Self {
                Self(::uuid::Uuid::new_v4().to_string())
            }
        }
    };
}

// Product identifiers come from the content store.
define_token!(ProductId);

// Authenticated identities come from the identity provider.
define_token!(UserId);

// Locally generated tokens.
define_token!(AnonymousId, generate);
define_token!(ItemKey, generate);
define_token!(CartToken, generate);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_tokens_are_distinct() {
        let a = ItemKey::generate();
        let b = ItemKey::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn test_generated_token_is_uuid() {
        let token = CartToken::generate();
        assert!(uuid::Uuid::parse_str(token.as_str()).is_ok());
    }

    #[test]
    fn test_token_serializes_transparently() {
        let key = ItemKey::new("abc-123");
        let json = serde_json::to_string(&key).unwrap_or_default();
        assert_eq!(json, "\"abc-123\"");
    }

    #[test]
    fn test_token_display_and_conversions() {
        let product = ProductId::from("prod-1");
        assert_eq!(product.to_string(), "prod-1");
        assert_eq!(product.as_ref(), "prod-1");
        assert_eq!(String::from(product), "prod-1");
    }
}
