//! Core types for Threadline.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod id;
pub mod identity;
pub mod price;
pub mod status;

pub use id::*;
pub use identity::{Identity, IdentityKind};
pub use price::{CurrencyCode, Price};
pub use status::*;
