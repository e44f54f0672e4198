//! Status enums for various entities.

use serde::{Deserialize, Serialize};

/// Order status as recorded in order history.
///
/// Orders are only written after the payment processor confirms payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Completed,
}
