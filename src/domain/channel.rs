//! Rotating payment channels for incoming deposits.

use crate::domain::Decimal;
use serde::{Deserialize, Serialize};

/// A payment channel with a soft receive limit. A singleton pointer row in
/// the store names the currently active channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentChannel {
    pub id: String,
    pub channel_id: String,
    pub is_active: bool,
    pub payment_limit: Decimal,
    pub current_received: Decimal,
}

impl PaymentChannel {
    /// Whether adding `amount` meets or exceeds the receive limit.
    pub fn would_exhaust(&self, amount: Decimal) -> bool {
        self.current_received + amount >= self.payment_limit
    }
}
