//! Delivery seam between the notification run and a chat service.

use crate::db::OwnerId;

/// Why a delivery did not go through.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    /// The recipient can no longer be reached (blocked the bot, chat gone).
    #[error("recipient unreachable: {0}")]
    Permanent(String),

    /// Anything else: network trouble, rate limits, server errors.
    #[error("delivery failed: {0}")]
    Transient(String),
}

/// Sends plain text to an owner.
pub trait Transport: Send + Sync {
    fn deliver(&self, owner: OwnerId, text: &str) -> Result<(), DeliveryError>;

    /// Human-readable name for logs (e.g., "telegram").
    fn channel_name(&self) -> &str;
}
