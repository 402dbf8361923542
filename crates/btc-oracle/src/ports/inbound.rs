//! # Inbound Ports
//!
//! What the oracle accepts from the outside: chat messages.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::domain::OracleError;

/// Text message received from a correspondent.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct InboundMessage {
    /// Transport-level sender id, replies go back here.
    pub sender: String,
    /// Message text.
    pub text: String,
}

impl InboundMessage {
    /// Create a message.
    pub fn new(sender: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            text: text.into(),
        }
    }
}

/// Message handler - inbound port.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Answer one message. Returns the replies to send back, in order.
    ///
    /// User mistakes produce explanatory replies; only failures of the
    /// oracle itself are errors.
    async fn handle_message(&self, message: &InboundMessage) -> Result<Vec<String>, OracleError>;
}
