//! Channel Transport
//!
//! `MessageTransport` over a tokio mpsc channel. The receiving half is
//! drained by whatever actually talks to the correspondents (a chat
//! client, the console, a test).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::domain::OracleError;
use crate::ports::{InboundMessage, MessageTransport};

/// Reply addressed to a correspondent.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct OutboundMessage {
    /// Correspondent the reply goes to.
    pub recipient: String,
    /// Reply text.
    pub text: String,
}

/// Transport pushing replies into an mpsc channel.
#[derive(Clone, Debug)]
pub struct ChannelTransport {
    outbound: mpsc::Sender<OutboundMessage>,
}

impl ChannelTransport {
    /// Transport plus the receiver its replies arrive on.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<OutboundMessage>) {
        let (outbound, rx) = mpsc::channel(capacity);
        (Self { outbound }, rx)
    }
}

#[async_trait]
impl MessageTransport for ChannelTransport {
    async fn send(&self, recipient: &str, text: &str) -> Result<(), OracleError> {
        self.outbound
            .send(OutboundMessage {
                recipient: recipient.to_string(),
                text: text.to_string(),
            })
            .await
            .map_err(|_| OracleError::Transport(format!("reply channel to {} closed", recipient)))
    }
}

/// Channel carrying inbound chat messages to the oracle.
pub fn inbound_channel(
    capacity: usize,
) -> (mpsc::Sender<InboundMessage>, mpsc::Receiver<InboundMessage>) {
    mpsc::channel(capacity)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_send_reaches_receiver() {
        let (transport, mut rx) = ChannelTransport::new(4);
        transport.send("alice", "hello").await.unwrap();
        let msg = rx.recv().await.unwrap();
        assert_eq!(msg.recipient, "alice");
        assert_eq!(msg.text, "hello");
    }

    #[tokio::test]
    async fn test_send_after_receiver_dropped() {
        let (transport, rx) = ChannelTransport::new(1);
        drop(rx);
        let result = transport.send("bob", "hi").await;
        assert!(matches!(result, Err(OracleError::Transport(_))));
    }
}
