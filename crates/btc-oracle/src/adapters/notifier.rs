//! Log Notifier
//!
//! Operator alerts written to the log at `error` level.

use async_trait::async_trait;
use tracing::error;

use crate::ports::OperatorNotifier;

/// Operator notifier backed by `tracing`.
#[derive(Clone, Debug, Default)]
pub struct LogNotifier {
    operator: Option<String>,
}

impl LogNotifier {
    /// Notifier with no named operator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Notifier tagging alerts with an operator contact.
    pub fn with_operator(operator: impl Into<String>) -> Self {
        Self {
            operator: Some(operator.into()),
        }
    }
}

#[async_trait]
impl OperatorNotifier for LogNotifier {
    async fn notify(&self, subject: &str, body: &str) {
        match &self.operator {
            Some(operator) => error!("[oracle] ALERT to {}: {}: {}", operator, subject, body),
            None => error!("[oracle] ALERT: {}: {}", subject, body),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notify_does_not_fail() {
        tokio_test::block_on(async {
            LogNotifier::new().notify("failed posting", "block 1").await;
            LogNotifier::with_operator("ops@example.org")
                .notify("integrity", "root mismatch")
                .await;
        });
    }
}
