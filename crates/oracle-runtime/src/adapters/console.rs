//! Console Transport
//!
//! Chat over the terminal: each stdin line is `<sender> <text>`, replies are
//! printed as `[to <sender>] <text>`.

use async_trait::async_trait;
use btc_oracle::{InboundMessage, MessageTransport, OracleError};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, watch, Mutex};
use tracing::{debug, info, warn};

/// Parse one console line. Blank lines and lines without text are skipped.
pub fn parse_line(line: &str) -> Option<InboundMessage> {
    let (sender, text) = line.trim().split_once(char::is_whitespace)?;
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    Some(InboundMessage::new(sender, text))
}

/// Replies written to stdout.
pub struct ConsoleTransport {
    stdout: Mutex<tokio::io::Stdout>,
}

impl ConsoleTransport {
    /// Transport over the process stdout.
    pub fn new() -> Self {
        Self {
            stdout: Mutex::new(tokio::io::stdout()),
        }
    }
}

impl Default for ConsoleTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageTransport for ConsoleTransport {
    async fn send(&self, recipient: &str, text: &str) -> Result<(), OracleError> {
        let line = format!("[to {}] {}\n", recipient, text);
        let mut stdout = self.stdout.lock().await;
        stdout
            .write_all(line.as_bytes())
            .await
            .map_err(|e| OracleError::Transport(e.to_string()))?;
        stdout
            .flush()
            .await
            .map_err(|e| OracleError::Transport(e.to_string()))
    }
}

/// Forward stdin lines to `inbound` until EOF or shutdown.
pub async fn read_console(
    inbound: mpsc::Sender<InboundMessage>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    info!("[oracle] Console ready, type `<sender> <address>`");
    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    let Some(message) = parse_line(&line) else {
                        debug!("[oracle] Ignoring console line {:?}", line);
                        continue;
                    };
                    if inbound.send(message).await.is_err() {
                        return;
                    }
                }
                Ok(None) => {
                    info!("[oracle] Console closed");
                    return;
                }
                Err(e) => {
                    warn!("[oracle] Console read failed: {}", e);
                    return;
                }
            },
            _ = shutdown.changed() => return,
        }
    }
}
