//! # Bitcoin Oracle Bridge
//!
//! Entry point: logging, configuration, adapters, then the runtime until
//! Ctrl+C or an integrity failure.
//!
//! ## Environment
//!
//! | Variable | Default |
//! |----------|---------|
//! | `ORACLE_NETWORK` | `mainnet` |
//! | `ORACLE_MIN_CONFIRMATIONS` | `2` |
//! | `ORACLE_BITCOIND_URL` | `http://127.0.0.1:8332` |
//! | `ORACLE_ESPLORA_URL` | `https://blockstream.info/api` |
//! | `ORACLE_LEDGER_URL` | unset (dry run) |
//! | `RUST_LOG` | `info` |

use std::sync::Arc;

use anyhow::{Context, Result};
use btc_oracle::adapters::{inbound_channel, ChannelTransport};
use btc_oracle::MessageTransport;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use oracle_runtime::adapters::{read_console, ConsoleTransport};
use oracle_runtime::{load_config, Collaborators, OracleRuntime};

/// Inbound message queue depth.
const INBOUND_CAPACITY: usize = 64;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(true)
        .with_thread_ids(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to install tracing subscriber")?;

    let config = load_config().context("Failed to load configuration")?;
    let collaborators = Collaborators::from_config(&config);
    let console = config.console;
    let runtime = OracleRuntime::new(config, collaborators);

    let (inbound_tx, inbound_rx) = inbound_channel(INBOUND_CAPACITY);
    let transport: Arc<dyn MessageTransport> = if console {
        tokio::spawn(read_console(inbound_tx, runtime.shutdown_signal()));
        Arc::new(ConsoleTransport::new())
    } else {
        // No chat frontend attached; replies are logged and dropped
        let (transport, mut replies) = ChannelTransport::new(INBOUND_CAPACITY);
        tokio::spawn(async move {
            let _inbound = inbound_tx;
            while let Some(reply) = replies.recv().await {
                info!("[oracle] Reply to {}: {}", reply.recipient, reply.text);
            }
        });
        Arc::new(transport)
    };

    runtime.start(inbound_rx, transport).await;

    info!("Oracle is running. Press Ctrl+C to stop.");
    let mut halted = runtime.shutdown_signal();
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.context("Failed to listen for Ctrl+C")?;
        }
        _ = halted.changed() => {
            warn!("[oracle] Runtime halted itself");
        }
    }

    let integrity_halt = runtime.is_shutting_down();
    runtime.shutdown().await;
    if integrity_halt {
        anyhow::bail!("stopped after an integrity failure");
    }
    Ok(())
}
