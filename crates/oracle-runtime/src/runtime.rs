//! # Oracle Runtime
//!
//! Long-running tasks around the oracle services.
//!
//! ## Startup Sequence
//!
//! 1. Full gap reconciliation (failures are logged, the timer retries)
//! 2. New-block poller every `poll_interval_secs`
//! 3. Full reconciliation every `reconcile_interval_secs`
//! 4. Message loop answering proof requests
//!
//! Every task selects on the shutdown watch channel. An integrity error in
//! any task alerts the operator and flips that channel, stopping the
//! process.

use std::sync::Arc;
use std::time::Duration;

use btc_oracle::{respond, InboundMessage, MessageTransport, OperatorNotifier, OracleError};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use crate::container::{Collaborators, OracleServices, RuntimeConfig};

/// Subject of operator alerts for integrity failures.
pub const INTEGRITY_SUBJECT: &str = "integrity failure";

/// The oracle runtime.
pub struct OracleRuntime {
    config: RuntimeConfig,
    services: Arc<OracleServices>,
    shutdown_tx: Arc<watch::Sender<bool>>,
    shutdown_rx: watch::Receiver<bool>,
}

impl OracleRuntime {
    /// Create a runtime over `collaborators`.
    pub fn new(config: RuntimeConfig, collaborators: Collaborators) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let services = Arc::new(OracleServices::new(
            &config,
            collaborators,
            shutdown_rx.clone(),
        ));

        Self {
            config,
            services,
            shutdown_tx: Arc::new(shutdown_tx),
            shutdown_rx,
        }
    }

    /// Services, for inspection.
    pub fn services(&self) -> &Arc<OracleServices> {
        &self.services
    }

    /// Receiver that turns `true` when the runtime halts.
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown_rx.clone()
    }

    /// Has a shutdown been signalled?
    pub fn is_shutting_down(&self) -> bool {
        *self.shutdown_rx.borrow()
    }

    /// Run the startup reconciliation and spawn the background tasks.
    pub async fn start(
        &self,
        inbound: mpsc::Receiver<InboundMessage>,
        transport: Arc<dyn MessageTransport>,
    ) {
        info!("===========================================");
        info!("  Bitcoin Oracle Bridge v{}", btc_oracle::VERSION);
        info!("===========================================");

        match self.services.reconciler.reconcile().await {
            Ok(report) => info!(
                "[oracle] Startup reconciliation up to {}: {} posted",
                report.confirmed,
                report.published().len()
            ),
            Err(e) => self.on_cycle_error("startup reconciliation", e).await,
        }

        self.spawn_poller();
        self.spawn_reconciler();
        self.spawn_message_loop(inbound, transport);
        info!("[oracle] Running");
    }

    fn spawn_poller(&self) {
        let services = Arc::clone(&self.services);
        let shutdown_tx = Arc::clone(&self.shutdown_tx);
        let mut shutdown = self.shutdown_rx.clone();
        let period = self.config.oracle.poll_interval();

        tokio::spawn(async move {
            let mut timer = delayed_interval(period);
            loop {
                tokio::select! {
                    _ = timer.tick() => {
                        if let Err(e) = services.reconciler.poll_new_blocks().await {
                            handle_error(&services, &shutdown_tx, "new block poll", e).await;
                        }
                    }
                    _ = shutdown.changed() => {
                        info!("[oracle] Poller shutdown signal received");
                        return;
                    }
                }
            }
        });
    }

    fn spawn_reconciler(&self) {
        let services = Arc::clone(&self.services);
        let shutdown_tx = Arc::clone(&self.shutdown_tx);
        let mut shutdown = self.shutdown_rx.clone();
        let period = self.config.oracle.reconcile_interval();

        tokio::spawn(async move {
            let mut timer = delayed_interval(period);
            loop {
                tokio::select! {
                    _ = timer.tick() => {
                        match services.reconciler.reconcile().await {
                            Ok(report) if !report.missing.is_empty() => info!(
                                "[oracle] Reconciled {:?}", report.missing
                            ),
                            Ok(_) => {}
                            Err(e) => handle_error(&services, &shutdown_tx, "reconciliation", e).await,
                        }
                    }
                    _ = shutdown.changed() => {
                        info!("[oracle] Reconciler shutdown signal received");
                        return;
                    }
                }
            }
        });
    }

    fn spawn_message_loop(
        &self,
        mut inbound: mpsc::Receiver<InboundMessage>,
        transport: Arc<dyn MessageTransport>,
    ) {
        let services = Arc::clone(&self.services);
        let shutdown_tx = Arc::clone(&self.shutdown_tx);
        let mut shutdown = self.shutdown_rx.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    message = inbound.recv() => {
                        let Some(message) = message else {
                            info!("[oracle] Inbound channel closed");
                            return;
                        };
                        debug!("[oracle] Message from {}: {}", message.sender, message.text);
                        match respond(services.responder.as_ref(), transport.as_ref(), &message).await {
                            Ok(sent) => debug!("[oracle] Sent {} replies to {}", sent, message.sender),
                            Err(e) => handle_error(&services, &shutdown_tx, "proof request", e).await,
                        }
                    }
                    _ = shutdown.changed() => {
                        info!("[oracle] Message loop shutdown signal received");
                        return;
                    }
                }
            }
        });
    }

    async fn on_cycle_error(&self, context: &str, err: OracleError) {
        handle_error(&self.services, &self.shutdown_tx, context, err).await;
    }

    /// Signal shutdown and give tasks time to finish.
    pub async fn shutdown(&self) {
        info!("[oracle] Initiating graceful shutdown...");
        if let Err(e) = self.shutdown_tx.send(true) {
            error!("[oracle] Failed to send shutdown signal: {}", e);
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
        info!("[oracle] Shutdown complete");
    }
}

/// Interval whose first tick is one period away.
fn delayed_interval(period: Duration) -> tokio::time::Interval {
    let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    interval
}

/// Log a failed cycle; on integrity errors alert the operator and halt.
async fn handle_error(
    services: &OracleServices,
    shutdown_tx: &watch::Sender<bool>,
    context: &str,
    err: OracleError,
) {
    if err.is_integrity() {
        error!("[oracle] {} hit an integrity failure: {}", context, err);
        services
            .notifier
            .notify(INTEGRITY_SUBJECT, &format!("{}: {}", context, err))
            .await;
        if shutdown_tx.send(true).is_err() {
            error!("[oracle] Failed to send shutdown signal");
        }
    } else {
        warn!("[oracle] {} failed, will retry: {}", context, err);
    }
}
