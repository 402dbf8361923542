//! # Service Container
//!
//! Builds the oracle services over injected adapters.
//!
//! ## Wiring
//!
//! ```text
//! ChainReader ──→ BlockReader ──┬──→ Publisher ──→ Reconciler
//!                               │        ↑
//! LedgerQuery ──→ Tracker ──────┘        │
//! LedgerPublisher ───────────────────────┘
//! HistoryLookup + LedgerQuery + BlockReader ──→ ProofResponder
//! ```

use std::sync::Arc;

use btc_oracle::adapters::{
    BitcoinRpcClient, EsploraHistory, InMemoryLedger, LedgerRpcClient, LogNotifier,
};
use btc_oracle::{
    BlockReader, ChainReader, HistoryLookup, InFlightSet, LedgerPublisher, LedgerQuery,
    OperatorNotifier, ProofResponder, PublicationTracker, Publisher, Reconciler,
};
use tokio::sync::watch;
use tracing::{info, warn};

use super::config::RuntimeConfig;

/// Outbound adapters the services run on.
#[derive(Clone)]
pub struct Collaborators {
    /// Source chain
    pub chain: Arc<dyn ChainReader>,
    /// Address history
    pub history: Arc<dyn HistoryLookup>,
    /// Ledger posting
    pub ledger_publisher: Arc<dyn LedgerPublisher>,
    /// Ledger durability queries
    pub ledger_query: Arc<dyn LedgerQuery>,
    /// Operator alerts
    pub notifier: Arc<dyn OperatorNotifier>,
}

impl Collaborators {
    /// Real adapters for the configured endpoints.
    pub fn from_config(config: &RuntimeConfig) -> Self {
        let chain = Arc::new(BitcoinRpcClient::new(
            config.bitcoind_url.clone(),
            config.bitcoind_user.clone(),
            config.bitcoind_password.clone(),
        ));
        let history = Arc::new(EsploraHistory::new(
            config.esplora_url.clone(),
            config.oracle.min_confirmations,
        ));
        let notifier: Arc<dyn OperatorNotifier> = match &config.operator {
            Some(operator) => Arc::new(LogNotifier::with_operator(operator.clone())),
            None => Arc::new(LogNotifier::new()),
        };

        let (ledger_publisher, ledger_query): (Arc<dyn LedgerPublisher>, Arc<dyn LedgerQuery>) =
            match &config.ledger_url {
                Some(url) => {
                    info!("[oracle] Posting to ledger wallet at {}", url);
                    let client = Arc::new(LedgerRpcClient::new(url.clone()));
                    (client.clone() as Arc<dyn LedgerPublisher>, client as Arc<dyn LedgerQuery>)
                }
                None => {
                    warn!("[oracle] No ledger configured, dry run against in-memory ledger");
                    let ledger = Arc::new(InMemoryLedger::new());
                    (ledger.clone() as Arc<dyn LedgerPublisher>, ledger as Arc<dyn LedgerQuery>)
                }
            };

        Self {
            chain,
            history,
            ledger_publisher,
            ledger_query,
            notifier,
        }
    }
}

/// The oracle services, sharing one post lock and one in-flight set.
pub struct OracleServices {
    /// Publisher (clones share state)
    pub publisher: Publisher,
    /// Gap reconciler and poller
    pub reconciler: Arc<Reconciler>,
    /// Proof responder
    pub responder: Arc<ProofResponder>,
    /// Operator alerts
    pub notifier: Arc<dyn OperatorNotifier>,
}

impl OracleServices {
    /// Wire services over `collaborators`. Retry tasks stop on `shutdown`.
    pub fn new(
        config: &RuntimeConfig,
        collaborators: Collaborators,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        let oracle = &config.oracle;
        let reader = BlockReader::new(collaborators.chain, oracle);
        let tracker = PublicationTracker::new(
            Arc::new(InFlightSet::new()),
            collaborators.ledger_query.clone(),
        );
        let publisher = Publisher::new(
            oracle.clone(),
            reader.clone(),
            tracker,
            collaborators.ledger_publisher,
            collaborators.notifier.clone(),
            shutdown,
        );
        let reconciler = Arc::new(Reconciler::new(
            reader.clone(),
            collaborators.ledger_query.clone(),
            publisher.clone(),
            oracle.published_heights_window,
        ));
        let responder = Arc::new(ProofResponder::new(
            oracle.clone(),
            collaborators.history,
            collaborators.ledger_query,
            reader,
        ));

        Self {
            publisher,
            reconciler,
            responder,
            notifier: collaborators.notifier,
        }
    }
}
