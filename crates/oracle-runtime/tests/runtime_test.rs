//! # Runtime Tests
//!
//! The runtime over in-memory collaborators: startup reconciliation,
//! proof replies through the message loop, halting on integrity failures.

use std::sync::Arc;
use std::time::Duration;

use btc_oracle::adapters::{
    inbound_channel, ChannelTransport, InMemoryChain, InMemoryLedger, RecordingNotifier,
};
use btc_oracle::{DataFeed, InboundMessage, IncomingTransaction, OracleConfig, RawBlock, RawOutput, Satoshis};
use oracle_runtime::{Collaborators, OracleRuntime, RuntimeConfig, INTEGRITY_SUBJECT};

const ADDR: &str = "1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa";

struct Harness {
    chain: Arc<InMemoryChain>,
    ledger: Arc<InMemoryLedger>,
    notifier: Arc<RecordingNotifier>,
    runtime: OracleRuntime,
}

fn make_harness() -> Harness {
    let chain = Arc::new(InMemoryChain::new());
    for height in 1..=10 {
        chain.insert_block(RawBlock {
            height,
            hash: format!("{:064x}", height),
            outputs: vec![RawOutput::to_address(ADDR, Satoshis(height * 1_000))],
        });
    }
    chain.record_incoming(
        ADDR,
        IncomingTransaction {
            txid: "tx10".to_string(),
            height: 10,
            block_hash: format!("{:064x}", 10),
            outputs: vec![RawOutput::to_address(ADDR, Satoshis(10_000))],
        },
    );
    let ledger = Arc::new(InMemoryLedger::new());
    let notifier = Arc::new(RecordingNotifier::new());

    let config = RuntimeConfig {
        oracle: OracleConfig::for_testing(),
        console: false,
        ..RuntimeConfig::default()
    };
    let collaborators = Collaborators {
        chain: chain.clone(),
        history: chain.clone(),
        ledger_publisher: ledger.clone(),
        ledger_query: ledger.clone(),
        notifier: notifier.clone(),
    };

    Harness {
        chain,
        ledger,
        notifier,
        runtime: OracleRuntime::new(config, collaborators),
    }
}

#[tokio::test]
async fn test_startup_reconciles_and_serves_proofs() {
    let h = make_harness();
    let (inbound_tx, inbound_rx) = inbound_channel(8);
    let (transport, mut replies) = ChannelTransport::new(8);

    h.runtime.start(inbound_rx, Arc::new(transport)).await;
    assert_eq!(h.ledger.feeds().len(), 1);
    assert_eq!(h.ledger.feeds()[0].bitcoin_height, 10);

    inbound_tx
        .send(InboundMessage::new("peer", ADDR))
        .await
        .unwrap();
    let reply = tokio::time::timeout(Duration::from_secs(5), replies.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reply.recipient, "peer");
    assert!(reply.text.starts_with("This is your merkle proof of"));
    assert!(!h.runtime.is_shutting_down());

    h.runtime.shutdown().await;
    assert!(h.runtime.is_shutting_down());
}

#[tokio::test]
async fn test_poller_publishes_new_blocks() {
    let h = make_harness();
    let (_inbound_tx, inbound_rx) = inbound_channel(8);
    let (transport, _replies) = ChannelTransport::new(8);
    h.runtime.start(inbound_rx, Arc::new(transport)).await;

    h.chain.insert_block(RawBlock {
        height: 11,
        hash: format!("{:064x}", 11),
        outputs: vec![],
    });

    // Poll interval is one second in the test config
    let ledger = h.ledger.clone();
    tokio::time::timeout(Duration::from_secs(5), async move {
        while ledger.feeds().len() < 2 {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    })
    .await
    .unwrap();
    h.runtime.shutdown().await;
}

#[tokio::test]
async fn test_root_mismatch_halts_runtime() {
    let h = make_harness();
    // Tampered fact for block 10
    h.ledger.insert_pending(DataFeed {
        bitcoin_hash: format!("{:064x}", 10),
        bitcoin_height: 10,
        bitcoin_merkle: Some("ee".repeat(32)),
        random_value: 1,
    });

    let (inbound_tx, inbound_rx) = inbound_channel(8);
    let (transport, _replies) = ChannelTransport::new(8);
    h.runtime.start(inbound_rx, Arc::new(transport)).await;

    let mut halted = h.runtime.shutdown_signal();
    inbound_tx
        .send(InboundMessage::new("peer", ADDR))
        .await
        .unwrap();
    tokio::time::timeout(Duration::from_secs(5), halted.changed())
        .await
        .unwrap()
        .unwrap();

    assert!(h.runtime.is_shutting_down());
    assert!(h.notifier.subjects().iter().any(|s| s == INTEGRITY_SUBJECT));
}
