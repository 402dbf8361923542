//! # Proof Responder
//!
//! Answers chat messages carrying a receiving address with merkle proofs
//! that the address was paid in a published block.
//!
//! ## Flow
//!
//! 1. Usage commands (pairing secret, `0000`, `help`) get the usage text
//! 2. Validate the address for the configured network
//! 3. Most recent confirmed incoming transaction from the history lookup
//! 4. Leaves paying exactly that address
//! 5. Published fact for the transaction's block
//! 6. Re-canonicalize the block and build one proof per leaf
//!
//! The published root is checked against every recomputed proof. A
//! mismatch, an absent leaf or a fact without root means the published
//! data cannot be trusted, and the error is returned to the caller.
//! Transient failures are answered with a try-again reply.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info, warn};

use super::block_reader::BlockReader;
use crate::algorithms::{
    build_proof, canonicalize, elements_for_address, normalize_address, serialize_proof,
};
use crate::config::OracleConfig;
use crate::domain::{invariant_canonical_elements, IncomingTransaction, OracleError};
use crate::ports::{
    HistoryLookup, InboundMessage, LedgerQuery, MessageHandler, MessageTransport,
};

/// Usage text.
pub const USAGE_REPLY: &str = "Type a receiving Bitcoin address, I'll respond with the merkle proof that this address did receive bitcoins.";

/// Prefix of the reply to anything that is not an address.
pub const INVALID_ADDRESS_PREFIX: &str = "That doesn't look like a valid Bitcoin address.";

/// Reply when the address has no confirmed incoming transaction.
pub const NOTHING_RECEIVED_REPLY: &str = "This address didn't receive anything";

/// Reply on transient lookup failures.
pub const TRY_AGAIN_REPLY: &str = "Failed to get the address history, try again in a minute.";

/// Secret accepted alongside the configured pairing secret.
const DEFAULT_PAIRING_CODE: &str = "0000";

/// Proof responder.
pub struct ProofResponder {
    config: OracleConfig,
    history: Arc<dyn HistoryLookup>,
    ledger: Arc<dyn LedgerQuery>,
    reader: BlockReader,
}

impl ProofResponder {
    /// Create a responder.
    pub fn new(
        config: OracleConfig,
        history: Arc<dyn HistoryLookup>,
        ledger: Arc<dyn LedgerQuery>,
        reader: BlockReader,
    ) -> Self {
        Self {
            config,
            history,
            ledger,
            reader,
        }
    }

    fn is_usage_command(&self, text: &str) -> bool {
        text == self.config.pairing_secret
            || text == DEFAULT_PAIRING_CODE
            || text.eq_ignore_ascii_case("help")
    }

    /// Proof replies for `address`, or the explanation why there are none.
    pub async fn prove_address(&self, address: &str) -> Result<Vec<String>, OracleError> {
        let Some(tx) = self.history.incoming_transaction(address).await? else {
            info!("[oracle] {} received nothing", address);
            return Ok(vec![NOTHING_RECEIVED_REPLY.to_string()]);
        };

        let leaves = elements_for_address(&tx.outputs, address);
        if leaves.is_empty() {
            return Ok(vec![NOTHING_RECEIVED_REPLY.to_string()]);
        }

        let Some(fact) = self.ledger.fact_by_hash(&tx.block_hash).await? else {
            info!(
                "[oracle] No published fact for block {} yet (tx {})",
                tx.block_hash, tx.txid
            );
            return Ok(vec![no_proof_reply(&tx)]);
        };
        let published_root = fact
            .bitcoin_merkle
            .ok_or_else(|| OracleError::MissingMerkleRoot(tx.block_hash.clone()))?;

        let block = self.reader.read_block(tx.height).await?;
        if block.hash != tx.block_hash {
            return Err(OracleError::ChainRead(format!(
                "block {} is {} on chain but {} in history",
                tx.height, block.hash, tx.block_hash
            )));
        }
        let (elements, _) = canonicalize(&block);
        // Index lookup below is a binary search
        invariant_canonical_elements(&elements)?;

        let mut replies = Vec::with_capacity(leaves.len());
        for leaf in leaves {
            let index = elements
                .binary_search(&leaf)
                .map_err(|_| OracleError::LeafNotFound {
                    element: leaf.clone(),
                    block_hash: tx.block_hash.clone(),
                })?;
            let proof = build_proof(&elements, index)?;
            let recomputed = proof.root_hex();
            if recomputed != published_root {
                return Err(OracleError::RootMismatch {
                    published: published_root,
                    recomputed,
                });
            }
            info!("[oracle] Proof of {} in block {}", leaf, tx.height);
            replies.push(proof_reply(&leaf, &serialize_proof(&proof)));
        }
        Ok(replies)
    }
}

#[async_trait]
impl MessageHandler for ProofResponder {
    async fn handle_message(&self, message: &InboundMessage) -> Result<Vec<String>, OracleError> {
        let text = message.text.trim();
        if self.is_usage_command(text) {
            return Ok(vec![USAGE_REPLY.to_string()]);
        }
        let Some(address) = normalize_address(text, self.config.network) else {
            return Ok(vec![invalid_address_reply()]);
        };

        match self.prove_address(&address).await {
            Ok(replies) => Ok(replies),
            Err(e) if e.is_transient() => {
                warn!("[oracle] Proof for {} from {} failed: {}", address, message.sender, e);
                Ok(vec![TRY_AGAIN_REPLY.to_string()])
            }
            Err(e) => {
                error!("[oracle] Proof for {} failed: {}", address, e);
                Err(e)
            }
        }
    }
}

/// Answer `message` and send every reply back to its sender.
///
/// Returns the number of replies delivered.
pub async fn respond(
    handler: &dyn MessageHandler,
    transport: &dyn MessageTransport,
    message: &InboundMessage,
) -> Result<usize, OracleError> {
    let replies = handler.handle_message(message).await?;
    for reply in &replies {
        transport.send(&message.sender, reply).await?;
    }
    Ok(replies.len())
}

fn invalid_address_reply() -> String {
    format!("{}  {}", INVALID_ADDRESS_PREFIX, USAGE_REPLY)
}

fn no_proof_reply(tx: &IncomingTransaction) -> String {
    format!(
        "No proof found for tx {}, block #{} {}",
        tx.txid, tx.height, tx.block_hash
    )
}

fn proof_reply(leaf: &str, proof: &str) -> String {
    format!(
        "This is your merkle proof of {}.  Please copy and paste it on the Send page to unlock the funds from your smart wallet:\n{}",
        leaf, proof
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{InMemoryChain, InMemoryLedger};
    use crate::algorithms::{deserialize_proof, summarize, verify_proof};
    use crate::domain::{DataFeed, RawBlock, RawOutput, Satoshis};

    const ADDR_A: &str = "1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa";
    const ADDR_B: &str = "3J98t1WpEZ73CNmQviecrnyiWrnqRhWNLy";
    const ADDR_C: &str = "1BvBMSEYstWetqTFn5Au4m4GFg7xJaNVN2";
    const ADDR_SEGWIT: &str = "bc1qar0srrr7xfkvy5l643lydnw9re59gtzzwf5mdq";

    fn block() -> RawBlock {
        RawBlock {
            height: 100,
            hash: "00000000000000000001".to_string(),
            outputs: vec![
                RawOutput::to_address(ADDR_A, Satoshis(100_000_000)),
                RawOutput::to_address(ADDR_B, Satoshis(50_000_000)),
                RawOutput::to_address(ADDR_A, Satoshis(100_000_000)),
                RawOutput::data_carrier(),
            ],
        }
    }

    fn incoming(outputs: Vec<RawOutput>) -> IncomingTransaction {
        IncomingTransaction {
            txid: "tx1".to_string(),
            height: 100,
            block_hash: "00000000000000000001".to_string(),
            outputs,
        }
    }

    struct Fixture {
        chain: Arc<InMemoryChain>,
        ledger: Arc<InMemoryLedger>,
        responder: ProofResponder,
    }

    fn fixture() -> Fixture {
        let config = OracleConfig::for_testing();
        let chain = Arc::new(InMemoryChain::new());
        chain.insert_block(block());
        chain.record_incoming(
            ADDR_A,
            incoming(vec![
                RawOutput::to_address(ADDR_A, Satoshis(100_000_000)),
                RawOutput::to_address(ADDR_C, Satoshis(7)),
            ]),
        );
        let ledger = Arc::new(InMemoryLedger::new());
        let responder = ProofResponder::new(
            config.clone(),
            chain.clone(),
            ledger.clone(),
            BlockReader::new(chain.clone(), &config),
        );
        Fixture {
            chain,
            ledger,
            responder,
        }
    }

    fn publish_block(ledger: &InMemoryLedger) -> DataFeed {
        let feed = DataFeed::from(&summarize(&block()).unwrap());
        ledger.insert_pending(feed.clone());
        feed
    }

    async fn ask(responder: &ProofResponder, text: &str) -> Result<Vec<String>, OracleError> {
        responder
            .handle_message(&InboundMessage::new("peer", text))
            .await
    }

    #[tokio::test]
    async fn test_usage_commands() {
        let f = fixture();
        for text in ["*", "0000", "help", " HELP "] {
            assert_eq!(ask(&f.responder, text).await.unwrap(), vec![USAGE_REPLY]);
        }
    }

    #[tokio::test]
    async fn test_invalid_address() {
        let f = fixture();
        let replies = ask(&f.responder, "not an address").await.unwrap();
        assert!(replies[0].starts_with(INVALID_ADDRESS_PREFIX));
        assert!(replies[0].ends_with(USAGE_REPLY));
    }

    #[tokio::test]
    async fn test_nothing_received() {
        let f = fixture();
        let replies = ask(&f.responder, ADDR_C).await.unwrap();
        assert_eq!(replies, vec![NOTHING_RECEIVED_REPLY]);
    }

    #[tokio::test]
    async fn test_no_proof_before_publication() {
        let f = fixture();
        let replies = ask(&f.responder, ADDR_A).await.unwrap();
        assert_eq!(
            replies,
            vec!["No proof found for tx tx1, block #100 00000000000000000001"]
        );
    }

    #[tokio::test]
    async fn test_proof_matches_published_root() {
        let f = fixture();
        let feed = publish_block(&f.ledger);

        let replies = ask(&f.responder, ADDR_A).await.unwrap();
        assert_eq!(replies.len(), 1);
        let (text, proof) = replies[0].split_once('\n').unwrap();
        assert!(text.contains(&format!("{}:1", ADDR_A)));

        let proof = deserialize_proof(proof).unwrap();
        assert_eq!(Some(proof.root_hex()), feed.bitcoin_merkle);
        assert!(verify_proof(&format!("{}:1", ADDR_A), &proof));
    }

    #[tokio::test]
    async fn test_uppercase_segwit_query_finds_payment() {
        let f = fixture();
        let paid = vec![RawOutput::to_address(ADDR_SEGWIT, Satoshis(25_000_000))];
        let segwit_block = RawBlock {
            height: 101,
            hash: "00000000000000000002".to_string(),
            outputs: paid.clone(),
        };
        f.chain.insert_block(segwit_block.clone());
        f.chain.record_incoming(
            ADDR_SEGWIT,
            IncomingTransaction {
                txid: "tx2".to_string(),
                height: 101,
                block_hash: "00000000000000000002".to_string(),
                outputs: paid,
            },
        );
        f.ledger
            .insert_pending(DataFeed::from(&summarize(&segwit_block).unwrap()));

        let replies = ask(&f.responder, &ADDR_SEGWIT.to_uppercase()).await.unwrap();
        assert_eq!(replies.len(), 1);
        assert!(replies[0].starts_with(&format!(
            "This is your merkle proof of {}:0.25.",
            ADDR_SEGWIT
        )));
    }

    #[tokio::test]
    async fn test_history_failure_asks_to_retry() {
        let f = fixture();
        publish_block(&f.ledger);
        f.chain.fail_next_lookups(1);
        let replies = ask(&f.responder, ADDR_A).await.unwrap();
        assert_eq!(replies, vec![TRY_AGAIN_REPLY]);
    }

    #[tokio::test]
    async fn test_reorged_block_asks_to_retry() {
        let f = fixture();
        publish_block(&f.ledger);
        f.chain.insert_block(RawBlock {
            hash: "00000000000000000002".to_string(),
            ..block()
        });
        let replies = ask(&f.responder, ADDR_A).await.unwrap();
        assert_eq!(replies, vec![TRY_AGAIN_REPLY]);
    }

    #[tokio::test]
    async fn test_root_mismatch_is_fatal() {
        let f = fixture();
        f.ledger.insert_pending(DataFeed {
            bitcoin_merkle: Some("ab".repeat(32)),
            ..DataFeed::from(&summarize(&block()).unwrap())
        });
        let result = ask(&f.responder, ADDR_A).await;
        assert!(matches!(result, Err(OracleError::RootMismatch { .. })));
    }

    #[tokio::test]
    async fn test_leaf_missing_from_block_is_fatal() {
        let f = fixture();
        publish_block(&f.ledger);
        f.chain.record_incoming(
            ADDR_A,
            incoming(vec![RawOutput::to_address(ADDR_A, Satoshis(3))]),
        );
        let result = ask(&f.responder, ADDR_A).await;
        assert!(matches!(result, Err(OracleError::LeafNotFound { .. })));
    }

    #[tokio::test]
    async fn test_fact_without_root_is_fatal() {
        let f = fixture();
        f.ledger.insert_pending(DataFeed {
            bitcoin_merkle: None,
            ..DataFeed::from(&summarize(&block()).unwrap())
        });
        let result = ask(&f.responder, ADDR_A).await;
        assert!(matches!(result, Err(OracleError::MissingMerkleRoot(_))));
    }
}
