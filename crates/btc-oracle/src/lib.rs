//! # BTC Oracle
//!
//! Republishes a condensed summary of every confirmed Bitcoin block onto a
//! second ledger as a data feed, and answers address queries with merkle
//! proofs of inclusion in the published summary.
//!
//! **Architecture:** Hexagonal (DDD + Ports/Adapters)
//!
//! ## Purpose
//!
//! - Canonicalize each confirmed block into sorted `address:amount` leaves
//! - Publish `{bitcoin_hash, bitcoin_height, bitcoin_merkle, random<height>}`
//!   exactly once per block, surviving retries and restarts
//! - Reconcile gaps between published heights and the confirmed chain
//! - Serve merkle proofs to chat users who paid an address
//!
//! ## Failure Classes
//!
//! | Class | Handling |
//! |-------|----------|
//! | Transient (RPC, publish) | Retried with backoff |
//! | Idempotency abandon | Logged and skipped |
//! | Integrity | Surfaced loudly, runtime halts |
//! | User input | Answered with plain text |
//!
//! ## Module Structure
//!
//! ```text
//! btc-oracle/
//! ├── domain/          # BlockSummary, DataFeed, MerkleProof, errors
//! ├── algorithms/      # Merkle engine, canonicalizer, gap detection, addresses
//! ├── ports/           # Inbound handler trait + outbound collaborator traits
//! ├── application/     # Tracker, Publisher, Reconciler, ProofResponder
//! ├── adapters/        # In-memory, Bitcoin Core RPC, Esplora, channels
//! └── config.rs        # OracleConfig
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod algorithms;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

// Re-exports
pub use algorithms::{
    build_proof, build_root, canonicalize, deserialize_proof, format_amount, is_valid_address,
    missing_heights, normalize_address, random_value, serialize_proof, verify_proof,
};
pub use application::{
    respond, BlockReader, InFlightSet, ProofResponder, PublicationTracker, PublishOutcome,
    Publisher, ReconcileReport, Reconciler,
};
pub use config::{BitcoinNetwork, OracleConfig};
pub use domain::{
    confirmed_height, BlockSummary, DataFeed, Hash, IncomingTransaction, MerkleProof,
    OracleError, ProofStep, RawBlock, RawOutput, Satoshis, Side, BLOCK_HASH_FEED_NAME,
    BLOCK_HEIGHT_FEED_NAME, DEFAULT_MIN_CONFIRMATIONS, MERKLE_ROOT_FEED_NAME,
};
pub use ports::{
    ChainReader, HistoryLookup, InboundMessage, LedgerPublisher, LedgerQuery, MessageHandler,
    MessageTransport, OperatorNotifier,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
