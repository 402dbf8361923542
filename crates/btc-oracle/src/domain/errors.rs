//! # Domain Errors
//!
//! Error types for the oracle.

use thiserror::Error;

/// Hash type alias (32-byte SHA-256)
pub type Hash = [u8; 32];

/// Oracle error types.
#[derive(Debug, Error)]
pub enum OracleError {
    /// Reading the source chain failed (RPC or transport).
    #[error("Chain read failed: {0}")]
    ChainRead(String),

    /// A block came back without a hash.
    #[error("No block hash at height {height}")]
    MissingBlockHash {
        /// Height that was requested
        height: u64,
    },

    /// The ledger client reported a failed posting.
    #[error("Publish failed: {0}")]
    Publish(String),

    /// Querying the ledger for published facts failed.
    #[error("Ledger query failed: {0}")]
    LedgerQuery(String),

    /// Address history lookup failed.
    #[error("History lookup failed: {0}")]
    History(String),

    /// Messaging transport failed to deliver a reply.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Merkle tree requested over an empty element set.
    #[error("Empty element set")]
    EmptyElementSet,

    /// Leaf index outside of the element set.
    #[error("Leaf index {index} out of range for {len} elements")]
    IndexOutOfRange {
        /// Requested index
        index: usize,
        /// Number of elements
        len: usize,
    },

    /// Serialized proof could not be decoded.
    #[error("Invalid proof encoding: {0}")]
    InvalidProofEncoding(String),

    /// A leaf expected in a block is absent from its recomputed elements.
    #[error("Integrity: {element} not found among outputs of block {block_hash}")]
    LeafNotFound {
        /// Leaf string that was looked up
        element: String,
        /// Block that was recomputed
        block_hash: String,
    },

    /// Recomputed root differs from the durably published one.
    #[error("Integrity: merkle root mismatch: published {published}, recomputed {recomputed}")]
    RootMismatch {
        /// Root stored on the ledger
        published: String,
        /// Root rebuilt from the chain
        recomputed: String,
    },

    /// Recomputed leaves are not unique and strictly ascending.
    #[error("Integrity: non-canonical leaf set: {0}")]
    NonCanonicalElements(String),

    /// Published fact for a block carrying outputs has no merkle root.
    #[error("Integrity: no merkle root published for block {0}")]
    MissingMerkleRoot(String),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl OracleError {
    /// Transient failures that are retried (reads with a bound, publishes forever).
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::ChainRead(_)
                | Self::Publish(_)
                | Self::LedgerQuery(_)
                | Self::History(_)
                | Self::Transport(_)
        )
    }

    /// Integrity failures: the published data can no longer be trusted.
    pub fn is_integrity(&self) -> bool {
        matches!(
            self,
            Self::LeafNotFound { .. }
                | Self::RootMismatch { .. }
                | Self::MissingMerkleRoot(_)
                | Self::NonCanonicalElements(_)
        )
    }
}
