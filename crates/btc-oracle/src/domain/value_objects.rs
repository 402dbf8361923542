//! # Domain Value Objects
//!
//! Immutable value types: amounts and merkle proofs.

use serde::{Deserialize, Serialize};
use super::errors::Hash;

/// Satoshis per bitcoin.
pub const SATS_PER_BTC: u64 = 100_000_000;

/// Output amount in satoshis.
///
/// Amounts stay integral end to end so leaf strings never depend on
/// floating point formatting.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct Satoshis(pub u64);

impl Satoshis {
    /// Zero amount.
    pub const ZERO: Satoshis = Satoshis(0);

    /// Convert a BTC amount as reported by JSON APIs.
    ///
    /// Returns `None` for negative, non-finite or out-of-range values.
    pub fn from_btc(btc: f64) -> Option<Self> {
        if !btc.is_finite() || btc < 0.0 {
            return None;
        }
        let sats = (btc * SATS_PER_BTC as f64).round();
        if sats > u64::MAX as f64 {
            return None;
        }
        Some(Self(sats as u64))
    }

    /// Whole bitcoins.
    pub fn whole_btc(&self) -> u64 {
        self.0 / SATS_PER_BTC
    }

    /// Fractional part in satoshis.
    pub fn fraction_sats(&self) -> u64 {
        self.0 % SATS_PER_BTC
    }

    /// Is this a zero-value output?
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

/// Source chain network, selects address encodings.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BitcoinNetwork {
    /// Bitcoin mainnet.
    #[default]
    Mainnet,
    /// Testnet (also signet).
    Testnet,
    /// Local regression test network.
    Regtest,
}

impl BitcoinNetwork {
    /// Parse a network name as used in configuration.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "mainnet" | "main" | "bitcoin" => Some(Self::Mainnet),
            "testnet" | "test" | "signet" => Some(Self::Testnet),
            "regtest" => Some(Self::Regtest),
            _ => None,
        }
    }

    /// Base58 version bytes accepted for P2PKH and P2SH.
    pub fn base58_versions(&self) -> [u8; 2] {
        match self {
            Self::Mainnet => [0x00, 0x05],
            Self::Testnet | Self::Regtest => [0x6f, 0xc4],
        }
    }

    /// Human readable part of segwit addresses.
    pub fn segwit_hrp(&self) -> &'static str {
        match self {
            Self::Mainnet => "bc",
            Self::Testnet => "tb",
            Self::Regtest => "bcrt",
        }
    }
}

/// Side a sibling sits on relative to the running hash.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum Side {
    /// Sibling is on the left.
    Left,
    /// Sibling is on the right.
    Right,
}

/// One level of a merkle proof, from leaf towards root.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum ProofStep {
    /// Sibling hash on the left: `parent = H(sibling || current)`.
    Left(Hash),
    /// Sibling hash on the right: `parent = H(current || sibling)`.
    Right(Hash),
    /// Node was the odd one out and moved up unchanged.
    Promoted,
}

impl ProofStep {
    /// Sibling hash, if the node was paired at this level.
    pub fn sibling(&self) -> Option<&Hash> {
        match self {
            ProofStep::Left(h) | ProofStep::Right(h) => Some(h),
            ProofStep::Promoted => None,
        }
    }

    /// Side of the sibling, if any.
    pub fn side(&self) -> Option<Side> {
        match self {
            ProofStep::Left(_) => Some(Side::Left),
            ProofStep::Right(_) => Some(Side::Right),
            ProofStep::Promoted => None,
        }
    }
}

/// Inclusion proof of one leaf.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct MerkleProof {
    /// Index of the leaf in the sorted element set.
    pub index: usize,
    /// Steps from leaf to root.
    pub steps: Vec<ProofStep>,
    /// Root the steps lead to.
    pub root: Hash,
}

impl MerkleProof {
    /// Root as lowercase hex, the form published on the ledger.
    pub fn root_hex(&self) -> String {
        hex::encode(self.root)
    }
}
