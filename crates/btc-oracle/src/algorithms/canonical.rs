//! # Block Canonicalizer
//!
//! Turns a raw block into the deterministic leaf set the merkle root is
//! built over: one `address:amount` string per distinct paying output,
//! sorted ascending.

use std::collections::BTreeSet;

use tracing::debug;

use super::merkle::build_root;
use super::random::random_value;
use crate::domain::{BlockSummary, OracleError, RawBlock, RawOutput, Satoshis};

/// Render an amount in BTC without exponential notation.
///
/// Whole amounts print as integers, fractions carry at most 8 digits with
/// trailing zeros stripped: `1 sat -> "0.00000001"`, `1.5 BTC -> "1.5"`,
/// `2 BTC -> "2"`.
pub fn format_amount(amount: Satoshis) -> String {
    let whole = amount.whole_btc();
    let fraction = amount.fraction_sats();
    if fraction == 0 {
        return whole.to_string();
    }
    let digits = format!("{:08}", fraction);
    format!("{}.{}", whole, digits.trim_end_matches('0'))
}

/// Leaf string for one output.
pub fn leaf_element(address: &str, amount: Satoshis) -> String {
    format!("{}:{}", address, format_amount(amount))
}

/// Leaf for an output, or `None` if the output is not summarized.
fn output_leaf(output: &RawOutput) -> Option<String> {
    if output.amount.is_zero() {
        // OP_RETURN
        return None;
    }
    match &output.address {
        Some(address) => Some(leaf_element(address, output.amount)),
        None => {
            debug!(
                "[oracle] Skipping output without address ({} sats, data carrier: {})",
                output.amount.0, output.is_data_carrier
            );
            None
        }
    }
}

/// Canonical leaf set and hash of a block.
///
/// Idempotent: the same block always yields byte-identical elements.
pub fn canonicalize(block: &RawBlock) -> (Vec<String>, String) {
    let elements: BTreeSet<String> = block.outputs.iter().filter_map(output_leaf).collect();
    (elements.into_iter().collect(), block.hash.clone())
}

/// Leaves paying exactly `address` among a transaction's outputs, deduplicated.
pub fn elements_for_address(outputs: &[RawOutput], address: &str) -> Vec<String> {
    let mine: BTreeSet<String> = outputs
        .iter()
        .filter(|o| o.address.as_deref() == Some(address))
        .filter_map(output_leaf)
        .collect();
    mine.into_iter().collect()
}

/// Build the immutable summary of a block.
pub fn summarize(block: &RawBlock) -> Result<BlockSummary, OracleError> {
    let (elements, hash) = canonicalize(block);
    if hash.is_empty() {
        return Err(OracleError::MissingBlockHash {
            height: block.height,
        });
    }

    let merkle_root = build_root(&elements).map(hex::encode);
    let random_value = random_value(&hash);

    Ok(BlockSummary {
        height: block.height,
        hash,
        elements,
        merkle_root,
        random_value,
    })
}
