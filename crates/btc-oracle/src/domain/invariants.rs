//! # Domain Invariants
//!
//! Constants and rules that must always hold true.

use super::errors::OracleError;

/// Confirmations a block needs before it is summarized.
pub const DEFAULT_MIN_CONFIRMATIONS: u64 = 2;

/// Upper bound of the per-block random value (inclusive).
pub const RANDOM_RANGE: u64 = 100_000;

/// Feed name carrying the block hash.
pub const BLOCK_HASH_FEED_NAME: &str = "bitcoin_hash";

/// Feed name carrying the block height.
pub const BLOCK_HEIGHT_FEED_NAME: &str = "bitcoin_height";

/// Feed name carrying the merkle root of the block's leaves.
pub const MERKLE_ROOT_FEED_NAME: &str = "bitcoin_merkle";

/// Prefix of the per-height random feed (`random<height>`).
pub const RANDOM_FEED_PREFIX: &str = "random";

/// Highest height considered final: `tip - min_confirmations + 1`.
///
/// Saturates at zero while the chain is shorter than the margin.
pub fn confirmed_height(tip: u64, min_confirmations: u64) -> u64 {
    (tip + 1).saturating_sub(min_confirmations.max(1))
}

/// Invariant: leaf elements are unique and strictly ascending.
///
/// Proof indices depend on this ordering, so a violation means any
/// proof built over the set is meaningless.
pub fn invariant_canonical_elements(elements: &[String]) -> Result<(), OracleError> {
    if let Some(pair) = elements.windows(2).find(|w| w[0] >= w[1]) {
        return Err(OracleError::NonCanonicalElements(format!(
            "{:?} >= {:?}",
            pair[0], pair[1]
        )));
    }
    Ok(())
}

/// Invariant: the random feed value lies in `[1, RANDOM_RANGE]`.
pub fn invariant_random_in_range(value: u32) -> bool {
    (1..=RANDOM_RANGE).contains(&u64::from(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confirmed_height() {
        assert_eq!(confirmed_height(100, 2), 99);
        assert_eq!(confirmed_height(100, 1), 100);
        assert_eq!(confirmed_height(100, 6), 95);
    }

    #[test]
    fn test_confirmed_height_short_chain() {
        assert_eq!(confirmed_height(0, 2), 0);
        assert_eq!(confirmed_height(1, 6), 0);
    }

    #[test]
    fn test_confirmed_height_zero_margin_treated_as_one() {
        assert_eq!(confirmed_height(50, 0), 50);
    }

    #[test]
    fn test_invariant_canonical_elements_pass() {
        let elements = vec!["A:1".to_string(), "B:0.5".to_string()];
        assert!(invariant_canonical_elements(&elements).is_ok());
        assert!(invariant_canonical_elements(&[]).is_ok());
    }

    #[test]
    fn test_invariant_canonical_elements_duplicate() {
        let elements = vec!["A:1".to_string(), "A:1".to_string()];
        assert!(invariant_canonical_elements(&elements).is_err());
    }

    #[test]
    fn test_invariant_canonical_elements_unsorted() {
        let elements = vec!["B:1".to_string(), "A:1".to_string()];
        let err = invariant_canonical_elements(&elements).unwrap_err();
        assert!(matches!(err, OracleError::NonCanonicalElements(_)));
        assert!(err.is_integrity());
    }

    #[test]
    fn test_invariant_random_in_range() {
        assert!(invariant_random_in_range(1));
        assert!(invariant_random_in_range(100_000));
        assert!(!invariant_random_in_range(0));
        assert!(!invariant_random_in_range(100_001));
    }
}
