//! # Gap Detection
//!
//! Which confirmed heights the oracle still owes.
//!
//! # Algorithm
//!
//! 1. Sort (and deduplicate) the published heights ascending
//! 2. Every height strictly between two consecutive published heights is missing
//! 3. Every height from `last + 1` through `confirmed` is missing (catch-up)
//! 4. With nothing published yet, only `confirmed` is owed; history is not replayed

/// Heights still owed, ascending.
pub fn missing_heights(published: &[u64], confirmed: u64) -> Vec<u64> {
    let mut heights = published.to_vec();
    heights.sort_unstable();
    heights.dedup();

    let Some(&last) = heights.last() else {
        return vec![confirmed];
    };

    let mut missing: Vec<u64> = heights
        .windows(2)
        .flat_map(|w| (w[0] + 1)..w[1])
        .collect();
    missing.extend((last + 1)..=confirmed);
    missing
}

/// Heights that appeared since the previously seen confirmed height.
///
/// Without a previous height only the current one is returned. An
/// unchanged or lower height yields nothing.
pub fn new_heights(previous: Option<u64>, confirmed: u64) -> Vec<u64> {
    match previous {
        Some(prev) => ((prev + 1)..=confirmed).collect(),
        None => vec![confirmed],
    }
}
