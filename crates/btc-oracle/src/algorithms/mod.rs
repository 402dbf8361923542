//! # Algorithms Module
//!
//! Pure functions: merkle engine, block canonicalization, gap detection,
//! random feed derivation and address validation.

pub mod address;
pub mod canonical;
pub mod gaps;
pub mod merkle;
pub mod random;

pub use address::{is_valid_address, normalize_address};
pub use canonical::{canonicalize, elements_for_address, format_amount, leaf_element, summarize};
pub use gaps::{missing_heights, new_heights};
pub use merkle::{
    build_proof, build_root, compute_root, deserialize_proof, hash_leaf, parse_hash,
    serialize_proof, verify_proof,
};
pub use random::random_value;
