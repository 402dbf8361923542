//! # Address Validation
//!
//! Well-formedness of source-chain addresses for the configured network:
//! base58check P2PKH/P2SH and bech32/bech32m segwit.

use sha2::{Digest, Sha256};
use crate::domain::BitcoinNetwork;

const BASE58_ALPHABET: &[u8; 58] = b"123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

/// Version byte + 20-byte hash + 4-byte checksum.
const BASE58_ADDRESS_LEN: usize = 25;

/// Is `text` a valid address on `network`?
pub fn is_valid_address(text: &str, network: BitcoinNetwork) -> bool {
    is_valid_base58_address(text, network) || is_valid_segwit_address(text, network)
}

/// Validate `text` and return the form the chain reports it in.
///
/// Bech32 is case-insensitive but nodes and indexers print it in lowercase;
/// base58 is case-sensitive and comes back unchanged.
pub fn normalize_address(text: &str, network: BitcoinNetwork) -> Option<String> {
    if is_valid_base58_address(text, network) {
        Some(text.to_string())
    } else if is_valid_segwit_address(text, network) {
        Some(text.to_ascii_lowercase())
    } else {
        None
    }
}

fn is_valid_base58_address(text: &str, network: BitcoinNetwork) -> bool {
    let Some(bytes) = base58_decode(text) else {
        return false;
    };
    if bytes.len() != BASE58_ADDRESS_LEN {
        return false;
    }

    let (payload, checksum) = bytes.split_at(BASE58_ADDRESS_LEN - 4);
    let digest = Sha256::digest(Sha256::digest(payload));
    if &digest[..4] != checksum {
        return false;
    }

    network.base58_versions().contains(&payload[0])
}

fn is_valid_segwit_address(text: &str, network: BitcoinNetwork) -> bool {
    match bech32::segwit::decode(text) {
        Ok((hrp, _version, _program)) => hrp.as_str().eq_ignore_ascii_case(network.segwit_hrp()),
        Err(_) => false,
    }
}

/// Decode base58 text into big-endian bytes.
fn base58_decode(text: &str) -> Option<Vec<u8>> {
    if text.is_empty() {
        return None;
    }

    // Little-endian accumulator
    let mut bytes: Vec<u8> = Vec::with_capacity(text.len());
    for c in text.bytes() {
        let mut carry = BASE58_ALPHABET.iter().position(|&a| a == c)? as u32;
        for b in bytes.iter_mut() {
            carry += u32::from(*b) * 58;
            *b = (carry & 0xff) as u8;
            carry >>= 8;
        }
        while carry > 0 {
            bytes.push((carry & 0xff) as u8);
            carry >>= 8;
        }
    }

    let leading_zeros = text.bytes().take_while(|&c| c == b'1').count();
    bytes.extend(std::iter::repeat(0u8).take(leading_zeros));
    bytes.reverse();
    Some(bytes)
}
