//! # Merkle Engine
//!
//! Binary merkle tree over the canonical leaf strings of a block.
//!
//! # Construction
//!
//! 1. Leaf hash = SHA256(utf8(element))
//! 2. Adjacent nodes are paired: parent = SHA256(left || right)
//! 3. An odd last node is promoted to the next level unchanged (no duplication)
//! 4. Repeat until a single root remains
//!
//! Proofs carry one [`ProofStep`] per level and serialize to
//! `<index>-<step>-...-<root>` where a step is `L<hex>`, `R<hex>` or `P`.

use sha2::{Digest, Sha256};
use crate::domain::{Hash, MerkleProof, OracleError, ProofStep};

const STEP_SEPARATOR: char = '-';

/// Hash a leaf element.
pub fn hash_leaf(element: &str) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(element.as_bytes());
    hasher.finalize().into()
}

/// Hash two nodes together.
fn hash_concat(left: &Hash, right: &Hash) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(left);
    hasher.update(right);
    hasher.finalize().into()
}

/// Compute the next level up. An unpaired last node moves up as is.
fn next_level(level: &[Hash]) -> Vec<Hash> {
    level
        .chunks(2)
        .map(|pair| match pair {
            [left, right] => hash_concat(left, right),
            _ => pair[0],
        })
        .collect()
}

/// Build the merkle root over an ordered element set.
///
/// Returns `None` for an empty set.
pub fn build_root<S: AsRef<str>>(elements: &[S]) -> Option<Hash> {
    if elements.is_empty() {
        return None;
    }

    let mut level: Vec<Hash> = elements.iter().map(|e| hash_leaf(e.as_ref())).collect();
    while level.len() > 1 {
        level = next_level(&level);
    }

    Some(level[0])
}

/// Build the inclusion proof of `elements[index]`.
pub fn build_proof<S: AsRef<str>>(elements: &[S], index: usize) -> Result<MerkleProof, OracleError> {
    if elements.is_empty() {
        return Err(OracleError::EmptyElementSet);
    }
    if index >= elements.len() {
        return Err(OracleError::IndexOutOfRange {
            index,
            len: elements.len(),
        });
    }

    let mut steps = Vec::new();
    let mut level: Vec<Hash> = elements.iter().map(|e| hash_leaf(e.as_ref())).collect();
    let mut position = index;

    while level.len() > 1 {
        let step = if position % 2 == 1 {
            ProofStep::Left(level[position - 1])
        } else if position + 1 < level.len() {
            ProofStep::Right(level[position + 1])
        } else {
            ProofStep::Promoted
        };
        steps.push(step);

        level = next_level(&level);
        position /= 2;
    }

    Ok(MerkleProof {
        index,
        steps,
        root: level[0],
    })
}

/// Recompute the root implied by a leaf and its proof steps.
pub fn compute_root(element: &str, proof: &MerkleProof) -> Hash {
    proof
        .steps
        .iter()
        .fold(hash_leaf(element), |current, step| match step {
            ProofStep::Left(sibling) => hash_concat(sibling, &current),
            ProofStep::Right(sibling) => hash_concat(&current, sibling),
            ProofStep::Promoted => current,
        })
}

/// Verify that `element` is included under `proof.root`.
///
/// The step sides must also agree with the bits of `proof.index`, so a
/// proof cannot be replayed for a different position.
pub fn verify_proof(element: &str, proof: &MerkleProof) -> bool {
    let mut position = proof.index;
    for step in &proof.steps {
        let consistent = match step {
            ProofStep::Left(_) => position % 2 == 1,
            ProofStep::Right(_) | ProofStep::Promoted => position % 2 == 0,
        };
        if !consistent {
            return false;
        }
        position /= 2;
    }
    if position != 0 {
        return false;
    }

    compute_root(element, proof) == proof.root
}

/// Serialize a proof to its text form.
pub fn serialize_proof(proof: &MerkleProof) -> String {
    let mut parts = Vec::with_capacity(proof.steps.len() + 2);
    parts.push(proof.index.to_string());
    for step in &proof.steps {
        parts.push(match step {
            ProofStep::Left(h) => format!("L{}", hex::encode(h)),
            ProofStep::Right(h) => format!("R{}", hex::encode(h)),
            ProofStep::Promoted => "P".to_string(),
        });
    }
    parts.push(hex::encode(proof.root));
    parts.join(&STEP_SEPARATOR.to_string())
}

/// Parse the text form produced by [`serialize_proof`].
pub fn deserialize_proof(serialized: &str) -> Result<MerkleProof, OracleError> {
    let parts: Vec<&str> = serialized.trim().split(STEP_SEPARATOR).collect();
    let (index_part, rest) = parts
        .split_first()
        .ok_or_else(|| OracleError::InvalidProofEncoding("empty proof".to_string()))?;
    let (root_part, step_parts) = rest
        .split_last()
        .ok_or_else(|| OracleError::InvalidProofEncoding("missing root".to_string()))?;

    let index = index_part
        .parse::<usize>()
        .map_err(|e| OracleError::InvalidProofEncoding(format!("bad index {:?}: {}", index_part, e)))?;

    let steps = step_parts
        .iter()
        .map(|part| parse_step(part))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(MerkleProof {
        index,
        steps,
        root: parse_hash(root_part)?,
    })
}

fn parse_step(part: &str) -> Result<ProofStep, OracleError> {
    if part == "P" {
        return Ok(ProofStep::Promoted);
    }
    match part.split_at_checked(1) {
        Some(("L", h)) => Ok(ProofStep::Left(parse_hash(h)?)),
        Some(("R", h)) => Ok(ProofStep::Right(parse_hash(h)?)),
        _ => Err(OracleError::InvalidProofEncoding(format!("bad step {:?}", part))),
    }
}

/// Parse a 32-byte hash from hex.
pub fn parse_hash(text: &str) -> Result<Hash, OracleError> {
    let bytes = hex::decode(text)
        .map_err(|e| OracleError::InvalidProofEncoding(format!("bad hex {:?}: {}", text, e)))?;
    bytes
        .try_into()
        .map_err(|b: Vec<u8>| OracleError::InvalidProofEncoding(format!("hash is {} bytes, expected 32", b.len())))
}
