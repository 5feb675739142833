//! Claim-hash builders for the three compact shapes.
//!
//! Batch commitments are canonicalized by ascending lock id before hashing,
//! so submission order never changes the hash; a repeated lock id is a
//! [`BatchError::DuplicateLock`]. Multichain elements are hashed in the
//! order given, because each element carries its own witness hash.

use alloy_primitives::{B256, keccak256};
use relock_types::error::BatchError;
use relock_types::{
    BatchCompact, ChainElement, Lock, MultichainCompact, SingleCompact, ValidatedCompact, Witness,
};

use crate::codec::{hash_type_string, hash_words, word_address, word_lock_tag, word_u64, word_u256};

const COMPACT_TYPESTRING: &str =
    "Compact(address arbiter,address sponsor,uint256 nonce,uint256 expires,uint256 id,uint256 amount)";
const COMPACT_WITNESS_PREFIX: &str =
    "Compact(address arbiter,address sponsor,uint256 nonce,uint256 expires,uint256 id,uint256 amount,Mandate mandate)";

const BATCH_TYPESTRING_PREFIX: &str =
    "BatchCompact(address arbiter,address sponsor,uint256 nonce,uint256 expires,Lock[] commitments)";
const BATCH_WITNESS_PREFIX: &str =
    "BatchCompact(address arbiter,address sponsor,uint256 nonce,uint256 expires,Lock[] commitments,Mandate mandate)";

const MULTICHAIN_TYPESTRING_PREFIX: &str =
    "MultichainCompact(address sponsor,uint256 nonce,uint256 expires,Element[] elements)";
const ELEMENT_TYPESTRING_PREFIX: &str =
    "Element(address arbiter,uint256 chainId,Lock[] commitments,Mandate mandate)";

const LOCK_TYPESTRING: &str = "Lock(bytes12 lockTag,address token,uint256 amount)";

/// Hash whichever shape the validator produced.
pub fn claim_hash(compact: &ValidatedCompact) -> Result<B256, BatchError> {
    match compact {
        ValidatedCompact::Single(c) => Ok(claim_hash_single(c)),
        ValidatedCompact::Batch(c) => claim_hash_batch(c),
        ValidatedCompact::Multichain(c) => claim_hash_multichain(c),
    }
}

pub fn claim_hash_single(compact: &SingleCompact) -> B256 {
    let type_hash = match &compact.witness {
        None => hash_type_string(COMPACT_TYPESTRING),
        Some(witness) => hash_type_string(&format!(
            "{COMPACT_WITNESS_PREFIX}Mandate({})",
            witness.type_string
        )),
    };

    let mut words = vec![
        type_hash,
        word_address(compact.arbiter),
        word_address(compact.sponsor),
        word_u256(compact.nonce),
        word_u64(compact.expires),
        word_u256(compact.id),
        word_u256(compact.amount),
    ];
    push_witness_hash(&mut words, compact.witness.as_ref());
    hash_words(&words)
}

pub fn claim_hash_batch(compact: &BatchCompact) -> Result<B256, BatchError> {
    let type_hash = match &compact.witness {
        None => hash_type_string(&format!("{BATCH_TYPESTRING_PREFIX}{LOCK_TYPESTRING}")),
        Some(witness) => hash_type_string(&format!(
            "{BATCH_WITNESS_PREFIX}{LOCK_TYPESTRING}Mandate({})",
            witness.type_string
        )),
    };

    let mut words = vec![
        type_hash,
        word_address(compact.arbiter),
        word_address(compact.sponsor),
        word_u256(compact.nonce),
        word_u64(compact.expires),
        commitments_hash(&compact.commitments)?,
    ];
    push_witness_hash(&mut words, compact.witness.as_ref());
    Ok(hash_words(&words))
}

pub fn claim_hash_multichain(compact: &MultichainCompact) -> Result<B256, BatchError> {
    let type_hash = hash_type_string(&format!(
        "{MULTICHAIN_TYPESTRING_PREFIX}{ELEMENT_TYPESTRING_PREFIX}{LOCK_TYPESTRING}Mandate({})",
        compact.witness_type_string
    ));
    let element_type_hash = hash_type_string(&format!(
        "{ELEMENT_TYPESTRING_PREFIX}{LOCK_TYPESTRING}Mandate({})",
        compact.witness_type_string
    ));

    // Element order is preserved as given: each element carries a distinct
    // witness hash, so reordering is a different compact.
    let mut element_hashes = Vec::with_capacity(compact.elements.len() * 32);
    for element in &compact.elements {
        element_hashes.extend_from_slice(element_hash(element_type_hash, element)?.as_slice());
    }
    let elements_hash = keccak256(element_hashes);

    Ok(hash_words(&[
        type_hash,
        word_address(compact.sponsor),
        word_u256(compact.nonce),
        word_u64(compact.expires),
        elements_hash,
    ]))
}

fn element_hash(element_type_hash: B256, element: &ChainElement) -> Result<B256, BatchError> {
    Ok(hash_words(&[
        element_type_hash,
        word_address(element.arbiter),
        word_u64(element.chain_id),
        commitments_hash(&element.commitments)?,
        element.witness_hash,
    ]))
}

/// Canonicalize and hash a commitment list: ascending lock id, each lock
/// hashed as an EIP-712 struct, the array as the keccak of the
/// concatenation.
fn commitments_hash(commitments: &[Lock]) -> Result<B256, BatchError> {
    let lock_type_hash = hash_type_string(LOCK_TYPESTRING);

    let mut sorted: Vec<&Lock> = commitments.iter().collect();
    sorted.sort_by_key(|lock| lock.lock_id());
    for pair in sorted.windows(2) {
        if pair[0].lock_id() == pair[1].lock_id() {
            return Err(BatchError::DuplicateLock(pair[0].lock_id()));
        }
    }

    let mut encoded = Vec::with_capacity(sorted.len() * 32);
    for lock in sorted {
        let lock_hash = hash_words(&[
            lock_type_hash,
            word_lock_tag(lock.lock_tag),
            word_address(lock.token),
            word_u256(lock.amount),
        ]);
        encoded.extend_from_slice(lock_hash.as_slice());
    }
    Ok(keccak256(encoded))
}

fn push_witness_hash(words: &mut Vec<B256>, witness: Option<&Witness>) {
    if let Some(witness) = witness {
        words.push(witness.hash);
    }
}
