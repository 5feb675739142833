//! Validated compact shapes and the stored record tree.
//!
//! A compact arrives as a loosely-typed JSON payload, passes through the
//! validator, and lives afterwards as one of three [`ValidatedCompact`]
//! shapes. On successful allocation it is frozen into a [`CompactRecord`]
//! tree (compact → elements → commitments) that is never mutated again.

use alloy_primitives::{Address, B256, Bytes, U256};

use crate::ids::{LockTag, lock_id};

/// Compact shape discriminant, stored with each record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompactKind {
    Single = 0,
    Batch = 1,
    Multichain = 2,
}

/// Witness pair for single and batch compacts: both sides present or the
/// compact carries no witness at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Witness {
    pub type_string: String,
    pub hash: B256,
}

/// One commitment against a resource lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lock {
    pub lock_tag: LockTag,
    pub token: Address,
    pub amount: U256,
}

impl Lock {
    pub fn lock_id(&self) -> U256 {
        lock_id(self.lock_tag, self.token)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SingleCompact {
    pub arbiter: Address,
    pub sponsor: Address,
    pub nonce: U256,
    pub expires: u64,
    /// Composite lock id `(lockTag << 160) | token`.
    pub id: U256,
    pub amount: U256,
    pub witness: Option<Witness>,
}

impl SingleCompact {
    /// The single commitment, recovered from the composite id.
    pub fn lock(&self) -> Lock {
        let (lock_tag, token) = crate::ids::split_lock_id(self.id);
        Lock {
            lock_tag,
            token,
            amount: self.amount,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchCompact {
    pub arbiter: Address,
    pub sponsor: Address,
    pub nonce: U256,
    pub expires: u64,
    pub commitments: Vec<Lock>,
    pub witness: Option<Witness>,
}

/// One per-chain element of a multichain compact. Order is significant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainElement {
    pub arbiter: Address,
    pub chain_id: u64,
    pub commitments: Vec<Lock>,
    pub witness_hash: B256,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultichainCompact {
    pub sponsor: Address,
    pub nonce: U256,
    pub expires: u64,
    pub witness_type_string: String,
    pub elements: Vec<ChainElement>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidatedCompact {
    Single(SingleCompact),
    Batch(BatchCompact),
    Multichain(MultichainCompact),
}

impl ValidatedCompact {
    pub fn kind(&self) -> CompactKind {
        match self {
            Self::Single(_) => CompactKind::Single,
            Self::Batch(_) => CompactKind::Batch,
            Self::Multichain(_) => CompactKind::Multichain,
        }
    }

    pub fn sponsor(&self) -> Address {
        match self {
            Self::Single(c) => c.sponsor,
            Self::Batch(c) => c.sponsor,
            Self::Multichain(c) => c.sponsor,
        }
    }

    pub fn nonce(&self) -> U256 {
        match self {
            Self::Single(c) => c.nonce,
            Self::Batch(c) => c.nonce,
            Self::Multichain(c) => c.nonce,
        }
    }

    pub fn expires(&self) -> u64 {
        match self {
            Self::Single(c) => c.expires,
            Self::Batch(c) => c.expires,
            Self::Multichain(c) => c.expires,
        }
    }

    /// Every commitment in the compact, paired with the chain its lock lives
    /// on. For single and batch compacts that is the notarization chain.
    pub fn chain_commitments(&self, notarized_chain_id: u64) -> Vec<(u64, Lock)> {
        match self {
            Self::Single(c) => vec![(notarized_chain_id, c.lock())],
            Self::Batch(c) => c
                .commitments
                .iter()
                .map(|lock| (notarized_chain_id, lock.clone()))
                .collect(),
            Self::Multichain(c) => c
                .elements
                .iter()
                .flat_map(|element| {
                    element
                        .commitments
                        .iter()
                        .map(|lock| (element.chain_id, lock.clone()))
                })
                .collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Stored records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitmentRecord {
    pub lock_tag: LockTag,
    pub token: Address,
    pub amount: U256,
}

impl CommitmentRecord {
    pub fn lock_id(&self) -> U256 {
        lock_id(self.lock_tag, self.token)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementRecord {
    pub element_index: u32,
    pub arbiter: Address,
    /// Chain the element's locks live on; equals the compact's chain for
    /// single and batch shapes.
    pub chain_id: u64,
    pub mandate_hash: Option<B256>,
    pub commitments: Vec<CommitmentRecord>,
}

/// A stored compact. Created on first successful submission, never mutated;
/// logically retired once expired or settled but kept for audit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompactRecord {
    /// Store-assigned surrogate id.
    pub id: u64,
    pub kind: CompactKind,
    /// Notarization chain: the domain separator's chain id.
    pub chain_id: u64,
    pub claim_hash: B256,
    pub sponsor: Address,
    pub nonce: U256,
    pub expires: u64,
    /// Allocator co-signature, 64-byte EIP-2098 compact form.
    pub signature: Bytes,
    pub sponsor_signature: Option<Bytes>,
    pub witness_type_string: Option<String>,
    pub witness_hash: Option<B256>,
    pub elements: Vec<ElementRecord>,
    pub created_at: u64,
}

/// Record fields the caller supplies; the store assigns the surrogate id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCompact {
    pub kind: CompactKind,
    pub chain_id: u64,
    pub claim_hash: B256,
    pub sponsor: Address,
    pub nonce: U256,
    pub expires: u64,
    pub signature: Bytes,
    pub sponsor_signature: Option<Bytes>,
    pub witness_type_string: Option<String>,
    pub witness_hash: Option<B256>,
    pub elements: Vec<ElementRecord>,
    pub created_at: u64,
}

impl NewCompact {
    pub fn from_validated(
        compact: &ValidatedCompact,
        chain_id: u64,
        claim_hash: B256,
        signature: Bytes,
        sponsor_signature: Option<Bytes>,
        created_at: u64,
    ) -> Self {
        let (witness_type_string, witness_hash, elements) = match compact {
            ValidatedCompact::Single(c) => (
                c.witness.as_ref().map(|w| w.type_string.clone()),
                c.witness.as_ref().map(|w| w.hash),
                vec![element_record(0, c.arbiter, chain_id, None, &[c.lock()])],
            ),
            ValidatedCompact::Batch(c) => (
                c.witness.as_ref().map(|w| w.type_string.clone()),
                c.witness.as_ref().map(|w| w.hash),
                vec![element_record(
                    0,
                    c.arbiter,
                    chain_id,
                    None,
                    &c.commitments,
                )],
            ),
            ValidatedCompact::Multichain(c) => (
                Some(c.witness_type_string.clone()),
                None,
                c.elements
                    .iter()
                    .enumerate()
                    .map(|(index, element)| {
                        element_record(
                            index as u32,
                            element.arbiter,
                            element.chain_id,
                            Some(element.witness_hash),
                            &element.commitments,
                        )
                    })
                    .collect(),
            ),
        };

        Self {
            kind: compact.kind(),
            chain_id,
            claim_hash,
            sponsor: compact.sponsor(),
            nonce: compact.nonce(),
            expires: compact.expires(),
            signature,
            sponsor_signature,
            witness_type_string,
            witness_hash,
            elements,
            created_at,
        }
    }
}

fn element_record(
    element_index: u32,
    arbiter: Address,
    chain_id: u64,
    mandate_hash: Option<B256>,
    commitments: &[Lock],
) -> ElementRecord {
    ElementRecord {
        element_index,
        arbiter,
        chain_id,
        mandate_hash,
        commitments: commitments
            .iter()
            .map(|lock| CommitmentRecord {
                lock_tag: lock.lock_tag,
                token: lock.token,
                amount: lock.amount,
            })
            .collect(),
    }
}
