//! Error taxonomy for validation, nonces, authorization, balances, the
//! store, the indexer, and signing. Core code returns these as values; only
//! the HTTP adapter maps them to status codes.

use alloy_primitives::{Address, B256, U256};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid chain id `{0}`")]
    InvalidChainId(String),
    #[error("invalid address for {kind}: {value}")]
    InvalidAddress { kind: &'static str, value: String },
    #[error("invalid hex for {kind}: {value}")]
    InvalidHex { kind: &'static str, value: String },
    #[error("invalid length for {kind}: expected {expected}, got {actual}")]
    InvalidLength {
        kind: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("invalid uint for {kind}: {value}")]
    InvalidUint { kind: &'static str, value: String },
    #[error("missing required field `{0}`")]
    MissingField(&'static str),
    #[error("{0} must be greater than zero")]
    NotPositive(&'static str),
    #[error("witness type string and witness hash must both be present or both absent")]
    WitnessPairMismatch,
    #[error("multichain compacts require a witness type string")]
    WitnessTypeStringRequired,
    #[error("multichain element {0} is missing its witness hash")]
    ElementWitnessRequired(usize),
    #[error("compact must contain at least one element")]
    NoElements,
    #[error("element {0} must contain at least one commitment")]
    NoCommitments(usize),
    #[error("compact has expired")]
    Expired,
    #[error("expires exceeds the {0}-second look-ahead window")]
    ExpiresTooFar(u64),
    #[error("No elements found for chain {0}")]
    NoElementsForChain(u64),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NonceError {
    #[error("nonce is required; request one from /suggested-nonce")]
    Missing,
    #[error("nonce has already been consumed")]
    Replay,
    #[error("nonce has already been consumed on chain")]
    Consumed,
    #[error("nonce does not embed sponsor {0}")]
    SponsorMismatch(Address),
    #[error("no free nonce fragment within {0} attempts")]
    Exhausted(u32),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error(
        "sponsor authorization failed: signature does not recover to the sponsor \
         and no on-chain registration was found"
    )]
    InvalidSponsor,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BalanceError {
    #[error("chain {0} is not supported by this allocator")]
    UnsupportedChain(u64),
    #[error("resource lock {lock_id} not found on chain {chain_id}")]
    LockMissing { chain_id: u64, lock_id: U256 },
    #[error("resource lock {lock_id} has a forced withdrawal in progress (status {status})")]
    ForcedWithdrawal { lock_id: U256, status: u8 },
    #[error(
        "lock tag allocator id {found} does not match allocator id {expected} on chain {chain_id}"
    )]
    WrongAllocator {
        chain_id: u64,
        expected: U256,
        found: U256,
    },
    #[error("insufficient balance for lock {lock_id}: have {have}, need {need}")]
    InsufficientBalance {
        lock_id: U256,
        have: U256,
        need: U256,
    },
}

/// Batch canonicalization failures detected while hashing.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BatchError {
    #[error("duplicate lock {0} in commitments")]
    DuplicateLock(U256),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("compact already exists for chain {chain_id} and claim hash {claim_hash}")]
    Duplicate { chain_id: u64, claim_hash: B256 },
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IndexerError {
    #[error("indexer request failed: {0}")]
    Transport(String),
    #[error("indexer response malformed: {0}")]
    InvalidResponse(String),
    #[error("indexer request timed out after {0}ms")]
    Timeout(u64),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EncodingError {
    #[error("invalid width for {kind}: expected {expected}, got {actual}")]
    Width {
        kind: &'static str,
        expected: usize,
        actual: usize,
    },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SigningError {
    #[error("invalid allocator private key")]
    InvalidKey,
    #[error("configured allocator address {configured} does not match key-derived address {derived}")]
    AddressMismatch {
        configured: Address,
        derived: Address,
    },
    #[error("signing failed: {0}")]
    Message(String),
}

/// Umbrella error crossing the engine boundary. The HTTP adapter is the only
/// place that inspects it for a status code.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AllocatorError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Nonce(#[from] NonceError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Balance(#[from] BalanceError),
    #[error(transparent)]
    Batch(#[from] BatchError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Indexer(#[from] IndexerError),
    #[error(transparent)]
    Encoding(#[from] EncodingError),
    #[error(transparent)]
    Signing(#[from] SigningError),
    #[error("{0}")]
    Internal(String),
}
