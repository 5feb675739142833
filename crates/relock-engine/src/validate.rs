//! Stateless submission validation.
//!
//! Checks run cheapest-first: chain-id syntax, then addresses and widths,
//! then presence, witness pairing, the expiration window, and finally
//! multichain membership. Any failure is returned as a typed error with no
//! partial effects.

use alloy_primitives::{Address, U256};
use relock_types::api::{CompactPayload, ElementPayload, LockPayload};
use relock_types::error::{AllocatorError, NonceError, ValidationError};
use relock_types::ids::{
    parse_address, parse_b256, parse_chain_id, parse_lock_tag, parse_timestamp, parse_u256,
};
use relock_types::{
    BatchCompact, ChainElement, Lock, MultichainCompact, SingleCompact, ValidatedCompact, Witness,
};

/// Maximum look-ahead for `expires`: two hours.
pub const EXPIRATION_WINDOW_SECS: u64 = 7_200;

/// Validate a submission for the given notarization chain. Returns the
/// parsed chain id and the canonical compact shape.
pub fn validate_submission(
    chain_id: &str,
    payload: &CompactPayload,
    now: u64,
) -> Result<(u64, ValidatedCompact), AllocatorError> {
    let chain_id = parse_chain_id(chain_id)?;

    let sponsor = parse_address("sponsor", &payload.sponsor)?;
    let nonce = match payload.nonce.as_deref() {
        Some(raw) => parse_u256("nonce", raw)?,
        None => return Err(NonceError::Missing.into()),
    };
    let expires = parse_timestamp("expires", &payload.expires)?;

    let compact = if let Some(elements) = payload.elements.as_deref() {
        validate_multichain(payload, elements, sponsor, nonce, expires)?
    } else if let Some(commitments) = payload.commitments.as_deref() {
        validate_batch(payload, commitments, sponsor, nonce, expires)?
    } else {
        validate_single(payload, sponsor, nonce, expires)?
    };

    check_expiration(expires, now)?;

    if let ValidatedCompact::Multichain(multichain) = &compact {
        if !multichain
            .elements
            .iter()
            .any(|element| element.chain_id == chain_id)
        {
            return Err(ValidationError::NoElementsForChain(chain_id).into());
        }
    }

    Ok((chain_id, compact))
}

fn validate_single(
    payload: &CompactPayload,
    sponsor: Address,
    nonce: U256,
    expires: u64,
) -> Result<ValidatedCompact, AllocatorError> {
    let arbiter = parse_address(
        "arbiter",
        payload
            .arbiter
            .as_deref()
            .ok_or(ValidationError::MissingField("arbiter"))?,
    )?;
    let id = parse_u256(
        "id",
        payload
            .id
            .as_deref()
            .ok_or(ValidationError::MissingField("id"))?,
    )?;
    let amount = parse_positive_amount(
        payload
            .amount
            .as_deref()
            .ok_or(ValidationError::MissingField("amount"))?,
    )?;
    let witness = parse_witness_pair(payload)?;

    Ok(ValidatedCompact::Single(SingleCompact {
        arbiter,
        sponsor,
        nonce,
        expires,
        id,
        amount,
        witness,
    }))
}

fn validate_batch(
    payload: &CompactPayload,
    commitments: &[LockPayload],
    sponsor: Address,
    nonce: U256,
    expires: u64,
) -> Result<ValidatedCompact, AllocatorError> {
    let arbiter = parse_address(
        "arbiter",
        payload
            .arbiter
            .as_deref()
            .ok_or(ValidationError::MissingField("arbiter"))?,
    )?;
    if commitments.is_empty() {
        return Err(ValidationError::NoCommitments(0).into());
    }
    let commitments = parse_locks(commitments)?;
    let witness = parse_witness_pair(payload)?;

    Ok(ValidatedCompact::Batch(BatchCompact {
        arbiter,
        sponsor,
        nonce,
        expires,
        commitments,
        witness,
    }))
}

fn validate_multichain(
    payload: &CompactPayload,
    elements: &[ElementPayload],
    sponsor: Address,
    nonce: U256,
    expires: u64,
) -> Result<ValidatedCompact, AllocatorError> {
    if elements.is_empty() {
        return Err(ValidationError::NoElements.into());
    }
    let witness_type_string = payload
        .witness_type_string
        .clone()
        .ok_or(ValidationError::WitnessTypeStringRequired)?;

    let elements = elements
        .iter()
        .enumerate()
        .map(|(index, element)| validate_element(index, element))
        .collect::<Result<Vec<_>, AllocatorError>>()?;

    Ok(ValidatedCompact::Multichain(MultichainCompact {
        sponsor,
        nonce,
        expires,
        witness_type_string,
        elements,
    }))
}

fn validate_element(index: usize, element: &ElementPayload) -> Result<ChainElement, AllocatorError> {
    let arbiter = parse_address("arbiter", &element.arbiter)?;
    let chain_id = parse_chain_id(&element.chain_id)?;
    if element.commitments.is_empty() {
        return Err(ValidationError::NoCommitments(index).into());
    }
    let commitments = parse_locks(&element.commitments)?;
    let witness_hash = parse_b256(
        "witnessHash",
        element
            .witness_hash
            .as_deref()
            .ok_or(ValidationError::ElementWitnessRequired(index))?,
    )?;

    Ok(ChainElement {
        arbiter,
        chain_id,
        commitments,
        witness_hash,
    })
}

fn parse_locks(payloads: &[LockPayload]) -> Result<Vec<Lock>, AllocatorError> {
    payloads
        .iter()
        .map(|lock| {
            Ok(Lock {
                lock_tag: parse_lock_tag(&lock.lock_tag)?,
                token: parse_address("token", &lock.token)?,
                amount: parse_positive_amount(&lock.amount)?,
            })
        })
        .collect()
}

fn parse_positive_amount(raw: &str) -> Result<U256, ValidationError> {
    let amount = parse_u256("amount", raw)?;
    if amount.is_zero() {
        return Err(ValidationError::NotPositive("amount"));
    }
    Ok(amount)
}

/// Both sides of the witness pair or neither (single and batch shapes).
fn parse_witness_pair(payload: &CompactPayload) -> Result<Option<Witness>, AllocatorError> {
    match (
        payload.witness_type_string.as_deref(),
        payload.witness_hash.as_deref(),
    ) {
        (None, None) => Ok(None),
        (Some(type_string), Some(hash)) => Ok(Some(Witness {
            type_string: type_string.to_string(),
            hash: parse_b256("witnessHash", hash)?,
        })),
        _ => Err(ValidationError::WitnessPairMismatch.into()),
    }
}

fn check_expiration(expires: u64, now: u64) -> Result<(), ValidationError> {
    if expires <= now {
        return Err(ValidationError::Expired);
    }
    if expires > now + EXPIRATION_WINDOW_SECS {
        return Err(ValidationError::ExpiresTooFar(EXPIRATION_WINDOW_SECS));
    }
    Ok(())
}
