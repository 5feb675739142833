//! Lock identifiers and boundary parsing helpers.
//!
//! Conventions at the HTTP boundary:
//! - addresses ingress as hex (checksum verified when mixed-case) and egress
//!   in EIP-55 checksum form;
//! - 256-bit integers ingress as decimal or `0x`-prefixed hex strings and
//!   egress as `0x` + 64 zero-padded hex, except amounts which stay decimal;
//! - internally everything is a fixed-width alloy primitive.

use alloy_primitives::{Address, B256, FixedBytes, U256};

use crate::error::ValidationError;

pub type ChainId = u64;

/// 12-byte lock tag: `(scope:1 bit, resetPeriod:3 bits, allocatorId:92 bits)`.
pub type LockTag = FixedBytes<12>;

/// Number of low bits of a lock id occupied by the token address.
const TOKEN_BITS: usize = 160;

/// Number of low bits of a nonce the sponsor is free to choose.
pub const NONCE_FRAGMENT_BITS: usize = 96;

/// Compose the 32-byte lock id `(lockTag << 160) | token`.
pub fn lock_id(lock_tag: LockTag, token: Address) -> U256 {
    let tag = U256::from_be_slice(lock_tag.as_slice());
    let token = U256::from_be_slice(token.as_slice());
    (tag << TOKEN_BITS) | token
}

/// Split a 32-byte lock id back into `(lockTag, token)`.
pub fn split_lock_id(id: U256) -> (LockTag, Address) {
    let bytes = id.to_be_bytes::<32>();
    let lock_tag = LockTag::from_slice(&bytes[..12]);
    let token = Address::from_slice(&bytes[12..]);
    (lock_tag, token)
}

/// Extract the 92-bit allocator id from a lock tag: `(lockTag >> 4) & (2^92 - 1)`.
pub fn allocator_id(lock_tag: LockTag) -> U256 {
    let tag = U256::from_be_slice(lock_tag.as_slice());
    let mask = (U256::from(1u8) << 92) - U256::from(1u8);
    (tag >> 4) & mask
}

/// Parse a boundary address string. Mixed-case input must carry a valid
/// EIP-55 checksum; all-lowercase and all-uppercase hex are accepted as-is.
pub fn parse_address(kind: &'static str, value: &str) -> Result<Address, ValidationError> {
    let trimmed = value.trim();
    let body = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    if body.len() != 40 || !body.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(invalid_address(kind, value));
    }

    let has_upper = body.bytes().any(|b| b.is_ascii_uppercase());
    let has_lower = body.bytes().any(|b| b.is_ascii_lowercase());
    if has_upper && has_lower {
        return Address::parse_checksummed(format!("0x{body}"), None)
            .map_err(|_| invalid_address(kind, value));
    }

    let mut bytes = [0u8; 20];
    hex::decode_to_slice(body.to_ascii_lowercase(), &mut bytes)
        .map_err(|_| invalid_address(kind, value))?;
    Ok(Address::from(bytes))
}

/// Parse a 256-bit unsigned integer from a decimal or `0x`-prefixed hex string.
pub fn parse_u256(kind: &'static str, value: &str) -> Result<U256, ValidationError> {
    let trimmed = value.trim();
    let parsed = match trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        Some(body) => U256::from_str_radix(body, 16),
        None => U256::from_str_radix(trimmed, 10),
    };
    parsed.map_err(|_| ValidationError::InvalidUint {
        kind,
        value: truncate_for_error(value),
    })
}

/// Parse a unix-seconds timestamp; must fit u64.
pub fn parse_timestamp(kind: &'static str, value: &str) -> Result<u64, ValidationError> {
    let wide = parse_u256(kind, value)?;
    u64::try_from(wide).map_err(|_| ValidationError::InvalidUint {
        kind,
        value: truncate_for_error(value),
    })
}

/// Parse a 32-byte hash from a hex string.
pub fn parse_b256(kind: &'static str, value: &str) -> Result<B256, ValidationError> {
    let bytes = parse_fixed_hex::<32>(kind, value)?;
    Ok(B256::from(bytes))
}

/// Parse a 12-byte lock tag from a hex string.
pub fn parse_lock_tag(value: &str) -> Result<LockTag, ValidationError> {
    let bytes = parse_fixed_hex::<12>("lockTag", value)?;
    Ok(LockTag::from(bytes))
}

/// Chain ids are decimal positive integers that round-trip through their
/// string form (no signs, no leading zeros, no hex).
pub fn parse_chain_id(value: &str) -> Result<ChainId, ValidationError> {
    let trimmed = value.trim();
    let parsed: u64 = trimmed
        .parse()
        .map_err(|_| ValidationError::InvalidChainId(truncate_for_error(value)))?;
    if parsed == 0 || parsed.to_string() != trimmed {
        return Err(ValidationError::InvalidChainId(truncate_for_error(value)));
    }
    Ok(parsed)
}

/// Egress form of a 256-bit integer: `0x` + 64 zero-padded hex chars.
pub fn hex_u256(value: U256) -> String {
    format!("0x{}", hex::encode(value.to_be_bytes::<32>()))
}

/// Egress form of a 32-byte hash.
pub fn hex_b256(value: B256) -> String {
    format!("0x{}", hex::encode(value))
}

/// Egress form of a lock tag.
pub fn hex_lock_tag(value: LockTag) -> String {
    format!("0x{}", hex::encode(value))
}

fn parse_fixed_hex<const N: usize>(
    kind: &'static str,
    value: &str,
) -> Result<[u8; N], ValidationError> {
    let trimmed = value.trim();
    let body = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    let decoded = hex::decode(body).map_err(|_| ValidationError::InvalidHex {
        kind,
        value: truncate_for_error(value),
    })?;
    decoded
        .as_slice()
        .try_into()
        .map_err(|_| ValidationError::InvalidLength {
            kind,
            expected: N,
            actual: decoded.len(),
        })
}

fn invalid_address(kind: &'static str, value: &str) -> ValidationError {
    ValidationError::InvalidAddress {
        kind,
        value: truncate_for_error(value),
    }
}

fn truncate_for_error(value: &str) -> String {
    const MAX: usize = 96;
    if value.chars().count() > MAX {
        let head: String = value.chars().take(MAX).collect();
        format!("{head}…")
    } else {
        value.to_string()
    }
}
