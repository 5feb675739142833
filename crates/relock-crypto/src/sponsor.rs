//! Sponsor signature handling: both 65-byte `r ‖ s ‖ v` and 64-byte
//! EIP-2098 `r ‖ vs` forms are accepted and normalized before recovery.

use alloy_primitives::{Address, B256, Signature, U256};
use relock_types::error::AuthError;

/// Recover the signing address from a hex-encoded sponsor signature over
/// the compact's digest. Any malformed input is an authorization failure,
/// never a panic.
pub fn recover_sponsor(digest: B256, signature_hex: &str) -> Result<Address, AuthError> {
    let signature = parse_signature_hex(signature_hex)?;
    signature
        .recover_address_from_prehash(&digest)
        .map_err(|_| AuthError::InvalidSponsor)
}

/// Parse a sponsor signature from hex into a normalized signature.
pub fn parse_signature_hex(signature_hex: &str) -> Result<Signature, AuthError> {
    let body = signature_hex.trim();
    let body = body
        .strip_prefix("0x")
        .or_else(|| body.strip_prefix("0X"))
        .unwrap_or(body);
    let bytes = hex::decode(body).map_err(|_| AuthError::InvalidSponsor)?;
    parse_signature(&bytes)
}

fn parse_signature(bytes: &[u8]) -> Result<Signature, AuthError> {
    match bytes.len() {
        65 => {
            let parity = match bytes[64] {
                0 | 27 => false,
                1 | 28 => true,
                _ => return Err(AuthError::InvalidSponsor),
            };
            Ok(Signature::from_bytes_and_parity(&bytes[..64], parity))
        }
        64 => {
            // EIP-2098: yParity rides in the high bit of vs.
            let parity = bytes[32] & 0x80 != 0;
            let mut s_bytes = [0u8; 32];
            s_bytes.copy_from_slice(&bytes[32..]);
            s_bytes[0] &= 0x7f;
            Ok(Signature::new(
                U256::from_be_slice(&bytes[..32]),
                U256::from_be_slice(&s_bytes),
                parity,
            ))
        }
        _ => Err(AuthError::InvalidSponsor),
    }
}
