//! Allocator key holder.
//!
//! The key is loaded once at startup and immutable afterwards. The only
//! signing operation the service exposes is a 64-byte EIP-2098 compact
//! signature over a 32-byte digest.

use alloy_primitives::{Address, B256, Signature};
use alloy_signer::SignerSync;
use alloy_signer_local::PrivateKeySigner;
use relock_types::error::SigningError;

#[derive(Debug, Clone)]
pub struct AllocatorSigner {
    inner: PrivateKeySigner,
}

impl AllocatorSigner {
    pub fn new(inner: PrivateKeySigner) -> Self {
        Self { inner }
    }

    /// Load from a 32-byte hex private key (with or without `0x` prefix).
    pub fn from_key_hex(key: &str) -> Result<Self, SigningError> {
        let body = key.trim();
        let body = body.strip_prefix("0x").unwrap_or(body);
        let bytes = hex::decode(body).map_err(|_| SigningError::InvalidKey)?;
        Self::from_slice(&bytes)
    }

    pub fn from_slice(key: &[u8]) -> Result<Self, SigningError> {
        let inner = PrivateKeySigner::from_slice(key).map_err(|_| SigningError::InvalidKey)?;
        Ok(Self { inner })
    }

    pub fn address(&self) -> Address {
        self.inner.address()
    }

    /// Startup sanity check: the configured allocator address must match the
    /// key-derived one.
    pub fn verify_configured_address(&self, configured: Address) -> Result<(), SigningError> {
        let derived = self.address();
        if configured != derived {
            return Err(SigningError::AddressMismatch {
                configured,
                derived,
            });
        }
        Ok(())
    }

    /// Sign a digest, returning the EIP-2098 compact form `r ‖ (v<<255 | s)`.
    pub fn sign_digest(&self, digest: B256) -> Result<[u8; 64], SigningError> {
        let signature = self
            .inner
            .sign_hash_sync(&digest)
            .map_err(|err| SigningError::Message(err.to_string()))?;
        Ok(erc2098(&signature))
    }
}

/// Encode a signature in EIP-2098 compact form.
pub fn erc2098(signature: &Signature) -> [u8; 64] {
    let mut out = [0u8; 64];
    out[..32].copy_from_slice(&signature.r().to_be_bytes::<32>());
    let mut vs = signature.s().to_be_bytes::<32>();
    if signature.v() {
        vs[0] |= 0x80;
    }
    out[32..].copy_from_slice(&vs);
    out
}

#[cfg(test)]
mod tests {
    use alloy_primitives::{B256, Signature, U256, keccak256};

    use super::{AllocatorSigner, erc2098};

    fn signer() -> AllocatorSigner {
        AllocatorSigner::from_slice(&[0x07; 32]).expect("valid key")
    }

    #[test]
    fn compact_signature_round_trips_to_signer_address() {
        let signer = signer();
        let digest = keccak256(b"relock signer test");
        let compact = signer.sign_digest(digest).unwrap();

        // Recover from the compact form: split vs back into (s, parity).
        let parity = compact[32] & 0x80 != 0;
        let mut s_bytes = [0u8; 32];
        s_bytes.copy_from_slice(&compact[32..]);
        s_bytes[0] &= 0x7f;
        let signature = Signature::new(
            U256::from_be_slice(&compact[..32]),
            U256::from_be_slice(&s_bytes),
            parity,
        );
        let recovered = signature
            .recover_address_from_prehash(&digest)
            .expect("recoverable");
        assert_eq!(recovered, signer.address());
    }

    #[test]
    fn erc2098_packs_parity_into_high_bit() {
        let signature = Signature::new(U256::from(1u8), U256::from(2u8), true);
        let compact = erc2098(&signature);
        assert_eq!(compact[32] & 0x80, 0x80);
        assert_eq!(compact[63], 0x02);

        let signature = Signature::new(U256::from(1u8), U256::from(2u8), false);
        let compact = erc2098(&signature);
        assert_eq!(compact[32] & 0x80, 0x00);
    }

    #[test]
    fn configured_address_must_match_derived() {
        let signer = signer();
        assert!(signer.verify_configured_address(signer.address()).is_ok());
        let other = AllocatorSigner::from_slice(&[0x08; 32]).unwrap();
        assert!(signer.verify_configured_address(other.address()).is_err());
    }

    #[test]
    fn different_digests_produce_different_signatures() {
        let signer = signer();
        let a = signer.sign_digest(B256::repeat_byte(0x01)).unwrap();
        let b = signer.sign_digest(B256::repeat_byte(0x02)).unwrap();
        assert_ne!(a, b);
    }
}
