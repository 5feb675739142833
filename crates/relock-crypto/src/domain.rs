//! EIP-712 domain for The Compact and the universal signing digest.

use alloy_primitives::{Address, B256, U256, address, keccak256};

use crate::codec::{hash_type_string, hash_words, word_address, word_u256};

pub const EIP712_NAME: &str = "The Compact";
pub const EIP712_VERSION: &str = "1";
pub const VERIFYING_CONTRACT: Address = address!("00000000000000171ede64904551eeDF3C6C9788");

const EIP712_DOMAIN_TYPESTRING: &str =
    "EIP712Domain(string name,string version,uint256 chainId,address verifyingContract)";

/// Domain separator bound to the notarization chain.
pub fn domain_separator(chain_id: u64) -> B256 {
    hash_words(&[
        hash_type_string(EIP712_DOMAIN_TYPESTRING),
        keccak256(EIP712_NAME.as_bytes()),
        keccak256(EIP712_VERSION.as_bytes()),
        word_u256(U256::from(chain_id)),
        word_address(VERIFYING_CONTRACT),
    ])
}

/// `keccak256(0x1901 ‖ domainSeparator(chainId) ‖ claimHash)`: the message
/// both the sponsor and the allocator sign.
pub fn digest(chain_id: u64, claim_hash: B256) -> B256 {
    let mut preimage = Vec::with_capacity(2 + 32 + 32);
    preimage.extend_from_slice(&[0x19, 0x01]);
    preimage.extend_from_slice(domain_separator(chain_id).as_slice());
    preimage.extend_from_slice(claim_hash.as_slice());
    keccak256(preimage)
}

#[cfg(test)]
mod tests {
    use alloy_primitives::b256;

    use super::{digest, domain_separator};

    #[test]
    fn domain_separator_varies_with_chain() {
        assert_ne!(domain_separator(1), domain_separator(10));
        assert_eq!(domain_separator(10), domain_separator(10));
    }

    #[test]
    fn digest_binds_chain_and_claim() {
        let claim = b256!("00000000000000000000000000000000000000000000000000000000000000aa");
        let other = b256!("00000000000000000000000000000000000000000000000000000000000000ab");
        assert_ne!(digest(10, claim), digest(137, claim));
        assert_ne!(digest(10, claim), digest(10, other));
        assert_ne!(digest(10, claim), claim);
    }
}
