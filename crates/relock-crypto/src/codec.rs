//! Typed-data encodings used by every hash builder in this crate:
//! 1. Packed encoding concatenates arguments at their natural byte width
//!    with no padding; type strings hash as the keccak of their packed
//!    UTF-8 bytes.
//! 2. ABI encoding produces 32-byte big-endian words: addresses left-padded,
//!    `bytesN` right-padded, `uint256` verbatim.
//! 3. Struct arrays hash as the keccak of the concatenation of their
//!    members' struct hashes (EIP-712 encodeData).
//!
//! Outputs must be byte-identical to the on-chain verifier for the same
//! inputs.

use alloy_primitives::{Address, B256, U256, keccak256};
use relock_types::LockTag;
use relock_types::error::EncodingError;

/// One argument of a packed encoding.
#[derive(Debug, Clone)]
pub enum Packed<'a> {
    Address(Address),
    U256(U256),
    B256(B256),
    LockTag(LockTag),
    Str(&'a str),
    Bytes(&'a [u8]),
}

/// Concatenate arguments at their typed-data width, no padding.
pub fn encode_packed(args: &[Packed<'_>]) -> Vec<u8> {
    let mut out = Vec::new();
    for arg in args {
        match arg {
            Packed::Address(value) => out.extend_from_slice(value.as_slice()),
            Packed::U256(value) => out.extend_from_slice(&value.to_be_bytes::<32>()),
            Packed::B256(value) => out.extend_from_slice(value.as_slice()),
            Packed::LockTag(value) => out.extend_from_slice(value.as_slice()),
            Packed::Str(value) => out.extend_from_slice(value.as_bytes()),
            Packed::Bytes(value) => out.extend_from_slice(value),
        }
    }
    out
}

/// ABI word for a `uint256`.
pub fn word_u256(value: U256) -> B256 {
    B256::from(value)
}

/// ABI word for an `address`: left-padded to the low-order 20 bytes.
pub fn word_address(value: Address) -> B256 {
    value.into_word()
}

/// ABI word for a `bytes12` lock tag: right-padded.
pub fn word_lock_tag(value: LockTag) -> B256 {
    let mut word = [0u8; 32];
    word[..12].copy_from_slice(value.as_slice());
    B256::from(word)
}

/// ABI word for a `uint64` widened to `uint256`.
pub fn word_u64(value: u64) -> B256 {
    word_u256(U256::from(value))
}

/// Head-only ABI encoding of a tuple of static 32-byte words.
pub fn abi_encode_words(words: &[B256]) -> Vec<u8> {
    let mut out = Vec::with_capacity(words.len() * 32);
    for word in words {
        out.extend_from_slice(word.as_slice());
    }
    out
}

/// keccak-256 over the ABI encoding of static words; the workhorse of every
/// EIP-712 struct hash below.
pub fn hash_words(words: &[B256]) -> B256 {
    keccak256(abi_encode_words(words))
}

/// Type hash: keccak-256 over the packed UTF-8 type string.
pub fn hash_type_string(type_string: &str) -> B256 {
    keccak256(encode_packed(&[Packed::Str(type_string)]))
}

/// Width-checked conversion for fixed-size byte arguments arriving as
/// slices (signatures, tags).
pub fn exact_width<const N: usize>(
    kind: &'static str,
    bytes: &[u8],
) -> Result<[u8; N], EncodingError> {
    bytes.try_into().map_err(|_| EncodingError::Width {
        kind,
        expected: N,
        actual: bytes.len(),
    })
}

#[cfg(test)]
mod tests {
    use alloy_primitives::{U256, address, b256, keccak256};
    use relock_types::error::EncodingError;
    use relock_types::ids::parse_lock_tag;

    use super::{
        Packed, abi_encode_words, encode_packed, exact_width, hash_type_string, hash_words,
        word_address, word_lock_tag, word_u256,
    };

    #[test]
    fn packed_has_no_padding() {
        let arbiter = address!("70997970C51812dc3A010C7d01b50e0d17dc79C8");
        let tag = parse_lock_tag("0x0000000000000000000000ff").unwrap();
        let encoded = encode_packed(&[
            Packed::Address(arbiter),
            Packed::LockTag(tag),
            Packed::U256(U256::from(1u8)),
        ]);
        assert_eq!(encoded.len(), 20 + 12 + 32);
        assert_eq!(&encoded[..20], arbiter.as_slice());
        assert_eq!(&encoded[20..32], tag.as_slice());
    }

    #[test]
    fn abi_words_pad_correctly() {
        let arbiter = address!("70997970C51812dc3A010C7d01b50e0d17dc79C8");
        let word = word_address(arbiter);
        assert_eq!(&word[..12], &[0u8; 12]);
        assert_eq!(&word[12..], arbiter.as_slice());

        let tag = parse_lock_tag("0x0000000000000000000000ff").unwrap();
        let word = word_lock_tag(tag);
        assert_eq!(&word[..12], tag.as_slice());
        assert_eq!(&word[12..], &[0u8; 20]);

        let word = word_u256(U256::from(0xabcdu32));
        assert_eq!(word[30], 0xab);
        assert_eq!(word[31], 0xcd);
    }

    #[test]
    fn hash_words_matches_manual_concatenation() {
        let a = b256!("0101010101010101010101010101010101010101010101010101010101010101");
        let b = b256!("0202020202020202020202020202020202020202020202020202020202020202");
        let mut concat = Vec::new();
        concat.extend_from_slice(a.as_slice());
        concat.extend_from_slice(b.as_slice());
        assert_eq!(hash_words(&[a, b]), keccak256(&concat));
        assert_eq!(abi_encode_words(&[a, b]), concat);
    }

    #[test]
    fn type_string_hash_is_packed_utf8() {
        let type_string = "Lock(bytes12 lockTag,address token,uint256 amount)";
        assert_eq!(
            hash_type_string(type_string),
            keccak256(type_string.as_bytes())
        );
    }

    #[test]
    fn exact_width_rejects_wrong_length() {
        let err = exact_width::<20>("address", &[0u8; 19]).unwrap_err();
        assert_eq!(
            err,
            EncodingError::Width {
                kind: "address",
                expected: 20,
                actual: 19
            }
        );
        assert!(exact_width::<20>("address", &[0u8; 20]).is_ok());
    }
}
