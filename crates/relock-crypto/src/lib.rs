pub mod claim_hash;
pub mod codec;
pub mod domain;
pub mod signer;
pub mod sponsor;

pub use claim_hash::{claim_hash, claim_hash_batch, claim_hash_multichain, claim_hash_single};
pub use domain::{VERIFYING_CONTRACT, digest, domain_separator};
pub use signer::{AllocatorSigner, erc2098};
pub use sponsor::{parse_signature_hex, recover_sponsor};
