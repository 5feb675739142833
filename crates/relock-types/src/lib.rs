pub mod api;
pub mod compact;
pub mod error;
pub mod ids;

pub use compact::{
    BatchCompact, ChainElement, CommitmentRecord, CompactKind, CompactRecord, ElementRecord, Lock,
    MultichainCompact, NewCompact, SingleCompact, ValidatedCompact, Witness,
};
pub use error::{
    AllocatorError, AuthError, BalanceError, BatchError, EncodingError, IndexerError, NonceError,
    SigningError, StoreError, ValidationError,
};
pub use ids::{ChainId, LockTag, NONCE_FRAGMENT_BITS, allocator_id, lock_id, split_lock_id};
