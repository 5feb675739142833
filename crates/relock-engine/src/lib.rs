pub mod allocate;
pub mod balance;
pub mod chains;
pub mod indexer;
pub mod nonce;
pub mod store;
pub mod validate;

pub use allocate::{Allocatable, AllocationEngine, EngineConfig, Issued, SponsorLockBalance, unix_now};
pub use balance::{BalanceEngine, LockCapacity};
pub use chains::SupportedChains;
pub use indexer::{
    CompactDetails, IndexerApi, RegisteredCompact, ResourceLockRef, ResourceLockState,
    SupportedChain,
};
pub use nonce::NonceService;
pub use store::{MemoryStore, Store};
pub use validate::{EXPIRATION_WINDOW_SECS, validate_submission};
