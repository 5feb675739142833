//! Read-only indexer port.
//!
//! The engine never talks to a chain directly; everything it knows about
//! on-chain state arrives through this trait. Implementations live at the
//! edges (the HTTP GraphQL adapter in the server binary, the scriptable
//! mock in tests). Transient failures propagate as [`IndexerError`]; the
//! engine never partially commits on one.

use std::time::Duration;

use alloy_primitives::{Address, B256, I256, U256};
use async_trait::async_trait;
use relock_types::error::IndexerError;

/// Current on-chain state of one resource lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceLockState {
    /// 0 = active; anything else means a forced withdrawal is in progress.
    pub withdrawal_status: u8,
    pub balance: U256,
}

/// Everything the indexer knows about a `(sponsor, lockId, chainId)` triple.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CompactDetails {
    pub resource_lock: Option<ResourceLockState>,
    /// Signed scheduled outflows; positive deltas reduce what is allocatable.
    pub account_deltas: Vec<I256>,
    /// Claim hashes the chain has already settled for this account.
    pub settled_claims: Vec<B256>,
}

/// One resource lock owned by a sponsor, as reported by the indexer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceLockRef {
    pub chain_id: u64,
    pub lock_id: U256,
    pub allocator_address: Address,
}

/// Per-chain allocator configuration, cached process-wide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupportedChain {
    pub chain_id: u64,
    pub allocator_id: U256,
    pub finalization_lag_blocks: u64,
}

/// A compact the sponsor registered directly on chain, allowing
/// smart-contract wallets to bypass off-chain signing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredCompact {
    pub sponsor: Address,
    pub expires: u64,
    pub typehash: B256,
    pub claimed: bool,
}

#[async_trait]
pub trait IndexerApi: Send + Sync {
    async fn compact_details(
        &self,
        allocator: Address,
        sponsor: Address,
        lock_id: U256,
        chain_id: u64,
    ) -> Result<CompactDetails, IndexerError>;

    async fn resource_locks(
        &self,
        sponsor: Address,
    ) -> Result<Vec<ResourceLockRef>, IndexerError>;

    async fn supported_chains(
        &self,
        allocator: Address,
    ) -> Result<Vec<SupportedChain>, IndexerError>;

    async fn registered_compact(
        &self,
        allocator: Address,
        sponsor: Address,
        claim_hash: B256,
        chain_id: u64,
    ) -> Result<Option<RegisteredCompact>, IndexerError>;

    async fn nonce_consumed(
        &self,
        chain_id: u64,
        sponsor: Address,
        nonce: U256,
    ) -> Result<bool, IndexerError>;
}

/// Guard an indexer call with a client-side deadline so no sponsor lock is
/// held across an unbounded wait.
pub async fn with_deadline<T>(
    timeout: Duration,
    call: impl std::future::Future<Output = Result<T, IndexerError>>,
) -> Result<T, IndexerError> {
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(IndexerError::Timeout(timeout.as_millis() as u64)),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use relock_types::error::IndexerError;

    use super::with_deadline;

    #[tokio::test]
    async fn deadline_converts_slow_calls_to_timeouts() {
        let slow = async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok::<u8, IndexerError>(1)
        };
        let result = with_deadline(Duration::from_millis(10), slow).await;
        assert_eq!(result, Err(IndexerError::Timeout(10)));
    }

    #[tokio::test]
    async fn deadline_passes_fast_results_through() {
        let fast = async { Ok::<u8, IndexerError>(7) };
        assert_eq!(with_deadline(Duration::from_secs(5), fast).await, Ok(7));
    }
}
