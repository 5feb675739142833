//! Per-lock capacity computation.
//!
//! `allocatable = max(0, onchainBalance − Σ pendingDeltas)` and
//! `outstanding = Σ` of stored commitment amounts for the same
//! `(sponsor, chainId, lockId)` that are unexpired and unsettled. The
//! sponsor's uncommitted capacity is `allocatable − outstanding`.

use std::collections::HashSet;
use std::time::Duration;

use alloy_primitives::{Address, B256, I256, U256};
use relock_types::error::{AllocatorError, BalanceError, IndexerError};
use relock_types::{Lock, allocator_id};

use crate::chains::SupportedChains;
use crate::indexer::{IndexerApi, with_deadline};
use crate::store::Store;

/// The answer for one `(sponsor, chainId, lockId)` triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockCapacity {
    pub allocatable: U256,
    pub outstanding: U256,
    pub withdrawal_status: u8,
}

impl LockCapacity {
    /// What the sponsor may still commit: `allocatable − outstanding`,
    /// floored at zero (and zero outright under a forced withdrawal).
    pub fn available(&self) -> U256 {
        if self.withdrawal_status != 0 {
            return U256::ZERO;
        }
        self.allocatable.saturating_sub(self.outstanding)
    }
}

pub struct BalanceEngine<'a> {
    pub store: &'a dyn Store,
    pub indexer: &'a dyn IndexerApi,
    pub chains: &'a SupportedChains,
    pub allocator: Address,
    pub indexer_timeout: Duration,
}

impl BalanceEngine<'_> {
    /// Capacity for one lock, refusing locks in forced withdrawal. Used on
    /// the submission path, where such a lock must not be committed against.
    pub async fn lock_capacity(
        &self,
        sponsor: Address,
        chain_id: u64,
        lock: &Lock,
        now: u64,
    ) -> Result<LockCapacity, AllocatorError> {
        let capacity = self
            .lock_capacity_lenient(sponsor, chain_id, lock, now)
            .await?;
        if capacity.withdrawal_status != 0 {
            return Err(BalanceError::ForcedWithdrawal {
                lock_id: lock.lock_id(),
                status: capacity.withdrawal_status,
            }
            .into());
        }
        Ok(capacity)
    }

    /// Capacity for one lock, reporting the withdrawal status instead of
    /// failing on it. Used by the read-only balance endpoints.
    pub async fn lock_capacity_lenient(
        &self,
        sponsor: Address,
        chain_id: u64,
        lock: &Lock,
        now: u64,
    ) -> Result<LockCapacity, AllocatorError> {
        let lock_id = lock.lock_id();
        let chain = self
            .chains
            .get(chain_id)
            .ok_or(BalanceError::UnsupportedChain(chain_id))?;

        let details = with_deadline(
            self.indexer_timeout,
            self.indexer
                .compact_details(self.allocator, sponsor, lock_id, chain_id),
        )
        .await?;

        let state = details.resource_lock.ok_or(BalanceError::LockMissing {
            chain_id,
            lock_id,
        })?;

        let found = allocator_id(lock.lock_tag);
        if found != chain.allocator_id {
            return Err(BalanceError::WrongAllocator {
                chain_id,
                expected: chain.allocator_id,
                found,
            }
            .into());
        }

        let pending = sum_deltas(&details.account_deltas)?;
        let allocatable = if pending.is_negative() {
            state.balance.saturating_add(pending.unsigned_abs())
        } else {
            state.balance.saturating_sub(pending.unsigned_abs())
        };

        let settled: HashSet<B256> = details.settled_claims.iter().copied().collect();
        let outstanding = self
            .store
            .sum_outstanding(sponsor, chain_id, lock_id, now, &settled)
            .await?;

        Ok(LockCapacity {
            allocatable,
            outstanding,
            withdrawal_status: state.withdrawal_status,
        })
    }
}

fn sum_deltas(deltas: &[I256]) -> Result<I256, IndexerError> {
    let mut total = I256::ZERO;
    for delta in deltas {
        total = total
            .checked_add(*delta)
            .ok_or_else(|| IndexerError::InvalidResponse("account delta sum overflow".into()))?;
    }
    Ok(total)
}
