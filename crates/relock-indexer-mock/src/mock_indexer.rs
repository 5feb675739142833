//! Scriptable in-memory indexer for tests and local demos.
//!
//! Every read the engine performs can be staged with a setter, and the whole
//! client can be switched into a failure mode to exercise the engine's
//! no-partial-commit guarantee.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use alloy_primitives::{Address, B256, I256, U256};
use async_trait::async_trait;
use relock_engine::indexer::{
    CompactDetails, IndexerApi, RegisteredCompact, ResourceLockRef, ResourceLockState,
    SupportedChain,
};
use relock_types::error::IndexerError;

#[derive(Debug, Clone)]
struct LockFixture {
    sponsor: Address,
    state: ResourceLockState,
    deltas: Vec<I256>,
    settled_claims: Vec<B256>,
    allocator_address: Address,
}

#[derive(Debug, Default)]
struct Inner {
    chains: Vec<SupportedChain>,
    locks: HashMap<(u64, Address, U256), LockFixture>,
    registered: HashMap<(u64, Address, B256), RegisteredCompact>,
    consumed_nonces: HashSet<(u64, Address, U256)>,
    failure: Option<IndexerError>,
}

#[derive(Debug, Default)]
pub struct MockIndexer {
    inner: RwLock<Inner>,
}

impl MockIndexer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_supported_chains(&self, chains: Vec<SupportedChain>) {
        self.inner.write().unwrap().chains = chains;
    }

    /// Stage a resource lock with a balance and an owning allocator.
    pub fn set_lock(
        &self,
        chain_id: u64,
        sponsor: Address,
        lock_id: U256,
        balance: U256,
        allocator_address: Address,
    ) {
        self.inner.write().unwrap().locks.insert(
            (chain_id, sponsor, lock_id),
            LockFixture {
                sponsor,
                state: ResourceLockState {
                    withdrawal_status: 0,
                    balance,
                },
                deltas: Vec::new(),
                settled_claims: Vec::new(),
                allocator_address,
            },
        );
    }

    pub fn set_withdrawal_status(
        &self,
        chain_id: u64,
        sponsor: Address,
        lock_id: U256,
        status: u8,
    ) {
        if let Some(fixture) = self
            .inner
            .write()
            .unwrap()
            .locks
            .get_mut(&(chain_id, sponsor, lock_id))
        {
            fixture.state.withdrawal_status = status;
        }
    }

    /// Append a signed scheduled outflow for the lock.
    pub fn push_delta(&self, chain_id: u64, sponsor: Address, lock_id: U256, delta: I256) {
        if let Some(fixture) = self
            .inner
            .write()
            .unwrap()
            .locks
            .get_mut(&(chain_id, sponsor, lock_id))
        {
            fixture.deltas.push(delta);
        }
    }

    /// Mark a claim hash as settled on chain for the lock's account.
    pub fn settle_claim(&self, chain_id: u64, sponsor: Address, lock_id: U256, claim_hash: B256) {
        if let Some(fixture) = self
            .inner
            .write()
            .unwrap()
            .locks
            .get_mut(&(chain_id, sponsor, lock_id))
        {
            fixture.settled_claims.push(claim_hash);
        }
    }

    pub fn register_compact(
        &self,
        chain_id: u64,
        sponsor: Address,
        claim_hash: B256,
        registered: RegisteredCompact,
    ) {
        self.inner
            .write()
            .unwrap()
            .registered
            .insert((chain_id, sponsor, claim_hash), registered);
    }

    pub fn consume_nonce_onchain(&self, chain_id: u64, sponsor: Address, nonce: U256) {
        self.inner
            .write()
            .unwrap()
            .consumed_nonces
            .insert((chain_id, sponsor, nonce));
    }

    /// Make every subsequent call fail with the given error; `None` clears.
    pub fn set_failure(&self, failure: Option<IndexerError>) {
        self.inner.write().unwrap().failure = failure;
    }

    fn check_failure(&self) -> Result<(), IndexerError> {
        match &self.inner.read().unwrap().failure {
            Some(failure) => Err(failure.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl IndexerApi for MockIndexer {
    async fn compact_details(
        &self,
        _allocator: Address,
        sponsor: Address,
        lock_id: U256,
        chain_id: u64,
    ) -> Result<CompactDetails, IndexerError> {
        self.check_failure()?;
        let inner = self.inner.read().unwrap();
        Ok(match inner.locks.get(&(chain_id, sponsor, lock_id)) {
            Some(fixture) => CompactDetails {
                resource_lock: Some(fixture.state.clone()),
                account_deltas: fixture.deltas.clone(),
                settled_claims: fixture.settled_claims.clone(),
            },
            None => CompactDetails::default(),
        })
    }

    async fn resource_locks(&self, sponsor: Address) -> Result<Vec<ResourceLockRef>, IndexerError> {
        self.check_failure()?;
        let inner = self.inner.read().unwrap();
        let mut refs: Vec<ResourceLockRef> = inner
            .locks
            .iter()
            .filter(|(_, fixture)| fixture.sponsor == sponsor)
            .map(|((chain_id, _, lock_id), fixture)| ResourceLockRef {
                chain_id: *chain_id,
                lock_id: *lock_id,
                allocator_address: fixture.allocator_address,
            })
            .collect();
        refs.sort_by_key(|lock_ref| (lock_ref.chain_id, lock_ref.lock_id));
        Ok(refs)
    }

    async fn supported_chains(&self, _allocator: Address) -> Result<Vec<SupportedChain>, IndexerError> {
        self.check_failure()?;
        Ok(self.inner.read().unwrap().chains.clone())
    }

    async fn registered_compact(
        &self,
        _allocator: Address,
        sponsor: Address,
        claim_hash: B256,
        chain_id: u64,
    ) -> Result<Option<RegisteredCompact>, IndexerError> {
        self.check_failure()?;
        Ok(self
            .inner
            .read()
            .unwrap()
            .registered
            .get(&(chain_id, sponsor, claim_hash))
            .cloned())
    }

    async fn nonce_consumed(
        &self,
        chain_id: u64,
        sponsor: Address,
        nonce: U256,
    ) -> Result<bool, IndexerError> {
        self.check_failure()?;
        Ok(self
            .inner
            .read()
            .unwrap()
            .consumed_nonces
            .contains(&(chain_id, sponsor, nonce)))
    }
}
