//! The allocation engine: the only component that issues signatures.
//!
//! All work outside the per-sponsor critical section is lock-free; inside
//! it, every commitment's capacity is recomputed against live indexer and
//! store state, closing the window between two concurrent submissions by
//! the same sponsor. Persistence and nonce consumption commit atomically;
//! any failure before that leaves no observable effect.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use alloy_primitives::{Address, B256, Bytes, U256};
use futures::future::join_all;
use relock_crypto::{AllocatorSigner, claim_hash, digest, recover_sponsor};
use relock_types::api::CompactPayload;
use relock_types::error::{AllocatorError, AuthError, BalanceError};
use relock_types::ids::{parse_address, parse_b256, parse_chain_id, parse_u256, split_lock_id};
use relock_types::{CompactRecord, Lock, NewCompact, ValidatedCompact};
use tokio::sync::OwnedMutexGuard;
use tracing::{info, warn};

use crate::balance::{BalanceEngine, LockCapacity};
use crate::chains::SupportedChains;
use crate::indexer::{IndexerApi, with_deadline};
use crate::nonce::NonceService;
use crate::store::Store;
use crate::validate::validate_submission;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Client-side deadline on every indexer call; nothing holds a sponsor
    /// lock across an unbounded wait.
    pub indexer_timeout: Duration,
    /// Bounded fragment scan for nonce suggestion.
    pub nonce_scan_limit: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            indexer_timeout: Duration::from_secs(5),
            nonce_scan_limit: 1_024,
        }
    }
}

/// A granted allocation: the co-signature the arbiter will redeem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issued {
    pub claim_hash: B256,
    pub signature: [u8; 64],
    pub nonce: U256,
}

/// Result of the lock-free `/is-allocatable` precheck.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocatable {
    pub chain_id: u64,
    pub compact: ValidatedCompact,
    /// Present when the compact is well-formed but does not fit.
    pub shortfall: Option<BalanceError>,
}

/// One entry of the per-sponsor balances listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SponsorLockBalance {
    pub chain_id: u64,
    pub lock_id: U256,
    pub capacity: LockCapacity,
}

/// Per-sponsor exclusion. Distinct sponsors proceed in parallel; the map
/// itself is guarded by a plain mutex held only long enough to clone the
/// entry.
#[derive(Debug, Default)]
struct SponsorLocks {
    inner: Mutex<HashMap<Address, Arc<tokio::sync::Mutex<()>>>>,
}

impl SponsorLocks {
    async fn acquire(&self, sponsor: Address) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().unwrap();
            Arc::clone(map.entry(sponsor).or_default())
        };
        lock.lock_owned().await
    }
}

pub struct AllocationEngine {
    store: Arc<dyn Store>,
    indexer: Arc<dyn IndexerApi>,
    signer: AllocatorSigner,
    chains: SupportedChains,
    locks: SponsorLocks,
    config: EngineConfig,
}

impl AllocationEngine {
    pub fn new(
        store: Arc<dyn Store>,
        indexer: Arc<dyn IndexerApi>,
        signer: AllocatorSigner,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            indexer,
            signer,
            chains: SupportedChains::new(),
            locks: SponsorLocks::default(),
            config,
        }
    }

    pub fn allocator_address(&self) -> Address {
        self.signer.address()
    }

    pub fn supported_chains(&self) -> &SupportedChains {
        &self.chains
    }

    /// Re-fetch the supported-chain configuration. Called at startup and
    /// from the administrative refresh route, never per request.
    pub async fn refresh_supported_chains(&self) -> Result<usize, AllocatorError> {
        let chains = with_deadline(
            self.config.indexer_timeout,
            self.indexer.supported_chains(self.signer.address()),
        )
        .await?;
        let count = chains.len();
        self.chains.replace(chains);
        Ok(count)
    }

    pub async fn suggested_nonce(
        &self,
        chain_id: &str,
        account: &str,
    ) -> Result<U256, AllocatorError> {
        let chain_id = parse_chain_id(chain_id)?;
        let sponsor = parse_address("account", account)?;
        self.nonce_service().suggest(sponsor, chain_id).await
    }

    /// The critical section: revalidate, authorize, sign, persist.
    pub async fn submit(
        &self,
        chain_id: &str,
        payload: &CompactPayload,
        sponsor_signature: Option<&str>,
    ) -> Result<Issued, AllocatorError> {
        let now = unix_now();
        let (chain_id, compact) = validate_submission(chain_id, payload, now)?;
        let sponsor = compact.sponsor();

        let _guard = self.locks.acquire(sponsor).await;

        // Recheck every commitment against live state while holding the
        // sponsor lock; the `/is-allocatable` precheck alone would leave a
        // window between two simultaneous submissions.
        let balance = self.balance_engine();
        for (lock_chain, lock) in compact.chain_commitments(chain_id) {
            let capacity = balance
                .lock_capacity(sponsor, lock_chain, &lock, now)
                .await?;
            if capacity.available() < lock.amount {
                return Err(BalanceError::InsufficientBalance {
                    lock_id: lock.lock_id(),
                    have: capacity.available(),
                    need: lock.amount,
                }
                .into());
            }
        }

        self.nonce_service()
            .validate(compact.nonce(), sponsor, chain_id)
            .await?;

        let claim_hash = claim_hash(&compact)?;
        let message = digest(chain_id, claim_hash);
        let stored_signature = self
            .authorize_sponsor(&compact, chain_id, claim_hash, message, sponsor_signature)
            .await?;

        let signature = self.signer.sign_digest(message)?;
        let record = NewCompact::from_validated(
            &compact,
            chain_id,
            claim_hash,
            Bytes::copy_from_slice(&signature),
            stored_signature,
            now,
        );
        self.store.insert_compact(record).await?;

        info!(
            sponsor = %sponsor,
            chain_id,
            claim_hash = %claim_hash,
            "issued allocation"
        );
        Ok(Issued {
            claim_hash,
            signature,
            nonce: compact.nonce(),
        })
    }

    /// Lock-free precheck for `/compact/is-allocatable`. Balance-family
    /// conditions are the endpoint's answer, not failures.
    pub async fn is_allocatable(
        &self,
        chain_id: &str,
        payload: &CompactPayload,
    ) -> Result<Allocatable, AllocatorError> {
        let now = unix_now();
        let (chain_id, compact) = validate_submission(chain_id, payload, now)?;
        let sponsor = compact.sponsor();

        let balance = self.balance_engine();
        for (lock_chain, lock) in compact.chain_commitments(chain_id) {
            let capacity = match balance.lock_capacity(sponsor, lock_chain, &lock, now).await {
                Ok(capacity) => capacity,
                Err(AllocatorError::Balance(shortfall)) => {
                    return Ok(Allocatable {
                        chain_id,
                        compact,
                        shortfall: Some(shortfall),
                    });
                }
                Err(other) => return Err(other),
            };
            if capacity.available() < lock.amount {
                return Ok(Allocatable {
                    chain_id,
                    compact,
                    shortfall: Some(BalanceError::InsufficientBalance {
                        lock_id: lock.lock_id(),
                        have: capacity.available(),
                        need: lock.amount,
                    }),
                });
            }
        }

        Ok(Allocatable {
            chain_id,
            compact,
            shortfall: None,
        })
    }

    /// Balance view for one lock; reports withdrawal status rather than
    /// refusing on it.
    pub async fn lock_balance(
        &self,
        chain_id: &str,
        lock_id: &str,
        account: &str,
    ) -> Result<LockCapacity, AllocatorError> {
        let chain_id = parse_chain_id(chain_id)?;
        let sponsor = parse_address("account", account)?;
        let lock_id = parse_u256("lockId", lock_id)?;
        let (lock_tag, token) = split_lock_id(lock_id);
        let lock = Lock {
            lock_tag,
            token,
            amount: U256::ZERO,
        };
        self.balance_engine()
            .lock_capacity_lenient(sponsor, chain_id, &lock, unix_now())
            .await
    }

    /// All of the sponsor's locks handled by this allocator, with balances.
    /// Individual lock failures are skipped with a warning so one bad lock
    /// cannot hide the rest.
    pub async fn sponsor_balances(
        &self,
        account: &str,
    ) -> Result<Vec<SponsorLockBalance>, AllocatorError> {
        let sponsor = parse_address("account", account)?;
        let refs = with_deadline(
            self.config.indexer_timeout,
            self.indexer.resource_locks(sponsor),
        )
        .await?;

        let allocator = self.signer.address();
        let now = unix_now();
        let balance = self.balance_engine();
        let lookups = refs
            .into_iter()
            .filter(|lock_ref| lock_ref.allocator_address == allocator)
            .map(|lock_ref| {
                let balance = &balance;
                async move {
                    let (lock_tag, token) = split_lock_id(lock_ref.lock_id);
                    let lock = Lock {
                        lock_tag,
                        token,
                        amount: U256::ZERO,
                    };
                    let capacity = balance
                        .lock_capacity_lenient(sponsor, lock_ref.chain_id, &lock, now)
                        .await;
                    (lock_ref, capacity)
                }
            });

        let mut balances = Vec::new();
        for (lock_ref, capacity) in join_all(lookups).await {
            match capacity {
                Ok(capacity) => balances.push(SponsorLockBalance {
                    chain_id: lock_ref.chain_id,
                    lock_id: lock_ref.lock_id,
                    capacity,
                }),
                Err(err) => {
                    warn!(
                        sponsor = %sponsor,
                        chain_id = lock_ref.chain_id,
                        lock_id = %lock_ref.lock_id,
                        error = %err,
                        "skipping lock in balances listing"
                    );
                }
            }
        }
        Ok(balances)
    }

    pub async fn compacts_by_sponsor(
        &self,
        account: &str,
    ) -> Result<Vec<CompactRecord>, AllocatorError> {
        let sponsor = parse_address("account", account)?;
        self.store.list_by_sponsor(sponsor).await
    }

    pub async fn compact_by_hash(
        &self,
        chain_id: &str,
        claim_hash: &str,
    ) -> Result<Option<CompactRecord>, AllocatorError> {
        let chain_id = parse_chain_id(chain_id)?;
        let claim_hash = parse_b256("claimHash", claim_hash)?;
        self.store
            .find_by_chain_and_claim_hash(chain_id, claim_hash)
            .await
    }

    /// Signed sponsors recover over the digest; smart-contract-wallet
    /// sponsors may instead have registered the compact on chain. Returns
    /// the signature bytes to persist when the signed path succeeded.
    async fn authorize_sponsor(
        &self,
        compact: &ValidatedCompact,
        chain_id: u64,
        claim_hash: B256,
        message: B256,
        sponsor_signature: Option<&str>,
    ) -> Result<Option<Bytes>, AllocatorError> {
        let sponsor = compact.sponsor();

        if let Some(signature_hex) = sponsor_signature.map(str::trim).filter(|s| !s.is_empty()) {
            if let Ok(recovered) = recover_sponsor(message, signature_hex) {
                if recovered == sponsor {
                    let body = signature_hex
                        .strip_prefix("0x")
                        .or_else(|| signature_hex.strip_prefix("0X"))
                        .unwrap_or(signature_hex);
                    let bytes = hex::decode(body)
                        .map_err(|_| AllocatorError::Auth(AuthError::InvalidSponsor))?;
                    return Ok(Some(Bytes::from(bytes)));
                }
            }
        }

        let registration = with_deadline(
            self.config.indexer_timeout,
            self.indexer
                .registered_compact(self.signer.address(), sponsor, claim_hash, chain_id),
        )
        .await?;
        match registration {
            Some(registered)
                if registered.sponsor == sponsor && registered.expires >= compact.expires() =>
            {
                info!(
                    sponsor = %sponsor,
                    chain_id,
                    claim_hash = %claim_hash,
                    "accepted on-chain registered compact"
                );
                Ok(None)
            }
            _ => Err(AuthError::InvalidSponsor.into()),
        }
    }

    fn balance_engine(&self) -> BalanceEngine<'_> {
        BalanceEngine {
            store: &*self.store,
            indexer: &*self.indexer,
            chains: &self.chains,
            allocator: self.signer.address(),
            indexer_timeout: self.config.indexer_timeout,
        }
    }

    fn nonce_service(&self) -> NonceService<'_> {
        NonceService {
            store: &*self.store,
            indexer: &*self.indexer,
            indexer_timeout: self.config.indexer_timeout,
            scan_limit: self.config.nonce_scan_limit,
        }
    }
}

/// Unix seconds; the clock every expiry comparison uses.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::{Arc, RwLock};

    use alloy_primitives::{Address, B256, I256, U256, address};
    use alloy_signer::SignerSync;
    use alloy_signer_local::PrivateKeySigner;
    use async_trait::async_trait;
    use relock_crypto::AllocatorSigner;
    use relock_types::api::{CompactPayload, LockPayload};
    use relock_types::error::{AllocatorError, AuthError, BalanceError, IndexerError, NonceError};
    use relock_types::ids::{hex_u256, parse_lock_tag};
    use relock_types::Lock;

    use super::{AllocationEngine, EngineConfig, unix_now};
    use crate::indexer::{
        CompactDetails, IndexerApi, RegisteredCompact, ResourceLockRef, ResourceLockState,
        SupportedChain,
    };
    use crate::nonce::compose;
    use crate::store::MemoryStore;

    const SPONSOR: Address = address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266");
    const SPONSOR_KEY: [u8; 32] = [
        0xac, 0x09, 0x74, 0xbe, 0xc3, 0x9a, 0x17, 0xe3, 0x6b, 0xa4, 0xa6, 0xb4, 0xd2, 0x38, 0xff,
        0x94, 0x4b, 0xac, 0xb4, 0x78, 0xcb, 0xed, 0x5e, 0xfc, 0xae, 0x78, 0x4d, 0x7b, 0xf4, 0xf2,
        0xff, 0x80,
    ];
    const ARBITER: &str = "0x70997970C51812dc3A010C7d01b50e0d17dc79C8";

    struct FakeIndexer {
        lock_state: RwLock<HashMap<(u64, U256), ResourceLockState>>,
        deltas: RwLock<Vec<I256>>,
        settled: RwLock<Vec<B256>>,
        registered: RwLock<HashMap<B256, RegisteredCompact>>,
    }

    impl FakeIndexer {
        fn new() -> Self {
            Self {
                lock_state: RwLock::new(HashMap::new()),
                deltas: RwLock::new(Vec::new()),
                settled: RwLock::new(Vec::new()),
                registered: RwLock::new(HashMap::new()),
            }
        }

        fn set_lock(&self, chain_id: u64, lock_id: U256, balance: U256, withdrawal_status: u8) {
            self.lock_state.write().unwrap().insert(
                (chain_id, lock_id),
                ResourceLockState {
                    withdrawal_status,
                    balance,
                },
            );
        }
    }

    #[async_trait]
    impl IndexerApi for FakeIndexer {
        async fn compact_details(
            &self,
            _: Address,
            _: Address,
            lock_id: U256,
            chain_id: u64,
        ) -> Result<CompactDetails, IndexerError> {
            Ok(CompactDetails {
                resource_lock: self
                    .lock_state
                    .read()
                    .unwrap()
                    .get(&(chain_id, lock_id))
                    .cloned(),
                account_deltas: self.deltas.read().unwrap().clone(),
                settled_claims: self.settled.read().unwrap().clone(),
            })
        }

        async fn resource_locks(&self, _: Address) -> Result<Vec<ResourceLockRef>, IndexerError> {
            Ok(Vec::new())
        }

        async fn supported_chains(&self, _: Address) -> Result<Vec<SupportedChain>, IndexerError> {
            Ok(vec![SupportedChain {
                chain_id: 10,
                allocator_id: U256::from(1u8),
                finalization_lag_blocks: 12,
            }])
        }

        async fn registered_compact(
            &self,
            _: Address,
            _: Address,
            claim_hash: B256,
            _: u64,
        ) -> Result<Option<RegisteredCompact>, IndexerError> {
            Ok(self.registered.read().unwrap().get(&claim_hash).cloned())
        }

        async fn nonce_consumed(&self, _: u64, _: Address, _: U256) -> Result<bool, IndexerError> {
            Ok(false)
        }
    }

    fn test_lock(amount: U256) -> Lock {
        Lock {
            lock_tag: parse_lock_tag("0x000000000000000000000010").unwrap(),
            token: address!("0000000000000000000000000000000000000001"),
            amount,
        }
    }

    async fn engine_with_balance(balance: U256) -> (Arc<AllocationEngine>, Arc<FakeIndexer>) {
        let indexer = Arc::new(FakeIndexer::new());
        indexer.set_lock(10, test_lock(U256::ZERO).lock_id(), balance, 0);
        let engine = Arc::new(AllocationEngine::new(
            Arc::new(MemoryStore::new()),
            Arc::clone(&indexer) as Arc<dyn IndexerApi>,
            AllocatorSigner::from_slice(&[0x07; 32]).unwrap(),
            EngineConfig::default(),
        ));
        engine.refresh_supported_chains().await.unwrap();
        (engine, indexer)
    }

    fn payload(amount: U256, fragment: u64) -> CompactPayload {
        CompactPayload {
            arbiter: Some(ARBITER.to_string()),
            sponsor: SPONSOR.to_checksum(None),
            nonce: Some(hex_u256(compose(SPONSOR, U256::from(fragment)))),
            expires: (unix_now() + 600).to_string(),
            id: Some(test_lock(U256::ZERO).lock_id().to_string()),
            amount: Some(amount.to_string()),
            ..CompactPayload::default()
        }
    }

    /// Sign the payload's digest with the sponsor key, 65-byte form.
    fn sponsor_signature(request: &CompactPayload) -> String {
        let (chain_id, compact) =
            crate::validate::validate_submission("10", request, unix_now()).unwrap();
        let claim = relock_crypto::claim_hash(&compact).unwrap();
        let digest = relock_crypto::digest(chain_id, claim);
        let signer = PrivateKeySigner::from_slice(&SPONSOR_KEY).unwrap();
        let signature = signer.sign_hash_sync(&digest).unwrap();
        format!("0x{}", hex::encode(signature.as_bytes()))
    }

    #[tokio::test]
    async fn happy_path_issues_a_signature() {
        let one_eth = U256::from(10u64).pow(U256::from(18u8));
        let (engine, _) = engine_with_balance(one_eth * U256::from(1_000u64)).await;

        let request = payload(one_eth, 0);
        let signature = sponsor_signature(&request);
        let issued = engine.submit("10", &request, Some(&signature)).await.unwrap();

        assert_eq!(issued.nonce, compose(SPONSOR, U256::ZERO));
        assert_eq!(issued.signature.len(), 64);

        let stored = engine.compacts_by_sponsor(&SPONSOR.to_string()).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].claim_hash, issued.claim_hash);

        // The consumed fragment is skipped by the next suggestion.
        let suggested = engine
            .suggested_nonce("10", &SPONSOR.to_string())
            .await
            .unwrap();
        assert_eq!(suggested, compose(SPONSOR, U256::from(1u8)));
    }

    #[tokio::test]
    async fn nonce_replay_is_rejected() {
        let one_eth = U256::from(10u64).pow(U256::from(18u8));
        let (engine, _) = engine_with_balance(one_eth * U256::from(1_000u64)).await;

        let request = payload(one_eth, 0);
        let signature = sponsor_signature(&request);
        engine.submit("10", &request, Some(&signature)).await.unwrap();

        // Same nonce, new expiry: different claim hash, consumed nonce.
        let mut replayed = payload(one_eth, 0);
        replayed.expires = (unix_now() + 700).to_string();
        let signature = sponsor_signature(&replayed);
        let err = engine.submit("10", &replayed, Some(&signature)).await.unwrap_err();
        assert_eq!(err, AllocatorError::Nonce(NonceError::Replay));
    }

    #[tokio::test]
    async fn insufficient_balance_reports_have_and_need() {
        let (engine, _) = engine_with_balance(U256::from(20u8)).await;

        let first = payload(U256::from(15u8), 0);
        let signature = sponsor_signature(&first);
        engine.submit("10", &first, Some(&signature)).await.unwrap();

        let second = payload(U256::from(10u8), 1);
        let signature = sponsor_signature(&second);
        let err = engine.submit("10", &second, Some(&signature)).await.unwrap_err();
        assert_eq!(
            err,
            AllocatorError::Balance(BalanceError::InsufficientBalance {
                lock_id: test_lock(U256::ZERO).lock_id(),
                have: U256::from(5u8),
                need: U256::from(10u8),
            })
        );
    }

    #[tokio::test]
    async fn concurrent_submissions_grant_exactly_one() {
        let (engine, _) = engine_with_balance(U256::from(10u8)).await;

        let first = payload(U256::from(7u8), 0);
        let second = payload(U256::from(7u8), 1);
        let sig_first = sponsor_signature(&first);
        let sig_second = sponsor_signature(&second);

        let (a, b) = tokio::join!(
            engine.submit("10", &first, Some(&sig_first)),
            engine.submit("10", &second, Some(&sig_second)),
        );

        let granted = [&a, &b].iter().filter(|r| r.is_ok()).count();
        assert_eq!(granted, 1, "exactly one of two oversubscribing submissions may win");
        let refused = if a.is_ok() { b.unwrap_err() } else { a.unwrap_err() };
        assert!(matches!(
            refused,
            AllocatorError::Balance(BalanceError::InsufficientBalance { .. })
        ));
    }

    #[tokio::test]
    async fn forced_withdrawal_leaves_no_trace() {
        let (engine, indexer) = engine_with_balance(U256::from(100u8)).await;
        indexer.set_lock(10, test_lock(U256::ZERO).lock_id(), U256::from(100u8), 1);

        let request = payload(U256::from(5u8), 0);
        let signature = sponsor_signature(&request);
        let err = engine.submit("10", &request, Some(&signature)).await.unwrap_err();
        assert!(matches!(
            err,
            AllocatorError::Balance(BalanceError::ForcedWithdrawal { status: 1, .. })
        ));

        assert!(engine
            .compacts_by_sponsor(&SPONSOR.to_string())
            .await
            .unwrap()
            .is_empty());
        // Nonce fragment 0 is still free.
        assert_eq!(
            engine.suggested_nonce("10", &SPONSOR.to_string()).await.unwrap(),
            compose(SPONSOR, U256::ZERO)
        );
    }

    #[tokio::test]
    async fn wrong_signer_is_rejected_without_registration() {
        let one_eth = U256::from(10u64).pow(U256::from(18u8));
        let (engine, _) = engine_with_balance(one_eth * U256::from(1_000u64)).await;

        let request = payload(one_eth, 0);
        let stranger = PrivateKeySigner::from_slice(&[0x33; 32]).unwrap();
        let (chain_id, compact) =
            crate::validate::validate_submission("10", &request, unix_now()).unwrap();
        let digest = relock_crypto::digest(chain_id, relock_crypto::claim_hash(&compact).unwrap());
        let forged = format!(
            "0x{}",
            hex::encode(stranger.sign_hash_sync(&digest).unwrap().as_bytes())
        );

        let err = engine.submit("10", &request, Some(&forged)).await.unwrap_err();
        assert_eq!(err, AllocatorError::Auth(AuthError::InvalidSponsor));
    }

    #[tokio::test]
    async fn onchain_registration_substitutes_for_a_signature() {
        let one_eth = U256::from(10u64).pow(U256::from(18u8));
        let (engine, indexer) = engine_with_balance(one_eth * U256::from(1_000u64)).await;

        let request = payload(one_eth, 0);
        let (_, compact) =
            crate::validate::validate_submission("10", &request, unix_now()).unwrap();
        let claim = relock_crypto::claim_hash(&compact).unwrap();

        // Registration that expires before the compact does not qualify.
        indexer.registered.write().unwrap().insert(
            claim,
            RegisteredCompact {
                sponsor: SPONSOR,
                expires: unix_now() - 1,
                typehash: B256::ZERO,
                claimed: false,
            },
        );
        let err = engine.submit("10", &request, None).await.unwrap_err();
        assert_eq!(err, AllocatorError::Auth(AuthError::InvalidSponsor));

        indexer.registered.write().unwrap().insert(
            claim,
            RegisteredCompact {
                sponsor: SPONSOR,
                expires: unix_now() + 3_600,
                typehash: B256::ZERO,
                claimed: false,
            },
        );
        let issued = engine.submit("10", &request, None).await.unwrap();
        assert_eq!(issued.claim_hash, claim);
        let stored = engine.compacts_by_sponsor(&SPONSOR.to_string()).await.unwrap();
        assert_eq!(stored[0].sponsor_signature, None);
    }

    #[tokio::test]
    async fn is_allocatable_reports_shortfall_without_effects() {
        let (engine, _) = engine_with_balance(U256::from(10u8)).await;

        let fits = engine.is_allocatable("10", &payload(U256::from(10u8), 0)).await.unwrap();
        assert!(fits.shortfall.is_none());

        let too_big = engine.is_allocatable("10", &payload(U256::from(11u8), 0)).await.unwrap();
        assert!(matches!(
            too_big.shortfall,
            Some(BalanceError::InsufficientBalance { .. })
        ));

        // The precheck persisted nothing and consumed nothing.
        assert!(engine
            .compacts_by_sponsor(&SPONSOR.to_string())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn batch_order_does_not_change_the_claim_hash() {
        let (engine, indexer) = engine_with_balance(U256::from(1_000u64)).await;
        let lock_a = LockPayload {
            lock_tag: "0x000000000000000000000010".to_string(),
            token: "0x0000000000000000000000000000000000000001".to_string(),
            amount: "5".to_string(),
        };
        let lock_b = LockPayload {
            lock_tag: "0x000000000000000000000010".to_string(),
            token: "0x0000000000000000000000000000000000000002".to_string(),
            amount: "7".to_string(),
        };
        let second_lock = Lock {
            lock_tag: parse_lock_tag("0x000000000000000000000010").unwrap(),
            token: address!("0000000000000000000000000000000000000002"),
            amount: U256::ZERO,
        };
        indexer.set_lock(10, second_lock.lock_id(), U256::from(1_000u64), 0);

        let batch = |commitments: Vec<LockPayload>| CompactPayload {
            arbiter: Some(ARBITER.to_string()),
            sponsor: SPONSOR.to_checksum(None),
            nonce: Some(hex_u256(compose(SPONSOR, U256::ZERO))),
            expires: (unix_now() + 600).to_string(),
            commitments: Some(commitments),
            ..CompactPayload::default()
        };

        let forward = batch(vec![lock_a.clone(), lock_b.clone()]);
        let reversed = batch(vec![lock_b, lock_a]);

        let sig_forward = sponsor_signature(&forward);
        let issued = engine.submit("10", &forward, Some(&sig_forward)).await.unwrap();

        // The reversed ordering canonicalizes to the same claim hash.
        let (_, reversed_compact) =
            crate::validate::validate_submission("10", &reversed, unix_now()).unwrap();
        assert_eq!(
            relock_crypto::claim_hash(&reversed_compact).unwrap(),
            issued.claim_hash
        );
    }
}
