//! Durable compact storage.
//!
//! The trait is the seam for a real database driver; [`MemoryStore`] is the
//! reference implementation used by the binary and the test suites. Insertion
//! of a compact and consumption of its nonce are one atomic operation: either
//! both land or neither does.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use alloy_primitives::{Address, B256, U256};
use async_trait::async_trait;
use relock_types::error::{AllocatorError, NonceError, StoreError};
use relock_types::{CompactRecord, NewCompact};

#[async_trait]
pub trait Store: Send + Sync {
    /// Persist a compact tree and consume its nonce atomically. Fails with
    /// `StoreError::Duplicate` when `(chain_id, claim_hash)` exists and
    /// `NonceError::Replay` when the nonce is already consumed.
    async fn insert_compact(&self, compact: NewCompact) -> Result<CompactRecord, AllocatorError>;

    /// All compacts for a sponsor, most recently created first. Stable
    /// between writes.
    async fn list_by_sponsor(&self, sponsor: Address) -> Result<Vec<CompactRecord>, AllocatorError>;

    async fn find_by_chain_and_claim_hash(
        &self,
        chain_id: u64,
        claim_hash: B256,
    ) -> Result<Option<CompactRecord>, AllocatorError>;

    /// Sum of commitment amounts for `(sponsor, chain_id, lock_id)` whose
    /// parent compact is still outstanding: unexpired and not settled.
    async fn sum_outstanding(
        &self,
        sponsor: Address,
        chain_id: u64,
        lock_id: U256,
        now: u64,
        settled_claims: &HashSet<B256>,
    ) -> Result<U256, AllocatorError>;

    /// Record a consumed nonce outside a compact insertion. Duplicate
    /// insertion is `NonceError::Replay`.
    async fn insert_consumed_nonce(
        &self,
        chain_id: u64,
        sponsor: Address,
        nonce: U256,
    ) -> Result<(), AllocatorError>;

    async fn nonce_consumed(
        &self,
        chain_id: u64,
        sponsor: Address,
        nonce: U256,
    ) -> Result<bool, AllocatorError>;
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct Inner {
    next_id: u64,
    compacts: HashMap<u64, CompactRecord>,
    /// Unique index over the idempotency key.
    by_chain_claim: HashMap<(u64, B256), u64>,
    /// Insertion-ordered ids per sponsor; reversed on read for descending
    /// creation order.
    by_sponsor: HashMap<Address, Vec<u64>>,
    /// Consumed nonces keyed over the full 256-bit value.
    consumed_nonces: HashSet<(u64, Address, U256)>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_compact(&self, compact: NewCompact) -> Result<CompactRecord, AllocatorError> {
        let mut inner = self.inner.write().unwrap();

        let claim_key = (compact.chain_id, compact.claim_hash);
        if inner.by_chain_claim.contains_key(&claim_key) {
            return Err(StoreError::Duplicate {
                chain_id: compact.chain_id,
                claim_hash: compact.claim_hash,
            }
            .into());
        }
        let nonce_key = (compact.chain_id, compact.sponsor, compact.nonce);
        if inner.consumed_nonces.contains(&nonce_key) {
            return Err(NonceError::Replay.into());
        }

        inner.next_id += 1;
        let id = inner.next_id;
        let record = CompactRecord {
            id,
            kind: compact.kind,
            chain_id: compact.chain_id,
            claim_hash: compact.claim_hash,
            sponsor: compact.sponsor,
            nonce: compact.nonce,
            expires: compact.expires,
            signature: compact.signature,
            sponsor_signature: compact.sponsor_signature,
            witness_type_string: compact.witness_type_string,
            witness_hash: compact.witness_hash,
            elements: compact.elements,
            created_at: compact.created_at,
        };

        inner.by_chain_claim.insert(claim_key, id);
        inner
            .by_sponsor
            .entry(record.sponsor)
            .or_default()
            .push(id);
        inner.consumed_nonces.insert(nonce_key);
        inner.compacts.insert(id, record.clone());

        Ok(record)
    }

    async fn list_by_sponsor(&self, sponsor: Address) -> Result<Vec<CompactRecord>, AllocatorError> {
        let inner = self.inner.read().unwrap();
        let ids = inner.by_sponsor.get(&sponsor);
        Ok(ids
            .map(|ids| {
                ids.iter()
                    .rev()
                    .filter_map(|id| inner.compacts.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn find_by_chain_and_claim_hash(
        &self,
        chain_id: u64,
        claim_hash: B256,
    ) -> Result<Option<CompactRecord>, AllocatorError> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .by_chain_claim
            .get(&(chain_id, claim_hash))
            .and_then(|id| inner.compacts.get(id))
            .cloned())
    }

    async fn sum_outstanding(
        &self,
        sponsor: Address,
        chain_id: u64,
        lock_id: U256,
        now: u64,
        settled_claims: &HashSet<B256>,
    ) -> Result<U256, AllocatorError> {
        let inner = self.inner.read().unwrap();
        let mut total = U256::ZERO;
        let Some(ids) = inner.by_sponsor.get(&sponsor) else {
            return Ok(total);
        };
        for id in ids {
            let Some(record) = inner.compacts.get(id) else {
                continue;
            };
            if record.expires <= now || settled_claims.contains(&record.claim_hash) {
                continue;
            }
            for element in &record.elements {
                if element.chain_id != chain_id {
                    continue;
                }
                for commitment in &element.commitments {
                    if commitment.lock_id() == lock_id {
                        total = total.saturating_add(commitment.amount);
                    }
                }
            }
        }
        Ok(total)
    }

    async fn insert_consumed_nonce(
        &self,
        chain_id: u64,
        sponsor: Address,
        nonce: U256,
    ) -> Result<(), AllocatorError> {
        let mut inner = self.inner.write().unwrap();
        if !inner.consumed_nonces.insert((chain_id, sponsor, nonce)) {
            return Err(NonceError::Replay.into());
        }
        Ok(())
    }

    async fn nonce_consumed(
        &self,
        chain_id: u64,
        sponsor: Address,
        nonce: U256,
    ) -> Result<bool, AllocatorError> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .consumed_nonces
            .contains(&(chain_id, sponsor, nonce)))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use alloy_primitives::{Address, B256, Bytes, U256, address};
    use relock_types::error::{AllocatorError, NonceError, StoreError};
    use relock_types::{CommitmentRecord, CompactKind, ElementRecord, NewCompact};

    use super::{MemoryStore, Store};

    const SPONSOR: Address = address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266");

    fn new_compact(chain_id: u64, claim_byte: u8, nonce: u64, expires: u64, amount: u64) -> NewCompact {
        NewCompact {
            kind: CompactKind::Single,
            chain_id,
            claim_hash: B256::repeat_byte(claim_byte),
            sponsor: SPONSOR,
            nonce: U256::from(nonce),
            expires,
            signature: Bytes::from(vec![0u8; 64]),
            sponsor_signature: None,
            witness_type_string: None,
            witness_hash: None,
            elements: vec![ElementRecord {
                element_index: 0,
                arbiter: address!("70997970C51812dc3A010C7d01b50e0d17dc79C8"),
                chain_id,
                mandate_hash: None,
                commitments: vec![CommitmentRecord {
                    lock_tag: [0u8, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0x10].into(),
                    token: address!("0000000000000000000000000000000000000001"),
                    amount: U256::from(amount),
                }],
            }],
            created_at: 1_000 + nonce,
        }
    }

    fn lock_id() -> U256 {
        new_compact(10, 1, 1, 2_000, 1).elements[0].commitments[0].lock_id()
    }

    #[tokio::test]
    async fn duplicate_chain_claim_hash_is_rejected() {
        let store = MemoryStore::new();
        store.insert_compact(new_compact(10, 0xaa, 1, 2_000, 5)).await.unwrap();
        let err = store
            .insert_compact(new_compact(10, 0xaa, 2, 2_000, 5))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AllocatorError::Store(StoreError::Duplicate { chain_id: 10, .. })
        ));

        // Same claim hash on another chain is a different compact.
        store.insert_compact(new_compact(137, 0xaa, 3, 2_000, 5)).await.unwrap();
    }

    #[tokio::test]
    async fn nonce_consumption_is_atomic_with_insert() {
        let store = MemoryStore::new();
        store.insert_compact(new_compact(10, 0xaa, 7, 2_000, 5)).await.unwrap();
        assert!(store.nonce_consumed(10, SPONSOR, U256::from(7u8)).await.unwrap());

        let err = store
            .insert_compact(new_compact(10, 0xbb, 7, 2_000, 5))
            .await
            .unwrap_err();
        assert_eq!(err, AllocatorError::Nonce(NonceError::Replay));
        // The failed insert left nothing behind.
        assert!(store
            .find_by_chain_and_claim_hash(10, B256::repeat_byte(0xbb))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn list_by_sponsor_is_descending_by_creation() {
        let store = MemoryStore::new();
        store.insert_compact(new_compact(10, 0x01, 1, 2_000, 5)).await.unwrap();
        store.insert_compact(new_compact(10, 0x02, 2, 2_000, 5)).await.unwrap();
        store.insert_compact(new_compact(10, 0x03, 3, 2_000, 5)).await.unwrap();

        let listed = store.list_by_sponsor(SPONSOR).await.unwrap();
        let claim_bytes: Vec<u8> = listed.iter().map(|r| r.claim_hash[0]).collect();
        assert_eq!(claim_bytes, vec![0x03, 0x02, 0x01]);

        // Stable across repeated reads.
        assert_eq!(store.list_by_sponsor(SPONSOR).await.unwrap(), listed);
    }

    #[tokio::test]
    async fn sum_outstanding_excludes_expired_and_settled() {
        let store = MemoryStore::new();
        store.insert_compact(new_compact(10, 0x01, 1, 2_000, 5)).await.unwrap();
        store.insert_compact(new_compact(10, 0x02, 2, 900, 7)).await.unwrap();
        store.insert_compact(new_compact(10, 0x03, 3, 2_000, 11)).await.unwrap();

        let now = 1_000;
        let none = HashSet::new();
        let all = store
            .sum_outstanding(SPONSOR, 10, lock_id(), now, &none)
            .await
            .unwrap();
        // 0x02 expired at 900.
        assert_eq!(all, U256::from(16u8));

        let settled: HashSet<_> = [B256::repeat_byte(0x03)].into();
        let remaining = store
            .sum_outstanding(SPONSOR, 10, lock_id(), now, &settled)
            .await
            .unwrap();
        assert_eq!(remaining, U256::from(5u8));

        // Other chain or other lock contributes nothing.
        assert_eq!(
            store.sum_outstanding(SPONSOR, 137, lock_id(), now, &none).await.unwrap(),
            U256::ZERO
        );
        assert_eq!(
            store
                .sum_outstanding(SPONSOR, 10, U256::from(999u64), now, &none)
                .await
                .unwrap(),
            U256::ZERO
        );
    }
}
