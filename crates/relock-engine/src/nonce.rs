//! Nonce derivation and lifecycle.
//!
//! Layout of a 32-byte nonce: high 20 bytes are the sponsor address, low
//! 12 bytes a fragment the sponsor chooses or the service suggests. The
//! prefix binds every nonce to its sponsor, so two sponsors can never
//! collide. Consumption itself happens inside the store's compact-insert
//! transaction; this module only derives and checks.

use std::time::Duration;

use alloy_primitives::{Address, U256};
use relock_types::error::{AllocatorError, NonceError};
use relock_types::ids::NONCE_FRAGMENT_BITS;

use crate::indexer::{IndexerApi, with_deadline};
use crate::store::Store;

/// Compose a nonce from a sponsor and a fragment (`fragment < 2^96`).
pub fn compose(sponsor: Address, fragment: U256) -> U256 {
    (U256::from_be_slice(sponsor.as_slice()) << NONCE_FRAGMENT_BITS) | fragment
}

/// The sponsor-chosen low 12 bytes.
pub fn fragment(nonce: U256) -> U256 {
    nonce & ((U256::from(1u8) << NONCE_FRAGMENT_BITS) - U256::from(1u8))
}

/// Whether the high 20 bytes of a nonce equal the sponsor address.
pub fn embeds_sponsor(nonce: U256, sponsor: Address) -> bool {
    (nonce >> NONCE_FRAGMENT_BITS) == U256::from_be_slice(sponsor.as_slice())
}

pub struct NonceService<'a> {
    pub store: &'a dyn Store,
    pub indexer: &'a dyn IndexerApi,
    pub indexer_timeout: Duration,
    /// Bounded fragment scan for `suggest`.
    pub scan_limit: u32,
}

impl NonceService<'_> {
    /// Smallest free fragment composed with the sponsor prefix, checked
    /// against both the local consumed table and the on-chain feed.
    pub async fn suggest(
        &self,
        sponsor: Address,
        chain_id: u64,
    ) -> Result<U256, AllocatorError> {
        for fragment in 0..self.scan_limit {
            let candidate = compose(sponsor, U256::from(fragment));
            if self.store.nonce_consumed(chain_id, sponsor, candidate).await? {
                continue;
            }
            if with_deadline(
                self.indexer_timeout,
                self.indexer.nonce_consumed(chain_id, sponsor, candidate),
            )
            .await?
            {
                continue;
            }
            return Ok(candidate);
        }
        Err(NonceError::Exhausted(self.scan_limit).into())
    }

    /// A nonce is usable when it embeds the sponsor and is unconsumed both
    /// locally and on chain.
    pub async fn validate(
        &self,
        nonce: U256,
        sponsor: Address,
        chain_id: u64,
    ) -> Result<(), AllocatorError> {
        if !embeds_sponsor(nonce, sponsor) {
            return Err(NonceError::SponsorMismatch(sponsor).into());
        }
        if self.store.nonce_consumed(chain_id, sponsor, nonce).await? {
            return Err(NonceError::Replay.into());
        }
        if with_deadline(
            self.indexer_timeout,
            self.indexer.nonce_consumed(chain_id, sponsor, nonce),
        )
        .await?
        {
            return Err(NonceError::Consumed.into());
        }
        Ok(())
    }
}
