//! Pre-built scenario: one sponsor, one arbiter, one funded resource lock.
//!
//! Keys are the well-known local development accounts so sponsor signatures
//! in tests are real secp256k1 signatures over real digests.

use alloy_primitives::{Address, U256};
use alloy_signer_local::PrivateKeySigner;
use relock_engine::indexer::SupportedChain;
use relock_types::ids::{LockTag, lock_id};

use crate::mock_indexer::MockIndexer;

/// Local development key #0; its address is the scenario sponsor.
pub const SPONSOR_KEY: [u8; 32] = [
    0xac, 0x09, 0x74, 0xbe, 0xc3, 0x9a, 0x17, 0xe3, 0x6b, 0xa4, 0xa6, 0xb4, 0xd2, 0x38, 0xff,
    0x94, 0x4b, 0xac, 0xb4, 0x78, 0xcb, 0xed, 0x5e, 0xfc, 0xae, 0x78, 0x4d, 0x7b, 0xf4, 0xf2,
    0xff, 0x80,
];

/// Fixed allocator key for scenarios; any nonzero scalar below the curve
/// order works.
pub const ALLOCATOR_KEY: [u8; 32] = [0x07; 32];

#[derive(Debug, Clone, Copy)]
pub struct ScenarioAccounts {
    pub sponsor: Address,
    pub arbiter: Address,
    pub token: Address,
}

/// One chain, one sponsor, one funded lock under allocator id 1.
#[derive(Debug)]
pub struct SingleLockScenario {
    pub accounts: ScenarioAccounts,
    pub chain_id: u64,
    pub lock_tag: LockTag,
    pub indexer: MockIndexer,
}

impl SingleLockScenario {
    /// Chain 10, allocator id 1, the given lock balance.
    pub fn funded(balance: U256) -> Self {
        let sponsor = address_of(&SPONSOR_KEY);
        let allocator = address_of(&ALLOCATOR_KEY);
        let accounts = ScenarioAccounts {
            sponsor,
            // Local development key #1.
            arbiter: address_of(&[
                0x59, 0xc6, 0x99, 0x5e, 0x99, 0x8f, 0x97, 0xa5, 0xa0, 0x04, 0x49, 0x66, 0xf0,
                0x94, 0x53, 0x89, 0xdc, 0x9e, 0x86, 0xda, 0xe8, 0x8c, 0x7a, 0x84, 0x12, 0xf4,
                0x60, 0x3b, 0x6b, 0x78, 0x69, 0x0d,
            ]),
            token: {
                let mut token = [0u8; 20];
                token[19] = 0x01;
                Address::from(token)
            },
        };

        // allocatorId 1 sits in bits 4..96 of the tag.
        let lock_tag = LockTag::from([0u8, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0x10]);
        let chain_id = 10;

        let indexer = MockIndexer::new();
        indexer.set_supported_chains(vec![SupportedChain {
            chain_id,
            allocator_id: U256::from(1u8),
            finalization_lag_blocks: 12,
        }]);
        indexer.set_lock(
            chain_id,
            sponsor,
            lock_id(lock_tag, accounts.token),
            balance,
            allocator,
        );

        Self {
            accounts,
            chain_id,
            lock_tag,
            indexer,
        }
    }

    pub fn lock_id(&self) -> U256 {
        lock_id(self.lock_tag, self.accounts.token)
    }

    pub fn sponsor_signer(&self) -> PrivateKeySigner {
        PrivateKeySigner::from_slice(&SPONSOR_KEY).expect("valid scenario key")
    }
}

fn address_of(key: &[u8; 32]) -> Address {
    PrivateKeySigner::from_slice(key)
        .expect("valid scenario key")
        .address()
}

#[cfg(test)]
mod tests {
    use alloy_primitives::U256;
    use relock_engine::indexer::IndexerApi;
    use relock_types::allocator_id;

    use super::{ALLOCATOR_KEY, SingleLockScenario, address_of};

    #[tokio::test]
    async fn scenario_lock_belongs_to_the_scenario_allocator() {
        let scenario = SingleLockScenario::funded(U256::from(1_000u64));
        assert_eq!(allocator_id(scenario.lock_tag), U256::from(1u8));

        let refs = scenario
            .indexer
            .resource_locks(scenario.accounts.sponsor)
            .await
            .unwrap();
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].lock_id, scenario.lock_id());
        assert_eq!(refs[0].allocator_address, address_of(&ALLOCATOR_KEY));

        let chains = scenario
            .indexer
            .supported_chains(refs[0].allocator_address)
            .await
            .unwrap();
        assert_eq!(chains[0].chain_id, 10);
    }
}
