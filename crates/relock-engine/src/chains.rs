//! Process-wide supported-chains cache.
//!
//! Read-mostly: refreshed once at startup and again only through the
//! administrative refresh call, never in a request path.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::indexer::SupportedChain;

#[derive(Debug, Default)]
pub struct SupportedChains {
    inner: RwLock<HashMap<u64, SupportedChain>>,
}

impl SupportedChains {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, chain_id: u64) -> Option<SupportedChain> {
        self.inner.read().unwrap().get(&chain_id).copied()
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().unwrap().is_empty()
    }

    /// Replace the whole cache with a freshly fetched configuration.
    pub fn replace(&self, chains: Vec<SupportedChain>) {
        let mut inner = self.inner.write().unwrap();
        inner.clear();
        for chain in chains {
            inner.insert(chain.chain_id, chain);
        }
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::U256;

    use super::SupportedChains;
    use crate::indexer::SupportedChain;

    fn chain(chain_id: u64, allocator_id: u64) -> SupportedChain {
        SupportedChain {
            chain_id,
            allocator_id: U256::from(allocator_id),
            finalization_lag_blocks: 12,
        }
    }

    #[test]
    fn replace_swaps_the_full_mapping() {
        let cache = SupportedChains::new();
        assert!(cache.is_empty());

        cache.replace(vec![chain(10, 1), chain(137, 1)]);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(10).unwrap().allocator_id, U256::from(1u8));

        cache.replace(vec![chain(8453, 2)]);
        assert!(cache.get(10).is_none());
        assert_eq!(cache.get(8453).unwrap().allocator_id, U256::from(2u8));
    }
}
