pub mod mock_indexer;
pub mod scenarios;

pub use mock_indexer::MockIndexer;
pub use scenarios::{ALLOCATOR_KEY, SPONSOR_KEY, ScenarioAccounts, SingleLockScenario};
