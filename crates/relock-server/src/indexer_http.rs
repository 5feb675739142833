//! GraphQL-over-HTTP implementation of the engine's indexer port.
//!
//! Thin by design: one POST per query, typed response envelopes, and every
//! transport or shape problem mapped into [`IndexerError`]. The reqwest
//! client carries its own timeout in addition to the engine's per-call
//! deadline.

use std::time::Duration;

use alloy_primitives::{Address, B256, I256, U256};
use async_trait::async_trait;
use relock_engine::indexer::{
    CompactDetails, IndexerApi, RegisteredCompact, ResourceLockRef, ResourceLockState,
    SupportedChain,
};
use relock_types::error::IndexerError;
use relock_types::ids::{parse_address, parse_b256, parse_u256};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;

const COMPACT_DETAILS_QUERY: &str = r#"
query CompactDetails($allocator: String!, $sponsor: String!, $lockId: String!, $chainId: String!) {
  resourceLock(allocator: $allocator, sponsor: $sponsor, lockId: $lockId, chainId: $chainId) {
    withdrawalStatus
    balance
  }
  accountDeltas(sponsor: $sponsor, lockId: $lockId, chainId: $chainId) {
    items { delta }
  }
  claims(sponsor: $sponsor, chainId: $chainId) {
    items { claimHash }
  }
}"#;

const RESOURCE_LOCKS_QUERY: &str = r#"
query ResourceLocks($sponsor: String!) {
  account(address: $sponsor) {
    resourceLocks {
      items { chainId lockId allocatorAddress }
    }
  }
}"#;

const SUPPORTED_CHAINS_QUERY: &str = r#"
query SupportedChains($allocator: String!) {
  allocatorChains(allocator: $allocator) {
    items { chainId allocatorId finalizationLagBlocks }
  }
}"#;

const REGISTERED_COMPACT_QUERY: &str = r#"
query RegisteredCompact($allocator: String!, $sponsor: String!, $claimHash: String!, $chainId: String!) {
  registeredCompact(allocator: $allocator, sponsor: $sponsor, claimHash: $claimHash, chainId: $chainId) {
    sponsor
    expires
    typehash
    claim { claimHash }
  }
}"#;

const CONSUMED_NONCE_QUERY: &str = r#"
query ConsumedNonce($chainId: String!, $sponsor: String!, $nonce: String!) {
  consumedNonce(chainId: $chainId, sponsor: $sponsor, nonce: $nonce) {
    consumed
  }
}"#;

#[derive(Debug, Clone)]
pub struct HttpIndexerConfig {
    pub endpoint: String,
    pub timeout: Duration,
}

pub struct HttpIndexerClient {
    http: reqwest::Client,
    config: HttpIndexerConfig,
}

impl HttpIndexerClient {
    pub fn new(config: HttpIndexerConfig) -> Result<Self, IndexerError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| IndexerError::Transport(err.to_string()))?;
        Ok(Self { http, config })
    }

    async fn query<T: DeserializeOwned>(
        &self,
        query: &'static str,
        variables: serde_json::Value,
    ) -> Result<T, IndexerError> {
        let response = self
            .http
            .post(&self.config.endpoint)
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await
            .map_err(|err| IndexerError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(IndexerError::Transport(format!(
                "indexer returned HTTP {status}"
            )));
        }

        let envelope: GraphQlResponse<T> = response
            .json()
            .await
            .map_err(|err| IndexerError::InvalidResponse(err.to_string()))?;
        if let Some(errors) = envelope.errors {
            let messages: Vec<String> = errors.into_iter().map(|e| e.message).collect();
            return Err(IndexerError::InvalidResponse(messages.join("; ")));
        }
        envelope
            .data
            .ok_or_else(|| IndexerError::InvalidResponse("missing data".into()))
    }
}

#[async_trait]
impl IndexerApi for HttpIndexerClient {
    async fn compact_details(
        &self,
        allocator: Address,
        sponsor: Address,
        lock_id: U256,
        chain_id: u64,
    ) -> Result<CompactDetails, IndexerError> {
        let data: CompactDetailsData = self
            .query(
                COMPACT_DETAILS_QUERY,
                json!({
                    "allocator": allocator.to_checksum(None),
                    "sponsor": sponsor.to_checksum(None),
                    "lockId": lock_id.to_string(),
                    "chainId": chain_id.to_string(),
                }),
            )
            .await?;

        let resource_lock = data
            .resource_lock
            .map(|lock| {
                Ok::<_, IndexerError>(ResourceLockState {
                    withdrawal_status: lock.withdrawal_status,
                    balance: uint_field("balance", &lock.balance)?,
                })
            })
            .transpose()?;

        let account_deltas = data
            .account_deltas
            .items
            .iter()
            .map(|item| {
                I256::from_dec_str(item.delta.trim())
                    .map_err(|_| invalid_field("delta", &item.delta))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let settled_claims = data
            .claims
            .items
            .iter()
            .map(|item| hash_field("claimHash", &item.claim_hash))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(CompactDetails {
            resource_lock,
            account_deltas,
            settled_claims,
        })
    }

    async fn resource_locks(&self, sponsor: Address) -> Result<Vec<ResourceLockRef>, IndexerError> {
        let data: ResourceLocksData = self
            .query(
                RESOURCE_LOCKS_QUERY,
                json!({ "sponsor": sponsor.to_checksum(None) }),
            )
            .await?;

        let Some(account) = data.account else {
            return Ok(Vec::new());
        };
        account
            .resource_locks
            .items
            .iter()
            .map(|item| {
                Ok(ResourceLockRef {
                    chain_id: chain_field(&item.chain_id)?,
                    lock_id: uint_field("lockId", &item.lock_id)?,
                    allocator_address: address_field("allocatorAddress", &item.allocator_address)?,
                })
            })
            .collect()
    }

    async fn supported_chains(
        &self,
        allocator: Address,
    ) -> Result<Vec<SupportedChain>, IndexerError> {
        let data: SupportedChainsData = self
            .query(
                SUPPORTED_CHAINS_QUERY,
                json!({ "allocator": allocator.to_checksum(None) }),
            )
            .await?;

        data.allocator_chains
            .items
            .iter()
            .map(|item| {
                Ok(SupportedChain {
                    chain_id: chain_field(&item.chain_id)?,
                    allocator_id: uint_field("allocatorId", &item.allocator_id)?,
                    finalization_lag_blocks: item.finalization_lag_blocks,
                })
            })
            .collect()
    }

    async fn registered_compact(
        &self,
        allocator: Address,
        sponsor: Address,
        claim_hash: B256,
        chain_id: u64,
    ) -> Result<Option<RegisteredCompact>, IndexerError> {
        let data: RegisteredCompactData = self
            .query(
                REGISTERED_COMPACT_QUERY,
                json!({
                    "allocator": allocator.to_checksum(None),
                    "sponsor": sponsor.to_checksum(None),
                    "claimHash": format!("{claim_hash}"),
                    "chainId": chain_id.to_string(),
                }),
            )
            .await?;

        data.registered_compact
            .map(|registered| {
                Ok(RegisteredCompact {
                    sponsor: address_field("sponsor", &registered.sponsor)?,
                    expires: uint_field("expires", &registered.expires)?
                        .try_into()
                        .map_err(|_| invalid_field("expires", &registered.expires))?,
                    typehash: hash_field("typehash", &registered.typehash)?,
                    claimed: registered.claim.is_some(),
                })
            })
            .transpose()
    }

    async fn nonce_consumed(
        &self,
        chain_id: u64,
        sponsor: Address,
        nonce: U256,
    ) -> Result<bool, IndexerError> {
        let data: ConsumedNonceData = self
            .query(
                CONSUMED_NONCE_QUERY,
                json!({
                    "chainId": chain_id.to_string(),
                    "sponsor": sponsor.to_checksum(None),
                    "nonce": nonce.to_string(),
                }),
            )
            .await?;
        Ok(data
            .consumed_nonce
            .map(|item| item.consumed)
            .unwrap_or(false))
    }
}

// ---------------------------------------------------------------------------
// Response envelopes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    errors: Option<Vec<GraphQlError>>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct Items<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

impl<T> Default for Items<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CompactDetailsData {
    resource_lock: Option<ResourceLockData>,
    #[serde(default)]
    account_deltas: Items<DeltaData>,
    #[serde(default)]
    claims: Items<ClaimData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResourceLockData {
    withdrawal_status: u8,
    balance: String,
}

#[derive(Debug, Deserialize)]
struct DeltaData {
    delta: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClaimData {
    claim_hash: String,
}

#[derive(Debug, Deserialize)]
struct ResourceLocksData {
    account: Option<AccountData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountData {
    #[serde(default)]
    resource_locks: Items<ResourceLockRefData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResourceLockRefData {
    chain_id: String,
    lock_id: String,
    allocator_address: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SupportedChainsData {
    #[serde(default)]
    allocator_chains: Items<SupportedChainData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SupportedChainData {
    chain_id: String,
    allocator_id: String,
    #[serde(default)]
    finalization_lag_blocks: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegisteredCompactData {
    registered_compact: Option<RegisteredData>,
}

#[derive(Debug, Deserialize)]
struct RegisteredData {
    sponsor: String,
    expires: String,
    typehash: String,
    claim: Option<ClaimData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConsumedNonceData {
    consumed_nonce: Option<ConsumedData>,
}

#[derive(Debug, Deserialize)]
struct ConsumedData {
    consumed: bool,
}

// ---------------------------------------------------------------------------
// Field parsing
// ---------------------------------------------------------------------------

fn invalid_field(name: &str, value: &str) -> IndexerError {
    IndexerError::InvalidResponse(format!("bad `{name}` value `{value}`"))
}

fn uint_field(name: &'static str, value: &str) -> Result<U256, IndexerError> {
    parse_u256(name, value).map_err(|_| invalid_field(name, value))
}

fn hash_field(name: &'static str, value: &str) -> Result<B256, IndexerError> {
    parse_b256(name, value).map_err(|_| invalid_field(name, value))
}

fn address_field(name: &'static str, value: &str) -> Result<Address, IndexerError> {
    parse_address(name, value).map_err(|_| invalid_field(name, value))
}

fn chain_field(value: &str) -> Result<u64, IndexerError> {
    value
        .trim()
        .parse::<u64>()
        .map_err(|_| invalid_field("chainId", value))
}

#[cfg(test)]
mod tests {
    use super::{CompactDetailsData, GraphQlResponse, chain_field, uint_field};

    #[test]
    fn parses_a_details_envelope() {
        let body = r#"{
            "data": {
                "resourceLock": {"withdrawalStatus": 0, "balance": "1000000000000000000000"},
                "accountDeltas": {"items": [{"delta": "-5"}, {"delta": "12"}]},
                "claims": {"items": [{"claimHash": "0x1111111111111111111111111111111111111111111111111111111111111111"}]}
            }
        }"#;
        let envelope: GraphQlResponse<CompactDetailsData> = serde_json::from_str(body).unwrap();
        let data = envelope.data.unwrap();
        assert_eq!(data.resource_lock.unwrap().withdrawal_status, 0);
        assert_eq!(data.account_deltas.items.len(), 2);
        assert_eq!(data.claims.items.len(), 1);
    }

    #[test]
    fn missing_collections_default_to_empty() {
        let body = r#"{"data": {"resourceLock": null}}"#;
        let envelope: GraphQlResponse<CompactDetailsData> = serde_json::from_str(body).unwrap();
        let data = envelope.data.unwrap();
        assert!(data.resource_lock.is_none());
        assert!(data.account_deltas.items.is_empty());
    }

    #[test]
    fn field_parsers_reject_garbage() {
        assert!(uint_field("balance", "12.5").is_err());
        assert!(chain_field("ten").is_err());
        assert!(uint_field("balance", "0xde0b6b3a7640000").is_ok());
    }
}
