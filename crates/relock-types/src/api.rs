//! JSON wire payloads for compact submission.
//!
//! These are deliberately loose: all integers travel as strings (decimal or
//! `0x` hex) and shape discrimination happens in the validator, so a
//! malformed submission produces a typed [`crate::error::ValidationError`]
//! instead of a serde rejection.

use serde::{Deserialize, Serialize};

/// Body of `POST /compact`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    pub chain_id: String,
    pub compact: CompactPayload,
    #[serde(default)]
    pub sponsor_signature: Option<String>,
}

/// Body of `POST /compact/is-allocatable`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IsAllocatableRequest {
    pub chain_id: String,
    pub compact: CompactPayload,
}

/// A compact in wire form. Exactly one of the three shapes is present:
/// `id`+`amount` (single), `commitments` (batch), or `elements` (multichain).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompactPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arbiter: Option<String>,
    pub sponsor: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    pub expires: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commitments: Option<Vec<LockPayload>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elements: Option<Vec<ElementPayload>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub witness_type_string: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub witness_hash: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockPayload {
    pub lock_tag: String,
    pub token: String,
    pub amount: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementPayload {
    pub arbiter: String,
    pub chain_id: String,
    pub commitments: Vec<LockPayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub witness_hash: Option<String>,
}
