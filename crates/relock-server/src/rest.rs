//! HTTP surface of the allocator.
//!
//! Handlers are thin: parse path/body, call the engine, render. The status
//! mapping at the bottom is the only place in the codebase that turns the
//! error taxonomy into HTTP codes.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use relock_engine::AllocationEngine;
use relock_types::api::{CompactPayload, ElementPayload, IsAllocatableRequest, LockPayload, SubmitRequest};
use relock_types::error::{AllocatorError, BalanceError, StoreError};
use relock_types::ids::{hex_b256, hex_lock_tag, hex_u256};
use relock_types::{CompactRecord, ValidatedCompact};
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tracing::warn;

pub struct AppState {
    pub engine: Arc<AllocationEngine>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/suggested-nonce/{chain_id}/{account}", get(suggested_nonce))
        .route("/compact", post(submit_compact))
        .route("/compact/is-allocatable", post(is_allocatable))
        .route("/compact/{chain_id}/{claim_hash}", get(get_compact))
        .route("/compacts/{account}", get(list_compacts))
        .route("/balance/{chain_id}/{lock_id}/{account}", get(get_balance))
        .route("/balances/{account}", get(get_balances))
        .route(
            "/admin/refresh-supported-chains",
            post(refresh_supported_chains),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct SuggestedNonceResponse {
    nonce: String,
}

#[derive(Serialize)]
struct SubmitResponse {
    hash: String,
    signature: String,
    nonce: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct IsAllocatableResponse {
    is_allocatable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    validated_compact: Option<CompactPayload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BalanceResponse {
    allocatable_balance: String,
    allocated_balance: String,
    balance_available_to_allocate: String,
    withdrawal_status: u8,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BalancesResponse {
    balances: Vec<BalanceEntry>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BalanceEntry {
    chain_id: String,
    lock_id: String,
    allocatable_balance: String,
    allocated_balance: String,
    balance_available_to_allocate: String,
    withdrawal_status: u8,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StoredCompactResponse {
    chain_id: String,
    hash: String,
    sponsor: String,
    nonce: String,
    expires: String,
    signature: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    sponsor_signature: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    witness_type_string: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    witness_hash: Option<String>,
    elements: Vec<StoredElementResponse>,
    created_at: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StoredElementResponse {
    element_index: u32,
    arbiter: String,
    chain_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    mandate_hash: Option<String>,
    commitments: Vec<StoredCommitmentResponse>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StoredCommitmentResponse {
    lock_tag: String,
    token: String,
    amount: String,
}

#[derive(Serialize)]
struct RefreshChainsResponse {
    chains: usize,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

type Rejection = (StatusCode, Json<ErrorResponse>);

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn suggested_nonce(
    State(state): State<Arc<AppState>>,
    Path((chain_id, account)): Path<(String, String)>,
) -> Result<Json<SuggestedNonceResponse>, Rejection> {
    let nonce = state
        .engine
        .suggested_nonce(&chain_id, &account)
        .await
        .map_err(reject)?;
    Ok(Json(SuggestedNonceResponse {
        nonce: hex_u256(nonce),
    }))
}

async fn submit_compact(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SubmitRequest>,
) -> Result<Json<SubmitResponse>, Rejection> {
    let issued = state
        .engine
        .submit(
            &request.chain_id,
            &request.compact,
            request.sponsor_signature.as_deref(),
        )
        .await
        .map_err(|err| {
            warn!(chain_id = request.chain_id.as_str(), error = %err, "submission refused");
            reject(err)
        })?;
    Ok(Json(SubmitResponse {
        hash: hex_b256(issued.claim_hash),
        signature: format!("0x{}", hex::encode(issued.signature)),
        nonce: hex_u256(issued.nonce),
    }))
}

async fn is_allocatable(
    State(state): State<Arc<AppState>>,
    Json(request): Json<IsAllocatableRequest>,
) -> Result<Json<IsAllocatableResponse>, Rejection> {
    let answer = state
        .engine
        .is_allocatable(&request.chain_id, &request.compact)
        .await
        .map_err(reject)?;
    Ok(Json(match answer.shortfall {
        None => IsAllocatableResponse {
            is_allocatable: true,
            validated_compact: Some(render_validated(&answer.compact)),
            error: None,
        },
        Some(shortfall) => IsAllocatableResponse {
            is_allocatable: false,
            validated_compact: None,
            error: Some(shortfall.to_string()),
        },
    }))
}

async fn get_compact(
    State(state): State<Arc<AppState>>,
    Path((chain_id, claim_hash)): Path<(String, String)>,
) -> Result<Json<StoredCompactResponse>, Rejection> {
    let record = state
        .engine
        .compact_by_hash(&chain_id, &claim_hash)
        .await
        .map_err(reject)?
        .ok_or_else(not_found)?;
    Ok(Json(render_record(&record)))
}

async fn list_compacts(
    State(state): State<Arc<AppState>>,
    Path(account): Path<String>,
) -> Result<Json<Vec<StoredCompactResponse>>, Rejection> {
    let records = state
        .engine
        .compacts_by_sponsor(&account)
        .await
        .map_err(reject)?;
    Ok(Json(records.iter().map(render_record).collect()))
}

async fn get_balance(
    State(state): State<Arc<AppState>>,
    Path((chain_id, lock_id, account)): Path<(String, String, String)>,
) -> Result<Json<BalanceResponse>, Rejection> {
    let capacity = state
        .engine
        .lock_balance(&chain_id, &lock_id, &account)
        .await
        .map_err(|err| {
            if matches!(
                err,
                AllocatorError::Balance(BalanceError::LockMissing { .. })
            ) {
                (StatusCode::NOT_FOUND, error_body(&err))
            } else {
                reject(err)
            }
        })?;
    Ok(Json(BalanceResponse {
        allocatable_balance: capacity.allocatable.to_string(),
        allocated_balance: capacity.outstanding.to_string(),
        balance_available_to_allocate: capacity.available().to_string(),
        withdrawal_status: capacity.withdrawal_status,
    }))
}

async fn get_balances(
    State(state): State<Arc<AppState>>,
    Path(account): Path<String>,
) -> Result<Json<BalancesResponse>, Rejection> {
    let balances = state
        .engine
        .sponsor_balances(&account)
        .await
        .map_err(reject)?;
    Ok(Json(BalancesResponse {
        balances: balances
            .into_iter()
            .map(|entry| BalanceEntry {
                chain_id: entry.chain_id.to_string(),
                lock_id: hex_u256(entry.lock_id),
                allocatable_balance: entry.capacity.allocatable.to_string(),
                allocated_balance: entry.capacity.outstanding.to_string(),
                balance_available_to_allocate: entry.capacity.available().to_string(),
                withdrawal_status: entry.capacity.withdrawal_status,
            })
            .collect(),
    }))
}

async fn refresh_supported_chains(
    State(state): State<Arc<AppState>>,
) -> Result<Json<RefreshChainsResponse>, Rejection> {
    let chains = state
        .engine
        .refresh_supported_chains()
        .await
        .map_err(reject)?;
    Ok(Json(RefreshChainsResponse { chains }))
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

fn render_record(record: &CompactRecord) -> StoredCompactResponse {
    StoredCompactResponse {
        chain_id: record.chain_id.to_string(),
        hash: hex_b256(record.claim_hash),
        sponsor: record.sponsor.to_checksum(None),
        nonce: hex_u256(record.nonce),
        expires: record.expires.to_string(),
        signature: format!("0x{}", hex::encode(&record.signature)),
        sponsor_signature: record
            .sponsor_signature
            .as_ref()
            .map(|bytes| format!("0x{}", hex::encode(bytes))),
        witness_type_string: record.witness_type_string.clone(),
        witness_hash: record.witness_hash.map(hex_b256),
        elements: record
            .elements
            .iter()
            .map(|element| StoredElementResponse {
                element_index: element.element_index,
                arbiter: element.arbiter.to_checksum(None),
                chain_id: element.chain_id.to_string(),
                mandate_hash: element.mandate_hash.map(hex_b256),
                commitments: element
                    .commitments
                    .iter()
                    .map(|commitment| StoredCommitmentResponse {
                        lock_tag: hex_lock_tag(commitment.lock_tag),
                        token: commitment.token.to_checksum(None),
                        amount: commitment.amount.to_string(),
                    })
                    .collect(),
            })
            .collect(),
        created_at: record.created_at.to_string(),
    }
}

/// Canonical wire form of a validated compact, echoed by `/is-allocatable`.
fn render_validated(compact: &ValidatedCompact) -> CompactPayload {
    match compact {
        ValidatedCompact::Single(c) => CompactPayload {
            arbiter: Some(c.arbiter.to_checksum(None)),
            sponsor: c.sponsor.to_checksum(None),
            nonce: Some(hex_u256(c.nonce)),
            expires: c.expires.to_string(),
            id: Some(hex_u256(c.id)),
            amount: Some(c.amount.to_string()),
            witness_type_string: c.witness.as_ref().map(|w| w.type_string.clone()),
            witness_hash: c.witness.as_ref().map(|w| hex_b256(w.hash)),
            ..CompactPayload::default()
        },
        ValidatedCompact::Batch(c) => CompactPayload {
            arbiter: Some(c.arbiter.to_checksum(None)),
            sponsor: c.sponsor.to_checksum(None),
            nonce: Some(hex_u256(c.nonce)),
            expires: c.expires.to_string(),
            commitments: Some(c.commitments.iter().map(render_lock).collect()),
            witness_type_string: c.witness.as_ref().map(|w| w.type_string.clone()),
            witness_hash: c.witness.as_ref().map(|w| hex_b256(w.hash)),
            ..CompactPayload::default()
        },
        ValidatedCompact::Multichain(c) => CompactPayload {
            sponsor: c.sponsor.to_checksum(None),
            nonce: Some(hex_u256(c.nonce)),
            expires: c.expires.to_string(),
            witness_type_string: Some(c.witness_type_string.clone()),
            elements: Some(
                c.elements
                    .iter()
                    .map(|element| ElementPayload {
                        arbiter: element.arbiter.to_checksum(None),
                        chain_id: element.chain_id.to_string(),
                        commitments: element.commitments.iter().map(render_lock).collect(),
                        witness_hash: Some(hex_b256(element.witness_hash)),
                    })
                    .collect(),
            ),
            ..CompactPayload::default()
        },
    }
}

fn render_lock(lock: &relock_types::Lock) -> LockPayload {
    LockPayload {
        lock_tag: hex_lock_tag(lock.lock_tag),
        token: lock.token.to_checksum(None),
        amount: lock.amount.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

fn status_for(err: &AllocatorError) -> StatusCode {
    match err {
        AllocatorError::Validation(_)
        | AllocatorError::Nonce(_)
        | AllocatorError::Balance(_)
        | AllocatorError::Batch(_) => StatusCode::BAD_REQUEST,
        AllocatorError::Auth(_) => StatusCode::FORBIDDEN,
        AllocatorError::Store(StoreError::Duplicate { .. }) => StatusCode::CONFLICT,
        AllocatorError::Indexer(_) => StatusCode::BAD_GATEWAY,
        AllocatorError::Store(_)
        | AllocatorError::Encoding(_)
        | AllocatorError::Signing(_)
        | AllocatorError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn reject(err: AllocatorError) -> Rejection {
    (status_for(&err), error_body(&err))
}

fn error_body(err: &AllocatorError) -> Json<ErrorResponse> {
    Json(ErrorResponse {
        error: err.to_string(),
    })
}

fn not_found() -> Rejection {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: "not found".to_string(),
        }),
    )
}
