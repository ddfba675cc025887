//! 积分账本 API 处理器
//!
//! 变更接口的幂等键通过 `Idempotency-Key` 请求头传入，缺失时直接拒绝。
//! 调用方超时后应使用 `GET /api/credits/idempotency/{key}` 查询结果。

use axum::{
    Json,
    extract::{Path, Query, State},
    http::HeaderMap,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::{
        ApiResponse, BalanceQuery, BalanceResponse, ConsumeCreditRequest, GrantCreditRequest,
        IDEMPOTENCY_KEY_HEADER, RefillCreditRequest, RevokeTransactionRequest,
    },
    error::LedgerError,
    models::{CreditTransaction, LedgerAudit, LedgerReceipt},
    state::AppState,
};

fn idempotency_key(headers: &HeaderMap) -> Result<String, LedgerError> {
    headers
        .get(IDEMPOTENCY_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
        .ok_or(LedgerError::MissingIdempotencyKey)
}

/// 发放积分
///
/// POST /api/credits/{org}/grant
pub async fn grant(
    State(state): State<AppState>,
    Path(org): Path<String>,
    headers: HeaderMap,
    Json(req): Json<GrantCreditRequest>,
) -> Result<Json<ApiResponse<LedgerReceipt>>, LedgerError> {
    req.validate()?;
    let key = idempotency_key(&headers)?;

    let receipt = state
        .ledger
        .grant(&org, req.amount, &req.actor_id, &req.reason, &key)
        .await?;

    Ok(Json(ApiResponse::success(receipt)))
}

/// 消耗积分
///
/// POST /api/credits/{org}/consume
pub async fn consume(
    State(state): State<AppState>,
    Path(org): Path<String>,
    headers: HeaderMap,
    Json(req): Json<ConsumeCreditRequest>,
) -> Result<Json<ApiResponse<LedgerReceipt>>, LedgerError> {
    req.validate()?;
    let key = idempotency_key(&headers)?;

    let receipt = state
        .ledger
        .consume(&org, req.amount, &req.reason, &key)
        .await?;

    Ok(Json(ApiResponse::success(receipt)))
}

/// 每日补充
///
/// POST /api/credits/{org}/refill
pub async fn refill(
    State(state): State<AppState>,
    Path(org): Path<String>,
    headers: HeaderMap,
    Json(req): Json<RefillCreditRequest>,
) -> Result<Json<ApiResponse<LedgerReceipt>>, LedgerError> {
    let key = idempotency_key(&headers)?;

    let receipt = state.ledger.refill_daily(&org, req.date, &key).await?;

    Ok(Json(ApiResponse::success(receipt)))
}

/// 撤销交易
///
/// POST /api/credits/transactions/{id}/revoke
///
/// `force = true` 走强制撤销通道，需服务端开启且必须填写原因
pub async fn revoke(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(req): Json<RevokeTransactionRequest>,
) -> Result<Json<ApiResponse<LedgerReceipt>>, LedgerError> {
    req.validate()?;
    let key = idempotency_key(&headers)?;

    let receipt = if req.force {
        let reason = req.reason.as_deref().unwrap_or_default();
        state
            .ledger
            .force_revoke(id, &req.actor_id, reason, &key)
            .await?
    } else {
        state.ledger.revoke(id, &req.actor_id, &key).await?
    };

    Ok(Json(ApiResponse::success(receipt)))
}

/// 查询余额
///
/// GET /api/credits/{org}/balance?at=2026-03-01T00:00:00Z
pub async fn get_balance(
    State(state): State<AppState>,
    Path(org): Path<String>,
    Query(query): Query<BalanceQuery>,
) -> Result<Json<ApiResponse<BalanceResponse>>, LedgerError> {
    let balance = match query.at {
        Some(at) => state.ledger.balance_at(&org, at).await?,
        None => state.ledger.get_balance(&org).await?,
    };

    Ok(Json(ApiResponse::success(BalanceResponse {
        organization_id: org,
        balance,
        at: query.at,
    })))
}

/// 查询流水
///
/// GET /api/credits/{org}/transactions
pub async fn list_transactions(
    State(state): State<AppState>,
    Path(org): Path<String>,
) -> Result<Json<ApiResponse<Vec<CreditTransaction>>>, LedgerError> {
    let transactions = state.ledger.list_transactions(&org).await?;
    Ok(Json(ApiResponse::success(transactions)))
}

/// 账户审计
///
/// GET /api/credits/{org}/audit
pub async fn audit(
    State(state): State<AppState>,
    Path(org): Path<String>,
) -> Result<Json<ApiResponse<LedgerAudit>>, LedgerError> {
    let audit = state.ledger.audit(&org).await?;
    Ok(Json(ApiResponse::success(audit)))
}

/// 按幂等键查询
///
/// GET /api/credits/idempotency/{key}
pub async fn lookup(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<ApiResponse<CreditTransaction>>, LedgerError> {
    let transaction = state
        .ledger
        .lookup(&key)
        .await?
        .ok_or(LedgerError::IdempotencyKeyNotFound(key))?;
    Ok(Json(ApiResponse::success(transaction)))
}
