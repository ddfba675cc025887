//! 结算 API 处理器

use axum::{
    Json,
    extract::{Path, Query, State},
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::{
        ApiResponse, ConfirmSettlementRequest, GroupBy, ReopenSettlementRequest,
        SettlementListResponse, SettlementQuery, UpsertSettlementRequest,
    },
    error::PipelineError,
    models::SettlementRecord,
    service::SettlementUpsert,
    state::AppState,
};

/// 重算结算单
///
/// POST /api/settlements
pub async fn upsert_settlement(
    State(state): State<AppState>,
    Json(req): Json<UpsertSettlementRequest>,
) -> Result<Json<ApiResponse<SettlementUpsert>>, PipelineError> {
    req.validate()?;

    let upsert = state
        .settlements
        .upsert_settlement(&req.organization_id, req.date, req.confirm_as.as_deref())
        .await?;

    Ok(Json(ApiResponse::success(upsert)))
}

/// 查询结算单
///
/// GET /api/settlements?organizationId=&startDate=&endDate=&groupBy=day|month
pub async fn list_settlements(
    State(state): State<AppState>,
    Query(query): Query<SettlementQuery>,
) -> Result<Json<ApiResponse<SettlementListResponse>>, PipelineError> {
    let records = state
        .settlements
        .get_settlements(
            query.organization_id.as_deref(),
            query.start_date,
            query.end_date,
        )
        .await?;

    let summary = state.settlements.summarize(&records);
    let response = match query.group_by {
        GroupBy::Day => SettlementListResponse {
            summary,
            days: Some(records),
            months: None,
        },
        GroupBy::Month => SettlementListResponse {
            summary,
            days: None,
            months: Some(state.settlements.group_by_month(&records)),
        },
    };

    Ok(Json(ApiResponse::success(response)))
}

/// 结算单详情
///
/// GET /api/settlements/{id}
pub async fn get_settlement(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<SettlementRecord>>, PipelineError> {
    let record = state.settlements.get_settlement(id).await?;
    Ok(Json(ApiResponse::success(record)))
}

/// 确认结算单
///
/// POST /api/settlements/{id}/confirm
pub async fn confirm_settlement(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<ConfirmSettlementRequest>,
) -> Result<Json<ApiResponse<SettlementRecord>>, PipelineError> {
    req.validate()?;
    let record = state.settlements.confirm(id, &req.actor_id).await?;
    Ok(Json(ApiResponse::success(record)))
}

/// 重新打开结算单
///
/// POST /api/settlements/{id}/reopen
pub async fn reopen_settlement(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<ReopenSettlementRequest>,
) -> Result<Json<ApiResponse<SettlementRecord>>, PipelineError> {
    req.validate()?;
    let record = state
        .settlements
        .reopen(id, &req.actor_id, &req.reason)
        .await?;
    Ok(Json(ApiResponse::success(record)))
}
