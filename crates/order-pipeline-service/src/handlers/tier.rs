//! 等级 API 处理器

use axum::{
    Json,
    extract::{Path, Query, State},
};
use chrono::Utc;
use serde_json::{Value, json};
use validator::Validate;

use crate::{
    dto::{ActorQuery, ApiResponse, ManualTierRequest, ReplaceCriteriaRequest},
    error::PipelineError,
    models::{ManualTierOverride, TierAssignment, TierCriterion},
    state::AppState,
};

/// 组织当前等级
///
/// GET /api/organizations/{org}/tier
pub async fn get_tier(
    State(state): State<AppState>,
    Path(org): Path<String>,
) -> Result<Json<ApiResponse<TierAssignment>>, PipelineError> {
    let assignment = state.tiers.get_tier(&org, Utc::now()).await?;
    Ok(Json(ApiResponse::success(assignment)))
}

/// 手动指定等级
///
/// PUT /api/organizations/{org}/tier/manual
pub async fn set_manual_tier(
    State(state): State<AppState>,
    Path(org): Path<String>,
    Json(req): Json<ManualTierRequest>,
) -> Result<Json<ApiResponse<ManualTierOverride>>, PipelineError> {
    req.validate()?;
    let manual = state
        .tiers
        .set_manual_tier(&org, &req.tier_name, &req.actor_id)
        .await?;
    Ok(Json(ApiResponse::success(manual)))
}

/// 清除手动等级
///
/// DELETE /api/organizations/{org}/tier/manual?actorId=
pub async fn clear_manual_tier(
    State(state): State<AppState>,
    Path(org): Path<String>,
    Query(query): Query<ActorQuery>,
) -> Result<Json<ApiResponse<Value>>, PipelineError> {
    let cleared = state.tiers.clear_manual_tier(&org, &query.actor_id).await?;
    Ok(Json(ApiResponse::success(json!({ "cleared": cleared }))))
}

/// 等级标准列表
///
/// GET /api/tiers/criteria
pub async fn list_criteria(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<TierCriterion>>>, PipelineError> {
    let criteria = state.tiers.list_criteria().await?;
    Ok(Json(ApiResponse::success(criteria)))
}

/// 替换等级标准
///
/// PUT /api/tiers/criteria
pub async fn replace_criteria(
    State(state): State<AppState>,
    Json(req): Json<ReplaceCriteriaRequest>,
) -> Result<Json<ApiResponse<Vec<TierCriterion>>>, PipelineError> {
    req.validate()?;
    state.tiers.replace_criteria(req.criteria, &req.actor_id).await?;
    let criteria = state.tiers.list_criteria().await?;
    Ok(Json(ApiResponse::success(criteria)))
}
