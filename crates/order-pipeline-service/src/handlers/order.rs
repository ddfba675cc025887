//! 订单 API 处理器

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde_json::{Value, json};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::{ActorQuery, ActorRequest, ApiResponse},
    error::PipelineError,
    models::CanonicalOrder,
    state::AppState,
};

/// 订单详情
///
/// GET /api/orders/{id}
pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<CanonicalOrder>>, PipelineError> {
    let order = state.orders.get_order(id).await?;
    Ok(Json(ApiResponse::success(order)))
}

/// 删除订单
///
/// DELETE /api/orders/{id}?actorId=&purge=
///
/// 默认软删除；`purge=true` 物理清除已软删除的订单
pub async fn delete_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<ActorQuery>,
) -> Result<Json<ApiResponse<Value>>, PipelineError> {
    if query.purge {
        state.orders.purge(id, &query.actor_id).await?;
        return Ok(Json(ApiResponse::success(json!({ "id": id, "purged": true }))));
    }

    let order = state.orders.soft_delete(id, &query.actor_id).await?;
    Ok(Json(ApiResponse::success(json!({
        "id": order.id,
        "deleted": order.is_deleted,
        "deletedAt": order.deleted_at,
        "deletedBy": order.deleted_by,
    }))))
}

/// 恢复订单
///
/// POST /api/orders/{id}/restore
pub async fn restore_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<ActorRequest>,
) -> Result<Json<ApiResponse<CanonicalOrder>>, PipelineError> {
    req.validate()?;
    let order = state.orders.restore(id, &req.actor_id).await?;
    Ok(Json(ApiResponse::success(order)))
}
