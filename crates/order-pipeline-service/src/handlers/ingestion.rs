//! 订单导入 API 处理器

use axum::{Json, extract::State};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::{ApiResponse, IngestBatchRequest},
    error::PipelineError,
    models::RawBatch,
    service::IngestionReport,
    state::AppState,
};

/// 上传订单
///
/// POST /api/ingestion/batches
///
/// 行级校验失败不影响其他行，失败明细在报告的 `rejected` 中返回
pub async fn ingest_batch(
    State(state): State<AppState>,
    Json(req): Json<IngestBatchRequest>,
) -> Result<Json<ApiResponse<IngestionReport>>, PipelineError> {
    req.validate()?;

    let marketplace = req
        .marketplace
        .as_deref()
        .map(str::trim)
        .filter(|m| !m.is_empty());

    let report = match req.header {
        Some(header) => {
            state
                .ingestion
                .ingest(RawBatch {
                    batch_id: Uuid::new_v4(),
                    organization_id: req.organization_id,
                    marketplace: marketplace.unwrap_or_default().to_string(),
                    header,
                    rows: req.rows,
                })
                .await?
        }
        None => {
            state
                .ingestion
                .ingest_sheet(&req.organization_id, marketplace, req.rows)
                .await?
        }
    };

    Ok(Json(ApiResponse::success(report)))
}
