//! 响应 DTO 定义

use serde::Serialize;

use crate::models::{MonthlySettlement, SettlementRecord, SettlementSummary};

/// API 统一响应
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub success: bool,
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    /// 创建成功响应
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            code: "SUCCESS".to_string(),
            message: "操作成功".to_string(),
            data: Some(data),
        }
    }
}

/// 结算查询响应
///
/// 按日查询返回 `days`，按月查询返回 `months`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementListResponse {
    pub summary: SettlementSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub days: Option<Vec<SettlementRecord>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub months: Option<Vec<MonthlySettlement>>,
}
