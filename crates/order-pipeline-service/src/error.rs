//! 订单流水线错误类型
//!
//! 行级校验失败不走这里，而是作为 `RowRejection` 随成功行一起返回。

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::NaiveDate;
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use order_shared::error::{ErrorCategory, SharedError};

use crate::models::CanonicalField;

/// 订单流水线错误类型
#[derive(Debug, Error)]
pub enum PipelineError {
    // === 映射配置错误 ===
    #[error("未找到平台的映射配置: {0}")]
    UnknownMarketplace(String),

    #[error("平台 {marketplace} 存在 {count} 个启用的映射配置")]
    ConfigurationConflict { marketplace: String, count: usize },

    #[error("映射配置无效: marketplace={marketplace}, {reason}")]
    InvalidProfile { marketplace: String, reason: String },

    #[error("表头缺少必填字段 {field} 对应的列: {column}")]
    MissingColumn {
        marketplace: String,
        field: CanonicalField,
        column: String,
    },

    // === 等级配置错误 ===
    #[error("等级标准无效: {0}")]
    InvalidTierCriteria(String),

    #[error("等级不存在: {0}")]
    TierNotFound(String),

    // === 参数错误 ===
    #[error("参数校验失败: {0}")]
    Validation(String),

    // === 资源不存在 ===
    #[error("订单不存在: {0}")]
    OrderNotFound(Uuid),

    #[error("结算单不存在: {0}")]
    SettlementNotFound(Uuid),

    // === 结算状态错误 ===
    #[error("结算单已确认，禁止自动重算: organization={organization_id}, date={date}")]
    ImmutableAfterConfirm {
        organization_id: String,
        date: NaiveDate,
    },

    #[error("结算单已确认: {0}")]
    AlreadyConfirmed(Uuid),

    #[error("结算单未确认，无需重新打开: {0}")]
    NotConfirmed(Uuid),

    #[error(
        "已确认结算与重算结果不一致: organization={organization_id}, date={date}, stored={stored_digest}, recomputed={recomputed_digest}"
    )]
    ConsistencyError {
        organization_id: String,
        date: NaiveDate,
        stored_digest: String,
        recomputed_digest: String,
    },

    // === 系统错误 ===
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Shared(#[from] SharedError),

    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("内部错误: {0}")]
    Internal(String),
}

/// 订单流水线 Result 类型别名
pub type Result<T> = std::result::Result<T, PipelineError>;

impl PipelineError {
    /// 检查是否为可重试的错误
    ///
    /// 一致性错误必须人工复核，配置错误需运营修正，二者都不重试
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Database(sqlx::Error::PoolTimedOut | sqlx::Error::Io(_)) => true,
            Self::Shared(e) => e.is_retryable(),
            _ => false,
        }
    }

    /// 错误分类
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::UnknownMarketplace(_)
            | Self::ConfigurationConflict { .. }
            | Self::InvalidProfile { .. }
            | Self::MissingColumn { .. }
            | Self::InvalidTierCriteria(_)
            | Self::TierNotFound(_) => ErrorCategory::Configuration,
            Self::Validation(_)
            | Self::OrderNotFound(_)
            | Self::SettlementNotFound(_)
            | Self::ImmutableAfterConfirm { .. }
            | Self::AlreadyConfirmed(_)
            | Self::NotConfirmed(_) => ErrorCategory::Validation,
            Self::ConsistencyError { .. } => ErrorCategory::Consistency,
            Self::Shared(e) => e.category(),
            Self::Database(_) | Self::Serialization(_) | Self::Internal(_) => {
                ErrorCategory::System
            }
        }
    }

    /// 获取错误码（用于 API 响应）
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::UnknownMarketplace(_) => "UNKNOWN_MARKETPLACE",
            Self::ConfigurationConflict { .. } => "CONFIGURATION_CONFLICT",
            Self::InvalidProfile { .. } => "INVALID_PROFILE",
            Self::MissingColumn { .. } => "MISSING_COLUMN",
            Self::InvalidTierCriteria(_) => "INVALID_TIER_CRITERIA",
            Self::TierNotFound(_) => "TIER_NOT_FOUND",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::OrderNotFound(_) => "ORDER_NOT_FOUND",
            Self::SettlementNotFound(_) => "SETTLEMENT_NOT_FOUND",
            Self::ImmutableAfterConfirm { .. } => "IMMUTABLE_AFTER_CONFIRM",
            Self::AlreadyConfirmed(_) => "ALREADY_CONFIRMED",
            Self::NotConfirmed(_) => "NOT_CONFIRMED",
            Self::ConsistencyError { .. } => "CONSISTENCY_ERROR",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Shared(e) => e.code(),
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// 返回对应的 HTTP 状态码
    pub fn status_code(&self) -> StatusCode {
        match self.category() {
            ErrorCategory::Configuration => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorCategory::Validation => match self {
                Self::OrderNotFound(_) | Self::SettlementNotFound(_) => StatusCode::NOT_FOUND,
                Self::ImmutableAfterConfirm { .. }
                | Self::AlreadyConfirmed(_)
                | Self::NotConfirmed(_) => StatusCode::CONFLICT,
                _ => StatusCode::BAD_REQUEST,
            },
            ErrorCategory::Consistency => StatusCode::CONFLICT,
            ErrorCategory::Resolution | ErrorCategory::Ledger => StatusCode::BAD_REQUEST,
            ErrorCategory::System => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for PipelineError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let message = match &self {
            Self::Database(e) => {
                tracing::error!(error = %e, "数据库操作失败");
                "服务内部错误".to_string()
            }
            Self::Internal(e) => {
                tracing::error!(error = %e, "内部错误");
                "服务内部错误".to_string()
            }
            other => other.to_string(),
        };

        let body = json!({
            "success": false,
            "code": self.error_code(),
            "message": message,
            "data": serde_json::Value::Null
        });

        (status, axum::Json(body)).into_response()
    }
}

impl From<validator::ValidationErrors> for PipelineError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::Validation(errors.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_errors() {
        let err = PipelineError::ConfigurationConflict {
            marketplace: "coupang".to_string(),
            count: 2,
        };
        assert_eq!(err.category(), ErrorCategory::Configuration);
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(!err.is_retryable());
        assert_eq!(err.to_string(), "平台 coupang 存在 2 个启用的映射配置");
    }

    #[test]
    fn test_consistency_error_not_retryable() {
        let err = PipelineError::ConsistencyError {
            organization_id: "org-1".to_string(),
            date: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            stored_digest: "a".to_string(),
            recomputed_digest: "b".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::Consistency);
        assert!(!err.is_retryable());
        assert_eq!(err.error_code(), "CONSISTENCY_ERROR");
    }

    #[test]
    fn test_not_found_status() {
        assert_eq!(
            PipelineError::SettlementNotFound(Uuid::nil()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            PipelineError::AlreadyConfirmed(Uuid::nil()).status_code(),
            StatusCode::CONFLICT
        );
    }
}
