//! 积分账本错误类型
//!
//! 业务拒绝（余额不足、已撤销等）必须原样返回调用方，不做自动重试；
//! 只有并发写冲突由服务层在内部重试后走幂等重放。

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::NaiveDate;
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use order_shared::error::ErrorCategory;

/// 积分账本错误类型
#[derive(Debug, Error)]
pub enum LedgerError {
    // === 参数错误 ===
    #[error("无效的积分数量: {0}，必须大于 0")]
    InvalidAmount(i64),

    #[error("缺少幂等键")]
    MissingIdempotencyKey,

    #[error("参数校验失败: {0}")]
    Validation(String),

    // === 账本业务错误 ===
    #[error("积分不足: 当前余额 {balance}，请求扣减 {requested}")]
    InsufficientCredit { balance: i64, requested: i64 },

    #[error("撤销后余额将为负: 当前余额 {balance}，需扣回 {required}")]
    InsufficientBalance { balance: i64, required: i64 },

    #[error("交易已被撤销: {0}")]
    AlreadyReversed(Uuid),

    #[error("交易不存在: {0}")]
    TransactionNotFound(Uuid),

    #[error("幂等键无对应交易: {0}")]
    IdempotencyKeyNotFound(String),

    #[error("冲正流水不可再次撤销: {0}")]
    NotRevocable(Uuid),

    #[error("幂等键已用于不同参数的请求: {0}")]
    IdempotencyConflict(String),

    #[error("当日已补充: organization={organization_id}, date={date}")]
    AlreadyRefilled {
        organization_id: String,
        date: NaiveDate,
    },

    #[error("余额 {balance} 已达补充上限 {limit}，无需补充")]
    RefillNotNeeded { balance: i64, limit: i64 },

    #[error("强制撤销通道未开启")]
    ForcedRevokeDisabled,

    // === 系统错误 ===
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("并发冲突，请重试")]
    ConcurrencyConflict,

    #[error("内部错误: {0}")]
    Internal(String),
}

/// 积分账本 Result 类型别名
pub type Result<T> = std::result::Result<T, LedgerError>;

impl LedgerError {
    /// 检查是否为可重试的错误
    ///
    /// 账本业务拒绝永不重试，调用方应停止计量活动或改为按幂等键查询结果
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConcurrencyConflict)
    }

    /// 检查是否为业务错误（非系统错误）
    pub fn is_business_error(&self) -> bool {
        !matches!(
            self,
            Self::Database(_) | Self::Internal(_) | Self::ConcurrencyConflict
        )
    }

    /// 错误分类
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidAmount(_) | Self::MissingIdempotencyKey | Self::Validation(_) => {
                ErrorCategory::Validation
            }
            Self::ForcedRevokeDisabled => ErrorCategory::Configuration,
            Self::Database(_) | Self::Internal(_) | Self::ConcurrencyConflict => {
                ErrorCategory::System
            }
            _ => ErrorCategory::Ledger,
        }
    }

    /// 获取错误码（用于 API 响应）
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidAmount(_) => "INVALID_AMOUNT",
            Self::MissingIdempotencyKey => "MISSING_IDEMPOTENCY_KEY",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::InsufficientCredit { .. } => "INSUFFICIENT_CREDIT",
            Self::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
            Self::AlreadyReversed(_) => "ALREADY_REVERSED",
            Self::TransactionNotFound(_) => "TRANSACTION_NOT_FOUND",
            Self::IdempotencyKeyNotFound(_) => "IDEMPOTENCY_KEY_NOT_FOUND",
            Self::NotRevocable(_) => "NOT_REVOCABLE",
            Self::IdempotencyConflict(_) => "IDEMPOTENCY_CONFLICT",
            Self::AlreadyRefilled { .. } => "ALREADY_REFILLED",
            Self::RefillNotNeeded { .. } => "REFILL_NOT_NEEDED",
            Self::ForcedRevokeDisabled => "FORCED_REVOKE_DISABLED",
            Self::Database(_) => "DATABASE_ERROR",
            Self::ConcurrencyConflict => "CONCURRENCY_CONFLICT",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// 返回对应的 HTTP 状态码
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidAmount(_) | Self::MissingIdempotencyKey | Self::Validation(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::TransactionNotFound(_) | Self::IdempotencyKeyNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            Self::InsufficientCredit { .. } => StatusCode::PAYMENT_REQUIRED,
            Self::ForcedRevokeDisabled => StatusCode::FORBIDDEN,
            Self::InsufficientBalance { .. }
            | Self::AlreadyReversed(_)
            | Self::NotRevocable(_)
            | Self::IdempotencyConflict(_)
            | Self::AlreadyRefilled { .. }
            | Self::RefillNotNeeded { .. }
            | Self::ConcurrencyConflict => StatusCode::CONFLICT,
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// 将唯一约束冲突识别为并发冲突
    pub(crate) fn from_write(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err
            && db_err.is_unique_violation()
        {
            return Self::ConcurrencyConflict;
        }
        Self::Database(err)
    }
}

impl IntoResponse for LedgerError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // 系统级错误只返回通用提示，详细信息仅记录日志
        let message = match &self {
            Self::Database(e) => {
                tracing::error!(error = %e, "数据库操作失败");
                "服务内部错误，请稍后按幂等键查询结果".to_string()
            }
            Self::Internal(e) => {
                tracing::error!(error = %e, "内部错误");
                "服务内部错误，请稍后按幂等键查询结果".to_string()
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

/// 从 validator 错误转换
impl From<validator::ValidationErrors> for LedgerError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::Validation(errors.to_string())
    }
}
