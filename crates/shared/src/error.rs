//! 统一错误处理模块
//!
//! 定义两个服务共享的基础设施错误类型，业务错误由各服务自行定义。

use serde::Serialize;
use thiserror::Error;

/// 错误分类
///
/// 两个服务的业务错误都归入以下类别之一，决定是否重试、是否需要人工介入
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCategory {
    /// 映射配置或等级标准缺失/冲突，需运营修正
    Configuration,
    /// 单行或单字段数据不合法，不影响整批
    Validation,
    /// 目录匹配失败，订单继续处理并标记待对账
    Resolution,
    /// 账本业务拒绝（余额不足、已撤销等），不自动重试
    Ledger,
    /// 已确认结算与重算结果不一致，停止自动化并人工复核
    Consistency,
    /// 数据库等基础设施故障
    System,
}

impl ErrorCategory {
    /// 是否允许自动重试
    pub fn allows_retry(&self) -> bool {
        matches!(self, Self::System)
    }
}

/// 共享基础设施错误
#[derive(Debug, Error)]
pub enum SharedError {
    // ==================== 数据库错误 ====================
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("数据库迁移失败: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    // ==================== 配置错误 ====================
    #[error("配置加载失败: {0}")]
    Config(#[from] config::ConfigError),

    // ==================== 金额错误 ====================
    #[error("无效的金额: {0}")]
    InvalidAmount(String),

    // ==================== 通用错误 ====================
    #[error("内部错误: {0}")]
    Internal(String),
}

/// 错误结果类型别名
pub type Result<T> = std::result::Result<T, SharedError>;

impl SharedError {
    /// 获取错误码
    pub fn code(&self) -> &'static str {
        match self {
            Self::Database(_) => "DATABASE_ERROR",
            Self::Migration(_) => "MIGRATION_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
            Self::InvalidAmount(_) => "INVALID_AMOUNT",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// 错误分类
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Config(_) => ErrorCategory::Configuration,
            Self::InvalidAmount(_) => ErrorCategory::Validation,
            Self::Database(_) | Self::Migration(_) | Self::Internal(_) => ErrorCategory::System,
        }
    }

    /// 是否为可重试错误
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Database(sqlx::Error::PoolTimedOut)
                | Self::Database(sqlx::Error::Io(_))
                | Self::Database(sqlx::Error::PoolClosed)
        )
    }
}
