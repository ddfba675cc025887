//! 请求 DTO 定义

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use validator::Validate;

/// 幂等键请求头
pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";

/// 发放积分请求
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GrantCreditRequest {
    #[validate(range(min = 1, message = "发放数量必须大于 0"))]
    pub amount: i64,
    #[validate(length(min = 1, max = 64, message = "操作人不能为空"))]
    pub actor_id: String,
    #[validate(length(min = 1, max = 500, message = "发放原因不能为空且不超过500字符"))]
    pub reason: String,
}

/// 消耗积分请求
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ConsumeCreditRequest {
    #[validate(range(min = 1, message = "消耗数量必须大于 0"))]
    pub amount: i64,
    #[validate(length(max = 500, message = "用途说明不超过500字符"))]
    #[serde(default)]
    pub reason: String,
}

/// 每日补充请求
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefillCreditRequest {
    /// 补充所属的自然日（由调度方按业务时区计算）
    pub date: NaiveDate,
}

/// 撤销交易请求
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RevokeTransactionRequest {
    #[validate(length(min = 1, max = 64, message = "操作人不能为空"))]
    pub actor_id: String,
    /// 走强制撤销通道（允许余额为负）
    #[serde(default)]
    pub force: bool,
    #[validate(length(max = 500, message = "撤销原因不超过500字符"))]
    pub reason: Option<String>,
}

/// 余额查询参数
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceQuery {
    /// 指定时刻，缺省为当前余额
    pub at: Option<DateTime<Utc>>,
}
