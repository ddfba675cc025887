//! 请求 DTO 定义

use chrono::NaiveDate;
use serde::Deserialize;
use validator::Validate;

use crate::models::TierCriterion;

/// 上传一批订单
///
/// 提供 `header` 时 `rows` 只含数据行；否则 `rows` 为原始表格，
/// 表头位置按平台配置确定
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct IngestBatchRequest {
    #[validate(length(min = 1, max = 64, message = "组织 ID 不能为空"))]
    pub organization_id: String,
    /// 平台标识，缺省时按表头识别
    pub marketplace: Option<String>,
    pub header: Option<Vec<String>>,
    #[validate(length(min = 1, max = 20000, message = "订单行数必须在 1 到 20000 之间"))]
    pub rows: Vec<Vec<String>>,
}

/// 重算结算单
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpsertSettlementRequest {
    #[validate(length(min = 1, max = 64, message = "组织 ID 不能为空"))]
    pub organization_id: String,
    pub date: NaiveDate,
    /// 重算后立即确认的操作人
    #[validate(length(min = 1, max = 64, message = "确认操作人不能为空"))]
    pub confirm_as: Option<String>,
}

/// 确认结算单
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmSettlementRequest {
    #[validate(length(min = 1, max = 64, message = "操作人不能为空"))]
    pub actor_id: String,
}

/// 重新打开结算单
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ReopenSettlementRequest {
    #[validate(length(min = 1, max = 64, message = "操作人不能为空"))]
    pub actor_id: String,
    #[validate(length(min = 1, max = 500, message = "原因不能为空且不超过500字符"))]
    pub reason: String,
}

/// 结算汇总粒度
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupBy {
    #[default]
    Day,
    Month,
}

/// 结算查询参数
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementQuery {
    pub organization_id: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub group_by: GroupBy,
}

/// 操作人参数（用于 DELETE 等无请求体的接口）
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActorQuery {
    pub actor_id: String,
    /// 删除订单时是否物理清除（仅限已软删除订单）
    #[serde(default)]
    pub purge: bool,
}

/// 操作人请求体
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ActorRequest {
    #[validate(length(min = 1, max = 64, message = "操作人不能为空"))]
    pub actor_id: String,
}

/// 手动指定等级
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ManualTierRequest {
    #[validate(length(min = 1, max = 64, message = "操作人不能为空"))]
    pub actor_id: String,
    #[validate(length(min = 1, max = 50, message = "等级名称不能为空"))]
    pub tier_name: String,
}

/// 替换等级标准
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ReplaceCriteriaRequest {
    #[validate(length(min = 1, max = 64, message = "操作人不能为空"))]
    pub actor_id: String,
    pub criteria: Vec<TierCriterion>,
}
