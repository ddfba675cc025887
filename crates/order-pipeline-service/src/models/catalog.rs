//! 选项目录

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::CatalogStatus;

/// 选项目录条目
///
/// 流水线只读，价格与供应方信息以目录为准
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct OptionCatalogEntry {
    pub id: Uuid,
    pub option_code: Option<String>,
    pub option_name: String,
    pub supply_price: Decimal,
    pub shipping_entity: Option<String>,
    pub invoice_entity: Option<String>,
    pub vendor_ref: Option<String>,
    pub category_path: Option<String>,
    pub status: CatalogStatus,
    pub updated_at: DateTime<Utc>,
}

/// 组织自定义的选项别名
///
/// 卖家在平台上使用的选项名与目录中的标准选项名不一致时使用
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct OptionAlias {
    pub organization_id: String,
    pub user_option_name: String,
    pub site_option_name: String,
}
