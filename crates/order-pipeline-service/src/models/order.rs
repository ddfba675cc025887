//! 规范订单

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{CanonicalField, EnrichmentStatus, ShippingStatus};

/// 字段级校验错误
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldError {
    pub field: CanonicalField,
    pub message: String,
}

impl FieldError {
    pub fn new(field: CanonicalField, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// 字段级警告（已使用默认值，行仍被接受）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldWarning {
    pub field: CanonicalField,
    pub message: String,
}

/// 被拒绝的行
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowRejection {
    pub row_number: usize,
    pub errors: Vec<FieldError>,
}

/// 规范化后的订单草稿
///
/// 只由输入行和映射配置决定，不含 ID 与写入时间
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalOrderDraft {
    pub organization_id: String,
    pub marketplace: String,
    pub batch_id: Uuid,
    pub row_number: usize,
    pub profile_version: i32,
    pub seller_order_number: Option<String>,
    pub option_name: String,
    pub option_code: Option<String>,
    pub quantity: i32,
    pub recipient_name: Option<String>,
    pub recipient_phone: Option<String>,
    pub recipient_address: Option<String>,
    pub shipping_status: ShippingStatus,
    pub paid_amount: Option<Decimal>,
    pub sheet_date: Option<DateTime<Utc>>,
    pub payment_date: Option<DateTime<Utc>>,
}

/// 目录匹配带出的字段
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderEnrichment {
    pub status: EnrichmentStatus,
    pub catalog_entry_id: Option<Uuid>,
    /// 别名替换后用于匹配的选项名
    pub matched_option_name: Option<String>,
    pub supply_price: Option<Decimal>,
    pub shipping_entity: Option<String>,
    pub invoice_entity: Option<String>,
    pub vendor_ref: Option<String>,
    pub discount_rate: Option<Decimal>,
    pub settlement_amount: Option<Decimal>,
}

/// 规范订单
///
/// 只做软删除，物理删除仅限管理员显式清除
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalOrder {
    pub id: Uuid,
    pub organization_id: String,
    pub marketplace: String,
    pub batch_id: Uuid,
    pub seller_order_number: Option<String>,
    pub option_name: String,
    pub option_code: Option<String>,
    pub quantity: i32,
    pub recipient_name: Option<String>,
    pub recipient_phone: Option<String>,
    pub recipient_address: Option<String>,
    pub shipping_status: ShippingStatus,
    pub paid_amount: Option<Decimal>,
    pub sheet_date: Option<DateTime<Utc>>,
    pub payment_date: Option<DateTime<Utc>>,

    // 目录匹配
    pub enrichment_status: EnrichmentStatus,
    pub catalog_entry_id: Option<Uuid>,
    pub matched_option_name: Option<String>,
    pub supply_price: Option<Decimal>,
    pub shipping_entity: Option<String>,
    pub invoice_entity: Option<String>,
    pub vendor_ref: Option<String>,
    pub discount_rate: Option<Decimal>,
    pub settlement_amount: Option<Decimal>,

    // 软删除
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub deleted_by: Option<String>,

    pub created_at: DateTime<Utc>,
}

impl CanonicalOrder {
    /// 由草稿和匹配结果生成订单
    pub fn from_draft(
        id: Uuid,
        draft: CanonicalOrderDraft,
        enrichment: OrderEnrichment,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            organization_id: draft.organization_id,
            marketplace: draft.marketplace,
            batch_id: draft.batch_id,
            seller_order_number: draft.seller_order_number,
            option_name: draft.option_name,
            option_code: draft.option_code,
            quantity: draft.quantity,
            recipient_name: draft.recipient_name,
            recipient_phone: draft.recipient_phone,
            recipient_address: draft.recipient_address,
            shipping_status: draft.shipping_status,
            paid_amount: draft.paid_amount,
            sheet_date: draft.sheet_date,
            payment_date: draft.payment_date,
            enrichment_status: enrichment.status,
            catalog_entry_id: enrichment.catalog_entry_id,
            matched_option_name: enrichment.matched_option_name,
            supply_price: enrichment.supply_price,
            shipping_entity: enrichment.shipping_entity,
            invoice_entity: enrichment.invoice_entity,
            vendor_ref: enrichment.vendor_ref,
            discount_rate: enrichment.discount_rate,
            settlement_amount: enrichment.settlement_amount,
            is_deleted: false,
            deleted_at: None,
            deleted_by: None,
            created_at: now,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.enrichment_status == EnrichmentStatus::Resolved && self.supply_price.is_some()
    }
}

/// 组织在统计窗口内的交易量
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderVolume {
    pub order_count: i64,
    /// 窗口内有效订单的供货价合计
    pub total_sales: Decimal,
}
