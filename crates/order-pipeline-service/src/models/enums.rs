//! 订单流水线枚举类型定义
//!
//! 所有枚举都支持数据库（sqlx）和 JSON（serde）序列化

use std::fmt;

use serde::{Deserialize, Serialize};

/// 规范订单字段
///
/// 映射配置把各平台导出列绑定到这些字段上
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalField {
    SellerOrderNumber,
    OptionName,
    OptionCode,
    Quantity,
    RecipientName,
    RecipientPhone,
    RecipientAddress,
    ShippingStatus,
    PaidAmount,
    SheetDate,
    PaymentDate,
}

impl CanonicalField {
    /// 字段本身是否必填（缺失或为空时整行拒绝）
    pub fn is_required(&self) -> bool {
        matches!(self, Self::OptionName | Self::Quantity)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SellerOrderNumber => "seller_order_number",
            Self::OptionName => "option_name",
            Self::OptionCode => "option_code",
            Self::Quantity => "quantity",
            Self::RecipientName => "recipient_name",
            Self::RecipientPhone => "recipient_phone",
            Self::RecipientAddress => "recipient_address",
            Self::ShippingStatus => "shipping_status",
            Self::PaidAmount => "paid_amount",
            Self::SheetDate => "sheet_date",
            Self::PaymentDate => "payment_date",
        }
    }
}

impl fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 配送状态
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "varchar", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShippingStatus {
    /// 已接单 / 已付款
    #[default]
    Received,
    /// 备货中
    Preparing,
    /// 已发货
    Shipped,
    /// 已签收
    Delivered,
    /// 已取消
    Cancelled,
    /// 已退款
    Refunded,
}

impl ShippingStatus {
    /// 解析平台导出的状态文本（韩文标签或英文名）
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim();
        let status = match label {
            "접수" | "결제완료" | "신규주문" => Self::Received,
            "상품준비중" | "발주확인" => Self::Preparing,
            "발송완료" | "배송중" => Self::Shipped,
            "배송완료" | "구매확정" => Self::Delivered,
            "취소요청" | "취소완료" => Self::Cancelled,
            "환불완료" | "반품완료" => Self::Refunded,
            _ => match label.to_ascii_uppercase().as_str() {
                "RECEIVED" => Self::Received,
                "PREPARING" => Self::Preparing,
                "SHIPPED" => Self::Shipped,
                "DELIVERED" => Self::Delivered,
                "CANCELLED" | "CANCELED" => Self::Cancelled,
                "REFUNDED" => Self::Refunded,
                _ => return None,
            },
        };
        Some(status)
    }

    /// 是否计入结算金额
    pub fn is_billable(&self) -> bool {
        !matches!(self, Self::Cancelled | Self::Refunded)
    }
}

/// 目录商品状态
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "varchar", rename_all = "lowercase")]
pub enum CatalogStatus {
    #[default]
    Active,
    Inactive,
    Discontinued,
}

/// 订单与目录的匹配结果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "varchar", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EnrichmentStatus {
    /// 已匹配目录，价格字段有效
    Resolved,
    /// 未匹配到目录，价格字段为空，待对账
    #[default]
    UnresolvedOption,
}

/// 结算单状态
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "varchar", rename_all = "lowercase")]
pub enum SettlementStatus {
    /// 草稿 - 可被重算覆盖
    #[default]
    Draft,
    /// 已确认 - 折扣率冻结，禁止自动重算
    Confirmed,
}

/// 等级来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TierSource {
    /// 按交易量计算得出
    Computed,
    /// 运营手动指定
    Manual,
    /// 未达到任何标准，使用基础等级
    Base,
}
