//! 目录匹配与结算金额计算
//!
//! 匹配顺序：组织别名替换 -> 选项名精确匹配 -> 选项编码匹配。
//! 未匹配的订单照常入库，价格字段留空并标记待对账。
//!
//! 同名目录条目按「启用优先、最近更新优先、ID 升序」确定唯一结果，
//! 重复本身是上游数据质量问题，无论如何都记录警告。

use std::cmp::Reverse;
use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use order_shared::money;

use crate::models::{
    CanonicalOrderDraft, CatalogStatus, EnrichmentStatus, OptionAlias, OptionCatalogEntry,
    OrderEnrichment,
};

/// 结算金额 = 供货价 × 数量 × (1 − 折扣率)，按最小单位四舍五入
pub fn settlement_amount(supply_price: Decimal, quantity: i32, rate: Decimal, scale: u32) -> Decimal {
    money::round_half_up(
        supply_price * Decimal::from(quantity) * (Decimal::ONE - rate),
        scale,
    )
}

/// 命中方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchKey {
    Name,
    Code,
}

/// 一次目录命中
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogMatch<'a> {
    pub entry: &'a OptionCatalogEntry,
    pub matched_by: MatchKey,
    /// 同键候选数，大于 1 表示目录重复
    pub candidates: usize,
}

/// 目录索引
#[derive(Debug, Default)]
pub struct CatalogIndex {
    by_name: HashMap<String, Vec<OptionCatalogEntry>>,
    by_code: HashMap<String, Vec<OptionCatalogEntry>>,
}

impl CatalogIndex {
    pub fn build(entries: Vec<OptionCatalogEntry>) -> Self {
        let mut index = Self::default();
        for entry in entries {
            if let Some(code) = entry.option_code.as_deref().map(str::trim)
                && !code.is_empty()
            {
                index
                    .by_code
                    .entry(code.to_string())
                    .or_default()
                    .push(entry.clone());
            }
            index
                .by_name
                .entry(entry.option_name.trim().to_string())
                .or_default()
                .push(entry);
        }

        for candidates in index.by_name.values_mut().chain(index.by_code.values_mut()) {
            candidates.sort_by_key(|e| (e.status != CatalogStatus::Active, Reverse(e.updated_at), e.id));
        }
        index
    }

    /// 先按选项名，再按选项编码查找
    pub fn lookup(&self, option_name: &str, option_code: Option<&str>) -> Option<CatalogMatch<'_>> {
        let by_name = self
            .by_name
            .get(option_name.trim())
            .map(|c| (c, MatchKey::Name));
        let by_code = || {
            option_code
                .map(str::trim)
                .filter(|code| !code.is_empty())
                .and_then(|code| self.by_code.get(code))
                .map(|c| (c, MatchKey::Code))
        };

        let (candidates, matched_by) = by_name.or_else(by_code)?;
        candidates.first().map(|entry| CatalogMatch {
            entry,
            matched_by,
            candidates: candidates.len(),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

/// 组织别名表，比较时忽略首尾空白和大小写
#[derive(Debug, Default)]
pub struct AliasTable {
    aliases: HashMap<String, String>,
}

impl AliasTable {
    pub fn new(aliases: Vec<OptionAlias>) -> Self {
        Self {
            aliases: aliases
                .into_iter()
                .map(|a| (fold(&a.user_option_name), a.site_option_name))
                .collect(),
        }
    }

    pub fn resolve(&self, option_name: &str) -> Option<&str> {
        self.aliases.get(&fold(option_name)).map(String::as_str)
    }
}

fn fold(value: &str) -> String {
    value.trim().to_lowercase()
}

/// 匹配过程中的提示
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EnrichmentWarning {
    #[serde(rename_all = "camelCase")]
    DuplicateCatalogEntry {
        option_name: String,
        candidates: usize,
        chosen_id: Uuid,
    },
    #[serde(rename_all = "camelCase")]
    UnresolvedOption {
        option_name: String,
        option_code: Option<String>,
    },
}

/// 单个订单的匹配结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichmentResult {
    pub enrichment: OrderEnrichment,
    pub warnings: Vec<EnrichmentWarning>,
}

/// 匹配目录并计算结算金额
pub fn enrich(
    draft: &CanonicalOrderDraft,
    catalog: &CatalogIndex,
    aliases: &AliasTable,
    discount_rate: Decimal,
    scale: u32,
) -> EnrichmentResult {
    let lookup_name = aliases
        .resolve(&draft.option_name)
        .unwrap_or(draft.option_name.as_str())
        .to_string();

    let Some(found) = catalog.lookup(&lookup_name, draft.option_code.as_deref()) else {
        warn!(
            organization_id = %draft.organization_id,
            option_name = %draft.option_name,
            option_code = ?draft.option_code,
            "选项未匹配到目录，订单待对账"
        );
        return EnrichmentResult {
            enrichment: OrderEnrichment {
                status: EnrichmentStatus::UnresolvedOption,
                matched_option_name: Some(lookup_name),
                ..OrderEnrichment::default()
            },
            warnings: vec![EnrichmentWarning::UnresolvedOption {
                option_name: draft.option_name.clone(),
                option_code: draft.option_code.clone(),
            }],
        };
    };

    let entry = found.entry;
    let mut warnings = Vec::new();
    if found.candidates > 1 {
        warn!(
            option_name = %lookup_name,
            matched_by = ?found.matched_by,
            candidates = found.candidates,
            chosen_id = %entry.id,
            chosen_status = ?entry.status,
            "目录存在重复条目"
        );
        warnings.push(EnrichmentWarning::DuplicateCatalogEntry {
            option_name: lookup_name.clone(),
            candidates: found.candidates,
            chosen_id: entry.id,
        });
    }

    EnrichmentResult {
        enrichment: OrderEnrichment {
            status: EnrichmentStatus::Resolved,
            catalog_entry_id: Some(entry.id),
            matched_option_name: Some(lookup_name),
            supply_price: Some(entry.supply_price),
            shipping_entity: entry.shipping_entity.clone(),
            invoice_entity: entry.invoice_entity.clone(),
            vendor_ref: entry.vendor_ref.clone(),
            discount_rate: Some(discount_rate),
            settlement_amount: Some(settlement_amount(
                entry.supply_price,
                draft.quantity,
                discount_rate,
                scale,
            )),
        },
        warnings,
    }
}
