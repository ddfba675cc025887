//! 等级评估
//!
//! 等级标准按 `rank` 升序排列，订单数与销售额同时达标才算满足，
//! 满足的最高等级生效；一个都不满足时回落到基础等级（rank 最小者）。

use std::collections::HashSet;

use rust_decimal::Decimal;
use tracing::warn;

use order_shared::money;

use crate::error::{PipelineError, Result};
use crate::models::{ManualTierOverride, OrderVolume, TierAssignment, TierCriterion, TierSource};

/// 排序并过滤后的等级表
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TierTable {
    criteria: Vec<TierCriterion>,
}

impl TierTable {
    /// 构建等级表，折扣率越界的标准被丢弃并记录警告
    pub fn new(criteria: Vec<TierCriterion>) -> Self {
        let mut criteria: Vec<TierCriterion> = criteria
            .into_iter()
            .filter(|c| {
                let valid = money::is_valid_rate(c.discount_rate);
                if !valid {
                    warn!(
                        tier = %c.name,
                        discount_rate = %c.discount_rate,
                        "等级折扣率不在 [0, 1) 区间，已忽略"
                    );
                }
                valid
            })
            .collect();
        criteria.sort_by(|a, b| a.rank.cmp(&b.rank).then_with(|| a.name.cmp(&b.name)));
        Self { criteria }
    }

    /// 校验运营编辑后的等级标准
    pub fn validate(criteria: &[TierCriterion]) -> Result<()> {
        let mut names = HashSet::new();
        let mut ranks = HashSet::new();

        for c in criteria {
            if c.name.trim().is_empty() {
                return Err(PipelineError::InvalidTierCriteria("等级名称不能为空".to_string()));
            }
            if !names.insert(c.name.as_str()) {
                return Err(PipelineError::InvalidTierCriteria(format!(
                    "等级名称重复: {}",
                    c.name
                )));
            }
            if !ranks.insert(c.rank) {
                return Err(PipelineError::InvalidTierCriteria(format!(
                    "等级顺序重复: {}",
                    c.rank
                )));
            }
            if c.min_order_count < 0 || c.min_total_sales.is_sign_negative() {
                return Err(PipelineError::InvalidTierCriteria(format!(
                    "等级 {} 的门槛不能为负",
                    c.name
                )));
            }
            if !money::is_valid_rate(c.discount_rate) {
                return Err(PipelineError::InvalidTierCriteria(format!(
                    "等级 {} 的折扣率 {} 不在 [0, 1) 区间",
                    c.name, c.discount_rate
                )));
            }
        }
        Ok(())
    }

    pub fn criteria(&self) -> &[TierCriterion] {
        &self.criteria
    }

    /// 基础等级
    pub fn base(&self) -> Option<&TierCriterion> {
        self.criteria.first()
    }

    pub fn find(&self, name: &str) -> Option<&TierCriterion> {
        self.criteria.iter().find(|c| c.name == name)
    }

    /// 满足的最高等级
    pub fn evaluate(&self, volume: &OrderVolume) -> Option<&TierCriterion> {
        self.criteria
            .iter()
            .rev()
            .find(|c| c.is_satisfied_by(volume))
    }

    /// 等级对应的折扣率，未知等级回落到基础等级，没有任何标准时为 0
    pub fn discount_rate(&self, tier_name: Option<&str>) -> Decimal {
        tier_name
            .and_then(|name| self.find(name))
            .or_else(|| self.base())
            .map(|c| c.discount_rate)
            .unwrap_or(Decimal::ZERO)
    }

    /// 确定组织等级
    ///
    /// 手动指定且等级存在时优先；手动指定的等级已被删除时按交易量计算
    pub fn assign(
        &self,
        organization_id: &str,
        volume: OrderVolume,
        manual: Option<&ManualTierOverride>,
    ) -> TierAssignment {
        if let Some(manual) = manual {
            match self.find(&manual.tier_name) {
                Some(tier) => {
                    return TierAssignment {
                        organization_id: organization_id.to_string(),
                        tier_name: Some(tier.name.clone()),
                        discount_rate: tier.discount_rate,
                        source: TierSource::Manual,
                        volume,
                    };
                }
                None => warn!(
                    organization_id,
                    tier = %manual.tier_name,
                    "手动指定的等级不存在，按交易量计算"
                ),
            }
        }

        let (tier, source) = match self.evaluate(&volume) {
            Some(tier) => (Some(tier), TierSource::Computed),
            None => (self.base(), TierSource::Base),
        };

        TierAssignment {
            organization_id: organization_id.to_string(),
            tier_name: tier.map(|t| t.name.clone()),
            discount_rate: tier.map(|t| t.discount_rate).unwrap_or(Decimal::ZERO),
            source,
            volume,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal_macros::dec;

    use super::*;

    fn criterion(name: &str, rank: i32, count: i64, sales: Decimal, rate: Decimal) -> TierCriterion {
        TierCriterion {
            name: name.to_string(),
            rank,
            min_order_count: count,
            min_total_sales: sales,
            discount_rate: rate,
        }
    }

    fn table() -> TierTable {
        TierTable::new(vec![
            criterion("gold", 3, 100, dec!(5000000), dec!(0.05)),
            criterion("bronze", 1, 10, dec!(300000), dec!(0.01)),
            criterion("silver", 2, 50, dec!(1000000), dec!(0.03)),
        ])
    }

    fn volume(count: i64, sales: Decimal) -> OrderVolume {
        OrderVolume {
            order_count: count,
            total_sales: sales,
        }
    }

    #[test]
    fn test_both_thresholds_required() {
        let table = table();
        // 订单数达到 gold，销售额只够 silver
        let tier = table.evaluate(&volume(150, dec!(2000000))).unwrap();
        assert_eq!(tier.name, "silver");
        // 销售额达到 gold，订单数只够 bronze
        let tier = table.evaluate(&volume(20, dec!(9000000))).unwrap();
        assert_eq!(tier.name, "bronze");
    }

    #[test]
    fn test_no_qualifying_tier_uses_base_rate() {
        let table = table();
        let assignment = table.assign("org-1", volume(1, dec!(1000)), None);
        assert_eq!(assignment.source, TierSource::Base);
        assert_eq!(assignment.tier_name.as_deref(), Some("bronze"));
        assert_eq!(assignment.discount_rate, dec!(0.01));
    }

    #[test]
    fn test_empty_table_never_errors() {
        let table = TierTable::new(vec![]);
        let assignment = table.assign("org-1", volume(1000, dec!(1)), None);
        assert_eq!(assignment.discount_rate, Decimal::ZERO);
        assert_eq!(assignment.tier_name, None);
        assert_eq!(table.discount_rate(Some("gold")), Decimal::ZERO);
    }

    #[test]
    fn test_manual_override_wins() {
        let table = table();
        let manual = ManualTierOverride {
            organization_id: "org-1".to_string(),
            tier_name: "gold".to_string(),
            actor_id: "admin".to_string(),
            updated_at: Utc::now(),
        };
        let assignment = table.assign("org-1", volume(0, dec!(0)), Some(&manual));
        assert_eq!(assignment.source, TierSource::Manual);
        assert_eq!(assignment.discount_rate, dec!(0.05));

        let stale = ManualTierOverride {
            tier_name: "diamond".to_string(),
            ..manual
        };
        let assignment = table.assign("org-1", volume(60, dec!(1500000)), Some(&stale));
        assert_eq!(assignment.source, TierSource::Computed);
        assert_eq!(assignment.tier_name.as_deref(), Some("silver"));
    }

    #[test]
    fn test_invalid_rate_dropped() {
        let table = TierTable::new(vec![
            criterion("bad", 1, 0, dec!(0), dec!(1.2)),
            criterion("ok", 2, 0, dec!(0), dec!(0.02)),
        ]);
        assert_eq!(table.criteria().len(), 1);
        assert_eq!(table.discount_rate(None), dec!(0.02));
    }

    #[test]
    fn test_validate() {
        assert!(TierTable::validate(table().criteria()).is_ok());
        let dup = vec![
            criterion("a", 1, 0, dec!(0), dec!(0.01)),
            criterion("a", 2, 0, dec!(0), dec!(0.02)),
        ];
        assert!(matches!(
            TierTable::validate(&dup).unwrap_err(),
            PipelineError::InvalidTierCriteria(_)
        ));
        let rate = vec![criterion("a", 1, 0, dec!(0), dec!(1))];
        assert!(TierTable::validate(&rate).is_err());
    }
}
