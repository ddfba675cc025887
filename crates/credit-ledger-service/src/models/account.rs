//! 积分账户与流水

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::TransactionKind;

/// 积分账户
///
/// `balance` 是流水的派生缓存，只能由账本在写流水的同一事务内更新
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CreditAccount {
    pub organization_id: String,
    pub balance: i64,
    /// 最后一条流水的序号，新流水序号为其加一
    pub last_sequence: i64,
    /// 最近一次每日补充的日期
    #[sqlx(default)]
    pub last_refill_date: Option<NaiveDate>,
    pub updated_at: DateTime<Utc>,
}

impl CreditAccount {
    /// 尚无任何流水的空账户
    pub fn empty(organization_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            organization_id: organization_id.into(),
            balance: 0,
            last_sequence: 0,
            last_refill_date: None,
            updated_at: now,
        }
    }
}

/// 积分流水
///
/// 写入后不可修改；撤销通过追加冲正流水实现，原流水仅置 `reversed` 标记
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CreditTransaction {
    pub id: Uuid,
    pub organization_id: String,
    /// 组织内单调递增的序号，决定流水全序
    pub sequence: i64,
    pub kind: TransactionKind,
    /// 带符号的变动值（最小单位）
    pub delta: i64,
    /// 变动后的余额
    pub balance_after: i64,
    pub reason: String,
    #[sqlx(default)]
    pub actor_id: Option<String>,
    pub reversed: bool,
    /// 冲正流水指向被撤销的原流水
    #[sqlx(default)]
    pub reverses_id: Option<Uuid>,
    pub idempotency_key: String,
    /// 请求参数指纹，用于识别幂等键被不同参数复用
    #[serde(skip_serializing, default)]
    pub request_fingerprint: String,
    pub created_at: DateTime<Utc>,
}

impl CreditTransaction {
    /// 是否可被撤销
    pub fn is_revocable(&self) -> bool {
        !self.kind.is_reversal() && !self.reversed
    }

    /// 是否计入有效余额
    ///
    /// 已撤销的原流水与其冲正流水成对抵消，二者都不计入
    pub fn is_effective(&self) -> bool {
        !self.reversed && !self.kind.is_reversal()
    }
}

/// 账本操作回执
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerReceipt {
    pub transaction: CreditTransaction,
    pub balance_after: i64,
    /// 是否为幂等重放（未追加新流水）
    pub replayed: bool,
}

/// 账户审计结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerAudit {
    pub organization_id: String,
    /// 账户上缓存的余额
    pub cached_balance: i64,
    /// 有效流水（未撤销且非冲正）变动之和
    pub effective_sum: i64,
    /// 全部流水变动之和
    pub total_delta_sum: i64,
    pub transaction_count: usize,
    /// 序号从 1 开始连续无缺口
    pub sequence_contiguous: bool,
    pub consistent: bool,
}

impl LedgerAudit {
    /// 根据账户与按序号排列的流水计算审计结果
    pub fn compute(
        organization_id: &str,
        cached_balance: i64,
        transactions: &[CreditTransaction],
    ) -> Self {
        let effective_sum: i64 = transactions
            .iter()
            .filter(|t| t.is_effective())
            .map(|t| t.delta)
            .sum();
        let total_delta_sum: i64 = transactions.iter().map(|t| t.delta).sum();
        let sequence_contiguous = transactions
            .iter()
            .enumerate()
            .all(|(i, t)| t.sequence == i as i64 + 1);

        Self {
            organization_id: organization_id.to_string(),
            cached_balance,
            effective_sum,
            total_delta_sum,
            transaction_count: transactions.len(),
            sequence_contiguous,
            consistent: cached_balance == effective_sum
                && cached_balance == total_delta_sum
                && sequence_contiguous,
        }
    }
}
