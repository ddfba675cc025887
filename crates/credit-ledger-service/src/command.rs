//! 账本指令与记账规则
//!
//! 记账规则是纯函数：输入账户当前状态（以及撤销目标），输出待写入的流水，
//! 不读时钟、不做 I/O。PostgreSQL 与内存两种存储在各自的串行化临界区内
//! 调用同一套规则，保证行为一致。

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::{LedgerError, Result};
use crate::models::{CreditAccount, CreditTransaction, TransactionKind};

/// 账本变更指令
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LedgerCommand {
    Grant {
        organization_id: String,
        amount: i64,
        actor_id: String,
        reason: String,
    },
    Consume {
        organization_id: String,
        amount: i64,
        reason: String,
    },
    Revoke {
        transaction_id: Uuid,
        actor_id: String,
        reason: Option<String>,
        force: bool,
    },
    DailyRefill {
        organization_id: String,
        date: NaiveDate,
        limit: i64,
    },
}

impl LedgerCommand {
    /// 操作名（日志与指标标签）
    pub fn operation(&self) -> &'static str {
        match self {
            Self::Grant { .. } => "grant",
            Self::Consume { .. } => "consume",
            Self::Revoke { force: false, .. } => "revoke",
            Self::Revoke { force: true, .. } => "force_revoke",
            Self::DailyRefill { .. } => "refill_daily",
        }
    }

    /// 直接指定的组织；撤销指令的组织需由目标流水反查
    pub fn organization_id(&self) -> Option<&str> {
        match self {
            Self::Grant {
                organization_id, ..
            }
            | Self::Consume {
                organization_id, ..
            }
            | Self::DailyRefill {
                organization_id, ..
            } => Some(organization_id),
            Self::Revoke { .. } => None,
        }
    }

    /// 撤销指令的目标流水
    pub fn target_transaction(&self) -> Option<Uuid> {
        match self {
            Self::Revoke { transaction_id, .. } => Some(*transaction_id),
            _ => None,
        }
    }

    /// 请求参数指纹（SHA-256 十六进制）
    ///
    /// 同一幂等键的重复请求指纹必须一致，否则视为键被误用
    pub fn fingerprint(&self) -> String {
        let canonical = match self {
            Self::Grant {
                organization_id,
                amount,
                actor_id,
                reason,
            } => format!("grant\u{1f}{organization_id}\u{1f}{amount}\u{1f}{actor_id}\u{1f}{reason}"),
            Self::Consume {
                organization_id,
                amount,
                reason,
            } => format!("consume\u{1f}{organization_id}\u{1f}{amount}\u{1f}{reason}"),
            Self::Revoke {
                transaction_id,
                actor_id,
                reason,
                force,
            } => format!(
                "revoke\u{1f}{transaction_id}\u{1f}{actor_id}\u{1f}{}\u{1f}{force}",
                reason.as_deref().unwrap_or_default()
            ),
            Self::DailyRefill {
                organization_id,
                date,
                limit,
            } => format!("refill\u{1f}{organization_id}\u{1f}{date}\u{1f}{limit}"),
        };

        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// 参数校验（不依赖账户状态）
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Grant {
                organization_id,
                amount,
                actor_id,
                ..
            } => {
                require_non_empty("organization_id", organization_id)?;
                require_non_empty("actor_id", actor_id)?;
                require_positive(*amount)
            }
            Self::Consume {
                organization_id,
                amount,
                ..
            } => {
                require_non_empty("organization_id", organization_id)?;
                require_positive(*amount)
            }
            Self::Revoke { actor_id, .. } => require_non_empty("actor_id", actor_id),
            Self::DailyRefill {
                organization_id,
                limit,
                ..
            } => {
                require_non_empty("organization_id", organization_id)?;
                require_positive(*limit)
            }
        }
    }
}

fn require_positive(amount: i64) -> Result<()> {
    if amount <= 0 {
        return Err(LedgerError::InvalidAmount(amount));
    }
    Ok(())
}

fn require_non_empty(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(LedgerError::Validation(format!("{} 不能为空", field)));
    }
    Ok(())
}

/// 待写入的流水
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedEntry {
    pub kind: TransactionKind,
    pub delta: i64,
    pub reason: String,
    pub actor_id: Option<String>,
    pub reverses_id: Option<Uuid>,
    pub refill_date: Option<NaiveDate>,
}

/// 根据账户当前状态决定要写入的流水
///
/// 撤销指令必须传入目标流水；目标缺失由存储层在调用前报告
pub fn plan(
    command: &LedgerCommand,
    account: &CreditAccount,
    target: Option<&CreditTransaction>,
) -> Result<PlannedEntry> {
    command.validate()?;

    match command {
        LedgerCommand::Grant {
            amount,
            actor_id,
            reason,
            ..
        } => Ok(PlannedEntry {
            kind: TransactionKind::Grant,
            delta: *amount,
            reason: reason.clone(),
            actor_id: Some(actor_id.clone()),
            reverses_id: None,
            refill_date: None,
        }),
        LedgerCommand::Consume { amount, reason, .. } => {
            // 1. 扣减后余额不得为负
            if account.balance < *amount {
                return Err(LedgerError::InsufficientCredit {
                    balance: account.balance,
                    requested: *amount,
                });
            }
            Ok(PlannedEntry {
                kind: TransactionKind::Consume,
                delta: -amount,
                reason: reason.clone(),
                actor_id: None,
                reverses_id: None,
                refill_date: None,
            })
        }
        LedgerCommand::Revoke {
            transaction_id,
            actor_id,
            reason,
            force,
        } => {
            let target = target.ok_or(LedgerError::TransactionNotFound(*transaction_id))?;

            // 1. 冲正流水本身不可撤销
            if target.kind.is_reversal() {
                return Err(LedgerError::NotRevocable(target.id));
            }
            // 2. 每条流水只能被撤销一次
            if target.reversed {
                return Err(LedgerError::AlreadyReversed(target.id));
            }
            // 3. 普通撤销不允许余额为负，强制通道除外
            let delta = -target.delta;
            if !force && account.balance + delta < 0 {
                return Err(LedgerError::InsufficientBalance {
                    balance: account.balance,
                    required: -delta,
                });
            }

            Ok(PlannedEntry {
                kind: if *force {
                    TransactionKind::ForcedReversal
                } else {
                    TransactionKind::Reversal
                },
                delta,
                reason: reason
                    .clone()
                    .unwrap_or_else(|| format!("撤销交易 {}", target.id)),
                actor_id: Some(actor_id.clone()),
                reverses_id: Some(target.id),
                refill_date: None,
            })
        }
        LedgerCommand::DailyRefill {
            organization_id,
            date,
            limit,
        } => {
            if account.last_refill_date == Some(*date) {
                return Err(LedgerError::AlreadyRefilled {
                    organization_id: organization_id.clone(),
                    date: *date,
                });
            }
            if account.balance >= *limit {
                return Err(LedgerError::RefillNotNeeded {
                    balance: account.balance,
                    limit: *limit,
                });
            }
            Ok(PlannedEntry {
                kind: TransactionKind::DailyRefill,
                delta: limit - account.balance,
                reason: format!("每日补充 {}", date),
                actor_id: None,
                reverses_id: None,
                refill_date: Some(*date),
            })
        }
    }
}

impl PlannedEntry {
    /// 生成流水与更新后的账户
    pub fn materialize(
        self,
        account: &CreditAccount,
        idempotency_key: &str,
        fingerprint: String,
        now: DateTime<Utc>,
    ) -> Result<(CreditTransaction, CreditAccount)> {
        let balance_after = account
            .balance
            .checked_add(self.delta)
            .ok_or_else(|| LedgerError::Validation("余额超出可表示范围".to_string()))?;
        let sequence = account.last_sequence + 1;
        // 时间戳在组织锁外生成，不得早于上一条流水，保证时间顺序与序号顺序一致
        let created_at = if account.last_sequence > 0 {
            now.max(account.updated_at)
        } else {
            now
        };

        let transaction = CreditTransaction {
            id: Uuid::now_v7(),
            organization_id: account.organization_id.clone(),
            sequence,
            kind: self.kind,
            delta: self.delta,
            balance_after,
            reason: self.reason,
            actor_id: self.actor_id,
            reversed: false,
            reverses_id: self.reverses_id,
            idempotency_key: idempotency_key.to_string(),
            request_fingerprint: fingerprint,
            created_at,
        };

        let updated = CreditAccount {
            organization_id: account.organization_id.clone(),
            balance: balance_after,
            last_sequence: sequence,
            last_refill_date: self.refill_date.or(account.last_refill_date),
            updated_at: created_at,
        };

        Ok((transaction, updated))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(balance: i64) -> CreditAccount {
        CreditAccount {
            organization_id: "org-1".to_string(),
            balance,
            last_sequence: 3,
            last_refill_date: None,
            updated_at: Utc::now(),
        }
    }

    fn grant_tx(delta: i64) -> CreditTransaction {
        CreditTransaction {
            id: Uuid::new_v4(),
            organization_id: "org-1".to_string(),
            sequence: 1,
            kind: TransactionKind::Grant,
            delta,
            balance_after: delta,
            reason: "충전".to_string(),
            actor_id: Some("admin".to_string()),
            reversed: false,
            reverses_id: None,
            idempotency_key: "k-1".to_string(),
            request_fingerprint: String::new(),
            created_at: Utc::now(),
        }
    }

    fn grant_cmd(amount: i64) -> LedgerCommand {
        LedgerCommand::Grant {
            organization_id: "org-1".to_string(),
            amount,
            actor_id: "admin".to_string(),
            reason: "충전".to_string(),
        }
    }

    fn consume(amount: i64) -> LedgerCommand {
        LedgerCommand::Consume {
            organization_id: "org-1".to_string(),
            amount,
            reason: "도구 사용".to_string(),
        }
    }

    fn revoke(transaction_id: Uuid, force: bool) -> LedgerCommand {
        LedgerCommand::Revoke {
            transaction_id,
            actor_id: "admin".to_string(),
            reason: None,
            force,
        }
    }

    #[test]
    fn test_grant_rejects_non_positive() {
        let cmd = LedgerCommand::Grant {
            organization_id: "org-1".to_string(),
            amount: 0,
            actor_id: "admin".to_string(),
            reason: "x".to_string(),
        };
        assert!(matches!(
            plan(&cmd, &account(0), None),
            Err(LedgerError::InvalidAmount(0))
        ));
    }

    #[test]
    fn test_consume_exact_balance_allowed() {
        let entry = plan(&consume(100), &account(100), None).unwrap();
        assert_eq!(entry.delta, -100);
        assert_eq!(entry.kind, TransactionKind::Consume);
    }

    #[test]
    fn test_consume_insufficient() {
        let err = plan(&consume(500), &account(120), None).unwrap_err();
        assert!(matches!(
            err,
            LedgerError::InsufficientCredit {
                balance: 120,
                requested: 500
            }
        ));
    }

    #[test]
    fn test_revoke_rules() {
        let target = grant_tx(1000);

        let entry = plan(&revoke(target.id, false), &account(1000), Some(&target)).unwrap();
        assert_eq!(entry.delta, -1000);
        assert_eq!(entry.reverses_id, Some(target.id));

        let err = plan(&revoke(target.id, false), &account(300), Some(&target)).unwrap_err();
        assert!(matches!(
            err,
            LedgerError::InsufficientBalance {
                balance: 300,
                required: 1000
            }
        ));

        let forced = plan(&revoke(target.id, true), &account(300), Some(&target)).unwrap();
        assert_eq!(forced.kind, TransactionKind::ForcedReversal);

        let mut reversed = target.clone();
        reversed.reversed = true;
        assert!(matches!(
            plan(&revoke(target.id, false), &account(1000), Some(&reversed)),
            Err(LedgerError::AlreadyReversed(_))
        ));

        let missing = Uuid::new_v4();
        assert!(matches!(
            plan(&revoke(missing, false), &account(1000), None),
            Err(LedgerError::TransactionNotFound(id)) if id == missing
        ));
    }

    #[test]
    fn test_reversal_not_revocable() {
        let mut reversal = grant_tx(-1000);
        reversal.kind = TransactionKind::Reversal;
        assert!(matches!(
            plan(&revoke(reversal.id, false), &account(5000), Some(&reversal)),
            Err(LedgerError::NotRevocable(_))
        ));
    }

    #[test]
    fn test_daily_refill() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let cmd = LedgerCommand::DailyRefill {
            organization_id: "org-1".to_string(),
            date,
            limit: 100,
        };

        let entry = plan(&cmd, &account(30), None).unwrap();
        assert_eq!(entry.delta, 70);
        assert_eq!(entry.refill_date, Some(date));

        assert!(matches!(
            plan(&cmd, &account(100), None),
            Err(LedgerError::RefillNotNeeded { .. })
        ));

        let mut refilled = account(30);
        refilled.last_refill_date = Some(date);
        assert!(matches!(
            plan(&cmd, &refilled, None),
            Err(LedgerError::AlreadyRefilled { .. })
        ));
    }

    #[test]
    fn test_materialize_advances_sequence() {
        let acc = account(100);
        let entry = plan(&consume(40), &acc, None).unwrap();
        let (tx, updated) = entry
            .materialize(&acc, "k-9", consume(40).fingerprint(), Utc::now())
            .unwrap();
        assert_eq!(tx.sequence, 4);
        assert_eq!(tx.balance_after, 60);
        assert_eq!(updated.balance, 60);
        assert_eq!(updated.last_sequence, 4);
    }

    #[test]
    fn test_materialize_never_goes_back_in_time() {
        let acc = account(100);
        let earlier = acc.updated_at - chrono::Duration::milliseconds(5);
        let entry = plan(&consume(40), &acc, None).unwrap();
        let (tx, updated) = entry
            .materialize(&acc, "k-9", consume(40).fingerprint(), earlier)
            .unwrap();
        assert_eq!(tx.created_at, acc.updated_at);
        assert_eq!(updated.updated_at, acc.updated_at);

        // 空账户直接使用传入时间
        let empty = CreditAccount::empty("org-1", Utc::now());
        let entry = plan(&grant_cmd(10), &empty, None).unwrap();
        let (tx, _) = entry
            .materialize(&empty, "k-1", grant_cmd(10).fingerprint(), earlier)
            .unwrap();
        assert_eq!(tx.created_at, earlier);
    }

    #[test]
    fn test_fingerprint_distinguishes_parameters() {
        assert_eq!(consume(10).fingerprint(), consume(10).fingerprint());
        assert_ne!(consume(10).fingerprint(), consume(11).fingerprint());
        assert_eq!(consume(10).fingerprint().len(), 64);
    }
}
