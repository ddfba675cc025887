//! 积分账本服务
//!
//! 处理积分发放、消耗、撤销与每日补充，包括：
//! - 幂等键校验（缺失即拒绝）
//! - 指令参数校验
//! - 存储层串行化执行，并发冲突按短退避重试后走幂等重放
//! - 结构化日志与指标
//!
//! ## 调用约定
//!
//! 调用方超时后结果未知，必须用同一幂等键调用 `lookup` 查询，
//! 不能换新键盲目重试，否则可能重复扣减。

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use order_shared::config::LedgerSettings;
use order_shared::observability::metrics;
use order_shared::retry::{RetryPolicy, retry_with_policy};

use crate::command::LedgerCommand;
use crate::error::{LedgerError, Result};
use crate::models::{CreditTransaction, LedgerAudit, LedgerReceipt};
use crate::repository::LedgerStore;

/// 积分账本服务
///
/// 余额只能经由本服务写入；读取的余额始终可由流水重建
pub struct CreditLedgerService<S: ?Sized = dyn LedgerStore>
where
    S: LedgerStore,
{
    store: Arc<S>,
    settings: LedgerSettings,
}

impl<S> CreditLedgerService<S>
where
    S: LedgerStore + ?Sized,
{
    pub fn new(store: Arc<S>, settings: LedgerSettings) -> Self {
        Self { store, settings }
    }

    pub fn settings(&self) -> &LedgerSettings {
        &self.settings
    }

    /// 发放积分
    #[instrument(skip_all, fields(organization_id = %organization_id, amount = amount, idempotency_key = %idempotency_key))]
    pub async fn grant(
        &self,
        organization_id: &str,
        amount: i64,
        actor_id: &str,
        reason: &str,
        idempotency_key: &str,
    ) -> Result<LedgerReceipt> {
        let command = LedgerCommand::Grant {
            organization_id: organization_id.to_string(),
            amount,
            actor_id: actor_id.to_string(),
            reason: reason.to_string(),
        };
        self.submit(idempotency_key, command).await
    }

    /// 消耗积分
    ///
    /// 余额不足时返回 `InsufficientCredit`，调用方应停止计量活动而不是重试
    #[instrument(skip_all, fields(organization_id = %organization_id, amount = amount, idempotency_key = %idempotency_key))]
    pub async fn consume(
        &self,
        organization_id: &str,
        amount: i64,
        reason: &str,
        idempotency_key: &str,
    ) -> Result<LedgerReceipt> {
        let command = LedgerCommand::Consume {
            organization_id: organization_id.to_string(),
            amount,
            reason: reason.to_string(),
        };
        self.submit(idempotency_key, command).await
    }

    /// 撤销交易
    ///
    /// 冲正后余额为负时拒绝（`InsufficientBalance`），不做隐式强制
    #[instrument(skip_all, fields(transaction_id = %transaction_id, actor_id = %actor_id, idempotency_key = %idempotency_key))]
    pub async fn revoke(
        &self,
        transaction_id: Uuid,
        actor_id: &str,
        idempotency_key: &str,
    ) -> Result<LedgerReceipt> {
        let command = LedgerCommand::Revoke {
            transaction_id,
            actor_id: actor_id.to_string(),
            reason: None,
            force: false,
        };
        self.submit(idempotency_key, command).await
    }

    /// 强制撤销（审计通道）
    ///
    /// 允许冲正后余额为负，需配置开启，必须提供原因
    #[instrument(skip_all, fields(transaction_id = %transaction_id, actor_id = %actor_id, idempotency_key = %idempotency_key))]
    pub async fn force_revoke(
        &self,
        transaction_id: Uuid,
        actor_id: &str,
        reason: &str,
        idempotency_key: &str,
    ) -> Result<LedgerReceipt> {
        if !self.settings.allow_forced_revoke {
            return Err(LedgerError::ForcedRevokeDisabled);
        }
        if reason.trim().is_empty() {
            return Err(LedgerError::Validation("强制撤销必须填写原因".to_string()));
        }

        let command = LedgerCommand::Revoke {
            transaction_id,
            actor_id: actor_id.to_string(),
            reason: Some(reason.to_string()),
            force: true,
        };
        let receipt = self.submit(idempotency_key, command).await?;

        if !receipt.replayed {
            warn!(
                transaction_id = %transaction_id,
                actor_id,
                reason,
                balance_after = receipt.balance_after,
                "执行强制撤销"
            );
        }

        Ok(receipt)
    }

    /// 每日补充
    ///
    /// 每个自然日最多一次，将余额补足到配置的上限
    #[instrument(skip_all, fields(organization_id = %organization_id, date = %date, idempotency_key = %idempotency_key))]
    pub async fn refill_daily(
        &self,
        organization_id: &str,
        date: NaiveDate,
        idempotency_key: &str,
    ) -> Result<LedgerReceipt> {
        let command = LedgerCommand::DailyRefill {
            organization_id: organization_id.to_string(),
            date,
            limit: self.settings.daily_refill_limit,
        };
        self.submit(idempotency_key, command).await
    }

    /// 查询当前余额（无账户时为 0）
    pub async fn get_balance(&self, organization_id: &str) -> Result<i64> {
        Ok(self
            .store
            .get_account(organization_id)
            .await?
            .map(|account| account.balance)
            .unwrap_or(0))
    }

    /// 按幂等键查询结果（调用超时后使用）
    pub async fn lookup(&self, idempotency_key: &str) -> Result<Option<CreditTransaction>> {
        self.store.find_by_idempotency_key(idempotency_key).await
    }

    pub async fn get_transaction(&self, id: Uuid) -> Result<CreditTransaction> {
        self.store
            .get_transaction(id)
            .await?
            .ok_or(LedgerError::TransactionNotFound(id))
    }

    /// 按序号升序列出流水
    pub async fn list_transactions(&self, organization_id: &str) -> Result<Vec<CreditTransaction>> {
        self.store.list_transactions(organization_id).await
    }

    /// 重建某一时刻的余额
    pub async fn balance_at(&self, organization_id: &str, at: DateTime<Utc>) -> Result<i64> {
        let transactions = self.store.list_transactions(organization_id).await?;
        Ok(transactions
            .iter()
            .take_while(|t| t.created_at <= at)
            .map(|t| t.delta)
            .sum())
    }

    /// 审计：比对缓存余额与流水重建结果
    #[instrument(skip_all, fields(organization_id = %organization_id))]
    pub async fn audit(&self, organization_id: &str) -> Result<LedgerAudit> {
        let cached_balance = self.get_balance(organization_id).await?;
        let transactions = self.store.list_transactions(organization_id).await?;
        let audit = LedgerAudit::compute(organization_id, cached_balance, &transactions);

        if !audit.consistent {
            error!(
                organization_id,
                cached_balance = audit.cached_balance,
                effective_sum = audit.effective_sum,
                total_delta_sum = audit.total_delta_sum,
                sequence_contiguous = audit.sequence_contiguous,
                "账本审计不一致"
            );
        }

        Ok(audit)
    }

    /// 执行指令
    ///
    /// 1. 幂等键校验 -> 2. 参数校验 -> 3. 存储层执行（并发冲突重试）-> 4. 日志与指标
    async fn submit(&self, idempotency_key: &str, command: LedgerCommand) -> Result<LedgerReceipt> {
        let start = Instant::now();
        let operation = command.operation();

        // 1. 幂等键校验
        if idempotency_key.trim().is_empty() {
            return Err(LedgerError::MissingIdempotencyKey);
        }

        // 2. 参数校验
        command.validate()?;

        // 3. 存储层执行
        let policy = RetryPolicy::conflict(self.settings.max_conflict_retries);
        let store = &self.store;
        let command = &command;
        let result = retry_with_policy(
            &policy,
            operation,
            |e: &LedgerError| e.is_retryable(),
            || store.execute(idempotency_key, command, Utc::now()),
        )
        .await;

        // 4. 日志与指标
        let elapsed = start.elapsed().as_secs_f64();
        match &result {
            Ok(receipt) => {
                let outcome = if receipt.replayed { "replayed" } else { "success" };
                metrics::record_ledger_operation(operation, outcome, elapsed);
                info!(
                    operation,
                    transaction_id = %receipt.transaction.id,
                    organization_id = %receipt.transaction.organization_id,
                    delta = receipt.transaction.delta,
                    balance_after = receipt.balance_after,
                    replayed = receipt.replayed,
                    "账本操作完成"
                );
            }
            Err(e) => {
                metrics::record_ledger_operation(operation, e.error_code(), elapsed);
                if e.is_business_error() {
                    warn!(operation, error = %e, code = e.error_code(), "账本操作被拒绝");
                } else {
                    error!(operation, error = %e, "账本操作失败");
                }
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CreditAccount, TransactionKind};
    use crate::repository::{MemoryLedgerStore, MockLedgerStore};

    fn service() -> CreditLedgerService<MemoryLedgerStore> {
        CreditLedgerService::new(Arc::new(MemoryLedgerStore::new()), LedgerSettings::default())
    }

    fn sample_receipt() -> LedgerReceipt {
        LedgerReceipt {
            transaction: CreditTransaction {
                id: Uuid::new_v4(),
                organization_id: "org-1".to_string(),
                sequence: 1,
                kind: TransactionKind::Consume,
                delta: -10,
                balance_after: 90,
                reason: "tool".to_string(),
                actor_id: None,
                reversed: false,
                reverses_id: None,
                idempotency_key: "k-1".to_string(),
                request_fingerprint: String::new(),
                created_at: Utc::now(),
            },
            balance_after: 90,
            replayed: false,
        }
    }

    #[tokio::test]
    async fn test_missing_idempotency_key() {
        let svc = service();
        let err = svc.grant("org-1", 100, "admin", "충전", " ").await.unwrap_err();
        assert!(matches!(err, LedgerError::MissingIdempotencyKey));
    }

    #[tokio::test]
    async fn test_force_revoke_disabled_by_default() {
        let svc = service();
        let granted = svc.grant("org-1", 100, "admin", "충전", "g-1").await.unwrap();
        let err = svc
            .force_revoke(granted.transaction.id, "admin", "chargeback", "r-1")
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::ForcedRevokeDisabled));
    }

    #[tokio::test]
    async fn test_conflict_is_retried_then_succeeds() {
        let mut store = MockLedgerStore::new();
        let mut calls = 0;
        store.expect_execute().times(2).returning(move |_, _, _| {
            calls += 1;
            if calls == 1 {
                Err(LedgerError::ConcurrencyConflict)
            } else {
                Ok(sample_receipt())
            }
        });

        let svc = CreditLedgerService::new(Arc::new(store), LedgerSettings::default());
        let receipt = svc.consume("org-1", 10, "tool", "k-1").await.unwrap();
        assert_eq!(receipt.balance_after, 90);
    }

    #[tokio::test]
    async fn test_business_rejection_not_retried() {
        let mut store = MockLedgerStore::new();
        store.expect_execute().times(1).returning(|_, _, _| {
            Err(LedgerError::InsufficientCredit {
                balance: 120,
                requested: 500,
            })
        });

        let svc = CreditLedgerService::new(Arc::new(store), LedgerSettings::default());
        let err = svc.consume("org-1", 500, "tool", "k-1").await.unwrap_err();
        assert_eq!(err.to_string(), "积分不足: 当前余额 120，请求扣减 500");
    }

    #[tokio::test]
    async fn test_invalid_amount_rejected_before_store() {
        let mut store = MockLedgerStore::new();
        store.expect_execute().never();

        let svc = CreditLedgerService::new(Arc::new(store), LedgerSettings::default());
        let err = svc.consume("org-1", -5, "tool", "k-1").await.unwrap_err();
        assert!(matches!(err, LedgerError::InvalidAmount(-5)));
    }

    #[tokio::test]
    async fn test_balance_defaults_to_zero() {
        let mut store = MockLedgerStore::new();
        store
            .expect_get_account()
            .returning(|_| Ok(None::<CreditAccount>));

        let svc = CreditLedgerService::new(Arc::new(store), LedgerSettings::default());
        assert_eq!(svc.get_balance("org-x").await.unwrap(), 0);
    }
}
