//! 仓储 Trait 定义

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::command::LedgerCommand;
use crate::error::{LedgerError, Result};
use crate::models::{CreditAccount, CreditTransaction, LedgerReceipt};

/// 账本存储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// 在组织级串行化临界区内执行一条指令
    ///
    /// 幂等键已存在时：指纹一致则返回原流水（`replayed = true`），
    /// 否则返回 `IdempotencyConflict`
    async fn execute(
        &self,
        idempotency_key: &str,
        command: &LedgerCommand,
        now: DateTime<Utc>,
    ) -> Result<LedgerReceipt>;

    async fn find_by_idempotency_key(&self, idempotency_key: &str)
    -> Result<Option<CreditTransaction>>;

    async fn get_transaction(&self, id: Uuid) -> Result<Option<CreditTransaction>>;

    async fn get_account(&self, organization_id: &str) -> Result<Option<CreditAccount>>;

    /// 按序号升序返回组织的全部流水
    async fn list_transactions(&self, organization_id: &str) -> Result<Vec<CreditTransaction>>;
}

/// 幂等重放：指纹一致返回原结果，不一致视为键被误用
pub(crate) fn replay(
    idempotency_key: &str,
    fingerprint: &str,
    existing: CreditTransaction,
) -> Result<LedgerReceipt> {
    if existing.request_fingerprint != fingerprint {
        return Err(LedgerError::IdempotencyConflict(idempotency_key.to_string()));
    }
    Ok(LedgerReceipt {
        balance_after: existing.balance_after,
        transaction: existing,
        replayed: true,
    })
}
