//! PostgreSQL 账本存储
//!
//! 每条指令在一个事务内完成：锁定账户行 -> 复查幂等键 -> 锁定撤销目标 ->
//! 记账 -> 写流水 -> 更新余额。同组织的并发写在账户行锁上排队，
//! 幂等键与 (organization_id, sequence) 上的唯一约束兜底跨组织的竞争。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgExecutor, PgPool};
use tracing::debug;
use uuid::Uuid;

use super::traits::{LedgerStore, replay};
use crate::command::{LedgerCommand, plan};
use crate::error::{LedgerError, Result};
use crate::models::{CreditAccount, CreditTransaction, LedgerReceipt};

const TRANSACTION_COLUMNS: &str = r#"
    id, organization_id, sequence, kind, delta, balance_after, reason, actor_id,
    reversed, reverses_id, idempotency_key, request_fingerprint, created_at
"#;

/// PostgreSQL 账本存储
#[derive(Clone)]
pub struct PgLedgerStore {
    pool: PgPool,
}

impl PgLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn find_by_key<'e>(
        executor: impl PgExecutor<'e>,
        idempotency_key: &str,
    ) -> Result<Option<CreditTransaction>> {
        let sql = format!(
            "SELECT {} FROM credit_transactions WHERE idempotency_key = $1",
            TRANSACTION_COLUMNS
        );
        let row = sqlx::query_as::<_, CreditTransaction>(&sql)
            .bind(idempotency_key)
            .fetch_optional(executor)
            .await?;
        Ok(row)
    }

    async fn owner_of(&self, transaction_id: Uuid) -> Result<String> {
        sqlx::query_scalar::<_, String>(
            "SELECT organization_id FROM credit_transactions WHERE id = $1",
        )
        .bind(transaction_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(LedgerError::TransactionNotFound(transaction_id))
    }

    /// 在事务中插入流水
    async fn insert_transaction<'e>(
        executor: impl PgExecutor<'e>,
        transaction: &CreditTransaction,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO credit_transactions
                (id, organization_id, sequence, kind, delta, balance_after, reason, actor_id,
                 reversed, reverses_id, idempotency_key, request_fingerprint, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(transaction.id)
        .bind(&transaction.organization_id)
        .bind(transaction.sequence)
        .bind(transaction.kind)
        .bind(transaction.delta)
        .bind(transaction.balance_after)
        .bind(&transaction.reason)
        .bind(&transaction.actor_id)
        .bind(transaction.reversed)
        .bind(transaction.reverses_id)
        .bind(&transaction.idempotency_key)
        .bind(&transaction.request_fingerprint)
        .bind(transaction.created_at)
        .execute(executor)
        .await
        .map_err(LedgerError::from_write)?;
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn execute(
        &self,
        idempotency_key: &str,
        command: &LedgerCommand,
        now: DateTime<Utc>,
    ) -> Result<LedgerReceipt> {
        let fingerprint = command.fingerprint();

        // 1. 幂等快速路径
        if let Some(existing) = Self::find_by_key(&self.pool, idempotency_key).await? {
            return replay(idempotency_key, &fingerprint, existing);
        }

        // 2. 确定组织
        let organization_id = match command.organization_id() {
            Some(org) => org.to_string(),
            None => match command.target_transaction() {
                Some(id) => self.owner_of(id).await?,
                None => return Err(LedgerError::Internal("指令缺少组织".to_string())),
            },
        };

        let mut tx = self.pool.begin().await?;

        // 3. 确保账户行存在并加行锁，同组织写操作在此排队
        sqlx::query(
            r#"
            INSERT INTO credit_accounts (organization_id, balance, last_sequence, updated_at)
            VALUES ($1, 0, 0, $2)
            ON CONFLICT (organization_id) DO NOTHING
            "#,
        )
        .bind(&organization_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let account = sqlx::query_as::<_, CreditAccount>(
            r#"
            SELECT organization_id, balance, last_sequence, last_refill_date, updated_at
            FROM credit_accounts
            WHERE organization_id = $1
            FOR UPDATE
            "#,
        )
        .bind(&organization_id)
        .fetch_one(&mut *tx)
        .await?;

        // 4. 锁内复查幂等键（并发的同键请求可能已提交）
        if let Some(existing) = Self::find_by_key(&mut *tx, idempotency_key).await? {
            debug!(idempotency_key, "幂等键在锁等待期间已被占用，重放首次结果");
            return replay(idempotency_key, &fingerprint, existing);
        }

        // 5. 锁定撤销目标
        let target = match command.target_transaction() {
            Some(id) => {
                let sql = format!(
                    "SELECT {} FROM credit_transactions WHERE id = $1 AND organization_id = $2 FOR UPDATE",
                    TRANSACTION_COLUMNS
                );
                sqlx::query_as::<_, CreditTransaction>(&sql)
                    .bind(id)
                    .bind(&organization_id)
                    .fetch_optional(&mut *tx)
                    .await?
            }
            None => None,
        };

        // 6. 记账规则
        let entry = plan(command, &account, target.as_ref())?;
        let (transaction, updated) =
            entry.materialize(&account, idempotency_key, fingerprint, now)?;

        // 7. 写流水并标记原流水
        Self::insert_transaction(&mut *tx, &transaction).await?;

        if let Some(reversed_id) = transaction.reverses_id {
            sqlx::query("UPDATE credit_transactions SET reversed = TRUE WHERE id = $1")
                .bind(reversed_id)
                .execute(&mut *tx)
                .await?;
        }

        // 8. 更新余额缓存
        sqlx::query(
            r#"
            UPDATE credit_accounts
            SET balance = $2, last_sequence = $3, last_refill_date = $4, updated_at = $5
            WHERE organization_id = $1
            "#,
        )
        .bind(&updated.organization_id)
        .bind(updated.balance)
        .bind(updated.last_sequence)
        .bind(updated.last_refill_date)
        .bind(updated.updated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await.map_err(LedgerError::from_write)?;

        Ok(LedgerReceipt {
            balance_after: updated.balance,
            transaction,
            replayed: false,
        })
    }

    async fn find_by_idempotency_key(
        &self,
        idempotency_key: &str,
    ) -> Result<Option<CreditTransaction>> {
        Self::find_by_key(&self.pool, idempotency_key).await
    }

    async fn get_transaction(&self, id: Uuid) -> Result<Option<CreditTransaction>> {
        let sql = format!(
            "SELECT {} FROM credit_transactions WHERE id = $1",
            TRANSACTION_COLUMNS
        );
        let row = sqlx::query_as::<_, CreditTransaction>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn get_account(&self, organization_id: &str) -> Result<Option<CreditAccount>> {
        let account = sqlx::query_as::<_, CreditAccount>(
            r#"
            SELECT organization_id, balance, last_sequence, last_refill_date, updated_at
            FROM credit_accounts
            WHERE organization_id = $1
            "#,
        )
        .bind(organization_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(account)
    }

    async fn list_transactions(&self, organization_id: &str) -> Result<Vec<CreditTransaction>> {
        let sql = format!(
            "SELECT {} FROM credit_transactions WHERE organization_id = $1 ORDER BY sequence ASC",
            TRANSACTION_COLUMNS
        );
        let rows = sqlx::query_as::<_, CreditTransaction>(&sql)
            .bind(organization_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }
}
