//! 内存账本存储
//!
//! 使用 DashMap 按组织保存账本，每个组织一把 `parking_lot::Mutex`，
//! 临界区内完成幂等检查、记账与索引更新。适用于测试和单机演示模式。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::Mutex;
use uuid::Uuid;

use super::traits::{LedgerStore, replay};
use crate::command::{LedgerCommand, plan};
use crate::error::{LedgerError, Result};
use crate::models::{CreditAccount, CreditTransaction, LedgerReceipt};

/// 单个组织的账本
#[derive(Debug)]
struct AccountBook {
    account: CreditAccount,
    transactions: Vec<CreditTransaction>,
    positions: HashMap<Uuid, usize>,
}

impl AccountBook {
    fn new(organization_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            account: CreditAccount::empty(organization_id, now),
            transactions: Vec::new(),
            positions: HashMap::new(),
        }
    }

    fn get(&self, id: &Uuid) -> Option<&CreditTransaction> {
        self.positions.get(id).map(|&i| &self.transactions[i])
    }
}

/// 内存账本存储
#[derive(Debug, Default)]
pub struct MemoryLedgerStore {
    books: DashMap<String, Arc<Mutex<AccountBook>>>,
    /// 幂等键 -> 首次写入时的流水快照
    idempotency: DashMap<String, CreditTransaction>,
    /// 流水 ID -> 所属组织
    transaction_index: DashMap<Uuid, String>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn book(&self, organization_id: &str, now: DateTime<Utc>) -> Arc<Mutex<AccountBook>> {
        self.books
            .entry(organization_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(AccountBook::new(organization_id, now))))
            .value()
            .clone()
    }

    fn existing_book(&self, organization_id: &str) -> Option<Arc<Mutex<AccountBook>>> {
        self.books.get(organization_id).map(|b| b.value().clone())
    }

    fn owner_of(&self, transaction_id: Uuid) -> Result<String> {
        self.transaction_index
            .get(&transaction_id)
            .map(|o| o.value().clone())
            .ok_or(LedgerError::TransactionNotFound(transaction_id))
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn execute(
        &self,
        idempotency_key: &str,
        command: &LedgerCommand,
        now: DateTime<Utc>,
    ) -> Result<LedgerReceipt> {
        let fingerprint = command.fingerprint();

        // 1. 幂等快速路径
        if let Some(existing) = self.idempotency.get(idempotency_key) {
            return replay(idempotency_key, &fingerprint, existing.value().clone());
        }

        // 2. 确定组织
        let organization_id = match command.organization_id() {
            Some(org) => org.to_string(),
            None => match command.target_transaction() {
                Some(id) => self.owner_of(id)?,
                None => return Err(LedgerError::Internal("指令缺少组织".to_string())),
            },
        };

        // 3. 进入组织临界区
        let book = self.book(&organization_id, now);
        let mut book = book.lock();

        // 4. 临界区内占用幂等键，并发的同键请求在此被识别
        let slot = match self.idempotency.entry(idempotency_key.to_string()) {
            Entry::Occupied(existing) => {
                return replay(idempotency_key, &fingerprint, existing.get().clone());
            }
            Entry::Vacant(slot) => slot,
        };

        // 5. 记账规则
        let target = command.target_transaction().and_then(|id| book.get(&id));
        let entry = plan(command, &book.account, target)?;
        let (transaction, updated) =
            entry.materialize(&book.account, idempotency_key, fingerprint, now)?;

        // 6. 写入流水、标记原流水、更新余额
        if let Some(reversed_id) = transaction.reverses_id
            && let Some(&pos) = book.positions.get(&reversed_id)
        {
            book.transactions[pos].reversed = true;
        }
        let position = book.transactions.len();
        book.positions.insert(transaction.id, position);
        book.transactions.push(transaction.clone());
        book.account = updated;

        self.transaction_index
            .insert(transaction.id, organization_id.clone());
        slot.insert(transaction.clone());

        Ok(LedgerReceipt {
            balance_after: book.account.balance,
            transaction,
            replayed: false,
        })
    }

    async fn find_by_idempotency_key(
        &self,
        idempotency_key: &str,
    ) -> Result<Option<CreditTransaction>> {
        let id = match self.idempotency.get(idempotency_key) {
            Some(snapshot) => snapshot.id,
            None => return Ok(None),
        };
        self.get_transaction(id).await
    }

    async fn get_transaction(&self, id: Uuid) -> Result<Option<CreditTransaction>> {
        let Ok(organization_id) = self.owner_of(id) else {
            return Ok(None);
        };
        Ok(self
            .existing_book(&organization_id)
            .and_then(|book| book.lock().get(&id).cloned()))
    }

    async fn get_account(&self, organization_id: &str) -> Result<Option<CreditAccount>> {
        Ok(self
            .existing_book(organization_id)
            .map(|book| book.lock().account.clone()))
    }

    async fn list_transactions(&self, organization_id: &str) -> Result<Vec<CreditTransaction>> {
        Ok(self
            .existing_book(organization_id)
            .map(|book| book.lock().transactions.clone())
            .unwrap_or_default())
    }
}
