//! 应用状态定义

use std::sync::Arc;

use crate::service::CreditLedgerService;

/// Axum 应用共享状态
#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<CreditLedgerService>,
}

impl AppState {
    pub fn new(ledger: Arc<CreditLedgerService>) -> Self {
        Self { ledger }
    }
}
