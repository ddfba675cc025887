//! 业务服务层

mod ledger_service;

pub use ledger_service::CreditLedgerService;
