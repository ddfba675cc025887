//! 积分账本服务
//!
//! 提供积分发放、消耗、撤销、每日补充与审计的 REST API。

use std::sync::Arc;

use axum::{Router, middleware};
use credit_ledger::{
    CreditLedgerService, LedgerStore, MemoryLedgerStore, PgLedgerStore, routes, state::AppState,
};
use order_shared::{
    config::AppConfig,
    database::Database,
    observability::{self, middleware as obs_middleware},
};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load("credit-ledger-service").unwrap_or_default();

    let obs_config = config
        .observability
        .clone()
        .with_service_name(&config.service_name);
    let _guard = observability::init(&obs_config).await?;

    info!("Starting credit-ledger-service on {}", config.server_addr());

    // 单机模式使用内存账本，重启即丢失，仅用于本地演示
    let (store, db): (Arc<dyn LedgerStore>, Option<Database>) = if config.server.standalone {
        if config.is_production() {
            warn!("生产环境不应开启 standalone 模式，账本数据不会持久化");
        }
        info!("使用内存账本存储");
        (Arc::new(MemoryLedgerStore::new()), None)
    } else {
        let db = Database::connect(&config.database).await?;
        db.run_migrations().await?;
        (Arc::new(PgLedgerStore::new(db.pool().clone())), Some(db))
    };

    if config.ledger.allow_forced_revoke {
        warn!("强制撤销通道已开启，撤销操作可能使余额为负");
    }

    let ledger = Arc::new(CreditLedgerService::new(store, config.ledger.clone()));
    let state = AppState::new(ledger);

    let app = Router::new()
        .merge(routes::api_routes())
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(middleware::from_fn(obs_middleware::http_tracing))
        .layer(middleware::from_fn(obs_middleware::request_id))
        .with_state(state);

    let listener = TcpListener::bind(config.server_addr()).await?;
    info!("Listening on {}", config.server_addr());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(db) = db {
        db.close().await;
    }
    info!("Server shutdown complete");

    Ok(())
}

/// 监听关闭信号
///
/// 收到 SIGTERM 或 Ctrl+C 后返回，触发 axum 的优雅关闭流程。
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "注册 Ctrl+C 处理器失败");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "注册 SIGTERM 处理器失败");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, initiating graceful shutdown..."),
        _ = terminate => info!("Received SIGTERM, initiating graceful shutdown..."),
    }
}
