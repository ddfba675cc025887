//! 订单流水线服务
//!
//! 提供订单导入、等级查询、订单维护与结算重算的 REST API。

use std::sync::Arc;

use axum::{Router, middleware};
use chrono::Utc;
use order_pipeline::{
    models::{CanonicalField, ExtractionRule, MappingProfile, TierCriterion},
    repository::{
        CatalogRepository, MappingProfileRepository, MemoryPipelineStore, OrderRepository,
        SettlementRepository, TierRepository,
    },
    routes,
    state::{AppState, Repositories},
};
use order_shared::{
    config::AppConfig,
    database::Database,
    observability::{self, middleware as obs_middleware},
};
use rust_decimal::Decimal;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load("order-pipeline-service").unwrap_or_default();

    let obs_config = config
        .observability
        .clone()
        .with_service_name(&config.service_name);
    let _guard = observability::init(&obs_config).await?;

    info!("Starting order-pipeline-service on {}", config.server_addr());

    let (repos, db) = if config.server.standalone {
        if config.is_production() {
            warn!("生产环境不应开启 standalone 模式，订单与结算数据不会持久化");
        }
        info!("使用内存存储，已载入演示映射配置与等级标准");
        let store = Arc::new(MemoryPipelineStore::new());
        seed_demo(&store);
        (Repositories::in_memory(store), None)
    } else {
        let db = Database::connect(&config.database).await?;
        db.run_migrations().await?;
        let pool = db.pool().clone();
        let repos = Repositories {
            mapping: Arc::new(MappingProfileRepository::new(pool.clone())),
            catalog: Arc::new(CatalogRepository::new(pool.clone())),
            tiers: Arc::new(TierRepository::new(pool.clone())),
            orders: Arc::new(OrderRepository::new(pool.clone())),
            settlements: Arc::new(SettlementRepository::new(pool)),
        };
        (repos, Some(db))
    };

    let state = AppState::new(repos, &config.pipeline);

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

/// 单机模式的演示数据
fn seed_demo(store: &MemoryPipelineStore) {
    store.add_profile(MappingProfile {
        id: Uuid::new_v4(),
        marketplace: "coupang".to_string(),
        version: 1,
        active: true,
        rules: vec![
            ExtractionRule::new(CanonicalField::SellerOrderNumber, "주문번호"),
            ExtractionRule::new(CanonicalField::OptionName, "옵션명"),
            ExtractionRule::new(CanonicalField::Quantity, "수량"),
            ExtractionRule::new(CanonicalField::RecipientName, "수취인"),
            ExtractionRule::new(CanonicalField::RecipientPhone, "연락처").with_transform("digits_only"),
            ExtractionRule::new(CanonicalField::ShippingStatus, "주문상태"),
            ExtractionRule::new(CanonicalField::PaymentDate, "결제일"),
        ],
        detect_strings: vec!["주문번호".to_string(), "옵션명".to_string()],
        header_row: 0,
        date_format: "%Y-%m-%d %H:%M:%S".to_string(),
        utc_offset_minutes: 9 * 60,
        updated_at: Utc::now(),
    });

    store.set_criteria(vec![
        TierCriterion {
            name: "basic".to_string(),
            rank: 1,
            min_order_count: 0,
            min_total_sales: Decimal::ZERO,
            discount_rate: Decimal::ZERO,
        },
        TierCriterion {
            name: "silver".to_string(),
            rank: 2,
            min_order_count: 50,
            min_total_sales: Decimal::from(1_000_000),
            discount_rate: Decimal::new(3, 2),
        },
        TierCriterion {
            name: "gold".to_string(),
            rank: 3,
            min_order_count: 200,
            min_total_sales: Decimal::from(5_000_000),
            discount_rate: Decimal::new(5, 2),
        },
    ]);
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
