//! 路由配置模块

use axum::{
    Router,
    routing::{get, post, put},
};

use crate::{handlers, state::AppState};

/// 订单导入路由
fn ingestion_routes() -> Router<AppState> {
    Router::new().route(
        "/ingestion/batches",
        post(handlers::ingestion::ingest_batch),
    )
}

/// 结算路由
fn settlement_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/settlements",
            get(handlers::settlement::list_settlements)
                .post(handlers::settlement::upsert_settlement),
        )
        .route("/settlements/{id}", get(handlers::settlement::get_settlement))
        .route(
            "/settlements/{id}/confirm",
            post(handlers::settlement::confirm_settlement),
        )
        .route(
            "/settlements/{id}/reopen",
            post(handlers::settlement::reopen_settlement),
        )
}

/// 订单路由
fn order_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/orders/{id}",
            get(handlers::order::get_order).delete(handlers::order::delete_order),
        )
        .route("/orders/{id}/restore", post(handlers::order::restore_order))
}

/// 等级路由
fn tier_routes() -> Router<AppState> {
    Router::new()
        .route("/organizations/{org}/tier", get(handlers::tier::get_tier))
        .route(
            "/organizations/{org}/tier/manual",
            put(handlers::tier::set_manual_tier).delete(handlers::tier::clear_manual_tier),
        )
        .route(
            "/tiers/criteria",
            get(handlers::tier::list_criteria).put(handlers::tier::replace_criteria),
        )
}

/// 构建完整的 API 路由
pub fn api_routes() -> Router<AppState> {
    let api = Router::new()
        .merge(ingestion_routes())
        .merge(settlement_routes())
        .merge(order_routes())
        .merge(tier_routes());

    Router::new()
        .nest("/api", api)
        .route("/health", get(handlers::health::health))
}
