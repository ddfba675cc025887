//! 路由配置模块

use axum::{
    Router,
    routing::{get, post},
};

use crate::{handlers, state::AppState};

/// 积分账本路由
fn credit_routes() -> Router<AppState> {
    Router::new()
        .route("/credits/{org}/grant", post(handlers::credit::grant))
        .route("/credits/{org}/consume", post(handlers::credit::consume))
        .route("/credits/{org}/refill", post(handlers::credit::refill))
        .route("/credits/{org}/balance", get(handlers::credit::get_balance))
        .route(
            "/credits/{org}/transactions",
            get(handlers::credit::list_transactions),
        )
        .route("/credits/{org}/audit", get(handlers::credit::audit))
        .route(
            "/credits/transactions/{id}/revoke",
            post(handlers::credit::revoke),
        )
        .route(
            "/credits/idempotency/{key}",
            get(handlers::credit::lookup),
        )
}

/// 构建完整的 API 路由
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/api", credit_routes())
        .route("/health", get(handlers::health::health))
}
