//! API 라우트 구성.

use crate::state::AppState;
use axum::Router;
use std::sync::Arc;

pub mod health;
pub mod stocks;

/// 전체 API 라우터 생성.
pub fn create_api_router() -> Router<Arc<AppState>> {
    Router::new()
        .nest("/stocks", stocks::router())
        .merge(health::router())
}
