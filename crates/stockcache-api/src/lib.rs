//! # StockCache API
//!
//! Axum 기반 REST API. 종목 등록과 캔들 + 지표 조회 엔드포인트를
//! 제공합니다.

pub mod error;
pub mod routes;
pub mod state;

pub use error::{ApiError, ApiErrorResponse};
pub use routes::create_api_router;
pub use state::AppState;
