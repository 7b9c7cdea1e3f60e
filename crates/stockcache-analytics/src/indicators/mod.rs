//! 기술적 지표 모듈.
//!
//! 종가 시리즈 위에서 동작하는 기술적 지표를 제공합니다.
//! 모든 지표는 입력과 같은 길이의 `Vec<Option<f64>>`를 반환하며,
//! 워밍업 구간은 `None`으로 채워집니다.
//!
//! # 지원 지표
//!
//! ## 추세 지표 (Trend Indicators)
//! - **SMA**: 단순 이동평균 (Simple Moving Average)
//! - **EMA**: 지수 이동평균 (Exponential Moving Average)
//! - **MACD**: 이동평균 수렴/확산 (Moving Average Convergence Divergence)
//!
//! ## 모멘텀 지표 (Momentum Indicators)
//! - **RSI**: 상대강도지수 (Relative Strength Index, Wilder 방식)
//!
//! # 사용 예시
//!
//! ```ignore
//! use stockcache_analytics::indicators::IndicatorRegistry;
//!
//! let registry = IndicatorRegistry::standard();
//! let columns = registry.apply("SMA_20", &closes);
//! ```

pub mod momentum;
pub mod registry;
pub mod trend;

use thiserror::Error;

pub use momentum::{MomentumIndicators, RsiParams};
pub use registry::{IndicatorColumn, IndicatorDescriptor, IndicatorRegistry, IndicatorSpec};
pub use trend::{EmaParams, MacdParams, MacdSeries, SmaParams, TrendIndicators};

/// 지표 계산 오류.
#[derive(Debug, Error)]
pub enum IndicatorError {
    /// 데이터 부족 오류
    #[error("데이터가 부족합니다: 필요 {required}개, 제공 {provided}개")]
    InsufficientData { required: usize, provided: usize },

    /// 잘못된 파라미터
    #[error("잘못된 파라미터: {0}")]
    InvalidParameter(String),
}

/// 지표 계산 결과 타입.
pub type IndicatorResult<T> = Result<T, IndicatorError>;
