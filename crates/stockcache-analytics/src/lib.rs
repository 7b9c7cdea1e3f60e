//! # StockCache Analytics
//!
//! 캔들 데이터 위에서 계산되는 기술적 지표와 지표 레지스트리를 제공합니다.

pub mod indicators;

pub use indicators::{
    EmaParams, IndicatorColumn, IndicatorDescriptor, IndicatorError, IndicatorRegistry,
    IndicatorResult, IndicatorSpec, MacdParams, MacdSeries, MomentumIndicators, RsiParams,
    SmaParams, TrendIndicators,
};
