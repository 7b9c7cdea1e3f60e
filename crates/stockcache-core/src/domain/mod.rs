//! 도메인 모델.

pub mod candle;
pub mod instrument;

pub use candle::{Candle, CoverageWindow};
pub use instrument::Instrument;
