//! 공통 타입 정의.

pub mod exchange;
pub mod interval;

pub use exchange::Exchange;
pub use interval::Interval;
