//! 저장소 계층.
//!
//! SQLite 위에 캔들과 종목 메타데이터를 저장합니다. 인터벌별로
//! 독립된 테이블을 사용합니다 (`candles_daily` / `candles_weekly` /
//! `candles_monthly`).

pub mod candles;
pub mod db;
pub mod instruments;

pub use candles::{CandleRecord, CandleStore};
pub use db::Database;
pub use instruments::{InstrumentRepository, UpsertOutcome};
