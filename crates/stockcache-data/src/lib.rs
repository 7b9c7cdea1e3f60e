//! # StockCache Data
//!
//! 캔들 데이터의 저장, 외부 제공자 연동, 동기화를 담당합니다.
//!
//! # 주요 구성
//!
//! - [`storage`] - SQLite 기반 캔들/종목 저장소
//! - [`provider`] - Upstox(1순위), Yahoo Finance(폴백) 데이터 제공자
//! - [`catalog`] - Upstox 종목 마스터 캐시
//! - [`manager`] - 커버리지 판정과 read-through 동기화

pub mod catalog;
pub mod error;
pub mod manager;
pub mod provider;
pub mod storage;

pub use catalog::{CatalogEntry, InstrumentCatalog};
pub use error::{DataError, Result};
pub use manager::{CandleSeries, SyncManager};
pub use provider::{CandleProvider, UpstoxProvider, YahooProvider};
pub use storage::{CandleStore, Database, InstrumentRepository, UpsertOutcome};
