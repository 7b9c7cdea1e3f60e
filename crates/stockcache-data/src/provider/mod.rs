//! 시세 데이터 제공자.
//!
//! Upstox를 우선 사용하고 Yahoo Finance로 폴백합니다. 모든 제공자는
//! [`CandleProvider`] 트레이트로 추상화되어 동기화 관리자가 제공자
//! 순서만 알고 구현 세부는 모르게 합니다.

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use stockcache_core::{Candle, Exchange, Instrument, Interval};

pub mod upstox;
pub mod yahoo;

pub use upstox::UpstoxProvider;
pub use yahoo::YahooProvider;

/// 캔들 데이터 제공자 추상화.
#[async_trait]
pub trait CandleProvider: Send + Sync {
    /// 로그와 오류 메시지에 쓰이는 제공자 이름.
    fn name(&self) -> &'static str;

    /// 기간 내 캔들 조회.
    ///
    /// 타임스탬프 오름차순으로 반환합니다. 데이터가 없으면 빈 Vec을
    /// 반환하고, 제공자 자체의 실패만 오류로 돌려줍니다.
    async fn fetch_candles(
        &self,
        instrument: &Instrument,
        interval: Interval,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Candle>>;

    /// 종목 메타데이터 조회.
    async fn fetch_metadata(&self, symbol: &str, exchange: Exchange) -> Result<Instrument>;
}
