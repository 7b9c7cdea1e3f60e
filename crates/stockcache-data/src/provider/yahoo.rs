//! Yahoo Finance 폴백 제공자.
//!
//! Upstox 호출이 실패하거나 데이터가 비어 있을 때 사용합니다. NSE는
//! `.NS`, BSE는 `.BO` 접미사를 붙인 티커로 조회합니다.

use crate::error::{DataError, Result};
use crate::provider::CandleProvider;
use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use time::OffsetDateTime;
use tracing::debug;
use stockcache_core::{Candle, Exchange, Instrument, Interval};

/// Yahoo Finance 제공자.
pub struct YahooProvider {
    connector: yahoo_finance_api::YahooConnector,
}

impl YahooProvider {
    pub fn new() -> Result<Self> {
        let connector = yahoo_finance_api::YahooConnector::new()
            .map_err(|e| DataError::ConnectionError(format!("Yahoo Finance 연결 실패: {}", e)))?;
        Ok(Self { connector })
    }
}

fn to_offset_datetime(dt: DateTime<Utc>) -> Result<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp(dt.timestamp())
        .map_err(|e| DataError::ParseError(format!("타임스탬프 변환 실패: {}", e)))
}

#[async_trait]
impl CandleProvider for YahooProvider {
    fn name(&self) -> &'static str {
        "yahoo"
    }

    async fn fetch_candles(
        &self,
        instrument: &Instrument,
        interval: Interval,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Candle>> {
        let ticker = instrument.exchange.yahoo_symbol(&instrument.symbol);
        let start = to_offset_datetime(from)?;
        // Yahoo의 종료일은 배타적이므로 하루를 더해 요청 범위를 포함시킴
        let end = to_offset_datetime(to + Duration::days(1))?;
        let yahoo_interval = interval.to_yahoo_interval();

        debug!(
            ticker = %ticker,
            interval = yahoo_interval,
            start = %from,
            end = %to,
            "Yahoo Finance API 호출"
        );

        let response = self
            .connector
            .get_quote_history_interval(&ticker, start, end, yahoo_interval)
            .await
            .map_err(|e| DataError::FetchError(format!("Yahoo Finance API 오류 ({}): {}", ticker, e)))?;

        let quotes = response
            .quotes()
            .map_err(|e| DataError::ParseError(format!("Quote 파싱 오류: {}", e)))?;

        let mut candles: Vec<Candle> = quotes
            .iter()
            .filter_map(|q| {
                let ts = Utc.timestamp_opt(q.timestamp as i64, 0).single()?;
                Some(Candle {
                    ts,
                    open: q.open,
                    high: q.high,
                    low: q.low,
                    close: q.close,
                    volume: q.volume as i64,
                })
            })
            .collect();

        candles.sort_by_key(|c| c.ts);

        debug!(ticker = %ticker, count = candles.len(), "Yahoo 캔들 수신");

        Ok(candles)
    }

    /// Yahoo 조회로 종목 존재 여부를 확인하고 최소 메타데이터를 구성합니다.
    ///
    /// Yahoo는 종목 키나 ISIN을 제공하지 않으므로 이름만 채웁니다.
    /// 시세가 확인되면 이름이 없어도 심볼을 이름으로 사용합니다.
    async fn fetch_metadata(&self, symbol: &str, exchange: Exchange) -> Result<Instrument> {
        let ticker = exchange.yahoo_symbol(symbol);

        let response = self
            .connector
            .get_quote_range(&ticker, "1d", "5d")
            .await
            .map_err(|e| DataError::FetchError(format!("Yahoo Finance API 오류 ({}): {}", ticker, e)))?;

        let quotes = response
            .quotes()
            .map_err(|e| DataError::ParseError(format!("Quote 파싱 오류: {}", e)))?;

        if quotes.is_empty() {
            return Err(DataError::FetchError(format!(
                "Yahoo에서 시세를 찾을 수 없음: {}",
                ticker
            )));
        }

        Ok(Instrument::new(symbol, exchange).with_name(symbol.to_uppercase()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset_datetime_conversion_preserves_instant() {
        let dt = Utc.with_ymd_and_hms(2024, 6, 15, 9, 30, 0).unwrap();
        let converted = to_offset_datetime(dt).unwrap();
        assert_eq!(converted.unix_timestamp(), dt.timestamp());
    }

    #[test]
    fn test_ticker_suffix_per_exchange() {
        assert_eq!(Exchange::Nse.yahoo_symbol("TCS"), "TCS.NS");
        assert_eq!(Exchange::Bse.yahoo_symbol("TCS"), "TCS.BO");
    }
}
