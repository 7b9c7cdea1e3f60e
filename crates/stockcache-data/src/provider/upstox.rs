//! Upstox 시세 제공자.
//!
//! Upstox historical-candle REST API로 NSE/BSE 일봉 이상의 캔들을
//! 조회합니다. 접근 토큰과 종목 키가 모두 있어야 동작하며, 둘 중
//! 하나라도 없으면 오류를 반환해 폴백 제공자로 넘어가게 합니다.

use crate::catalog::InstrumentCatalog;
use crate::error::{DataError, Result};
use crate::provider::CandleProvider;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use stockcache_core::{Candle, Exchange, Instrument, Interval};

const DEFAULT_BASE_URL: &str = "https://api.upstox.com/v2";

/// Upstox 시세 제공자.
pub struct UpstoxProvider {
    client: reqwest::Client,
    base_url: String,
    access_token: Option<String>,
    catalog: Arc<InstrumentCatalog>,
}

#[derive(Debug, Deserialize)]
struct HistoricalCandleResponse {
    status: String,
    #[serde(default)]
    data: Option<CandlePayload>,
}

#[derive(Debug, Deserialize)]
struct CandlePayload {
    #[serde(default)]
    candles: Vec<Vec<serde_json::Value>>,
}

impl UpstoxProvider {
    /// 새로운 Upstox 제공자 생성.
    pub fn new(access_token: Option<String>, catalog: Arc<InstrumentCatalog>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("HTTP 클라이언트 생성 실패");

        Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            access_token,
            catalog,
        }
    }

    /// 종목 키 결정: 저장된 키 우선, 없으면 카탈로그 조회.
    async fn resolve_instrument_key(&self, instrument: &Instrument) -> Result<String> {
        if let Some(key) = &instrument.instrument_key {
            return Ok(key.clone());
        }
        self.catalog
            .instrument_key(&instrument.symbol, instrument.exchange)
            .await?
            .ok_or_else(|| {
                DataError::FetchError(format!(
                    "Upstox 종목 키 없음: {}/{}",
                    instrument.symbol, instrument.exchange
                ))
            })
    }

    fn token(&self) -> Result<&str> {
        self.access_token
            .as_deref()
            .ok_or_else(|| DataError::FetchError("Upstox 접근 토큰 미설정".to_string()))
    }

    /// 응답 행 하나를 캔들로 변환.
    ///
    /// 행 형식: `[ts, open, high, low, close, volume, open_interest]`
    fn parse_candle_row(row: &[serde_json::Value]) -> Result<Candle> {
        if row.len() < 6 {
            return Err(DataError::ParseError(format!(
                "Upstox 캔들 필드 부족: {}개",
                row.len()
            )));
        }

        let ts_str = row[0]
            .as_str()
            .ok_or_else(|| DataError::ParseError("Upstox 타임스탬프가 문자열이 아님".to_string()))?;
        let ts = DateTime::parse_from_rfc3339(ts_str)
            .map_err(|e| DataError::ParseError(format!("Upstox 타임스탬프 파싱 실패: {} - {}", ts_str, e)))?
            .with_timezone(&Utc);

        let number = |idx: usize, field: &str| -> Result<f64> {
            row[idx]
                .as_f64()
                .ok_or_else(|| DataError::ParseError(format!("Upstox {} 필드가 숫자가 아님", field)))
        };

        Ok(Candle {
            ts,
            open: number(1, "open")?,
            high: number(2, "high")?,
            low: number(3, "low")?,
            close: number(4, "close")?,
            volume: number(5, "volume")? as i64,
        })
    }
}

#[async_trait]
impl CandleProvider for UpstoxProvider {
    fn name(&self) -> &'static str {
        "upstox"
    }

    async fn fetch_candles(
        &self,
        instrument: &Instrument,
        interval: Interval,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Candle>> {
        let token = self.token()?.to_string();
        let instrument_key = self.resolve_instrument_key(instrument).await?;

        // 경로 순서 주의: to가 from보다 앞에 옵니다
        let url = format!(
            "{}/historical-candle/{}/{}/{}/{}",
            self.base_url,
            instrument_key,
            interval.to_upstox_interval(),
            to.format("%Y-%m-%d"),
            from.format("%Y-%m-%d"),
        );

        debug!(
            symbol = %instrument.symbol,
            exchange = %instrument.exchange,
            interval = %interval,
            url = %url,
            "Upstox API 호출"
        );

        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", token))
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| DataError::FetchError(format!("Upstox API 오류: {}", e)))?;

        if !response.status().is_success() {
            return Err(DataError::FetchError(format!(
                "Upstox API 응답 오류: HTTP {}",
                response.status()
            )));
        }

        let body: HistoricalCandleResponse = response
            .json()
            .await
            .map_err(|e| DataError::ParseError(format!("Upstox 응답 파싱 실패: {}", e)))?;

        if body.status != "success" {
            return Err(DataError::FetchError(format!(
                "Upstox API 상태 오류: {}",
                body.status
            )));
        }

        let rows = body.data.map(|d| d.candles).unwrap_or_default();
        let mut candles = rows
            .iter()
            .map(|row| Self::parse_candle_row(row))
            .collect::<Result<Vec<Candle>>>()?;

        // 응답은 최신순이므로 오름차순으로 정렬
        candles.sort_by_key(|c| c.ts);

        debug!(
            symbol = %instrument.symbol,
            count = candles.len(),
            "Upstox 캔들 수신"
        );

        Ok(candles)
    }

    async fn fetch_metadata(&self, symbol: &str, exchange: Exchange) -> Result<Instrument> {
        let entry = self
            .catalog
            .equity_entry(symbol, exchange)
            .await?
            .ok_or_else(|| {
                DataError::FetchError(format!("Upstox 카탈로그에 없는 종목: {}/{}", symbol, exchange))
            })?;

        let mut instrument = Instrument::new(symbol, exchange).with_name(entry.name);
        if let Some(key) = entry.instrument_key {
            instrument = instrument.with_instrument_key(key);
        }
        if let Some(isin) = entry.isin {
            instrument = instrument.with_isin(isin);
        }
        Ok(instrument)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(values: &[serde_json::Value]) -> Vec<serde_json::Value> {
        values.to_vec()
    }

    #[test]
    fn test_parse_candle_row() {
        let raw = row(&[
            serde_json::json!("2024-01-02T00:00:00+05:30"),
            serde_json::json!(100.5),
            serde_json::json!(105.0),
            serde_json::json!(99.0),
            serde_json::json!(104.2),
            serde_json::json!(123456),
            serde_json::json!(0),
        ]);

        let candle = UpstoxProvider::parse_candle_row(&raw).unwrap();
        assert_eq!(candle.open, 100.5);
        assert_eq!(candle.close, 104.2);
        assert_eq!(candle.volume, 123456);
        // +05:30 오프셋이 UTC로 변환됨
        assert_eq!(candle.ts.format("%Y-%m-%d %H:%M").to_string(), "2024-01-01 18:30");
    }

    #[test]
    fn test_parse_candle_row_rejects_short_row() {
        let raw = row(&[serde_json::json!("2024-01-02T00:00:00+05:30"), serde_json::json!(1.0)]);
        let result = UpstoxProvider::parse_candle_row(&raw);
        assert!(matches!(result, Err(DataError::ParseError(_))));
    }

    #[test]
    fn test_parse_candle_row_rejects_non_numeric_price() {
        let raw = row(&[
            serde_json::json!("2024-01-02T00:00:00+05:30"),
            serde_json::json!("abc"),
            serde_json::json!(105.0),
            serde_json::json!(99.0),
            serde_json::json!(104.2),
            serde_json::json!(123456),
        ]);
        let result = UpstoxProvider::parse_candle_row(&raw);
        assert!(matches!(result, Err(DataError::ParseError(_))));
    }
}
