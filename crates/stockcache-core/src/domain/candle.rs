//! 캔들 데이터 타입 및 구조체.
//!
//! 이 모듈은 캔들 관련 타입을 정의합니다:
//! - `Candle` - OHLCV 캔들 데이터
//! - `CoverageWindow` - 저장된 구간의 시간 범위

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// OHLCV 캔들 데이터.
///
/// 가격은 `f64`, 거래량은 `i64`로 저장합니다. 타임스탬프는 UTC 기준이며
/// 해당 인터벌 구간의 시작 시각을 나타냅니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// 캔들 시작 시간 (UTC)
    pub ts: DateTime<Utc>,
    /// 시가
    pub open: f64,
    /// 고가
    pub high: f64,
    /// 저가
    pub low: f64,
    /// 종가
    pub close: f64,
    /// 거래량
    pub volume: i64,
}

impl Candle {
    /// 새 캔들을 생성합니다.
    pub fn new(ts: DateTime<Utc>, open: f64, high: f64, low: f64, close: f64, volume: i64) -> Self {
        Self {
            ts,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// 캔들이 저장 가능한 값인지 검사합니다.
    ///
    /// 가격은 유한한 양수여야 하고, 고가/저가 관계가 성립해야 하며,
    /// 거래량은 음수가 될 수 없습니다.
    pub fn validate(&self) -> Result<(), String> {
        let prices = [
            ("open", self.open),
            ("high", self.high),
            ("low", self.low),
            ("close", self.close),
        ];
        for (field, value) in prices {
            if !value.is_finite() || value <= 0.0 {
                return Err(format!(
                    "invalid {} price {} at {}",
                    field, value, self.ts
                ));
            }
        }
        if self.high < self.low {
            return Err(format!(
                "high {} below low {} at {}",
                self.high, self.low, self.ts
            ));
        }
        if self.volume < 0 {
            return Err(format!("negative volume {} at {}", self.volume, self.ts));
        }
        Ok(())
    }
}

/// 한 파티션에 저장된 (종목, 거래소) 데이터의 시간 범위.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageWindow {
    /// 가장 오래된 캔들 시각
    pub min_ts: DateTime<Utc>,
    /// 가장 최근 캔들 시각
    pub max_ts: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_candle_validate_ok() {
        let c = Candle::new(ts(2024, 1, 2), 100.0, 110.0, 95.0, 105.5, 12_000);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn test_candle_validate_rejects_bad_prices() {
        let base = Candle::new(ts(2024, 1, 2), 100.0, 110.0, 95.0, 105.5, 12_000);

        let mut c = base.clone();
        c.open = 0.0;
        assert!(c.validate().is_err());

        let mut c = base.clone();
        c.close = f64::NAN;
        assert!(c.validate().is_err());

        let mut c = base.clone();
        c.high = 90.0; // 고가 < 저가
        assert!(c.validate().is_err());

        let mut c = base;
        c.volume = -1;
        assert!(c.validate().is_err());
    }
}
