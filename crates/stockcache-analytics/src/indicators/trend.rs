//! 추세 지표 (Trend Indicators).
//!
//! 이동평균 기반의 추세 지표들을 제공합니다.
//! - SMA (Simple Moving Average)
//! - EMA (Exponential Moving Average)
//! - MACD (Moving Average Convergence Divergence)

use serde::{Deserialize, Serialize};

use super::{IndicatorError, IndicatorResult};

/// SMA 파라미터.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SmaParams {
    /// 이동평균 기간.
    pub period: usize,
}

impl Default for SmaParams {
    fn default() -> Self {
        Self { period: 20 }
    }
}

/// EMA 파라미터.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EmaParams {
    /// 이동평균 기간.
    pub period: usize,
}

impl Default for EmaParams {
    fn default() -> Self {
        Self { period: 20 }
    }
}

/// MACD 파라미터.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MacdParams {
    /// 단기 EMA 기간 (기본: 12).
    pub fast: usize,
    /// 장기 EMA 기간 (기본: 26).
    pub slow: usize,
    /// 시그널 라인 기간 (기본: 9).
    pub signal: usize,
}

impl Default for MacdParams {
    fn default() -> Self {
        Self {
            fast: 12,
            slow: 26,
            signal: 9,
        }
    }
}

/// MACD 결과 시리즈. 세 컬럼 모두 입력과 같은 길이입니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MacdSeries {
    /// MACD 라인 (단기 EMA - 장기 EMA).
    pub macd: Vec<Option<f64>>,
    /// 시그널 라인 (MACD 라인의 EMA).
    pub signal: Vec<Option<f64>>,
    /// 히스토그램 (MACD - 시그널).
    pub histogram: Vec<Option<f64>>,
}

/// 추세 지표 계산기.
#[derive(Debug, Default)]
pub struct TrendIndicators;

impl TrendIndicators {
    /// 새로운 추세 지표 계산기 생성.
    pub fn new() -> Self {
        Self
    }

    /// 단순 이동평균 (SMA) 계산.
    ///
    /// SMA = (P1 + P2 + ... + Pn) / n
    ///
    /// # 반환
    /// 각 시점의 SMA 값 (처음 period-1개는 None)
    pub fn sma(&self, prices: &[f64], params: SmaParams) -> IndicatorResult<Vec<Option<f64>>> {
        let period = params.period;

        if period == 0 {
            return Err(IndicatorError::InvalidParameter(
                "기간은 0보다 커야 합니다".to_string(),
            ));
        }

        if prices.len() < period {
            return Err(IndicatorError::InsufficientData {
                required: period,
                provided: prices.len(),
            });
        }

        let mut result = Vec::with_capacity(prices.len());
        let mut window_sum = 0.0;

        for (i, price) in prices.iter().enumerate() {
            window_sum += price;
            if i >= period {
                window_sum -= prices[i - period];
            }
            if i < period - 1 {
                result.push(None);
            } else {
                result.push(Some(window_sum / period as f64));
            }
        }

        Ok(result)
    }

    /// 지수 이동평균 (EMA) 계산.
    ///
    /// EMA = (현재가 × k) + (이전 EMA × (1 - k)), k = 2 / (period + 1)
    /// 첫 EMA는 처음 period개의 SMA로 시작합니다.
    pub fn ema(&self, prices: &[f64], params: EmaParams) -> IndicatorResult<Vec<Option<f64>>> {
        let period = params.period;

        if period == 0 {
            return Err(IndicatorError::InvalidParameter(
                "기간은 0보다 커야 합니다".to_string(),
            ));
        }

        if prices.len() < period {
            return Err(IndicatorError::InsufficientData {
                required: period,
                provided: prices.len(),
            });
        }

        let mut result = vec![None; period - 1];
        let multiplier = 2.0 / (period as f64 + 1.0);

        let initial_sma = prices[..period].iter().sum::<f64>() / period as f64;
        result.push(Some(initial_sma));

        let mut prev_ema = initial_sma;
        for price in prices.iter().skip(period) {
            let ema = (price * multiplier) + (prev_ema * (1.0 - multiplier));
            result.push(Some(ema));
            prev_ema = ema;
        }

        Ok(result)
    }

    /// MACD 계산.
    ///
    /// MACD 라인 = 단기 EMA - 장기 EMA
    /// 시그널 라인 = MACD 라인의 EMA
    /// 히스토그램 = MACD 라인 - 시그널 라인
    pub fn macd(&self, prices: &[f64], params: MacdParams) -> IndicatorResult<MacdSeries> {
        if params.fast == 0 || params.slow == 0 || params.signal == 0 {
            return Err(IndicatorError::InvalidParameter(
                "MACD 파라미터는 0보다 커야 합니다".to_string(),
            ));
        }

        let min_required = params.slow + params.signal;
        if prices.len() < min_required {
            return Err(IndicatorError::InsufficientData {
                required: min_required,
                provided: prices.len(),
            });
        }

        let fast_ema = self.ema(prices, EmaParams { period: params.fast })?;
        let slow_ema = self.ema(prices, EmaParams { period: params.slow })?;

        let macd_line: Vec<Option<f64>> = fast_ema
            .iter()
            .zip(slow_ema.iter())
            .map(|(fast, slow)| match (fast, slow) {
                (Some(f), Some(s)) => Some(f - s),
                _ => None,
            })
            .collect();

        // 시그널 라인: MACD 값이 존재하는 구간에 대한 EMA
        let macd_values: Vec<f64> = macd_line.iter().flatten().copied().collect();
        let signal_dense = self.ema(
            &macd_values,
            EmaParams {
                period: params.signal,
            },
        )?;

        let leading = macd_line.len() - macd_values.len();
        let mut signal: Vec<Option<f64>> = vec![None; leading];
        signal.extend(signal_dense);

        let histogram: Vec<Option<f64>> = macd_line
            .iter()
            .zip(signal.iter())
            .map(|(m, s)| match (m, s) {
                (Some(m), Some(s)) => Some(m - s),
                _ => None,
            })
            .collect();

        Ok(MacdSeries {
            macd: macd_line,
            signal,
            histogram,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_prices() -> Vec<f64> {
        vec![
            100.0, 102.0, 101.0, 103.0, 105.0, 104.0, 106.0, 108.0, 107.0, 109.0,
        ]
    }

    #[test]
    fn test_sma_basic() {
        let trend = TrendIndicators::new();
        let prices = sample_prices();

        let sma = trend.sma(&prices, SmaParams { period: 3 }).unwrap();

        assert_eq!(sma.len(), prices.len());
        assert!(sma[0].is_none());
        assert!(sma[1].is_none());

        // 3번째 값: (100 + 102 + 101) / 3 = 101
        assert!((sma[2].unwrap() - 101.0).abs() < 1e-9);
        // 마지막 값: (108 + 107 + 109) / 3 = 108
        assert!((sma[9].unwrap() - 108.0).abs() < 1e-9);
    }

    #[test]
    fn test_ema_starts_from_sma() {
        let trend = TrendIndicators::new();
        let prices = sample_prices();

        let ema = trend.ema(&prices, EmaParams { period: 3 }).unwrap();

        assert!(ema[0].is_none());
        assert!(ema[1].is_none());
        assert!((ema[2].unwrap() - 101.0).abs() < 1e-9);

        // 4번째: (103 * 0.5) + (101 * 0.5) = 102
        assert!((ema[3].unwrap() - 102.0).abs() < 1e-9);
    }

    #[test]
    fn test_macd_shape() {
        let trend = TrendIndicators::new();
        let prices: Vec<f64> = (0..60).map(|i| 100.0 + i as f64).collect();

        let macd = trend.macd(&prices, MacdParams::default()).unwrap();

        assert_eq!(macd.macd.len(), prices.len());
        assert_eq!(macd.signal.len(), prices.len());
        assert_eq!(macd.histogram.len(), prices.len());

        // slow EMA 워밍업 전에는 None
        assert!(macd.macd[0].is_none());
        assert!(macd.macd[24].is_none());
        assert!(macd.macd[25].is_some());

        // 시그널은 MACD 워밍업 + signal 기간 이후
        assert!(macd.signal[25 + 8].is_some());
        assert!(macd.histogram[50].is_some());
    }

    #[test]
    fn test_insufficient_data() {
        let trend = TrendIndicators::new();
        let prices = vec![100.0, 101.0];

        assert!(trend.sma(&prices, SmaParams { period: 20 }).is_err());
        assert!(trend.ema(&prices, EmaParams { period: 20 }).is_err());
        assert!(trend.macd(&prices, MacdParams::default()).is_err());
    }

    #[test]
    fn test_zero_period_rejected() {
        let trend = TrendIndicators::new();
        let prices = sample_prices();

        assert!(matches!(
            trend.sma(&prices, SmaParams { period: 0 }),
            Err(IndicatorError::InvalidParameter(_))
        ));
    }
}
