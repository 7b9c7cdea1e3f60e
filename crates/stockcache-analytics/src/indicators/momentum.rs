//! 모멘텀 지표 (Momentum Indicators).
//!
//! - RSI (Relative Strength Index)

use serde::{Deserialize, Serialize};

use super::{IndicatorError, IndicatorResult};

/// RSI 파라미터.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RsiParams {
    /// RSI 기간 (기본: 14).
    pub period: usize,
}

impl Default for RsiParams {
    fn default() -> Self {
        Self { period: 14 }
    }
}

/// 모멘텀 지표 계산기.
#[derive(Debug, Default)]
pub struct MomentumIndicators;

impl MomentumIndicators {
    /// 새로운 모멘텀 지표 계산기 생성.
    pub fn new() -> Self {
        Self
    }

    /// RSI (Relative Strength Index) 계산.
    ///
    /// Wilder 평활법을 사용합니다:
    /// - 첫 평균 이득/손실은 처음 period개 변화량의 단순 평균
    /// - 이후 평균 = (이전 평균 × (period - 1) + 현재 변화량) / period
    ///
    /// RSI = 100 - 100 / (1 + 평균이득 / 평균손실)
    ///
    /// # 반환
    /// 입력과 같은 길이의 벡터. 처음 period개는 None, 값은 0-100 범위.
    pub fn rsi(&self, prices: &[f64], params: RsiParams) -> IndicatorResult<Vec<Option<f64>>> {
        let period = params.period;

        if period == 0 {
            return Err(IndicatorError::InvalidParameter(
                "기간은 0보다 커야 합니다".to_string(),
            ));
        }

        // 변화량 period개를 만들려면 가격이 period + 1개 필요
        if prices.len() < period + 1 {
            return Err(IndicatorError::InsufficientData {
                required: period + 1,
                provided: prices.len(),
            });
        }

        let mut result = vec![None; period];

        let mut avg_gain = 0.0;
        let mut avg_loss = 0.0;
        for i in 1..=period {
            let change = prices[i] - prices[i - 1];
            if change > 0.0 {
                avg_gain += change;
            } else {
                avg_loss += -change;
            }
        }
        avg_gain /= period as f64;
        avg_loss /= period as f64;

        result.push(Some(rsi_value(avg_gain, avg_loss)));

        for i in period + 1..prices.len() {
            let change = prices[i] - prices[i - 1];
            let (gain, loss) = if change > 0.0 {
                (change, 0.0)
            } else {
                (0.0, -change)
            };
            avg_gain = (avg_gain * (period as f64 - 1.0) + gain) / period as f64;
            avg_loss = (avg_loss * (period as f64 - 1.0) + loss) / period as f64;
            result.push(Some(rsi_value(avg_gain, avg_loss)));
        }

        Ok(result)
    }
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        return 100.0;
    }
    let rs = avg_gain / avg_loss;
    100.0 - 100.0 / (1.0 + rs)
}
