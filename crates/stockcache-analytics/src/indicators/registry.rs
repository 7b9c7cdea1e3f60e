//! 지표 레지스트리.
//!
//! 요청 문자열(`SMA_20`, `MACD_12_26_9` 등)을 지표 계산으로 연결합니다.
//! 레지스트리는 명시적으로 생성되며 전역 상태를 사용하지 않습니다.
//! 서비스 시작 시 `IndicatorRegistry::standard()`로 만들어 `Arc`로 공유합니다.

use serde::Serialize;
use tracing::warn;

use super::momentum::{MomentumIndicators, RsiParams};
use super::trend::{EmaParams, MacdParams, SmaParams, TrendIndicators};
use super::IndicatorResult;

/// 등록된 지표의 메타데이터. 지표 목록 API에 그대로 노출됩니다.
#[derive(Debug, Clone, Serialize)]
pub struct IndicatorDescriptor {
    /// 지표 ID (예: "SMA")
    pub id: &'static str,
    /// 표시용 이름
    pub name: &'static str,
    /// 요청 형식 예시 (예: "SMA_20")
    pub example_format: &'static str,
    /// 기본 파라미터 요청 문자열
    pub default_params: &'static str,
}

/// 파싱이 끝난 지표 요청.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IndicatorSpec {
    /// 단순 이동평균
    Sma(SmaParams),
    /// 지수 이동평균
    Ema(EmaParams),
    /// 상대강도지수
    Rsi(RsiParams),
    /// MACD
    Macd(MacdParams),
}

impl IndicatorSpec {
    /// 출력 컬럼의 기본 이름을 반환합니다 (예: `SMA_20`, `MACD_12_26_9`).
    pub fn column_base(&self) -> String {
        match self {
            IndicatorSpec::Sma(p) => format!("SMA_{}", p.period),
            IndicatorSpec::Ema(p) => format!("EMA_{}", p.period),
            IndicatorSpec::Rsi(p) => format!("RSI_{}", p.period),
            IndicatorSpec::Macd(p) => format!("MACD_{}_{}_{}", p.fast, p.slow, p.signal),
        }
    }
}

/// 이름 붙은 지표 출력 컬럼. 값 벡터는 항상 입력 캔들 수와 같은 길이입니다.
#[derive(Debug, Clone, Serialize)]
pub struct IndicatorColumn {
    /// 컬럼 이름 (예: `SMA_20`, `MACD_12_26_9_SIGNAL`)
    pub name: String,
    /// 각 캔들 시점의 값. 워밍업 구간은 None.
    pub values: Vec<Option<f64>>,
}

/// 지표 레지스트리.
///
/// 알 수 없는 지표 ID나 파싱할 수 없는 파라미터는 오류가 아니라 `None`으로
/// 처리됩니다. 호출 측은 해당 요청을 건너뜁니다.
#[derive(Debug)]
pub struct IndicatorRegistry {
    descriptors: Vec<IndicatorDescriptor>,
    trend: TrendIndicators,
    momentum: MomentumIndicators,
}

impl IndicatorRegistry {
    /// 표준 지표 세트(SMA, EMA, RSI, MACD)를 담은 레지스트리를 생성합니다.
    pub fn standard() -> Self {
        Self {
            descriptors: vec![
                IndicatorDescriptor {
                    id: "SMA",
                    name: "Simple Moving Average",
                    example_format: "SMA_20",
                    default_params: "SMA_20",
                },
                IndicatorDescriptor {
                    id: "EMA",
                    name: "Exponential Moving Average",
                    example_format: "EMA_20",
                    default_params: "EMA_20",
                },
                IndicatorDescriptor {
                    id: "RSI",
                    name: "Relative Strength Index",
                    example_format: "RSI_14",
                    default_params: "RSI_14",
                },
                IndicatorDescriptor {
                    id: "MACD",
                    name: "MACD (Moving Average Convergence Divergence)",
                    example_format: "MACD_12_26_9",
                    default_params: "MACD_12_26_9",
                },
            ],
            trend: TrendIndicators::new(),
            momentum: MomentumIndicators::new(),
        }
    }

    /// 등록된 지표 메타데이터 목록을 반환합니다.
    pub fn descriptors(&self) -> &[IndicatorDescriptor] {
        &self.descriptors
    }

    /// 요청 문자열을 파싱합니다.
    ///
    /// `<ID>` 단독이면 기본 파라미터를 사용하고, `<ID>_<params...>`는
    /// 지표별 형식을 따릅니다. 형식이 맞지 않으면 `None`을 반환합니다.
    pub fn parse(&self, request: &str) -> Option<IndicatorSpec> {
        let normalized = request.trim().to_uppercase();
        let parts: Vec<&str> = normalized.split('_').collect();
        let id = *parts.first()?;

        if !self.descriptors.iter().any(|d| d.id == id) {
            return None;
        }

        match (id, parts.len()) {
            ("SMA", 1) => Some(IndicatorSpec::Sma(SmaParams::default())),
            ("SMA", 2) => {
                let period = parse_period(parts[1])?;
                Some(IndicatorSpec::Sma(SmaParams { period }))
            }
            ("EMA", 1) => Some(IndicatorSpec::Ema(EmaParams::default())),
            ("EMA", 2) => {
                let period = parse_period(parts[1])?;
                Some(IndicatorSpec::Ema(EmaParams { period }))
            }
            ("RSI", 1) => Some(IndicatorSpec::Rsi(RsiParams::default())),
            ("RSI", 2) => {
                let period = parse_period(parts[1])?;
                Some(IndicatorSpec::Rsi(RsiParams { period }))
            }
            ("MACD", 1) => Some(IndicatorSpec::Macd(MacdParams::default())),
            ("MACD", 4) => {
                let fast = parse_period(parts[1])?;
                let slow = parse_period(parts[2])?;
                let signal = parse_period(parts[3])?;
                Some(IndicatorSpec::Macd(MacdParams { fast, slow, signal }))
            }
            _ => None,
        }
    }

    /// 파싱된 지표를 종가 시리즈 위에서 계산합니다.
    ///
    /// 단일 출력 지표는 컬럼 하나, MACD는 `_MACD`/`_SIGNAL`/`_HISTO`
    /// 세 컬럼을 반환합니다.
    pub fn compute(
        &self,
        spec: &IndicatorSpec,
        closes: &[f64],
    ) -> IndicatorResult<Vec<IndicatorColumn>> {
        let base = spec.column_base();
        match spec {
            IndicatorSpec::Sma(params) => {
                let values = self.trend.sma(closes, *params)?;
                Ok(vec![IndicatorColumn { name: base, values }])
            }
            IndicatorSpec::Ema(params) => {
                let values = self.trend.ema(closes, *params)?;
                Ok(vec![IndicatorColumn { name: base, values }])
            }
            IndicatorSpec::Rsi(params) => {
                let values = self.momentum.rsi(closes, *params)?;
                Ok(vec![IndicatorColumn { name: base, values }])
            }
            IndicatorSpec::Macd(params) => {
                let series = self.trend.macd(closes, *params)?;
                Ok(vec![
                    IndicatorColumn {
                        name: format!("{}_MACD", base),
                        values: series.macd,
                    },
                    IndicatorColumn {
                        name: format!("{}_SIGNAL", base),
                        values: series.signal,
                    },
                    IndicatorColumn {
                        name: format!("{}_HISTO", base),
                        values: series.histogram,
                    },
                ])
            }
        }
    }

    /// 요청 문자열 하나를 처리합니다.
    ///
    /// 파싱 실패와 계산 오류 모두 경고 로그 후 `None`으로 처리되어
    /// 응답에서 해당 지표만 빠집니다.
    pub fn apply(&self, request: &str, closes: &[f64]) -> Option<Vec<IndicatorColumn>> {
        let spec = match self.parse(request) {
            Some(spec) => spec,
            None => {
                warn!(indicator = %request, "알 수 없는 지표 요청, 건너뜀");
                return None;
            }
        };

        match self.compute(&spec, closes) {
            Ok(columns) => Some(columns),
            Err(e) => {
                warn!(indicator = %request, error = %e, "지표 계산 실패, 건너뜀");
                None
            }
        }
    }
}

fn parse_period(s: &str) -> Option<usize> {
    s.parse::<usize>().ok().filter(|n| *n > 0)
}
