//! 캔들 데이터를 위한 인터벌 정의.
//!
//! 이 모듈은 저장소 파티션과 1:1로 대응되는 인터벌 타입을 정의합니다.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 캔들 인터벌.
///
/// 각 인터벌은 독립적인 저장소 파티션을 가지며, 한 파티션의 데이터는
/// 다른 파티션의 조회 결과에 절대 나타나지 않습니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interval {
    /// 일봉
    D1,
    /// 주봉
    W1,
    /// 월봉
    Mn1,
}

impl Interval {
    /// 요청 문자열에서 파싱합니다. 대소문자를 구분하지 않습니다.
    ///
    /// 허용되는 표기: `1D` / `1W`, `1WK` / `1M`, `1MO`
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "1D" => Some(Interval::D1),
            "1W" | "1WK" => Some(Interval::W1),
            "1M" | "1MO" => Some(Interval::Mn1),
            _ => None,
        }
    }

    /// 이 인터벌 한 단위의 명목 기간을 반환합니다.
    ///
    /// 주봉은 7일, 월봉은 30일(근사값)로 취급합니다. 커버리지 판정의
    /// 라이브 엣지 유예에 사용됩니다.
    pub fn unit_duration(&self) -> Duration {
        match self {
            Interval::D1 => Duration::days(1),
            Interval::W1 => Duration::days(7),
            Interval::Mn1 => Duration::days(30),
        }
    }

    /// 저장소 파티션(테이블) 접미사를 반환합니다.
    pub fn partition(&self) -> &'static str {
        match self {
            Interval::D1 => "daily",
            Interval::W1 => "weekly",
            Interval::Mn1 => "monthly",
        }
    }

    /// Yahoo Finance 인터벌 문자열로 변환합니다.
    pub fn to_yahoo_interval(&self) -> &'static str {
        match self {
            Interval::D1 => "1d",
            Interval::W1 => "1wk",
            Interval::Mn1 => "1mo",
        }
    }

    /// Upstox 히스토리 API 인터벌 경로 세그먼트로 변환합니다.
    pub fn to_upstox_interval(&self) -> &'static str {
        match self {
            Interval::D1 => "day",
            Interval::W1 => "week",
            Interval::Mn1 => "month",
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Interval::D1 => "1D",
            Interval::W1 => "1W",
            Interval::Mn1 => "1M",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for Interval {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("Unsupported interval: {}", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_parse_spellings() {
        assert_eq!(Interval::parse("1D"), Some(Interval::D1));
        assert_eq!(Interval::parse("1d"), Some(Interval::D1));
        assert_eq!(Interval::parse("1W"), Some(Interval::W1));
        assert_eq!(Interval::parse("1wk"), Some(Interval::W1));
        assert_eq!(Interval::parse("1M"), Some(Interval::Mn1));
        assert_eq!(Interval::parse("1mo"), Some(Interval::Mn1));
        assert_eq!(Interval::parse("5m"), None);
        assert_eq!(Interval::parse("1h"), None);
    }

    #[test]
    fn test_interval_partition() {
        assert_eq!(Interval::D1.partition(), "daily");
        assert_eq!(Interval::W1.partition(), "weekly");
        assert_eq!(Interval::Mn1.partition(), "monthly");
    }

    #[test]
    fn test_interval_provider_mapping() {
        assert_eq!(Interval::D1.to_yahoo_interval(), "1d");
        assert_eq!(Interval::W1.to_upstox_interval(), "week");
        assert_eq!(Interval::Mn1.to_yahoo_interval(), "1mo");
    }

    #[test]
    fn test_interval_unit_duration() {
        assert_eq!(Interval::D1.unit_duration(), Duration::days(1));
        assert_eq!(Interval::W1.unit_duration(), Duration::days(7));
    }
}
