//! 거래소 정의.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 지원 거래소.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Exchange {
    /// National Stock Exchange of India
    Nse,
    /// Bombay Stock Exchange
    Bse,
}

impl Exchange {
    /// 정규화된 거래소 코드를 반환합니다.
    pub fn as_str(&self) -> &'static str {
        match self {
            Exchange::Nse => "NSE",
            Exchange::Bse => "BSE",
        }
    }

    /// Yahoo Finance 심볼 접미사를 반환합니다.
    pub fn yahoo_suffix(&self) -> &'static str {
        match self {
            Exchange::Nse => ".NS",
            Exchange::Bse => ".BO",
        }
    }

    /// Upstox 종목 마스터의 주식 세그먼트 코드를 반환합니다.
    pub fn upstox_segment(&self) -> &'static str {
        match self {
            Exchange::Nse => "NSE_EQ",
            Exchange::Bse => "BSE_EQ",
        }
    }

    /// 심볼에 Yahoo 접미사를 붙입니다.
    pub fn yahoo_symbol(&self, symbol: &str) -> String {
        format!("{}{}", symbol, self.yahoo_suffix())
    }
}

impl fmt::Display for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Exchange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "NSE" | "NS" => Ok(Exchange::Nse),
            "BSE" | "BO" => Ok(Exchange::Bse),
            _ => Err(format!("Unknown exchange: {}", s)),
        }
    }
}
