//! 종목(주식) 도메인 모델.

use crate::types::Exchange;
use serde::{Deserialize, Serialize};

/// 시스템이 추적하는 종목.
///
/// `(symbol, exchange)` 쌍이 자연키입니다. 심볼은 항상 대문자로
/// 정규화되어 저장됩니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instrument {
    /// 티커 심볼 (예: RELIANCE)
    pub symbol: String,
    /// 거래소
    pub exchange: Exchange,
    /// 종목명 (예: Reliance Industries Limited)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// 브로커(Upstox) 종목 키
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instrument_key: Option<String>,
    /// ISIN 코드
    #[serde(skip_serializing_if = "Option::is_none")]
    pub isin: Option<String>,
}

impl Instrument {
    /// 새 종목을 생성합니다. 심볼은 대문자로 정규화됩니다.
    pub fn new(symbol: impl Into<String>, exchange: Exchange) -> Self {
        Self {
            symbol: symbol.into().to_uppercase(),
            exchange,
            name: None,
            instrument_key: None,
            isin: None,
        }
    }

    /// 종목명을 설정합니다.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// 브로커 종목 키를 설정합니다.
    pub fn with_instrument_key(mut self, key: impl Into<String>) -> Self {
        self.instrument_key = Some(key.into());
        self
    }

    /// ISIN 코드를 설정합니다.
    pub fn with_isin(mut self, isin: impl Into<String>) -> Self {
        self.isin = Some(isin.into());
        self
    }

    /// 표시용 종목명을 반환합니다. 이름이 없으면 심볼을 사용합니다.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.symbol)
    }
}
