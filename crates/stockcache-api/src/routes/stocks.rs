//! 종목 조회 endpoint.
//!
//! 종목 등록, 범위 캔들 + 지표 조회, 메타데이터 조회, 지표 목록,
//! 거래소별 종목 목록을 제공합니다.

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::str::FromStr;
use std::sync::Arc;
use tracing::warn;
use stockcache_core::{Candle, Exchange, Interval};
use stockcache_analytics::IndicatorColumn;

use crate::error::ApiError;
use crate::state::AppState;

/// 기본 조회 범위 (약 2년).
const DEFAULT_LOOKBACK_DAYS: i64 = 730;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/list", get(list_stocks))
        .route("/available-indicators", get(available_indicators))
        .route("/{exchange}/{symbol}", post(register_stock))
        .route("/{exchange}/{symbol}/data", get(stock_data))
        .route("/{exchange}/{symbol}/info", get(stock_info))
}

// ==================== 쿼리 파라미터 ====================

#[derive(Debug, Deserialize)]
pub struct DataQuery {
    pub interval: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    /// 쉼표 구분 지표 목록 (예: "SMA_20,RSI_14,MACD")
    pub indicators: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct InfoQuery {
    pub interval: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub exchange: Option<String>,
}

// ==================== 핸들러 ====================

/// 종목 등록.
///
/// POST /stocks/{exchange}/{symbol}
pub async fn register_stock(
    State(state): State<Arc<AppState>>,
    Path((exchange, symbol)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    let exchange = parse_exchange(&exchange)?;
    let instrument = state.manager.register(&symbol, exchange).await?;

    Ok(Json(json!({
        "message": "종목이 등록되었습니다",
        "stock_info": instrument,
    })))
}

/// 범위 캔들 + 지표 조회.
///
/// GET /stocks/{exchange}/{symbol}/data?interval&start_date&end_date&indicators
pub async fn stock_data(
    State(state): State<Arc<AppState>>,
    Path((exchange, symbol)): Path<(String, String)>,
    Query(query): Query<DataQuery>,
) -> Result<Json<Value>, ApiError> {
    let exchange = parse_exchange(&exchange)?;
    let interval = parse_interval(query.interval.as_deref())?;

    let to = match query.end_date.as_deref() {
        Some(raw) => parse_date_param(raw, "end_date")?,
        None => today_utc(),
    };
    let from = match query.start_date.as_deref() {
        Some(raw) => parse_date_param(raw, "start_date")?,
        None => to - Duration::days(DEFAULT_LOOKBACK_DAYS),
    };

    let indicators = split_indicator_param(query.indicators.as_deref());

    let series = state
        .manager
        .get_candles(&symbol, exchange, interval, from, to, &indicators)
        .await?;

    let data: Vec<Value> = series
        .candles
        .iter()
        .enumerate()
        .map(|(i, candle)| candle_row(candle, &series.columns, i))
        .collect();

    Ok(Json(json!({
        "symbol": symbol.to_uppercase(),
        "exchange": exchange,
        "interval": interval.to_string(),
        "start_date": from.format("%Y-%m-%d").to_string(),
        "end_date": to.format("%Y-%m-%d").to_string(),
        "partial": series.partial,
        "data": data,
    })))
}

/// 종목 메타데이터와 저장 범위 조회.
///
/// GET /stocks/{exchange}/{symbol}/info?interval
pub async fn stock_info(
    State(state): State<Arc<AppState>>,
    Path((exchange, symbol)): Path<(String, String)>,
    Query(query): Query<InfoQuery>,
) -> Result<Json<Value>, ApiError> {
    let exchange = parse_exchange(&exchange)?;
    let interval = parse_interval(query.interval.as_deref())?;

    let (instrument, window) = state
        .manager
        .instrument_info(&symbol, exchange, interval)
        .await?;

    let mut body = Map::new();
    body.insert("symbol".to_string(), json!(instrument.symbol));
    body.insert("exchange".to_string(), json!(instrument.exchange));
    body.insert("name".to_string(), json!(instrument.name));
    body.insert("instrument_key".to_string(), json!(instrument.instrument_key));
    body.insert("isin".to_string(), json!(instrument.isin));
    body.insert(
        "supported_intervals".to_string(),
        json!(["1D", "1W", "1M"]),
    );
    body.insert(
        format!("date_range_{}", interval),
        match window {
            Some(w) => json!({
                "min_time": w.min_ts.to_rfc3339(),
                "max_time": w.max_ts.to_rfc3339(),
            }),
            None => Value::Null,
        },
    );

    Ok(Json(Value::Object(body)))
}

/// 레지스트리에 등록된 지표 목록.
///
/// GET /stocks/available-indicators
pub async fn available_indicators(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!(state.registry.descriptors()))
}

/// 거래소별 종목 목록.
///
/// GET /stocks/list?exchange=NSE
///
/// 지원하지 않는 거래소이거나 목록을 받아오지 못하면 빈 배열을
/// 반환합니다.
pub async fn list_stocks(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Json<Value> {
    let raw = query.exchange.unwrap_or_else(|| "NSE".to_string());
    let Ok(exchange) = Exchange::from_str(&raw) else {
        warn!(exchange = %raw, "지원하지 않는 거래소 목록 요청");
        return Json(json!([]));
    };

    match state.catalog.equity_list(exchange).await {
        Ok(entries) => Json(json!(entries)),
        Err(e) => {
            warn!(exchange = %exchange, error = %e, "종목 목록 조회 실패");
            Json(json!([]))
        }
    }
}

// ==================== 헬퍼 ====================

fn parse_exchange(raw: &str) -> Result<Exchange, ApiError> {
    Exchange::from_str(raw).map_err(ApiError::bad_request)
}

fn parse_interval(raw: Option<&str>) -> Result<Interval, ApiError> {
    let raw = raw.unwrap_or("1D");
    Interval::parse(raw)
        .ok_or_else(|| ApiError::bad_request(format!("Unsupported interval: {}", raw)))
}

/// `YYYY-MM-DD` 날짜 파라미터를 UTC 자정으로 해석.
fn parse_date_param(raw: &str, field: &str) -> Result<DateTime<Utc>, ApiError> {
    let date = NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| ApiError::bad_request(format!("{}: 잘못된 날짜 형식: {}", field, raw)))?;
    let naive = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| ApiError::bad_request(format!("{}: 잘못된 날짜: {}", field, raw)))?;
    Ok(Utc.from_utc_datetime(&naive))
}

fn today_utc() -> DateTime<Utc> {
    let today = Utc::now().date_naive();
    Utc.from_utc_datetime(&today.and_hms_opt(0, 0, 0).unwrap_or_default())
}

/// 쉼표 구분 지표 파라미터 분해.
fn split_indicator_param(raw: Option<&str>) -> Vec<String> {
    raw.unwrap_or_default()
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// 캔들 한 건과 지표 컬럼들을 한 행으로 합칩니다.
fn candle_row(candle: &Candle, columns: &[IndicatorColumn], index: usize) -> Value {
    let mut row = Map::new();
    row.insert("time".to_string(), json!(candle.ts.timestamp()));
    row.insert("open".to_string(), json!(candle.open));
    row.insert("high".to_string(), json!(candle.high));
    row.insert("low".to_string(), json!(candle.low));
    row.insert("close".to_string(), json!(candle.close));
    row.insert("volume".to_string(), json!(candle.volume));

    for column in columns {
        let value = column.values.get(index).copied().flatten();
        row.insert(column.name.clone(), json!(value));
    }

    Value::Object(row)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date_param() {
        let dt = parse_date_param("2024-03-15", "start_date").unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2024, 3, 15, 0, 0, 0).unwrap());

        assert!(parse_date_param("15-03-2024", "start_date").is_err());
        assert!(parse_date_param("not-a-date", "end_date").is_err());
    }

    #[test]
    fn test_parse_interval_defaults_to_daily() {
        assert_eq!(parse_interval(None).unwrap(), Interval::D1);
        assert_eq!(parse_interval(Some("1wk")).unwrap(), Interval::W1);
        assert!(parse_interval(Some("5m")).is_err());
    }

    #[test]
    fn test_split_indicator_param() {
        assert!(split_indicator_param(None).is_empty());
        assert_eq!(
            split_indicator_param(Some("SMA_20, RSI_14 ,,MACD")),
            vec!["SMA_20", "RSI_14", "MACD"]
        );
    }

    #[test]
    fn test_candle_row_merges_indicator_values() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        let candle = Candle::new(ts, 100.0, 105.0, 99.0, 104.0, 1_000);
        let columns = vec![IndicatorColumn {
            name: "SMA_3".to_string(),
            values: vec![None, Some(101.5)],
        }];

        let row = candle_row(&candle, &columns, 0);
        assert_eq!(row["time"], json!(ts.timestamp()));
        assert_eq!(row["close"], json!(104.0));
        assert_eq!(row["SMA_3"], Value::Null);

        let row = candle_row(&candle, &columns, 1);
        assert_eq!(row["SMA_3"], json!(101.5));
    }
}
