//! 캔들 저장소.
//!
//! 인터벌별 테이블에 캔들을 저장하고 조회합니다.
//!
//! # 동작 방식
//!
//! - 쓰기는 항상 `INSERT OR IGNORE`입니다. 이미 저장된 `(symbol,
//!   exchange, ts)` 캔들은 절대 덮어쓰지 않습니다. 같은 데이터를 몇 번
//!   저장해도 결과가 같으므로 동시 요청의 안전 경계가 됩니다.
//! - 저장 전에 배치 전체를 검증합니다. 한 건이라도 잘못된 캔들이 있으면
//!   아무것도 쓰지 않습니다.

use crate::error::{DataError, Result};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePool;
use sqlx::FromRow;
use stockcache_core::{Candle, CoverageWindow, Exchange, Interval};
use tracing::{debug, info, instrument};

/// 한 번의 INSERT 문에 담는 최대 행 수.
///
/// SQLite의 바인드 변수 한도 안에서 행당 8개 파라미터를 사용합니다.
const INSERT_CHUNK_SIZE: usize = 100;

/// 캔들 데이터베이스 레코드.
#[derive(Debug, Clone, FromRow)]
pub struct CandleRecord {
    pub ts: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
}

impl CandleRecord {
    /// 도메인 캔들로 변환.
    pub fn to_candle(&self) -> Candle {
        Candle {
            ts: self.ts,
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            volume: self.volume,
        }
    }
}

/// 캔들 저장소 서비스.
#[derive(Clone)]
pub struct CandleStore {
    pool: SqlitePool,
}

impl CandleStore {
    /// 새로운 캔들 저장소 생성.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// 캔들 배치를 저장합니다.
    ///
    /// 전체 배치를 먼저 검증한 뒤 `INSERT OR IGNORE`로 저장합니다.
    /// 실제로 새로 삽입된 행 수를 반환합니다.
    #[instrument(skip(self, candles), fields(count = candles.len()))]
    pub async fn upsert_candles(
        &self,
        symbol: &str,
        exchange: Exchange,
        interval: Interval,
        candles: &[Candle],
    ) -> Result<u64> {
        if candles.is_empty() {
            return Ok(0);
        }

        for candle in candles {
            candle
                .validate()
                .map_err(|reason| DataError::Validation(format!("{}/{}: {}", symbol, exchange, reason)))?;
        }

        let table = table_name(interval);
        let mut inserted = 0u64;

        for chunk in candles.chunks(INSERT_CHUNK_SIZE) {
            let mut query = format!(
                "INSERT OR IGNORE INTO {} (symbol, exchange, ts, open, high, low, close, volume) VALUES ",
                table
            );
            let tuples: Vec<&str> = chunk.iter().map(|_| "(?, ?, ?, ?, ?, ?, ?, ?)").collect();
            query.push_str(&tuples.join(", "));

            let mut sql_query = sqlx::query(&query);
            for candle in chunk {
                sql_query = sql_query
                    .bind(symbol)
                    .bind(exchange.as_str())
                    .bind(candle.ts)
                    .bind(candle.open)
                    .bind(candle.high)
                    .bind(candle.low)
                    .bind(candle.close)
                    .bind(candle.volume);
            }

            let result = sql_query
                .execute(&self.pool)
                .await
                .map_err(|e| DataError::InsertError(e.to_string()))?;

            inserted += result.rows_affected();
        }

        info!(
            symbol = symbol,
            exchange = %exchange,
            interval = %interval,
            received = candles.len(),
            inserted = inserted,
            "캔들 데이터 저장"
        );

        Ok(inserted)
    }

    /// 시간 범위의 캔들 조회 (양끝 포함, 오름차순).
    #[instrument(skip(self))]
    pub async fn query_range(
        &self,
        symbol: &str,
        exchange: Exchange,
        interval: Interval,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Candle>> {
        let query = format!(
            r#"
            SELECT ts, open, high, low, close, volume
            FROM {}
            WHERE symbol = ? AND exchange = ? AND ts >= ? AND ts <= ?
            ORDER BY ts ASC
            "#,
            table_name(interval)
        );

        let records: Vec<CandleRecord> = sqlx::query_as(&query)
            .bind(symbol)
            .bind(exchange.as_str())
            .bind(from)
            .bind(to)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DataError::QueryError(e.to_string()))?;

        debug!(
            symbol = symbol,
            exchange = %exchange,
            interval = %interval,
            count = records.len(),
            "저장소에서 캔들 조회"
        );

        Ok(records.into_iter().map(|r| r.to_candle()).collect())
    }

    /// 저장된 데이터의 시간 범위를 조회합니다.
    ///
    /// 해당 키에 캔들이 하나도 없으면 `None`을 반환합니다.
    pub async fn coverage_window(
        &self,
        symbol: &str,
        exchange: Exchange,
        interval: Interval,
    ) -> Result<Option<CoverageWindow>> {
        let query = format!(
            "SELECT MIN(ts), MAX(ts) FROM {} WHERE symbol = ? AND exchange = ?",
            table_name(interval)
        );

        let row: (Option<DateTime<Utc>>, Option<DateTime<Utc>>) = sqlx::query_as(&query)
            .bind(symbol)
            .bind(exchange.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DataError::QueryError(e.to_string()))?;

        Ok(match row {
            (Some(min_ts), Some(max_ts)) => Some(CoverageWindow { min_ts, max_ts }),
            _ => None,
        })
    }

    /// 저장된 캔들 수 조회.
    pub async fn count(&self, symbol: &str, exchange: Exchange, interval: Interval) -> Result<i64> {
        let query = format!(
            "SELECT COUNT(*) FROM {} WHERE symbol = ? AND exchange = ?",
            table_name(interval)
        );

        let row: (i64,) = sqlx::query_as(&query)
            .bind(symbol)
            .bind(exchange.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DataError::QueryError(e.to_string()))?;

        Ok(row.0)
    }
}

/// 인터벌의 물리 테이블 이름.
fn table_name(interval: Interval) -> String {
    format!("candles_{}", interval.partition())
}
