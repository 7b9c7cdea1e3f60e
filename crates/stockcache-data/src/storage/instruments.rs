//! 종목 메타데이터 저장소.

use crate::error::{DataError, Result};
use sqlx::sqlite::SqlitePool;
use sqlx::FromRow;
use stockcache_core::{Exchange, Instrument};
use tracing::{info, instrument};

/// 저장 결과.
///
/// 신규 등록 여부에 따라 초기 백필을 수행할지 결정할 때 사용합니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// 새로 등록된 종목
    Inserted,
    /// 기존 종목의 메타데이터 갱신
    Updated,
}

#[derive(Debug, Clone, FromRow)]
struct InstrumentRecord {
    symbol: String,
    exchange: String,
    name: Option<String>,
    instrument_key: Option<String>,
    isin: Option<String>,
}

impl InstrumentRecord {
    fn into_instrument(self) -> Result<Instrument> {
        let exchange: Exchange = self
            .exchange
            .parse()
            .map_err(|e: String| DataError::ParseError(e))?;
        Ok(Instrument {
            symbol: self.symbol,
            exchange,
            name: self.name,
            instrument_key: self.instrument_key,
            isin: self.isin,
        })
    }
}

/// 종목 메타데이터 저장소 서비스.
#[derive(Clone)]
pub struct InstrumentRepository {
    pool: SqlitePool,
}

impl InstrumentRepository {
    /// 새로운 종목 저장소 생성.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// 종목 조회.
    pub async fn get(&self, symbol: &str, exchange: Exchange) -> Result<Option<Instrument>> {
        let record: Option<InstrumentRecord> = sqlx::query_as(
            r#"
            SELECT symbol, exchange, name, instrument_key, isin
            FROM instruments
            WHERE symbol = ? AND exchange = ?
            "#,
        )
        .bind(symbol)
        .bind(exchange.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DataError::QueryError(e.to_string()))?;

        record.map(InstrumentRecord::into_instrument).transpose()
    }

    /// 종목 저장 또는 갱신.
    ///
    /// 반환값으로 신규 등록과 기존 갱신을 구분합니다.
    #[instrument(skip(self), fields(symbol = %instrument.symbol, exchange = %instrument.exchange))]
    pub async fn upsert(&self, instrument: &Instrument) -> Result<UpsertOutcome> {
        let existing = self.get(&instrument.symbol, instrument.exchange).await?;
        let outcome = if existing.is_some() {
            sqlx::query(
                r#"
                UPDATE instruments
                SET name = ?, instrument_key = ?, isin = ?
                WHERE symbol = ? AND exchange = ?
                "#,
            )
            .bind(&instrument.name)
            .bind(&instrument.instrument_key)
            .bind(&instrument.isin)
            .bind(&instrument.symbol)
            .bind(instrument.exchange.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| DataError::InsertError(e.to_string()))?;
            UpsertOutcome::Updated
        } else {
            sqlx::query(
                r#"
                INSERT INTO instruments (symbol, exchange, name, instrument_key, isin)
                VALUES (?, ?, ?, ?, ?)
                "#,
            )
            .bind(&instrument.symbol)
            .bind(instrument.exchange.as_str())
            .bind(&instrument.name)
            .bind(&instrument.instrument_key)
            .bind(&instrument.isin)
            .execute(&self.pool)
            .await
            .map_err(|e| DataError::InsertError(e.to_string()))?;
            UpsertOutcome::Inserted
        };

        info!(
            symbol = %instrument.symbol,
            exchange = %instrument.exchange,
            outcome = ?outcome,
            "종목 메타데이터 저장"
        );

        Ok(outcome)
    }

    /// 등록된 전체 종목 목록 (심볼 오름차순).
    pub async fn list(&self) -> Result<Vec<Instrument>> {
        let records: Vec<InstrumentRecord> = sqlx::query_as(
            r#"
            SELECT symbol, exchange, name, instrument_key, isin
            FROM instruments
            ORDER BY symbol ASC, exchange ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DataError::QueryError(e.to_string()))?;

        records
            .into_iter()
            .map(InstrumentRecord::into_instrument)
            .collect()
    }
}
