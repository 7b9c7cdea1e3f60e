//! SQLite 연결 풀 및 스키마 관리.

use crate::error::{DataError, Result};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use stockcache_core::config::DatabaseConfig;
use tracing::info;

/// 데이터베이스 연결 풀 래퍼.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// 새로운 데이터베이스 연결 풀을 생성합니다.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        info!(path = %config.path, "Connecting to database...");

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.connect_url())
            .await
            .map_err(|e| DataError::ConnectionError(e.to_string()))?;

        info!("Database connection established");

        Ok(Self { pool })
    }

    /// 인메모리 데이터베이스를 생성합니다 (테스트용).
    ///
    /// 연결마다 별도 DB가 되므로 풀은 반드시 단일 연결이어야 합니다.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| DataError::ConnectionError(e.to_string()))?;

        Ok(Self { pool })
    }

    /// 기존 연결 풀에서 Database 인스턴스를 생성합니다.
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// 내부 연결 풀을 반환합니다.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// 데이터베이스 스키마를 생성합니다.
    ///
    /// 모든 문장이 `IF NOT EXISTS`이므로 재기동 시에도 안전합니다.
    pub async fn migrate(&self) -> Result<()> {
        info!("Running database migrations...");

        let statements = [
            r#"
            CREATE TABLE IF NOT EXISTS instruments (
                symbol TEXT NOT NULL,
                exchange TEXT NOT NULL,
                name TEXT,
                instrument_key TEXT,
                isin TEXT,
                added_at TEXT NOT NULL DEFAULT (datetime('now')),
                PRIMARY KEY (symbol, exchange)
            )
            "#
            .to_string(),
            candle_table_ddl("candles_daily"),
            candle_table_ddl("candles_weekly"),
            candle_table_ddl("candles_monthly"),
        ];

        for statement in &statements {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| DataError::MigrationError(e.to_string()))?;
        }

        info!("Migrations completed successfully");
        Ok(())
    }

    /// 데이터베이스 상태를 확인합니다.
    pub async fn health_check(&self) -> Result<bool> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| DataError::QueryError(e.to_string()))?;
        Ok(true)
    }
}

fn candle_table_ddl(table: &str) -> String {
    format!(
        r#"
        CREATE TABLE IF NOT EXISTS {table} (
            symbol TEXT NOT NULL,
            exchange TEXT NOT NULL,
            ts TEXT NOT NULL,
            open REAL NOT NULL,
            high REAL NOT NULL,
            low REAL NOT NULL,
            close REAL NOT NULL,
            volume INTEGER NOT NULL,
            PRIMARY KEY (symbol, exchange, ts)
        )
        "#
    )
}
