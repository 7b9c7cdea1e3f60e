//! 설정 관리.
//!
//! 이 모듈은 애플리케이션 설정을 정의하고 관리합니다.
//! 모든 설정은 환경 변수에서 읽으며, 값이 없으면 기본값을 사용합니다.

use serde::{Deserialize, Serialize};

/// 애플리케이션 설정.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    /// 서버 설정
    pub server: ServerConfig,
    /// 데이터베이스 설정
    pub database: DatabaseConfig,
    /// Upstox API 설정
    pub upstox: UpstoxConfig,
    /// 종목 마스터 캐시 설정
    pub catalog: CatalogConfig,
    /// 데이터 동기화 설정
    pub sync: SyncConfig,
}

impl AppConfig {
    /// 환경 변수에서 전체 설정을 구성합니다.
    pub fn from_env() -> Self {
        Self {
            server: ServerConfig::from_env(),
            database: DatabaseConfig::from_env(),
            upstox: UpstoxConfig::from_env(),
            catalog: CatalogConfig::from_env(),
            sync: SyncConfig::from_env(),
        }
    }
}

/// 서버 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// 바인딩할 호스트
    pub host: String,
    /// 리스닝할 포트
    pub port: u16,
    /// 요청 타임아웃 (초)
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            request_timeout_secs: 60,
        }
    }
}

impl ServerConfig {
    /// 환경 변수에서 설정을 생성합니다.
    ///
    /// `API_HOST`, `API_PORT`, `REQUEST_TIMEOUT_SECS`를 사용합니다.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("API_HOST").unwrap_or(defaults.host),
            port: env_parse("API_PORT", defaults.port),
            request_timeout_secs: env_parse("REQUEST_TIMEOUT_SECS", defaults.request_timeout_secs),
        }
    }
}

/// 데이터베이스 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// SQLite 데이터베이스 파일 경로
    pub path: String,
    /// 최대 연결 수
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "data/stocks.db".to_string(),
            max_connections: 5,
        }
    }
}

impl DatabaseConfig {
    /// 환경 변수에서 설정을 생성합니다.
    ///
    /// `DATABASE_PATH`, `DB_MAX_CONNECTIONS`를 사용합니다.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            path: std::env::var("DATABASE_PATH").unwrap_or(defaults.path),
            max_connections: env_parse("DB_MAX_CONNECTIONS", defaults.max_connections),
        }
    }

    /// sqlx 연결 URL을 반환합니다.
    pub fn connect_url(&self) -> String {
        format!("sqlite://{}?mode=rwc", self.path)
    }
}

/// Upstox API 설정.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct UpstoxConfig {
    /// API 액세스 토큰. 없으면 Upstox 조회는 실패하고 폴백으로 넘어갑니다.
    pub access_token: Option<String>,
}

impl UpstoxConfig {
    /// 환경 변수에서 설정을 생성합니다. `UPSTOX_ACCESS_TOKEN`을 사용합니다.
    pub fn from_env() -> Self {
        Self {
            access_token: std::env::var("UPSTOX_ACCESS_TOKEN").ok(),
        }
    }
}

/// 종목 마스터 캐시 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CatalogConfig {
    /// 종목 마스터 파일 캐시 디렉터리
    pub cache_dir: String,
    /// 캐시 최대 유효 시간 (시간 단위)
    pub max_age_hours: i64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            cache_dir: "data/catalog".to_string(),
            max_age_hours: 23,
        }
    }
}

impl CatalogConfig {
    /// 환경 변수에서 설정을 생성합니다.
    ///
    /// `CATALOG_CACHE_DIR`, `CATALOG_MAX_AGE_HOURS`를 사용합니다.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            cache_dir: std::env::var("CATALOG_CACHE_DIR").unwrap_or(defaults.cache_dir),
            max_age_hours: env_parse("CATALOG_MAX_AGE_HOURS", defaults.max_age_hours),
        }
    }
}

/// 데이터 동기화 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SyncConfig {
    /// 신규 종목 등록 시 백필할 일봉 기간 (년)
    pub backfill_years: i64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self { backfill_years: 10 }
    }
}

impl SyncConfig {
    /// 환경 변수에서 설정을 생성합니다. `BACKFILL_YEARS`를 사용합니다.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            backfill_years: env_parse("BACKFILL_YEARS", defaults.backfill_years),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.database.max_connections, 5);
        assert_eq!(config.catalog.max_age_hours, 23);
        assert_eq!(config.sync.backfill_years, 10);
        assert!(config.upstox.access_token.is_none());
    }

    #[test]
    fn test_connect_url() {
        let db = DatabaseConfig {
            path: "data/stocks.db".to_string(),
            max_connections: 5,
        };
        assert_eq!(db.connect_url(), "sqlite://data/stocks.db?mode=rwc");
    }
}
