//! Upstox 종목 카탈로그.
//!
//! 거래소별 전체 종목 목록을 내려받아 EQ 종목만 추려 보관합니다.
//! 목록은 하루 안에 거의 변하지 않으므로 메모리와 파일 두 단계의
//! TTL 캐시를 둡니다. 시계는 주입 가능해서 만료 동작을 테스트할 수
//! 있습니다.

use crate::error::{DataError, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use stockcache_core::{CatalogConfig, Exchange};

const INSTRUMENT_ASSET_BASE: &str =
    "https://assets.upstox.com/market-quote/instruments/exchange";

/// 카탈로그 시계. 기본은 `Utc::now`.
pub type CatalogClock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// 카탈로그의 EQ 종목 한 건.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub symbol: String,
    pub name: String,
    pub exchange: Exchange,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instrument_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub isin: Option<String>,
}

/// Upstox 종목 목록의 원본 행.
#[derive(Debug, Deserialize)]
struct RawInstrument {
    #[serde(default)]
    segment: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    isin: Option<String>,
    #[serde(default)]
    instrument_type: String,
    #[serde(default)]
    instrument_key: Option<String>,
    #[serde(default)]
    trading_symbol: String,
}

/// 파일 캐시 형식. 내려받은 시각을 함께 저장해 TTL을 판정합니다.
#[derive(Debug, Serialize, Deserialize)]
struct FileCache {
    fetched_at: DateTime<Utc>,
    entries: Vec<CatalogEntry>,
}

#[derive(Debug, Clone)]
struct CachedList {
    entries: Vec<CatalogEntry>,
    fetched_at: DateTime<Utc>,
}

/// 거래소별 종목 카탈로그.
pub struct InstrumentCatalog {
    client: reqwest::Client,
    asset_base: String,
    cache_dir: PathBuf,
    max_age: Duration,
    clock: CatalogClock,
    memory: RwLock<HashMap<Exchange, CachedList>>,
}

impl InstrumentCatalog {
    /// 설정으로 카탈로그 생성. 시계는 `Utc::now`.
    pub fn new(config: &CatalogConfig) -> Self {
        Self::with_clock(config, Arc::new(Utc::now))
    }

    /// 시계를 주입해 카탈로그 생성.
    pub fn with_clock(config: &CatalogConfig, clock: CatalogClock) -> Self {
        let client = reqwest::Client::builder()
            .timeout(StdDuration::from_secs(60))
            .gzip(true)
            .build()
            .expect("HTTP 클라이언트 생성 실패");

        Self {
            client,
            asset_base: INSTRUMENT_ASSET_BASE.to_string(),
            cache_dir: PathBuf::from(&config.cache_dir),
            max_age: Duration::hours(config.max_age_hours),
            clock,
            memory: RwLock::new(HashMap::new()),
        }
    }

    /// 거래소의 EQ 종목 목록 (심볼 오름차순).
    pub async fn equity_list(&self, exchange: Exchange) -> Result<Vec<CatalogEntry>> {
        let mut entries = self.entries(exchange).await?;
        entries.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        Ok(entries)
    }

    /// 심볼에 해당하는 카탈로그 항목 조회.
    pub async fn equity_entry(
        &self,
        symbol: &str,
        exchange: Exchange,
    ) -> Result<Option<CatalogEntry>> {
        let target = symbol.trim().to_uppercase();
        let entries = self.entries(exchange).await?;
        Ok(entries.into_iter().find(|e| e.symbol == target))
    }

    /// 심볼의 Upstox 종목 키 조회.
    pub async fn instrument_key(&self, symbol: &str, exchange: Exchange) -> Result<Option<String>> {
        Ok(self
            .equity_entry(symbol, exchange)
            .await?
            .and_then(|entry| entry.instrument_key))
    }

    /// 캐시 계층을 차례로 확인하고 필요하면 내려받습니다.
    async fn entries(&self, exchange: Exchange) -> Result<Vec<CatalogEntry>> {
        {
            let memory = self.memory.read().await;
            if let Some(cached) = memory.get(&exchange) {
                if self.is_fresh(cached.fetched_at) {
                    return Ok(cached.entries.clone());
                }
            }
        }

        if let Some(cached) = self.load_file_cache(exchange).await {
            self.remember(exchange, cached.clone()).await;
            return Ok(cached.entries);
        }

        let entries = self.download(exchange).await?;
        let cached = CachedList {
            entries: entries.clone(),
            fetched_at: (self.clock)(),
        };
        self.store_file_cache(exchange, &cached).await;
        self.remember(exchange, cached).await;
        Ok(entries)
    }

    async fn remember(&self, exchange: Exchange, cached: CachedList) {
        let mut memory = self.memory.write().await;
        memory.insert(exchange, cached);
    }

    fn is_fresh(&self, fetched_at: DateTime<Utc>) -> bool {
        (self.clock)() - fetched_at < self.max_age
    }

    fn file_cache_path(&self, exchange: Exchange) -> PathBuf {
        self.cache_dir
            .join(format!("upstox_{}_instruments.json", exchange.as_str()))
    }

    /// 파일 캐시가 아직 유효하면 읽어옵니다.
    async fn load_file_cache(&self, exchange: Exchange) -> Option<CachedList> {
        let path = self.file_cache_path(exchange);
        let raw = tokio::fs::read(&path).await.ok()?;
        let file_cache: FileCache = match serde_json::from_slice(&raw) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "카탈로그 파일 캐시 파싱 실패, 무시");
                return None;
            }
        };

        if !self.is_fresh(file_cache.fetched_at) {
            debug!(exchange = %exchange, "카탈로그 파일 캐시 만료");
            return None;
        }

        debug!(
            exchange = %exchange,
            count = file_cache.entries.len(),
            "카탈로그 파일 캐시 사용"
        );

        Some(CachedList {
            entries: file_cache.entries,
            fetched_at: file_cache.fetched_at,
        })
    }

    /// 파일 캐시 저장. 실패해도 치명적이지 않으므로 경고만 남깁니다.
    async fn store_file_cache(&self, exchange: Exchange, cached: &CachedList) {
        let path = self.file_cache_path(exchange);
        if let Err(e) = tokio::fs::create_dir_all(&self.cache_dir).await {
            warn!(dir = %self.cache_dir.display(), error = %e, "카탈로그 캐시 디렉터리 생성 실패");
            return;
        }

        let file_cache = FileCache {
            fetched_at: cached.fetched_at,
            entries: cached.entries.clone(),
        };
        match serde_json::to_vec(&file_cache) {
            Ok(bytes) => {
                if let Err(e) = tokio::fs::write(&path, bytes).await {
                    warn!(path = %path.display(), error = %e, "카탈로그 파일 캐시 저장 실패");
                }
            }
            Err(e) => {
                warn!(error = %e, "카탈로그 직렬화 실패");
            }
        }
    }

    /// 거래소 전체 종목 목록을 내려받아 EQ 종목만 남깁니다.
    async fn download(&self, exchange: Exchange) -> Result<Vec<CatalogEntry>> {
        let url = format!("{}/{}.json.gz", self.asset_base, exchange.as_str());

        debug!(exchange = %exchange, url = %url, "Upstox 종목 목록 다운로드");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| DataError::FetchError(format!("종목 목록 다운로드 실패: {}", e)))?;

        if !response.status().is_success() {
            return Err(DataError::FetchError(format!(
                "종목 목록 응답 오류: HTTP {}",
                response.status()
            )));
        }

        let raw: Vec<RawInstrument> = response
            .json()
            .await
            .map_err(|e| DataError::ParseError(format!("종목 목록 파싱 실패: {}", e)))?;

        let entries = filter_equities(raw, exchange);

        info!(
            exchange = %exchange,
            count = entries.len(),
            "Upstox 종목 목록 갱신"
        );

        Ok(entries)
    }
}

/// EQ 세그먼트 종목만 추려 카탈로그 항목으로 변환.
fn filter_equities(raw: Vec<RawInstrument>, exchange: Exchange) -> Vec<CatalogEntry> {
    let segment = exchange.upstox_segment();
    raw.into_iter()
        .filter(|r| r.instrument_type == "EQ" && r.segment == segment && !r.trading_symbol.is_empty())
        .map(|r| CatalogEntry {
            symbol: r.trading_symbol.to_uppercase(),
            name: r.name,
            exchange,
            instrument_key: r.instrument_key,
            isin: r.isin,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn raw(symbol: &str, segment: &str, instrument_type: &str) -> RawInstrument {
        RawInstrument {
            segment: segment.to_string(),
            name: format!("{} Ltd", symbol),
            isin: Some("INE000000000".to_string()),
            instrument_type: instrument_type.to_string(),
            instrument_key: Some(format!("{}|{}", segment, symbol)),
            trading_symbol: symbol.to_string(),
        }
    }

    fn catalog_at(dir: &std::path::Path, now: DateTime<Utc>) -> InstrumentCatalog {
        let config = CatalogConfig {
            cache_dir: dir.to_string_lossy().into_owned(),
            max_age_hours: 23,
        };
        InstrumentCatalog::with_clock(&config, Arc::new(move || now))
    }

    #[test]
    fn test_filter_keeps_only_eq_segment() {
        let rows = vec![
            raw("TCS", "NSE_EQ", "EQ"),
            raw("NIFTYFUT", "NSE_FO", "FUT"),
            raw("INFY", "NSE_EQ", "EQ"),
            raw("SGBMAY31", "NSE_EQ", "SGB"),
        ];

        let entries = filter_equities(rows, Exchange::Nse);
        let symbols: Vec<&str> = entries.iter().map(|e| e.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["TCS", "INFY"]);
        assert_eq!(entries[0].exchange, Exchange::Nse);
        assert!(entries[0].instrument_key.is_some());
    }

    #[tokio::test]
    async fn test_file_cache_round_trip_within_ttl() {
        let dir = std::env::temp_dir().join(format!("catalog-test-{}", std::process::id()));
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let catalog = catalog_at(&dir, now);

        let cached = CachedList {
            entries: filter_equities(vec![raw("TCS", "NSE_EQ", "EQ")], Exchange::Nse),
            fetched_at: now - Duration::hours(1),
        };
        catalog.store_file_cache(Exchange::Nse, &cached).await;

        let loaded = catalog.load_file_cache(Exchange::Nse).await.unwrap();
        assert_eq!(loaded.entries.len(), 1);
        assert_eq!(loaded.entries[0].symbol, "TCS");

        tokio::fs::remove_dir_all(&dir).await.ok();
    }

    #[tokio::test]
    async fn test_file_cache_expires_past_max_age() {
        let dir = std::env::temp_dir().join(format!("catalog-exp-{}", std::process::id()));
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();

        {
            let catalog = catalog_at(&dir, now);
            let cached = CachedList {
                entries: filter_equities(vec![raw("TCS", "NSE_EQ", "EQ")], Exchange::Nse),
                fetched_at: now,
            };
            catalog.store_file_cache(Exchange::Nse, &cached).await;
        }

        // 24시간 뒤: 기본 TTL 23시간을 넘김
        let later = now + Duration::hours(24);
        let catalog = catalog_at(&dir, later);
        assert!(catalog.load_file_cache(Exchange::Nse).await.is_none());

        tokio::fs::remove_dir_all(&dir).await.ok();
    }

    #[tokio::test]
    async fn test_memory_cache_serves_without_file() {
        let dir = std::env::temp_dir().join("catalog-mem-test-never-created");
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let catalog = catalog_at(&dir, now);

        catalog
            .remember(
                Exchange::Bse,
                CachedList {
                    entries: filter_equities(vec![raw("TCS", "BSE_EQ", "EQ")], Exchange::Bse),
                    fetched_at: now,
                },
            )
            .await;

        let key = catalog.instrument_key("tcs", Exchange::Bse).await.unwrap();
        assert_eq!(key.as_deref(), Some("BSE_EQ|TCS"));

        let list = catalog.equity_list(Exchange::Bse).await.unwrap();
        assert_eq!(list.len(), 1);
    }
}
