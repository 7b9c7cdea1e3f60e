//! 커버리지 기반 동기화 관리자.
//!
//! 요청 범위를 저장소가 이미 덮고 있으면 저장소만 읽고, 부족하면
//! 제공자에게서 받아 저장한 뒤 저장소를 다시 읽어 돌려줍니다. 응답은
//! 항상 저장소를 거치며 제공자 원본 데이터를 그대로 반환하지 않습니다.
//!
//! # 커버리지 규칙
//!
//! `window.min <= from` 이고 `window.max >= to - interval.unit_duration()`
//! 이면 충분합니다. 마지막 한 단위의 여유는 아직 닫히지 않은 최신
//! 캔들 때문에 매 요청마다 다시 받아오는 일을 막습니다.

use crate::error::{DataError, Result};
use crate::provider::CandleProvider;
use crate::storage::{CandleStore, InstrumentRepository, UpsertOutcome};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, instrument, warn};
use stockcache_analytics::{IndicatorColumn, IndicatorRegistry};
use stockcache_core::{Candle, CoverageWindow, Exchange, Instrument, Interval};

/// 키별 중복 요청 직렬화용 잠금 맵.
///
/// 정확성은 INSERT OR IGNORE가 보장하므로 이 잠금은 같은 키에 대한
/// 중복 업스트림 호출을 줄이는 용도입니다.
type FetchLockMap = Arc<RwLock<HashMap<String, Arc<Mutex<()>>>>>;

/// 범위 조회 결과.
#[derive(Debug, Clone)]
pub struct CandleSeries {
    pub candles: Vec<Candle>,
    pub columns: Vec<IndicatorColumn>,
    /// 제공자 조회가 모두 실패해 저장소의 오래된 데이터만 반환한 경우 true
    pub partial: bool,
}

/// 동기화 관리자.
pub struct SyncManager {
    store: CandleStore,
    instruments: InstrumentRepository,
    providers: Vec<Arc<dyn CandleProvider>>,
    registry: Arc<IndicatorRegistry>,
    backfill_years: i64,
    fetch_locks: FetchLockMap,
}

impl SyncManager {
    pub fn new(
        store: CandleStore,
        instruments: InstrumentRepository,
        providers: Vec<Arc<dyn CandleProvider>>,
        registry: Arc<IndicatorRegistry>,
        backfill_years: i64,
    ) -> Self {
        Self {
            store,
            instruments,
            providers,
            registry,
            backfill_years,
            fetch_locks: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// 종목 등록. 메타데이터를 확보하고 신규 종목이면 백필합니다.
    #[instrument(skip(self))]
    pub async fn register(&self, symbol: &str, exchange: Exchange) -> Result<Instrument> {
        let (instrument, newly_registered) = self.ensure_metadata(symbol, exchange).await?;
        if newly_registered {
            self.backfill(&instrument).await;
        }
        Ok(instrument)
    }

    /// 종목 메타데이터와 인터벌의 저장 범위 조회.
    pub async fn instrument_info(
        &self,
        symbol: &str,
        exchange: Exchange,
        interval: Interval,
    ) -> Result<(Instrument, Option<CoverageWindow>)> {
        let instrument = self.register(symbol, exchange).await?;
        let window = self
            .store
            .coverage_window(&instrument.symbol, exchange, interval)
            .await?;
        Ok((instrument, window))
    }

    /// 범위 캔들 조회.
    ///
    /// 커버리지가 부족할 때만 제공자를 호출하고, 항상 저장소를 다시
    /// 읽어 반환합니다. 지표 요청 중 해석 불가능한 항목은 건너뜁니다.
    #[instrument(skip(self, indicators), fields(indicator_count = indicators.len()))]
    pub async fn get_candles(
        &self,
        symbol: &str,
        exchange: Exchange,
        interval: Interval,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        indicators: &[String],
    ) -> Result<CandleSeries> {
        if from > to {
            return Err(DataError::Validation(format!(
                "시작이 종료보다 늦음: {} > {}",
                from, to
            )));
        }

        let (instrument, newly_registered) = self.ensure_metadata(symbol, exchange).await?;
        let symbol = instrument.symbol.as_str();

        let lock = self.get_or_create_lock(symbol, exchange, interval).await;
        let _guard = lock.lock().await;

        if newly_registered {
            self.backfill(&instrument).await;
        }

        let covered = self.is_covered(symbol, exchange, interval, from, to).await?;
        let mut partial = false;

        if !covered {
            match self.fetch_from_providers(&instrument, interval, from, to).await {
                Some(fetched) => {
                    self.store
                        .upsert_candles(symbol, exchange, interval, &fetched)
                        .await?;
                }
                None => {
                    let stored = self.store.count(symbol, exchange, interval).await?;
                    if stored == 0 {
                        return Err(DataError::NoDataAvailable(format!(
                            "{}/{} {}",
                            symbol, exchange, interval
                        )));
                    }
                    warn!(
                        symbol = symbol,
                        exchange = %exchange,
                        interval = %interval,
                        "모든 제공자 실패, 저장된 데이터로 응답"
                    );
                    partial = true;
                }
            }
        }

        let candles = self
            .store
            .query_range(symbol, exchange, interval, from, to)
            .await?;

        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        let mut columns = Vec::new();
        for request in indicators {
            if let Some(mut computed) = self.registry.apply(request, &closes) {
                columns.append(&mut computed);
            }
        }

        debug!(
            symbol = symbol,
            exchange = %exchange,
            interval = %interval,
            candles = candles.len(),
            columns = columns.len(),
            partial = partial,
            "범위 조회 완료"
        );

        Ok(CandleSeries {
            candles,
            columns,
            partial,
        })
    }

    /// 메타데이터 확보. 저장소에 없으면 제공자 순서대로 조회합니다.
    ///
    /// 반환된 bool은 이번 호출로 새로 등록됐는지 여부입니다.
    async fn ensure_metadata(&self, symbol: &str, exchange: Exchange) -> Result<(Instrument, bool)> {
        let normalized = symbol.trim().to_uppercase();
        if let Some(existing) = self.instruments.get(&normalized, exchange).await? {
            return Ok((existing, false));
        }

        for provider in &self.providers {
            match provider.fetch_metadata(&normalized, exchange).await {
                Ok(instrument) => {
                    let outcome = self.instruments.upsert(&instrument).await?;
                    info!(
                        symbol = %instrument.symbol,
                        exchange = %exchange,
                        provider = provider.name(),
                        "종목 메타데이터 등록"
                    );
                    return Ok((instrument, outcome == UpsertOutcome::Inserted));
                }
                Err(e) => {
                    warn!(
                        symbol = %normalized,
                        exchange = %exchange,
                        provider = provider.name(),
                        error = %e,
                        "메타데이터 조회 실패, 다음 제공자 시도"
                    );
                }
            }
        }

        Err(DataError::MetadataUnavailable(format!(
            "{}/{}",
            normalized, exchange
        )))
    }

    /// 신규 종목의 일봉 초기 백필. 실패해도 요청은 계속 진행합니다.
    async fn backfill(&self, instrument: &Instrument) {
        let to = Utc::now();
        let from = to - Duration::days(self.backfill_years * 365);

        match self
            .fetch_from_providers(instrument, Interval::D1, from, to)
            .await
        {
            Some(candles) => {
                match self
                    .store
                    .upsert_candles(&instrument.symbol, instrument.exchange, Interval::D1, &candles)
                    .await
                {
                    Ok(inserted) => {
                        info!(
                            symbol = %instrument.symbol,
                            exchange = %instrument.exchange,
                            inserted = inserted,
                            "신규 종목 일봉 백필 완료"
                        );
                    }
                    Err(e) => {
                        warn!(
                            symbol = %instrument.symbol,
                            error = %e,
                            "백필 데이터 저장 실패"
                        );
                    }
                }
            }
            None => {
                warn!(
                    symbol = %instrument.symbol,
                    exchange = %instrument.exchange,
                    "백필 데이터 조회 실패"
                );
            }
        }
    }

    /// 저장 범위가 요청 범위를 덮는지 확인.
    async fn is_covered(
        &self,
        symbol: &str,
        exchange: Exchange,
        interval: Interval,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<bool> {
        let window = self.store.coverage_window(symbol, exchange, interval).await?;
        Ok(match window {
            Some(w) => w.min_ts <= from && w.max_ts >= to - interval.unit_duration(),
            None => false,
        })
    }

    /// 제공자를 순서대로 시도해 첫 번째 비어 있지 않은 결과를 반환.
    async fn fetch_from_providers(
        &self,
        instrument: &Instrument,
        interval: Interval,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Option<Vec<Candle>> {
        for provider in &self.providers {
            match provider
                .fetch_candles(instrument, interval, from, to)
                .await
            {
                Ok(candles) if !candles.is_empty() => {
                    debug!(
                        provider = provider.name(),
                        symbol = %instrument.symbol,
                        count = candles.len(),
                        "제공자에서 캔들 수신"
                    );
                    return Some(candles);
                }
                Ok(_) => {
                    warn!(
                        provider = provider.name(),
                        symbol = %instrument.symbol,
                        "제공자 응답이 비어 있음, 다음 제공자 시도"
                    );
                }
                Err(e) => {
                    warn!(
                        provider = provider.name(),
                        symbol = %instrument.symbol,
                        error = %e,
                        "제공자 조회 실패, 다음 제공자 시도"
                    );
                }
            }
        }
        None
    }

    async fn get_or_create_lock(
        &self,
        symbol: &str,
        exchange: Exchange,
        interval: Interval,
    ) -> Arc<Mutex<()>> {
        let key = format!("{}:{}:{}", symbol, exchange, interval);

        {
            let locks = self.fetch_locks.read().await;
            if let Some(lock) = locks.get(&key) {
                return Arc::clone(lock);
            }
        }

        let mut locks = self.fetch_locks.write().await;
        Arc::clone(locks.entry(key).or_insert_with(|| Arc::new(Mutex::new(()))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Database;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// 테스트용 프로그래머블 제공자.
    #[derive(Clone)]
    enum MockResponse {
        Candles(Vec<Candle>),
        Empty,
        Fail,
    }

    struct MockProvider {
        name: &'static str,
        response: MockResponse,
        metadata_ok: bool,
        candle_calls: AtomicUsize,
        metadata_calls: AtomicUsize,
    }

    impl MockProvider {
        fn new(name: &'static str, response: MockResponse) -> Arc<Self> {
            Arc::new(Self {
                name,
                response,
                metadata_ok: true,
                candle_calls: AtomicUsize::new(0),
                metadata_calls: AtomicUsize::new(0),
            })
        }

        fn without_metadata(name: &'static str, response: MockResponse) -> Arc<Self> {
            Arc::new(Self {
                name,
                response,
                metadata_ok: false,
                candle_calls: AtomicUsize::new(0),
                metadata_calls: AtomicUsize::new(0),
            })
        }

        fn candle_calls(&self) -> usize {
            self.candle_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CandleProvider for MockProvider {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn fetch_candles(
            &self,
            _instrument: &Instrument,
            _interval: Interval,
            _from: DateTime<Utc>,
            _to: DateTime<Utc>,
        ) -> Result<Vec<Candle>> {
            self.candle_calls.fetch_add(1, Ordering::SeqCst);
            match &self.response {
                MockResponse::Candles(candles) => Ok(candles.clone()),
                MockResponse::Empty => Ok(Vec::new()),
                MockResponse::Fail => Err(DataError::FetchError("mock failure".to_string())),
            }
        }

        async fn fetch_metadata(&self, symbol: &str, exchange: Exchange) -> Result<Instrument> {
            self.metadata_calls.fetch_add(1, Ordering::SeqCst);
            if self.metadata_ok {
                Ok(Instrument::new(symbol, exchange).with_name(symbol.to_uppercase()))
            } else {
                Err(DataError::FetchError("mock metadata failure".to_string()))
            }
        }
    }

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, d, 0, 0, 0).unwrap()
    }

    fn candle(d: u32, close: f64) -> Candle {
        Candle::new(day(d), close - 1.0, close + 2.0, close - 3.0, close, 1_000)
    }

    fn candles(days: std::ops::RangeInclusive<u32>) -> Vec<Candle> {
        days.map(|d| candle(d, 100.0 + d as f64)).collect()
    }

    async fn build_manager(providers: Vec<Arc<MockProvider>>) -> (SyncManager, CandleStore) {
        let db = Database::in_memory().await.unwrap();
        db.migrate().await.unwrap();
        let store = CandleStore::new(db.pool().clone());
        let instruments = InstrumentRepository::new(db.pool().clone());
        let manager = SyncManager::new(
            store.clone(),
            instruments,
            providers
                .into_iter()
                .map(|p| p as Arc<dyn CandleProvider>)
                .collect(),
            Arc::new(IndicatorRegistry::standard()),
            10,
        );
        (manager, store)
    }

    async fn seed_instrument(store_db: &SyncManager, symbol: &str) {
        store_db
            .instruments
            .upsert(&Instrument::new(symbol, Exchange::Nse))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_covered_range_skips_providers() {
        let provider = MockProvider::new("primary", MockResponse::Candles(candles(1..=10)));
        let (manager, store) = build_manager(vec![provider.clone()]).await;
        seed_instrument(&manager, "TCS").await;

        store
            .upsert_candles("TCS", Exchange::Nse, Interval::D1, &candles(1..=20))
            .await
            .unwrap();

        let series = manager
            .get_candles("TCS", Exchange::Nse, Interval::D1, day(5), day(15), &[])
            .await
            .unwrap();

        assert_eq!(provider.candle_calls(), 0);
        assert_eq!(series.candles.len(), 11);
        assert!(!series.partial);
    }

    #[tokio::test]
    async fn test_live_edge_grace_skips_refetch() {
        let provider = MockProvider::new("primary", MockResponse::Candles(candles(1..=10)));
        let (manager, store) = build_manager(vec![provider.clone()]).await;
        seed_instrument(&manager, "TCS").await;

        // 저장 범위가 요청 종료일보다 하루 모자라지만 한 단위 여유 안
        store
            .upsert_candles("TCS", Exchange::Nse, Interval::D1, &candles(1..=14))
            .await
            .unwrap();

        let series = manager
            .get_candles("TCS", Exchange::Nse, Interval::D1, day(5), day(15), &[])
            .await
            .unwrap();

        assert_eq!(provider.candle_calls(), 0);
        assert_eq!(series.candles.len(), 10);
    }

    #[tokio::test]
    async fn test_miss_fetches_persists_and_rereads() {
        let provider = MockProvider::new("primary", MockResponse::Candles(candles(1..=20)));
        let (manager, store) = build_manager(vec![provider.clone()]).await;
        seed_instrument(&manager, "TCS").await;

        let series = manager
            .get_candles("TCS", Exchange::Nse, Interval::D1, day(5), day(15), &[])
            .await
            .unwrap();

        assert_eq!(provider.candle_calls(), 1);
        assert_eq!(series.candles.len(), 11);
        assert!(!series.partial);

        // 저장소를 거쳐 반환됨
        let stored = store.count("TCS", Exchange::Nse, Interval::D1).await.unwrap();
        assert_eq!(stored, 20);
    }

    #[tokio::test]
    async fn test_failover_to_secondary_provider() {
        let primary = MockProvider::new("primary", MockResponse::Empty);
        let fallback = MockProvider::new("fallback", MockResponse::Candles(candles(1..=20)));
        let (manager, store) =
            build_manager(vec![primary.clone(), fallback.clone()]).await;
        seed_instrument(&manager, "TCS").await;

        let series = manager
            .get_candles("TCS", Exchange::Nse, Interval::D1, day(1), day(20), &[])
            .await
            .unwrap();

        assert_eq!(primary.candle_calls(), 1);
        assert_eq!(fallback.candle_calls(), 1);
        assert_eq!(series.candles.len(), 20);
        assert_eq!(store.count("TCS", Exchange::Nse, Interval::D1).await.unwrap(), 20);
    }

    #[tokio::test]
    async fn test_total_failure_empty_store_is_no_data() {
        let primary = MockProvider::new("primary", MockResponse::Fail);
        let fallback = MockProvider::new("fallback", MockResponse::Fail);
        let (manager, _store) = build_manager(vec![primary, fallback]).await;
        seed_instrument(&manager, "TCS").await;

        let result = manager
            .get_candles("TCS", Exchange::Nse, Interval::D1, day(1), day(20), &[])
            .await;

        assert!(matches!(result, Err(DataError::NoDataAvailable(_))));
    }

    #[tokio::test]
    async fn test_total_failure_with_stale_data_sets_partial() {
        let provider = MockProvider::new("primary", MockResponse::Fail);
        let (manager, store) = build_manager(vec![provider]).await;
        seed_instrument(&manager, "TCS").await;

        // 요청 범위 일부만 저장됨
        store
            .upsert_candles("TCS", Exchange::Nse, Interval::D1, &candles(1..=5))
            .await
            .unwrap();

        let series = manager
            .get_candles("TCS", Exchange::Nse, Interval::D1, day(1), day(20), &[])
            .await
            .unwrap();

        assert!(series.partial);
        assert_eq!(series.candles.len(), 5);
    }

    #[tokio::test]
    async fn test_metadata_failover_and_total_failure() {
        let primary = MockProvider::without_metadata("primary", MockResponse::Fail);
        let fallback = MockProvider::new("fallback", MockResponse::Candles(candles(1..=20)));
        let (manager, _store) = build_manager(vec![primary, fallback]).await;

        let instrument = manager.register("tcs", Exchange::Nse).await.unwrap();
        assert_eq!(instrument.symbol, "TCS");

        let none = MockProvider::without_metadata("only", MockResponse::Fail);
        let (manager, _store) = build_manager(vec![none]).await;
        let result = manager.register("TCS", Exchange::Nse).await;
        assert!(matches!(result, Err(DataError::MetadataUnavailable(_))));
    }

    #[tokio::test]
    async fn test_new_instrument_backfills_once() {
        let provider = MockProvider::new("primary", MockResponse::Candles(candles(1..=31)));
        let (manager, store) = build_manager(vec![provider.clone()]).await;

        // 미등록 종목: 메타데이터 조회 후 일봉 백필
        let series = manager
            .get_candles("TCS", Exchange::Nse, Interval::D1, day(1), day(30), &[])
            .await
            .unwrap();

        // 백필이 범위를 덮었으므로 추가 범위 조회가 없음
        assert_eq!(provider.candle_calls(), 1);
        assert_eq!(series.candles.len(), 30);
        assert_eq!(store.count("TCS", Exchange::Nse, Interval::D1).await.unwrap(), 31);

        // 재요청은 저장소만 사용
        manager
            .get_candles("TCS", Exchange::Nse, Interval::D1, day(1), day(30), &[])
            .await
            .unwrap();
        assert_eq!(provider.candle_calls(), 1);
    }

    #[tokio::test]
    async fn test_partition_isolation_between_intervals() {
        let provider = MockProvider::new("primary", MockResponse::Candles(candles(1..=20)));
        let (manager, store) = build_manager(vec![provider.clone()]).await;
        seed_instrument(&manager, "TCS").await;

        manager
            .get_candles("TCS", Exchange::Nse, Interval::D1, day(1), day(20), &[])
            .await
            .unwrap();

        // 일봉 데이터는 주봉 조회의 커버리지에 포함되지 않음
        assert_eq!(store.count("TCS", Exchange::Nse, Interval::W1).await.unwrap(), 0);

        manager
            .get_candles("TCS", Exchange::Nse, Interval::W1, day(1), day(20), &[])
            .await
            .unwrap();
        assert_eq!(provider.candle_calls(), 2);
    }

    #[tokio::test]
    async fn test_indicator_columns_and_unknown_skip() {
        let provider = MockProvider::new("primary", MockResponse::Candles(candles(1..=20)));
        let (manager, _store) = build_manager(vec![provider]).await;
        seed_instrument(&manager, "TCS").await;

        let requests = vec!["SMA_3".to_string(), "FOO_BAR_1".to_string()];
        let series = manager
            .get_candles("TCS", Exchange::Nse, Interval::D1, day(1), day(20), &requests)
            .await
            .unwrap();

        // 알 수 없는 지표는 건너뛰고 SMA 한 컬럼만 생성
        assert_eq!(series.columns.len(), 1);
        assert_eq!(series.columns[0].name, "SMA_3");
        assert!(series.columns[0].values[1].is_none());
        assert!(series.columns[0].values[2].is_some());
        assert_eq!(series.columns[0].values.len(), series.candles.len());
    }

    #[tokio::test]
    async fn test_invalid_range_rejected() {
        let provider = MockProvider::new("primary", MockResponse::Empty);
        let (manager, _store) = build_manager(vec![provider]).await;

        let result = manager
            .get_candles("TCS", Exchange::Nse, Interval::D1, day(10), day(1), &[])
            .await;

        assert!(matches!(result, Err(DataError::Validation(_))));
    }
}
