//! 공유 애플리케이션 상태.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use stockcache_analytics::IndicatorRegistry;
use stockcache_data::{Database, InstrumentCatalog, SyncManager};

/// 모든 핸들러가 공유하는 상태.
pub struct AppState {
    pub manager: Arc<SyncManager>,
    pub catalog: Arc<InstrumentCatalog>,
    pub registry: Arc<IndicatorRegistry>,
    pub db: Database,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        manager: Arc<SyncManager>,
        catalog: Arc<InstrumentCatalog>,
        registry: Arc<IndicatorRegistry>,
        db: Database,
    ) -> Self {
        Self {
            manager,
            catalog,
            registry,
            db,
            started_at: Utc::now(),
        }
    }

    /// 서버 가동 시간(초).
    pub fn uptime_secs(&self) -> i64 {
        (Utc::now() - self.started_at).num_seconds()
    }
}
