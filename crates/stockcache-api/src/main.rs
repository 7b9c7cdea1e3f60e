//! 주가 데이터 캐시 API 서버.
//!
//! Axum 기반 REST API 서버를 시작합니다. 종목 등록, 캔들 + 지표 조회,
//! 종목 목록, 헬스 체크 엔드포인트를 제공합니다.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use stockcache_analytics::IndicatorRegistry;
use stockcache_api::routes::create_api_router;
use stockcache_api::state::AppState;
use stockcache_core::config::AppConfig;
use stockcache_core::logging::init_logging_from_env;
use stockcache_data::{
    CandleProvider, Database, InstrumentCatalog, SyncManager, UpstoxProvider, YahooProvider,
};
use stockcache_data::storage::{CandleStore, InstrumentRepository};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging_from_env()?;

    let config = AppConfig::from_env();
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;

    // 데이터베이스 연결 및 스키마 준비
    let db = Database::connect(&config.database).await?;
    db.migrate().await?;
    info!(path = %config.database.path, "데이터베이스 준비 완료");

    // 카탈로그와 제공자 체인 구성 (Upstox 1순위, Yahoo 폴백)
    let catalog = Arc::new(InstrumentCatalog::new(&config.catalog));

    if config.upstox.access_token.is_none() {
        warn!("UPSTOX_ACCESS_TOKEN 미설정, Yahoo Finance 폴백만 사용됩니다");
    }

    let upstox = Arc::new(UpstoxProvider::new(
        config.upstox.access_token.clone(),
        Arc::clone(&catalog),
    ));
    let yahoo = Arc::new(YahooProvider::new()?);
    let providers: Vec<Arc<dyn CandleProvider>> = vec![upstox, yahoo];

    let registry = Arc::new(IndicatorRegistry::standard());
    let manager = Arc::new(SyncManager::new(
        CandleStore::new(db.pool().clone()),
        InstrumentRepository::new(db.pool().clone()),
        providers,
        Arc::clone(&registry),
        config.sync.backfill_years,
    ));

    let state = Arc::new(AppState::new(manager, catalog, registry, db));

    let app = create_router(state, config.server.request_timeout_secs);

    info!(%addr, "API 서버 시작");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("서버가 정상적으로 종료되었습니다");

    Ok(())
}

/// 라우터와 공통 미들웨어 조합.
fn create_router(state: Arc<AppState>, timeout_secs: u64) -> Router {
    create_api_router()
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(timeout_secs),
        ))
        .layer(cors_layer())
}

/// CORS 설정.
///
/// # 환경변수
///
/// - `CORS_ORIGINS`: 쉼표로 구분된 허용 origin 목록.
///   미설정이면 모든 origin을 허용합니다 (개발 모드).
fn cors_layer() -> CorsLayer {
    let allow_origin = match std::env::var("CORS_ORIGINS") {
        Ok(origins) if !origins.is_empty() => {
            let origins: Vec<_> = origins
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();

            if origins.is_empty() {
                warn!("CORS_ORIGINS에 유효한 origin이 없어 전체 허용");
                AllowOrigin::any()
            } else {
                info!(count = origins.len(), "CORS origin 제한 설정");
                AllowOrigin::list(origins)
            }
        }
        _ => {
            warn!("CORS_ORIGINS 미설정, 모든 origin 허용 (개발 모드)");
            AllowOrigin::any()
        }
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
        .allow_headers([axum::http::header::CONTENT_TYPE])
}

/// Graceful shutdown 시그널 대기.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            warn!("Ctrl+C 수신, 종료를 시작합니다");
        }
        _ = terminate => {
            warn!("SIGTERM 수신, 종료를 시작합니다");
        }
    }
}
