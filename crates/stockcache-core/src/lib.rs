//! # StockCache Core
//!
//! 주식 데이터 캐시 서비스의 핵심 도메인 모델 및 타입을 제공합니다.
//!
//! 이 크레이트는 시스템 전반에서 사용되는 기본 타입을 제공합니다:
//! - 캔들 및 종목 구조체
//! - 거래소 및 인터벌 정의
//! - 설정 관리
//! - 로깅 인프라

pub mod config;
pub mod domain;
pub mod logging;
pub mod types;

pub use config::*;
pub use domain::*;
pub use logging::*;
pub use types::*;
