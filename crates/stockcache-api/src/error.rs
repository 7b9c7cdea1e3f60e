//! 통합 API 에러 응답 타입.
//!
//! 모든 엔드포인트가 같은 `{code, message}` 형식으로 에러를 내려줍니다.
//! 외부 제공자의 에러 본문은 절대 그대로 노출하지 않습니다.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use stockcache_data::DataError;

/// 통합 API 에러 응답.
///
/// # 예시
///
/// ```json
/// {
///   "code": "NO_DATA",
///   "message": "No data available: TCS/NSE 1D"
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorResponse {
    /// 에러 코드 (예: "INVALID_INPUT", "NO_DATA")
    pub code: String,
    /// 사람이 읽을 수 있는 에러 메시지
    pub message: String,
}

impl ApiErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// HTTP 상태 코드가 결정된 API 에러.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ApiErrorResponse,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &str, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ApiErrorResponse::new(code, message),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "INVALID_INPUT", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

impl From<DataError> for ApiError {
    fn from(err: DataError) -> Self {
        match &err {
            DataError::Validation(_) | DataError::UnsupportedInterval(_) => {
                Self::new(StatusCode::BAD_REQUEST, "INVALID_INPUT", err.to_string())
            }
            DataError::NoDataAvailable(_) => {
                Self::new(StatusCode::NOT_FOUND, "NO_DATA", err.to_string())
            }
            DataError::NotFound(_) => {
                Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", err.to_string())
            }
            DataError::MetadataUnavailable(_) => Self::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "METADATA_UNAVAILABLE",
                err.to_string(),
            ),
            _ => Self::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                err.to_string(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_maps_to_bad_request() {
        let err: ApiError = DataError::Validation("bad range".to_string()).into();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.body.code, "INVALID_INPUT");
    }

    #[test]
    fn test_unsupported_interval_maps_to_bad_request() {
        let err: ApiError = DataError::UnsupportedInterval("5m".to_string()).into();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_no_data_maps_to_not_found() {
        let err: ApiError = DataError::NoDataAvailable("TCS/NSE".to_string()).into();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
        assert_eq!(err.body.code, "NO_DATA");
    }

    #[test]
    fn test_metadata_unavailable_maps_to_internal() {
        let err: ApiError = DataError::MetadataUnavailable("TCS/NSE".to_string()).into();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.body.code, "METADATA_UNAVAILABLE");
    }

    #[test]
    fn test_provider_error_maps_to_internal() {
        let err: ApiError = DataError::FetchError("upstream boom".to_string()).into();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.body.code, "INTERNAL_ERROR");
    }
}
