//! API 핸들러 모듈.

pub mod automation;
pub mod commands;
pub mod frames;
pub mod health;
pub mod sessions;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::error::ApiError;

/// 디바이스 선택 쿼리 (`?device_id=`)
#[derive(Debug, Default, Deserialize)]
pub struct DeviceQuery {
    pub device_id: Option<String>,
}

impl DeviceQuery {
    /// 비어 있지 않은 device_id
    pub fn device(&self) -> Option<&str> {
        self.device_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }
}

/// 에포크 초 (소수점 포함)
pub fn epoch_seconds(at: DateTime<Utc>) -> f64 {
    at.timestamp_millis() as f64 / 1000.0
}

/// blocking 작업 조인 실패 → 500
pub(crate) fn join_error(e: tokio::task::JoinError) -> ApiError {
    ApiError::Internal(format!("작업 실행 실패: {e}"))
}
