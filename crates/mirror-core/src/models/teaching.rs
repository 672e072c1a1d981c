//! 사용자 교육 요청/응답 모델.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::element::{AccessibilityNode, Point};

/// 사용자에게 요소 위치를 묻는 요청
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeachingRequest {
    pub request_id: String,
    pub user_id: String,
    pub device_id: String,
    pub app: String,
    /// 찾지 못한 요소 설명
    pub description: String,
    /// 사용자에게 보여줄 메시지
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl TeachingRequest {
    pub fn new(
        user_id: impl Into<String>,
        device_id: impl Into<String>,
        app: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        let description = description.into();
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            device_id: device_id.into(),
            app: app.into(),
            message: format!("Please show me where '{description}' is"),
            description,
            created_at: Utc::now(),
        }
    }
}

/// 사용자가 알려준 위치
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeachingResponse {
    pub coordinates: Point,
    #[serde(default)]
    pub element: Option<AccessibilityNode>,
}
