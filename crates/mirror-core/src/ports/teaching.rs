//! 사용자 교육 채널 포트.

use async_trait::async_trait;

use crate::error::CoreError;
use crate::models::teaching::{TeachingRequest, TeachingResponse};

/// 사용자에게 요소 위치를 묻고 응답을 기다린다.
///
/// 구현체: `TeachingBroker` (mirror-automation)
#[async_trait]
pub trait TeachingChannel: Send + Sync {
    /// 교육 요청 (시간 초과 시 None)
    async fn request_teaching(
        &self,
        request: TeachingRequest,
    ) -> Result<Option<TeachingResponse>, CoreError>;
}
