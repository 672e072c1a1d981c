//! 접근성 서비스 포트.

use async_trait::async_trait;

use crate::error::CoreError;
use crate::models::element::AccessibilityNode;

/// 휴대폰 접근성 트리 조회/조작
///
/// 구현체: `ReportedAccessibilityTree` (mirror-automation)
#[async_trait]
pub trait AccessibilityService: Send + Sync {
    /// 요소 ID로 조회
    async fn find_by_id(
        &self,
        device_id: &str,
        element_id: &str,
    ) -> Result<Option<AccessibilityNode>, CoreError>;

    /// 텍스트로 조회 (일치도 내림차순)
    async fn find_by_text(
        &self,
        device_id: &str,
        text: &str,
    ) -> Result<Vec<AccessibilityNode>, CoreError>;

    /// 요소 활성화 (탭)
    async fn activate(&self, device_id: &str, node: &AccessibilityNode) -> Result<bool, CoreError>;
}
