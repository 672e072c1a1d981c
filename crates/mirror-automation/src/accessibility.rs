//! 휴대폰이 보고한 접근성 트리.
//!
//! 프레임과 함께 전송된 노드 목록에서 요소를 찾고,
//! 활성화는 노드 중심 탭 명령으로 디바이스에 전달한다.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use mirror_core::error::CoreError;
use mirror_core::models::command::Command;
use mirror_core::models::element::{text_similarity, AccessibilityNode};
use mirror_core::ports::accessibility::AccessibilityService;
use mirror_core::ports::device::DeviceController;

use crate::session::SessionRegistry;

/// 텍스트 일치 최소 유사도
const MIN_TEXT_SIMILARITY: f64 = 0.5;

/// 보고된 접근성 노드 기반 `AccessibilityService`
pub struct ReportedAccessibilityTree {
    sessions: Arc<SessionRegistry>,
    device: Arc<dyn DeviceController>,
}

impl ReportedAccessibilityTree {
    pub fn new(sessions: Arc<SessionRegistry>, device: Arc<dyn DeviceController>) -> Self {
        Self { sessions, device }
    }
}

#[async_trait]
impl AccessibilityService for ReportedAccessibilityTree {
    async fn find_by_id(
        &self,
        device_id: &str,
        element_id: &str,
    ) -> Result<Option<AccessibilityNode>, CoreError> {
        Ok(self
            .sessions
            .accessibility_nodes(device_id)
            .into_iter()
            .find(|node| node.element_id == element_id))
    }

    async fn find_by_text(
        &self,
        device_id: &str,
        text: &str,
    ) -> Result<Vec<AccessibilityNode>, CoreError> {
        let mut scored: Vec<(f64, AccessibilityNode)> = self
            .sessions
            .accessibility_nodes(device_id)
            .into_iter()
            .filter_map(|node| {
                let score = node
                    .label
                    .as_deref()
                    .map_or(0.0, |label| text_similarity(label, text));
                (score >= MIN_TEXT_SIMILARITY).then_some((score, node))
            })
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        debug!(device_id, text, matches = scored.len(), "접근성 텍스트 검색");
        Ok(scored.into_iter().map(|(_, node)| node).collect())
    }

    async fn activate(&self, device_id: &str, node: &AccessibilityNode) -> Result<bool, CoreError> {
        if !node.enabled {
            debug!(device_id, element_id = %node.element_id, "비활성 요소: 활성화 생략");
            return Ok(false);
        }
        let (x, y) = node.bounds.center();
        let reason = format!(
            "accessibility {}",
            node.label.as_deref().unwrap_or(&node.element_id)
        );
        self.device
            .execute(device_id, &Command::tap(x, y, reason))
            .await
    }
}
