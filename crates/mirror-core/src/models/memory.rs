//! 사용자별 메모리 모델.
//!
//! 화면 기록, 요소 위치, 교육 예제는 모두 `user_id` 단위로 격리된다.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::automation::ExecutionMethod;
use super::element::{AccessibilityNode, Point};

/// 저장할 화면 기록
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreenRecord {
    /// 앱 이름
    pub app: String,
    /// 수행 액션 ("observe", "tap" 등)
    pub action: String,
    /// 성공 여부
    pub success: bool,
    /// 실행 방법
    pub method: Option<ExecutionMethod>,
    /// 신뢰도
    pub confidence: f64,
    /// 검색 대상 텍스트 (임베딩 입력)
    pub text_content: String,
    /// 디바이스 식별자
    pub device_id: Option<String>,
    /// 프레임 번호
    pub frame_number: Option<u64>,
}

impl ScreenRecord {
    /// 관찰 기록 (프레임 처리 시)
    pub fn observation(app: impl Into<String>, text_content: impl Into<String>) -> Self {
        Self {
            app: app.into(),
            action: "observe".to_string(),
            success: true,
            method: None,
            confidence: 0.0,
            text_content: text_content.into(),
            device_id: None,
            frame_number: None,
        }
    }
}

/// 메모리 검색 결과
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryHit {
    pub id: String,
    pub content: String,
    pub app: String,
    pub action: String,
    pub success: bool,
    pub timestamp: DateTime<Utc>,
    /// 질의와의 코사인 유사도
    pub relevance: f32,
}

impl MemoryHit {
    /// "Successfully executed {action} on {description}" 형식에서 설명 추출
    pub fn executed_description(&self) -> Option<&str> {
        if !self.success {
            return None;
        }
        self.content
            .strip_prefix("Successfully executed ")
            .and_then(|rest| rest.split_once(" on "))
            .map(|(_, desc)| desc.trim())
            .filter(|desc| !desc.is_empty())
    }
}

/// 기억된 UI 요소 위치
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElementMemory {
    /// 탭 좌표
    pub coordinates: Point,
    /// 접근성 요소 (알려진 경우)
    #[serde(default)]
    pub element: Option<AccessibilityNode>,
    /// 성공률 (0.0 ~ 1.0)
    pub success_rate: f64,
    /// 성공 횟수
    #[serde(default)]
    pub success_count: u32,
    /// 전체 시도 횟수
    #[serde(default)]
    pub total_count: u32,
    /// 사용자 교육으로 학습했는지 여부
    #[serde(default)]
    pub learned_from_user: bool,
    /// 마지막 확인 시각
    pub last_seen: DateTime<Utc>,
}

impl ElementMemory {
    /// 사용자 교육으로 학습한 요소
    pub fn learned(coordinates: Point, element: Option<AccessibilityNode>) -> Self {
        Self {
            coordinates,
            element,
            success_rate: 1.0,
            success_count: 1,
            total_count: 1,
            learned_from_user: true,
            last_seen: Utc::now(),
        }
    }
}

/// 교육 예제 (향후 앱별 모델 보정용)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeachingExample {
    pub app: String,
    pub prompt: String,
    pub response: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(content: &str, success: bool) -> MemoryHit {
        MemoryHit {
            id: "1".to_string(),
            content: content.to_string(),
            app: "Uber".to_string(),
            action: "tap".to_string(),
            success,
            timestamp: Utc::now(),
            relevance: 0.8,
        }
    }

    #[test]
    fn executed_description_parsing() {
        assert_eq!(
            hit("Successfully executed tap on Confirm pickup", true).executed_description(),
            Some("Confirm pickup")
        );
        assert_eq!(hit("Successfully executed tap on Confirm", false).executed_description(), None);
        assert_eq!(hit("Screen text", true).executed_description(), None);
    }

    #[test]
    fn learned_element_is_certain() {
        let memory = ElementMemory::learned(Point::new(1, 2), None);
        assert!(memory.learned_from_user);
        assert_eq!(memory.success_rate, 1.0);
    }
}
