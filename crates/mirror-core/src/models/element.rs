//! 화면 요소 모델.
//!
//! 분석기가 찾아낸 UI 요소, 휴대폰이 보고한 접근성 노드, 화면 좌표를 정의한다.

use serde::{Deserialize, Serialize};

/// 화면 좌표 (픽셀)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl From<(i32, i32)> for Point {
    fn from((x, y): (i32, i32)) -> Self {
        Self { x, y }
    }
}

/// 화면에서 발견된 UI 요소
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiElement {
    /// 요소 텍스트 (없으면 빈 문자열)
    #[serde(default)]
    pub text: String,
    /// 요소 경계 영역
    pub bounds: ElementBounds,
    /// 요소 역할 (button, text_field, tab_bar 등)
    pub role: Option<String>,
    /// 탐색 신뢰도 (0.0 ~ 1.0)
    pub confidence: f64,
    /// 탭 가능 여부
    #[serde(default = "default_clickable")]
    pub clickable: bool,
    /// 탐색 소스
    pub source: FinderSource,
}

fn default_clickable() -> bool {
    true
}

impl UiElement {
    /// 요소 중심 좌표
    pub fn center(&self) -> Point {
        self.bounds.center().into()
    }

    /// 표시용 라벨 (텍스트가 없으면 역할)
    pub fn label(&self) -> &str {
        if self.text.is_empty() {
            self.role.as_deref().unwrap_or("element")
        } else {
            &self.text
        }
    }
}

/// UI 요소의 경계 영역 (화면 좌표)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementBounds {
    /// 좌상단 X 좌표
    pub x: i32,
    /// 좌상단 Y 좌표
    pub y: i32,
    /// 너비
    pub width: u32,
    /// 높이
    pub height: u32,
}

impl ElementBounds {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// 경계 영역의 중심 좌표 반환 (i32 범위에서 포화)
    pub fn center(&self) -> (i32, i32) {
        (
            self.x.saturating_add(extent(self.width / 2)),
            self.y.saturating_add(extent(self.height / 2)),
        )
    }

    /// 지정 좌표가 경계 영역 내에 있는지 확인
    pub fn contains(&self, px: i32, py: i32) -> bool {
        px >= self.x
            && px < self.x.saturating_add(extent(self.width))
            && py >= self.y
            && py < self.y.saturating_add(extent(self.height))
    }

    /// 가로/세로 비율 (높이 0이면 0)
    pub fn aspect_ratio(&self) -> f64 {
        if self.height == 0 {
            0.0
        } else {
            self.width as f64 / self.height as f64
        }
    }
}

fn extent(length: u32) -> i32 {
    i32::try_from(length).unwrap_or(i32::MAX)
}

/// UI 요소를 발견한 소스
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinderSource {
    /// OCR 텍스트 인식
    Ocr,
    /// 휴대폰 접근성 트리
    Accessibility,
    /// 에지 기반 레이아웃 검출
    Layout,
    /// 비전-언어 모델
    VisionModel,
    /// 사용자 메모리
    Memory,
    /// 사용자 교육
    User,
}

/// 휴대폰이 프레임과 함께 보고하는 접근성 노드
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessibilityNode {
    /// 플랫폼 요소 식별자
    pub element_id: String,
    /// 접근성 라벨
    #[serde(default)]
    pub label: Option<String>,
    /// 역할 (button, cell 등)
    #[serde(default)]
    pub role: Option<String>,
    /// 화면 영역
    pub bounds: ElementBounds,
    /// 활성화 여부
    #[serde(default = "default_clickable")]
    pub enabled: bool,
}

/// 텍스트 유사도 (대소문자 무시)
///
/// 완전 일치 1.0, 부분 포함은 길이 비율, 그 외 0.0.
pub fn text_similarity(text: &str, query: &str) -> f64 {
    let text_lower = text.to_lowercase();
    let query_lower = query.to_lowercase();

    if query_lower.is_empty() || text_lower.is_empty() {
        0.0
    } else if text_lower == query_lower {
        1.0
    } else if text_lower.contains(&query_lower) {
        query_lower.len() as f64 / text_lower.len() as f64
    } else if query_lower.contains(&text_lower) {
        text_lower.len() as f64 / query_lower.len() as f64
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn similarity_scores() {
        assert_eq!(text_similarity("Login", "login"), 1.0);
        assert!((text_similarity("Login now", "login") - 5.0 / 9.0).abs() < 1e-9);
        assert!((text_similarity("OK", "OK button") - 2.0 / 9.0).abs() < 1e-9);
        assert_eq!(text_similarity("Cancel", "login"), 0.0);
        assert_eq!(text_similarity("", "login"), 0.0);
    }

    #[test]
    fn bounds_center_and_contains() {
        let bounds = ElementBounds::new(100, 200, 80, 40);
        assert_eq!(bounds.center(), (140, 220));
        assert!(bounds.contains(100, 200));
        assert!(bounds.contains(179, 239));
        assert!(!bounds.contains(180, 240));
        assert!((bounds.aspect_ratio() - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn extreme_bounds_saturate() {
        let bounds = ElementBounds::new(i32::MAX - 10, 0, u32::MAX, 100);
        assert_eq!(bounds.center(), (i32::MAX, 50));
        assert!(bounds.contains(i32::MAX - 1, 10));
        assert!(!bounds.contains(i32::MAX - 11, 10));
    }

    #[test]
    fn zero_height_aspect_ratio() {
        assert_eq!(ElementBounds::new(0, 0, 10, 0).aspect_ratio(), 0.0);
    }

    #[test]
    fn element_label_falls_back_to_role() {
        let element = UiElement {
            text: String::new(),
            bounds: ElementBounds::new(0, 0, 10, 10),
            role: Some("button".to_string()),
            confidence: 0.9,
            clickable: true,
            source: FinderSource::Layout,
        };
        assert_eq!(element.label(), "button");
        assert_eq!(element.center(), Point::new(5, 5));
    }

    #[test]
    fn accessibility_node_defaults() {
        let json = r#"{"element_id":"btn_login","bounds":{"x":0,"y":0,"width":100,"height":40}}"#;
        let node: AccessibilityNode = serde_json::from_str(json).unwrap();
        assert!(node.enabled);
        assert!(node.label.is_none());
    }
}
