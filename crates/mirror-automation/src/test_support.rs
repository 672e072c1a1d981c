//! 테스트 공용 헬퍼와 Mock 포트.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;

use mirror_core::error::CoreError;
use mirror_core::models::analysis::{AnalysisRequest, ScreenAnalysis};
use mirror_core::models::command::Command;
use mirror_core::models::element::{AccessibilityNode, ElementBounds, Point};
use mirror_core::models::frame::{Frame, FrameMetadata};
use mirror_core::models::memory::{ElementMemory, MemoryHit, ScreenRecord, TeachingExample};
use mirror_core::models::teaching::{TeachingRequest, TeachingResponse};
use mirror_core::ports::accessibility::AccessibilityService;
use mirror_core::ports::device::DeviceController;
use mirror_core::ports::memory::MemoryStore;
use mirror_core::ports::screen_analyzer::ScreenAnalyzer;
use mirror_core::ports::teaching::TeachingChannel;
use mirror_core::ports::vision::{ElementLocator, FrameComparator, LocatedElement};

/// 단색 프레임
pub fn solid_frame(device_id: &str, frame_number: u64, value: u8) -> Frame {
    let (width, height) = (32u32, 64u32);
    Frame::new(
        FrameMetadata {
            device_id: device_id.to_string(),
            frame_number,
            frame_number_reported: true,
            timestamp: Utc::now(),
            width,
            height,
            source: None,
        },
        vec![value; (width * height * 4) as usize],
    )
    .unwrap()
}

/// 디바이스 프레임 (회색)
pub fn frame_for(device_id: &str, frame_number: u64) -> Frame {
    solid_frame(device_id, frame_number, 128)
}

/// 버튼 접근성 노드 (100x40, 중심 = (x+50, y+20))
pub fn node_at(element_id: &str, label: &str, x: i32, y: i32) -> AccessibilityNode {
    AccessibilityNode {
        element_id: element_id.to_string(),
        label: Some(label.to_string()),
        role: Some("button".to_string()),
        bounds: ElementBounds::new(x, y, 100, 40),
        enabled: true,
    }
}

pub fn node(element_id: &str, label: &str) -> AccessibilityNode {
    node_at(element_id, label, 100, 200)
}

// ============================================================
// Mock 포트
// ============================================================

#[derive(Default)]
pub struct RecordingDevice {
    pub executed: Mutex<Vec<Command>>,
    pub captures: Mutex<VecDeque<Frame>>,
}

#[async_trait]
impl DeviceController for RecordingDevice {
    async fn execute(&self, _device_id: &str, command: &Command) -> Result<bool, CoreError> {
        self.executed.lock().push(command.clone());
        Ok(true)
    }

    async fn capture_screen(&self, device_id: &str) -> Result<Option<Frame>, CoreError> {
        Ok(Some(
            self.captures
                .lock()
                .pop_front()
                .unwrap_or_else(|| frame_for(device_id, 99)),
        ))
    }
}

#[derive(Default)]
pub struct FixedAccessibility {
    pub nodes: Vec<AccessibilityNode>,
    pub activations: Mutex<Vec<String>>,
}

#[async_trait]
impl AccessibilityService for FixedAccessibility {
    async fn find_by_id(
        &self,
        _device_id: &str,
        element_id: &str,
    ) -> Result<Option<AccessibilityNode>, CoreError> {
        Ok(self.nodes.iter().find(|n| n.element_id == element_id).cloned())
    }

    async fn find_by_text(
        &self,
        _device_id: &str,
        text: &str,
    ) -> Result<Vec<AccessibilityNode>, CoreError> {
        Ok(self
            .nodes
            .iter()
            .filter(|n| n.label.as_deref() == Some(text))
            .cloned()
            .collect())
    }

    async fn activate(&self, _device_id: &str, node: &AccessibilityNode) -> Result<bool, CoreError> {
        self.activations.lock().push(node.element_id.clone());
        Ok(true)
    }
}

pub struct FixedLocator(pub Option<LocatedElement>);

#[async_trait]
impl ElementLocator for FixedLocator {
    async fn locate(
        &self,
        _frame: &Frame,
        _description: &str,
    ) -> Result<Option<LocatedElement>, CoreError> {
        Ok(self.0)
    }

    fn name(&self) -> &str {
        "fixed"
    }
}

/// 호출 순서대로 변화율을 돌려주는 비교기 (소진 후 마지막 값 반복)
pub struct ScriptedComparator(Mutex<VecDeque<f64>>);

impl ScriptedComparator {
    pub fn new(ratios: &[f64]) -> Self {
        Self(Mutex::new(ratios.iter().copied().collect()))
    }
}

impl FrameComparator for ScriptedComparator {
    fn diff_ratio(&self, _before: &Frame, _after: &Frame) -> f64 {
        let mut ratios = self.0.lock();
        if ratios.len() > 1 {
            ratios.pop_front().unwrap_or(0.0)
        } else {
            ratios.front().copied().unwrap_or(0.0)
        }
    }
}

#[derive(Default)]
pub struct InMemoryStore {
    pub screens: Mutex<Vec<(String, ScreenRecord)>>,
    pub elements: Mutex<HashMap<(String, String, String), ElementMemory>>,
    pub examples: Mutex<Vec<(String, TeachingExample)>>,
}

#[async_trait]
impl MemoryStore for InMemoryStore {
    async fn store_screen(&self, user_id: &str, record: &ScreenRecord) -> Result<String, CoreError> {
        let mut screens = self.screens.lock();
        screens.push((user_id.to_string(), record.clone()));
        Ok(screens.len().to_string())
    }

    /// 사용자 기록 최신순 (유사도 계산 없음)
    async fn remember(
        &self,
        user_id: &str,
        _query: &str,
        limit: usize,
    ) -> Result<Vec<MemoryHit>, CoreError> {
        Ok(self
            .screens
            .lock()
            .iter()
            .enumerate()
            .rev()
            .filter(|(_, (user, _))| user == user_id)
            .take(limit)
            .map(|(i, (_, record))| MemoryHit {
                id: i.to_string(),
                content: record.text_content.clone(),
                app: record.app.clone(),
                action: record.action.clone(),
                success: record.success,
                timestamp: Utc::now(),
                relevance: 1.0,
            })
            .collect())
    }

    async fn store_ui_element(
        &self,
        user_id: &str,
        app: &str,
        element_key: &str,
        element: &ElementMemory,
    ) -> Result<(), CoreError> {
        self.elements.lock().insert(
            (user_id.to_string(), app.to_string(), element_key.to_string()),
            element.clone(),
        );
        Ok(())
    }

    async fn get_element_location(
        &self,
        user_id: &str,
        app: &str,
        description: &str,
    ) -> Result<Option<ElementMemory>, CoreError> {
        Ok(self
            .elements
            .lock()
            .get(&(user_id.to_string(), app.to_string(), description.to_string()))
            .cloned())
    }

    async fn record_teaching_example(
        &self,
        user_id: &str,
        example: &TeachingExample,
    ) -> Result<(), CoreError> {
        self.examples.lock().push((user_id.to_string(), example.clone()));
        Ok(())
    }

    async fn teaching_examples(
        &self,
        _user_id: &str,
        _app: &str,
    ) -> Result<Vec<TeachingExample>, CoreError> {
        Ok(Vec::new())
    }
}

impl FixedTeaching {
    pub fn new(answer: Option<Point>) -> Self {
        Self {
            answer,
            requests: Mutex::new(Vec::new()),
        }
    }
}

pub struct FixedTeaching {
    pub answer: Option<Point>,
    pub requests: Mutex<Vec<TeachingRequest>>,
}

#[async_trait]
impl TeachingChannel for FixedTeaching {
    async fn request_teaching(
        &self,
        request: TeachingRequest,
    ) -> Result<Option<TeachingResponse>, CoreError> {
        self.requests.lock().push(request);
        Ok(self.answer.map(|coordinates| TeachingResponse {
            coordinates,
            element: None,
        }))
    }
}

/// 고정 분석 결과를 돌려주는 분석기 (받은 요청 기록)
pub struct FixedAnalyzer {
    pub analysis: ScreenAnalysis,
    pub requests: Mutex<Vec<AnalysisRequest>>,
}

impl FixedAnalyzer {
    pub fn new(analysis: ScreenAnalysis) -> Self {
        Self {
            analysis,
            requests: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ScreenAnalyzer for FixedAnalyzer {
    async fn analyze(
        &self,
        _frame: &Frame,
        request: &AnalysisRequest,
    ) -> Result<ScreenAnalysis, CoreError> {
        self.requests.lock().push(request.clone());
        Ok(self.analysis.clone())
    }

    fn name(&self) -> &str {
        "fixed"
    }
}
