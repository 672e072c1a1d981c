//! 라우터 테스트 헬퍼.

use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use base64::Engine as _;
use image::{ImageFormat, Rgba, RgbaImage};
use serde_json::Value;
use tokio::sync::RwLock;
use tower::ServiceExt;

use mirror_automation::accessibility::ReportedAccessibilityTree;
use mirror_automation::audit::AuditLogger;
use mirror_automation::device::QueueingDeviceController;
use mirror_automation::element_cache::ElementCache;
use mirror_automation::executor::{ExecutorPorts, SelfHealingExecutor};
use mirror_automation::pipeline::AutomationPipeline;
use mirror_automation::scorer::ConfidenceScorer;
use mirror_automation::session::SessionRegistry;
use mirror_automation::teaching::TeachingBroker;
use mirror_core::config::{AutomationConfig, SessionConfig, VisionConfig};
use mirror_core::error::CoreError;
use mirror_core::models::analysis::{AnalysisRequest, ScreenAnalysis};
use mirror_core::models::command::Command;
use mirror_core::models::element::{ElementBounds, FinderSource, UiElement};
use mirror_core::models::frame::Frame;
use mirror_core::ports::device::DeviceController;
use mirror_core::ports::memory::MemoryStore;
use mirror_core::ports::screen_analyzer::ScreenAnalyzer;
use mirror_storage::embedding::HashingEmbedder;
use mirror_storage::sqlite::SqliteMemoryStore;
use mirror_vision::analyzer::HeuristicAnalyzer;
use mirror_vision::delta::TileFrameComparator;
use mirror_vision::locator::ChainedElementLocator;

use crate::{build_router, AppState, AutomationServices, ServerStats};

/// 항상 같은 분석 결과를 돌려주는 분석기
pub struct FixedAnalyzer {
    analysis: ScreenAnalysis,
}

#[async_trait]
impl ScreenAnalyzer for FixedAnalyzer {
    async fn analyze(
        &self,
        _frame: &Frame,
        _request: &AnalysisRequest,
    ) -> Result<ScreenAnalysis, CoreError> {
        Ok(self.analysis.clone())
    }

    fn name(&self) -> &str {
        "fixed"
    }
}

/// 로그인 화면 분석 결과 (Login 버튼 탭 1개)
pub fn login_analysis() -> ScreenAnalysis {
    ScreenAnalysis {
        analyzer: "fixed".to_string(),
        understanding: "Login screen".to_string(),
        screen_type: Some("login".to_string()),
        elements: vec![UiElement {
            text: "Login".to_string(),
            bounds: ElementBounds::new(145, 402, 100, 40),
            role: Some("button".to_string()),
            confidence: 0.9,
            clickable: true,
            source: FinderSource::Ocr,
        }],
        commands: vec![Command::tap(195, 422, "Login screen detected")],
        confidence: 1.0,
        ..Default::default()
    }
}

/// 테스트 상태 (인메모리 SQLite, 교육 비활성, 검증 대기 없음)
pub fn state_with(analysis: ScreenAnalysis) -> AppState {
    let config = AutomationConfig {
        verify_delay_ms: 0,
        teaching_enabled: false,
        ..Default::default()
    };

    let sessions = Arc::new(SessionRegistry::new(SessionConfig::default()));
    let memory: Arc<dyn MemoryStore> = Arc::new(
        SqliteMemoryStore::open_in_memory(Arc::new(HashingEmbedder::default())).unwrap(),
    );
    let analyzer: Arc<dyn ScreenAnalyzer> = Arc::new(FixedAnalyzer { analysis });
    let device: Arc<dyn DeviceController> =
        Arc::new(QueueingDeviceController::new(sessions.clone()));
    let teaching = Arc::new(TeachingBroker::new(Duration::from_secs(5)));
    let audit = Arc::new(RwLock::new(AuditLogger::new(100)));

    let executor = Arc::new(SelfHealingExecutor::new(
        ExecutorPorts {
            device: device.clone(),
            accessibility: Arc::new(ReportedAccessibilityTree::new(sessions.clone(), device)),
            locator: Arc::new(ChainedElementLocator::new(Vec::new())),
            comparator: Arc::new(TileFrameComparator),
            memory: memory.clone(),
            teaching: teaching.clone(),
        },
        Arc::new(ElementCache::new(64)),
        audit.clone(),
        config.clone(),
    ));
    let pipeline = Arc::new(AutomationPipeline::new(
        analyzer.clone(),
        memory.clone(),
        Arc::new(ConfidenceScorer::default()),
        executor.clone(),
        config,
    ));

    AppState {
        sessions,
        analyzer,
        heuristic: Arc::new(HeuristicAnalyzer::new(VisionConfig::default())),
        stats: Arc::new(ServerStats::new()),
        automation: AutomationServices {
            pipeline,
            executor,
            teaching,
            audit,
            memory,
        },
    }
}

pub fn state() -> AppState {
    state_with(login_analysis())
}

pub fn router(state: AppState) -> Router {
    build_router(state, 16)
}

/// 단색 PNG base64
pub fn png_base64(width: u32, height: u32, rgba: [u8; 4]) -> String {
    let image = RgbaImage::from_pixel(width, height, Rgba(rgba));
    let mut bytes = Cursor::new(Vec::new());
    image.write_to(&mut bytes, ImageFormat::Png).unwrap();
    base64::engine::general_purpose::STANDARD.encode(bytes.into_inner())
}

/// 요청 전송 → (상태 코드, JSON 본문)
pub async fn call(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

pub fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

pub fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// 프레임 전송 본문
pub fn frame_body(device_id: &str) -> Value {
    serde_json::json!({
        "image": png_base64(40, 80, [30, 30, 30, 255]),
        "device_id": device_id,
    })
}
