//! 통합 테스트 공용 구성 요소.
//!
//! 라이브러리 크레이트만으로 서버 상태를 조립하고, 실제 TCP 포트에 라우터를 띄운다.

#![allow(dead_code)]

use std::io::Cursor;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use chrono::Utc;
use image::{ImageFormat, Rgba, RgbaImage};
use tokio::net::TcpListener;
use tokio::sync::RwLock;

use mirror_automation::accessibility::ReportedAccessibilityTree;
use mirror_automation::audit::AuditLogger;
use mirror_automation::device::QueueingDeviceController;
use mirror_automation::element_cache::ElementCache;
use mirror_automation::executor::{ExecutorPorts, SelfHealingExecutor};
use mirror_automation::pipeline::AutomationPipeline;
use mirror_automation::scorer::ConfidenceScorer;
use mirror_automation::session::SessionRegistry;
use mirror_automation::teaching::TeachingBroker;
use mirror_core::config::AppConfig;
use mirror_core::error::CoreError;
use mirror_core::models::command::Command;
use mirror_core::models::frame::{Frame, FrameMetadata};
use mirror_core::ports::device::DeviceController;
use mirror_core::ports::memory::MemoryStore;
use mirror_core::ports::ocr_provider::{OcrProvider, OcrResult};
use mirror_core::ports::vision::ElementLocator;
use mirror_storage::embedding::HashingEmbedder;
use mirror_storage::sqlite::SqliteMemoryStore;
use mirror_vision::analyzer::HeuristicAnalyzer;
use mirror_vision::delta::TileFrameComparator;
use mirror_vision::locator::ChainedElementLocator;
use mirror_web::{build_router, AppState, AutomationServices, ServerStats};

/// 테스트 설정 (검증 대기 없음, 교육 비활성)
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default_config();
    config.automation.verify_delay_ms = 0;
    config.automation.teaching_enabled = false;
    config
}

pub fn in_memory_store() -> Arc<dyn MemoryStore> {
    Arc::new(SqliteMemoryStore::open_in_memory(Arc::new(HashingEmbedder::default())).unwrap())
}

/// 휴리스틱 분석기 + 큐 디바이스로 서버 상태 조립
pub fn heuristic_state(config: &AppConfig, memory: Arc<dyn MemoryStore>) -> AppState {
    let sessions = Arc::new(SessionRegistry::new(config.session.clone()));
    let device: Arc<dyn DeviceController> =
        Arc::new(QueueingDeviceController::new(sessions.clone()));
    let heuristic = Arc::new(HeuristicAnalyzer::new(config.vision.clone()));
    let teaching = Arc::new(TeachingBroker::new(config.teaching_timeout()));
    let audit = Arc::new(RwLock::new(AuditLogger::new(
        config.automation.audit_buffer_size,
    )));

    let executor = Arc::new(SelfHealingExecutor::new(
        ExecutorPorts {
            device: device.clone(),
            accessibility: Arc::new(ReportedAccessibilityTree::new(sessions.clone(), device)),
            locator: Arc::new(ChainedElementLocator::new(Vec::new())),
            comparator: Arc::new(TileFrameComparator),
            memory: memory.clone(),
            teaching: teaching.clone(),
        },
        Arc::new(ElementCache::new(config.automation.element_cache_size)),
        audit.clone(),
        config.automation.clone(),
    ));
    let pipeline = Arc::new(AutomationPipeline::new(
        heuristic.clone(),
        memory.clone(),
        Arc::new(ConfidenceScorer::new(config.automation.scorer_history_limit)),
        executor.clone(),
        config.automation.clone(),
    ));

    AppState {
        sessions,
        analyzer: heuristic.clone(),
        heuristic,
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

/// 127.0.0.1 임의 포트에 라우터 실행 → 기본 URL
pub async fn spawn_http(state: AppState) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, build_router(state, 16)).await.unwrap();
    });
    format!("http://{addr}")
}

/// 사용 가능한 로컬 포트 하나
pub fn free_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

/// 단색 PNG base64
pub fn png_base64(width: u32, height: u32, rgba: [u8; 4]) -> String {
    let image = RgbaImage::from_pixel(width, height, Rgba(rgba));
    let mut bytes = Cursor::new(Vec::new());
    image.write_to(&mut bytes, ImageFormat::Png).unwrap();
    base64::engine::general_purpose::STANDARD.encode(bytes.into_inner())
}

/// 단색 프레임
pub fn solid_frame(device_id: &str, width: u32, height: u32, rgba: [u8; 4]) -> Frame {
    let buf = rgba
        .iter()
        .copied()
        .cycle()
        .take((width * height * 4) as usize)
        .collect();
    Frame::new(
        FrameMetadata {
            device_id: device_id.to_string(),
            frame_number: 1,
            frame_number_reported: true,
            timestamp: Utc::now(),
            width,
            height,
            source: None,
        },
        buf,
    )
    .unwrap()
}

/// 명령을 기록하고, 캡처할 때마다 밝기가 바뀌는 화면을 돌려주는 디바이스
#[derive(Default)]
pub struct ScriptedDevice {
    pub executed: Mutex<Vec<Command>>,
    captures: AtomicU32,
}

impl ScriptedDevice {
    pub fn executed(&self) -> Vec<Command> {
        self.executed.lock().unwrap().clone()
    }
}

#[async_trait]
impl DeviceController for ScriptedDevice {
    async fn execute(&self, _device_id: &str, command: &Command) -> Result<bool, CoreError> {
        self.executed.lock().unwrap().push(command.clone());
        Ok(true)
    }

    async fn capture_screen(&self, device_id: &str) -> Result<Option<Frame>, CoreError> {
        let n = self.captures.fetch_add(1, Ordering::SeqCst);
        let shade = if n % 2 == 0 { 200 } else { 90 };
        Ok(Some(solid_frame(device_id, 64, 64, [shade, shade, shade, 255])))
    }
}

/// 고정 OCR 결과를 돌려주는 제공자
pub struct FixedOcr(pub Vec<OcrResult>);

#[async_trait]
impl OcrProvider for FixedOcr {
    async fn extract_elements(&self, _frame: &Frame) -> Result<Vec<OcrResult>, CoreError> {
        Ok(self.0.clone())
    }

    fn provider_name(&self) -> &str {
        "fixed"
    }

    fn is_external(&self) -> bool {
        false
    }
}

pub fn ocr_line(text: &str, x: i32, y: i32, width: u32, height: u32) -> OcrResult {
    OcrResult {
        text: text.to_string(),
        x,
        y,
        width,
        height,
        confidence: 0.99,
    }
}

/// 스크립트 디바이스 + 지정 저장소/위치 추정기로 실행기 조립
pub fn scripted_executor(
    config: &AppConfig,
    device: Arc<ScriptedDevice>,
    memory: Arc<dyn MemoryStore>,
    locator: Arc<dyn ElementLocator>,
    teaching: Arc<TeachingBroker>,
) -> (SelfHealingExecutor, Arc<RwLock<AuditLogger>>) {
    let sessions = Arc::new(SessionRegistry::new(config.session.clone()));
    let device: Arc<dyn DeviceController> = device;
    let audit = Arc::new(RwLock::new(AuditLogger::new(100)));
    let executor = SelfHealingExecutor::new(
        ExecutorPorts {
            device: device.clone(),
            accessibility: Arc::new(ReportedAccessibilityTree::new(sessions, device)),
            locator,
            comparator: Arc::new(TileFrameComparator),
            memory,
            teaching,
        },
        Arc::new(ElementCache::new(64)),
        audit.clone(),
        config.automation.clone(),
    );
    (executor, audit)
}

/// 교육 요청이 올라올 때까지 대기
pub async fn wait_for_teaching(broker: &TeachingBroker) -> String {
    for _ in 0..200 {
        if let Some(request) = broker.pending().into_iter().next() {
            return request.request_id;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("교육 요청이 올라오지 않음");
}
