//! DI 와이어링.
//!
//! 설정에 맞춰 포트 구현체를 고르고 `AppState`를 조립한다.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::RwLock;
use tracing::{info, warn};

use mirror_automation::accessibility::ReportedAccessibilityTree;
use mirror_automation::audit::AuditLogger;
use mirror_automation::device::QueueingDeviceController;
use mirror_automation::element_cache::ElementCache;
use mirror_automation::executor::{ExecutorPorts, SelfHealingExecutor};
use mirror_automation::pipeline::AutomationPipeline;
use mirror_automation::scorer::ConfidenceScorer;
use mirror_automation::session::SessionRegistry;
use mirror_automation::teaching::TeachingBroker;
use mirror_core::config::{AnalyzerBackend, AppConfig};
use mirror_core::config_manager::ConfigManager;
use mirror_core::ports::device::DeviceController;
use mirror_core::ports::memory::MemoryStore;
use mirror_core::ports::ocr_provider::OcrProvider;
use mirror_core::ports::screen_analyzer::ScreenAnalyzer;
use mirror_core::ports::vision::ElementLocator;
use mirror_network::vision_client::RemoteVisionModel;
use mirror_storage::embedding::HashingEmbedder;
use mirror_storage::sqlite::SqliteMemoryStore;
use mirror_vision::analyzer::{HeuristicAnalyzer, OcrAnalyzer, VisionModelAnalyzer};
use mirror_vision::delta::TileFrameComparator;
use mirror_vision::local_ocr_provider::LocalOcrProvider;
use mirror_vision::locator::{ChainedElementLocator, OcrElementLocator};
use mirror_web::{AppState, AutomationServices, ServerStats};

use crate::settings::MEMORY_DB_FILE;

/// 화면 분석기 + 요소 위치 추정기
struct VisionStack {
    analyzer: Arc<dyn ScreenAnalyzer>,
    locator: Arc<dyn ElementLocator>,
}

/// 메모리 DB 경로 결정 (설정 값 또는 플랫폼별 데이터 디렉토리)
///
/// - macOS: `~/Library/Application Support/com.mirror.mirror/memory.db`
/// - Windows: `%APPDATA%\mirror\mirror\data\memory.db`
/// - Linux: `~/.local/share/mirror/memory.db`
fn resolve_db_path(config: &AppConfig) -> PathBuf {
    config
        .memory
        .db_path
        .clone()
        .or_else(|| {
            ConfigManager::data_dir()
                .ok()
                .map(|dir| dir.join(MEMORY_DB_FILE))
        })
        .unwrap_or_else(|| PathBuf::from(MEMORY_DB_FILE))
}

fn build_memory(config: &AppConfig, in_memory: bool) -> Result<Arc<dyn MemoryStore>> {
    let embedder = Arc::new(HashingEmbedder::new(config.memory.embedding_dim));

    let store = if in_memory {
        info!("메모리 저장소: 인메모리 SQLite");
        SqliteMemoryStore::open_in_memory(embedder)?
    } else {
        let path = resolve_db_path(config);
        info!("메모리 저장소: {}", path.display());
        SqliteMemoryStore::open(&path, embedder)
            .with_context(|| format!("메모리 DB 열기 실패: {}", path.display()))?
    };

    Ok(Arc::new(
        store.with_min_similarity(config.memory.min_similarity),
    ))
}

fn build_vision(config: &AppConfig) -> Result<VisionStack> {
    let heuristic = HeuristicAnalyzer::new(config.vision.clone());
    let ocr: Arc<dyn OcrProvider> =
        Arc::new(LocalOcrProvider::new(config.vision.tessdata_path.clone()));

    let mut locators: Vec<Arc<dyn ElementLocator>> = Vec::new();

    let analyzer: Arc<dyn ScreenAnalyzer> = match config.vision.analyzer {
        AnalyzerBackend::Heuristic => Arc::new(heuristic),
        AnalyzerBackend::Ocr => {
            if !LocalOcrProvider::is_available() {
                warn!("OCR 기능 없이 빌드됨 (--features ocr): 텍스트 규칙 없이 휴리스틱만 적용");
            }
            Arc::new(OcrAnalyzer::new(config.vision.clone(), ocr.clone()))
        }
        AnalyzerBackend::VisionModel => match &config.ai_provider.vision_api {
            Some(endpoint) => {
                let model = RemoteVisionModel::new(endpoint).context("비전 모델 클라이언트 생성 실패")?;
                let analyzer = Arc::new(VisionModelAnalyzer::new(Arc::new(model)));
                locators.push(analyzer.clone());
                info!(endpoint = %endpoint.endpoint, "비전 모델 분석기 사용");
                analyzer
            }
            None => {
                warn!("ai_provider.vision_api 설정 없음: 휴리스틱 분석기로 대체");
                Arc::new(heuristic)
            }
        },
    };

    if LocalOcrProvider::is_available() {
        locators.push(Arc::new(OcrElementLocator::new(ocr)));
    }

    info!(
        analyzer = analyzer.name(),
        locators = locators.len(),
        "화면 분석기 구성"
    );

    Ok(VisionStack {
        analyzer,
        locator: Arc::new(ChainedElementLocator::new(locators)),
    })
}

/// 설정으로 서버 상태 조립
pub fn build_state(config: &AppConfig, in_memory: bool) -> Result<AppState> {
    // 1. 저장소
    let memory = build_memory(config, in_memory)?;

    // 2. 화면 분석
    let vision = build_vision(config)?;

    // 3. 디바이스 세션 / 명령 큐
    let sessions = Arc::new(SessionRegistry::new(config.session.clone()));
    let device: Arc<dyn DeviceController> =
        Arc::new(QueueingDeviceController::new(sessions.clone()));

    // 4. 자가 치유 실행기
    let teaching = Arc::new(TeachingBroker::new(config.teaching_timeout()));
    let audit = Arc::new(RwLock::new(AuditLogger::new(
        config.automation.audit_buffer_size,
    )));
    let executor = Arc::new(SelfHealingExecutor::new(
        ExecutorPorts {
            device: device.clone(),
            accessibility: Arc::new(ReportedAccessibilityTree::new(sessions.clone(), device)),
            locator: vision.locator,
            comparator: Arc::new(TileFrameComparator),
            memory: memory.clone(),
            teaching: teaching.clone(),
        },
        Arc::new(ElementCache::new(config.automation.element_cache_size)),
        audit.clone(),
        config.automation.clone(),
    ));

    // 5. 자동화 파이프라인
    let pipeline = Arc::new(AutomationPipeline::new(
        vision.analyzer.clone(),
        memory.clone(),
        Arc::new(ConfidenceScorer::new(
            config.automation.scorer_history_limit,
        )),
        executor.clone(),
        config.automation.clone(),
    ));

    Ok(AppState {
        sessions,
        analyzer: vision.analyzer,
        heuristic: Arc::new(HeuristicAnalyzer::new(config.vision.clone())),
        stats: Arc::new(ServerStats::new()),
        automation: AutomationServices {
            pipeline,
            executor,
            teaching,
            audit,
            memory,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mirror_core::config::{AiProviderType, ExternalApiEndpoint};

    #[test]
    fn heuristic_state_in_memory() {
        let state = build_state(&AppConfig::default_config(), true).unwrap();
        assert_eq!(state.analyzer.name(), "heuristic");
        assert_eq!(state.sessions.len(), 0);
    }

    #[test]
    fn vision_model_without_endpoint_falls_back() {
        let mut config = AppConfig::default_config();
        config.vision.analyzer = AnalyzerBackend::VisionModel;

        let state = build_state(&config, true).unwrap();
        assert_eq!(state.analyzer.name(), "heuristic");
    }

    #[test]
    fn vision_model_with_endpoint() {
        let mut config = AppConfig::default_config();
        config.vision.analyzer = AnalyzerBackend::VisionModel;
        config.ai_provider.vision_api = Some(ExternalApiEndpoint {
            endpoint: "http://127.0.0.1:9/v1/chat/completions".to_string(),
            api_key: "test-key".to_string(),
            model: Some("llava".to_string()),
            timeout_secs: 5,
            provider_type: AiProviderType::OpenAi,
        });

        let state = build_state(&config, true).unwrap();
        assert_eq!(state.analyzer.name(), "vision-model");
    }

    #[test]
    fn ocr_backend_selected() {
        let mut config = AppConfig::default_config();
        config.vision.analyzer = AnalyzerBackend::Ocr;

        let state = build_state(&config, true).unwrap();
        assert_eq!(state.analyzer.name(), "ocr");
    }

    #[test]
    fn file_backed_memory_uses_configured_path() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default_config();
        config.memory.db_path = Some(dir.path().join(MEMORY_DB_FILE));

        build_state(&config, false).unwrap();
        assert!(dir.path().join(MEMORY_DB_FILE).exists());
    }

    #[test]
    fn db_path_prefers_config() {
        let mut config = AppConfig::default_config();
        config.memory.db_path = Some(PathBuf::from("/data/mirror.db"));
        assert_eq!(resolve_db_path(&config), PathBuf::from("/data/mirror.db"));
    }
}
