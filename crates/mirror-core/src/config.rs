//! 애플리케이션 설정 구조체.
//!
//! HTTP 서버, 화면 분석기, 자동 실행기, 사용자 메모리, 세션, AI 제공자 설정을 정의한다.
//! `config` crate를 통해 파일/환경변수에서 로드.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// 최상위 애플리케이션 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP 서버 설정
    #[serde(default)]
    pub server: ServerConfig,
    /// 화면 분석(비전) 설정
    #[serde(default)]
    pub vision: VisionConfig,
    /// 자가 치유 자동화 설정
    #[serde(default)]
    pub automation: AutomationConfig,
    /// 사용자별 벡터 메모리 설정
    #[serde(default)]
    pub memory: MemoryConfig,
    /// 디바이스 세션 설정
    #[serde(default)]
    pub session: SessionConfig,
    /// AI 제공자 설정 (비전 모델)
    #[serde(default)]
    pub ai_provider: AiProviderConfig,
}

// ============================================================
// 서버 설정
// ============================================================

/// HTTP 서버 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// 서버 포트 (기본: 5000)
    #[serde(default = "default_server_port")]
    pub port: u16,
    /// 외부 접근 허용 여부 (false: 127.0.0.1 only)
    ///
    /// 휴대폰이 같은 네트워크에서 접속하므로 기본값은 true.
    #[serde(default = "default_true")]
    pub allow_external: bool,
    /// 요청 본문 최대 크기 (MB)
    #[serde(default = "default_max_body_mb")]
    pub max_body_mb: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_server_port(),
            allow_external: true,
            max_body_mb: default_max_body_mb(),
        }
    }
}

// ============================================================
// 비전 설정
// ============================================================

/// 화면 분석기 백엔드
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AnalyzerBackend {
    /// 색상/레이아웃 휴리스틱 (외부 의존성 없음)
    #[default]
    Heuristic,
    /// OCR 텍스트 규칙 + 휴리스틱
    Ocr,
    /// 원격 비전-언어 모델
    VisionModel,
}

/// 화면 분석 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisionConfig {
    /// 사용할 분석기
    #[serde(default)]
    pub analyzer: AnalyzerBackend,
    /// Tesseract 데이터 경로 (None이면 시스템 기본값)
    #[serde(default)]
    pub tessdata_path: Option<PathBuf>,
    /// 파란 화면(로딩) 판정 비율
    #[serde(default = "default_blue_ratio_threshold")]
    pub blue_ratio_threshold: f64,
    /// 흰 화면(로딩) 판정 비율
    #[serde(default = "default_white_ratio_threshold")]
    pub white_ratio_threshold: f64,
    /// 주기적 중앙 탭 간격 (프레임 수, 0이면 비활성)
    #[serde(default = "default_periodic_tap_interval")]
    pub periodic_tap_interval: u64,
    /// 주기적 스크롤 간격 (프레임 수, 0이면 비활성)
    #[serde(default = "default_periodic_swipe_interval")]
    pub periodic_swipe_interval: u64,
    /// 리스트 화면 스크롤 간격 (프레임 수)
    #[serde(default = "default_list_scroll_interval")]
    pub list_scroll_interval: u64,
    /// 대표 색상 개수
    #[serde(default = "default_dominant_color_count")]
    pub dominant_color_count: usize,
    /// 앱별 자동 스크롤 최소 간격 (초)
    #[serde(default = "default_auto_scroll_interval_secs")]
    pub auto_scroll_interval_secs: u64,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            analyzer: AnalyzerBackend::default(),
            tessdata_path: None,
            blue_ratio_threshold: default_blue_ratio_threshold(),
            white_ratio_threshold: default_white_ratio_threshold(),
            periodic_tap_interval: default_periodic_tap_interval(),
            periodic_swipe_interval: default_periodic_swipe_interval(),
            list_scroll_interval: default_list_scroll_interval(),
            dominant_color_count: default_dominant_color_count(),
            auto_scroll_interval_secs: default_auto_scroll_interval_secs(),
        }
    }
}

// ============================================================
// 자동화 설정
// ============================================================

/// 자가 치유 자동화 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomationConfig {
    /// 자동화 파이프라인 활성화 여부
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// 비전 모델 예측 채택 최소 신뢰도
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,
    /// 파이프라인이 명령을 실행하는 최소 점수
    #[serde(default = "default_execute_threshold")]
    pub execute_threshold: f64,
    /// 접근성 레이어 시도 최소 신뢰도
    #[serde(default = "default_accessibility_gate")]
    pub accessibility_gate: f64,
    /// 최대 재시도 횟수
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// 실행 후 검증까지 대기 시간 (밀리초)
    #[serde(default = "default_verify_delay_ms")]
    pub verify_delay_ms: u64,
    /// 성공으로 판정할 최소 화면 변화율
    #[serde(default = "default_min_screen_change")]
    pub min_screen_change: f64,
    /// 사용자 교육 활성화 여부
    #[serde(default = "default_true")]
    pub teaching_enabled: bool,
    /// 사용자 교육 응답 대기 시간 (초)
    #[serde(default = "default_teaching_timeout_secs")]
    pub teaching_timeout_secs: u64,
    /// 요소 캐시 최대 항목 수
    #[serde(default = "default_element_cache_size")]
    pub element_cache_size: usize,
    /// 신뢰도 이력 키별 최대 보관 수
    #[serde(default = "default_scorer_history_limit")]
    pub scorer_history_limit: usize,
    /// 프레임 처리 시 회상할 메모리 수
    #[serde(default = "default_recall_count")]
    pub recall_count: usize,
    /// 감사 로그 버퍼 크기
    #[serde(default = "default_audit_buffer_size")]
    pub audit_buffer_size: usize,
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            confidence_threshold: default_confidence_threshold(),
            execute_threshold: default_execute_threshold(),
            accessibility_gate: default_accessibility_gate(),
            max_retries: default_max_retries(),
            verify_delay_ms: default_verify_delay_ms(),
            min_screen_change: default_min_screen_change(),
            teaching_enabled: true,
            teaching_timeout_secs: default_teaching_timeout_secs(),
            element_cache_size: default_element_cache_size(),
            scorer_history_limit: default_scorer_history_limit(),
            recall_count: default_recall_count(),
            audit_buffer_size: default_audit_buffer_size(),
        }
    }
}

// ============================================================
// 메모리 설정
// ============================================================

/// 사용자별 벡터 메모리 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// SQLite DB 경로 (None이면 데이터 디렉토리 기본값)
    #[serde(default)]
    pub db_path: Option<PathBuf>,
    /// 임베딩 차원
    #[serde(default = "default_embedding_dim")]
    pub embedding_dim: usize,
    /// 요소 위치 조회 최소 유사도
    #[serde(default = "default_min_similarity")]
    pub min_similarity: f32,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            embedding_dim: default_embedding_dim(),
            min_similarity: default_min_similarity(),
        }
    }
}

// ============================================================
// 세션 설정
// ============================================================

/// 디바이스 세션 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// 세션별 상호작용 이력 최대 길이
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
    /// 세션별 대기 명령 최대 개수 (초과 시 오래된 명령부터 버림)
    #[serde(default = "default_queue_limit")]
    pub queue_limit: usize,
    /// device_id가 없을 때 사용하는 기본값
    #[serde(default = "default_device_id")]
    pub default_device_id: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            history_limit: default_history_limit(),
            queue_limit: default_queue_limit(),
            default_device_id: default_device_id(),
        }
    }
}

// ============================================================
// AI 제공자 설정
// ============================================================

/// AI 제공자 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AiProviderConfig {
    /// 원격 비전 모델 API (analyzer=vision_model일 때 필수)
    #[serde(default)]
    pub vision_api: Option<ExternalApiEndpoint>,
}

/// AI API 제공자 타입: 요청/응답 형식 및 인증 헤더 결정에 사용
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AiProviderType {
    /// Anthropic Claude API: `x-api-key` 헤더 + `/v1/messages` 형식
    Anthropic,
    /// OpenAI 호환 API: `Authorization: Bearer` 헤더 + `/v1/chat/completions` 형식
    OpenAi,
    /// 기타 제공자 (OpenAI 호환 응답 형식으로 파싱)
    #[default]
    Generic,
}

/// 외부 AI API 엔드포인트 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalApiEndpoint {
    /// API URL (예: "https://api.example.com/v1/messages")
    pub endpoint: String,
    /// API 키
    #[serde(default)]
    pub api_key: String,
    /// 모델 이름
    pub model: Option<String>,
    /// 요청 타임아웃 (초)
    #[serde(default = "default_api_timeout_secs")]
    pub timeout_secs: u64,
    /// AI 제공자 타입
    #[serde(default)]
    pub provider_type: AiProviderType,
}

// ============================================================
// 기본값 함수
// ============================================================

fn default_true() -> bool {
    true
}

fn default_server_port() -> u16 {
    5000
}

fn default_max_body_mb() -> usize {
    16
}

fn default_blue_ratio_threshold() -> f64 {
    0.5
}

fn default_white_ratio_threshold() -> f64 {
    0.7
}

fn default_periodic_tap_interval() -> u64 {
    10
}

fn default_periodic_swipe_interval() -> u64 {
    30
}

fn default_list_scroll_interval() -> u64 {
    20
}

fn default_dominant_color_count() -> usize {
    5
}

fn default_auto_scroll_interval_secs() -> u64 {
    5
}

fn default_confidence_threshold() -> f64 {
    0.95
}

fn default_execute_threshold() -> f64 {
    0.7
}

fn default_accessibility_gate() -> f64 {
    0.9
}

fn default_max_retries() -> u32 {
    3
}

fn default_verify_delay_ms() -> u64 {
    500
}

fn default_min_screen_change() -> f64 {
    0.05
}

fn default_teaching_timeout_secs() -> u64 {
    30
}

fn default_element_cache_size() -> usize {
    1_024
}

fn default_scorer_history_limit() -> usize {
    100
}

fn default_recall_count() -> usize {
    3
}

fn default_audit_buffer_size() -> usize {
    1_000
}

fn default_embedding_dim() -> usize {
    256
}

fn default_min_similarity() -> f32 {
    0.35
}

fn default_history_limit() -> usize {
    10
}

fn default_queue_limit() -> usize {
    100
}

fn default_device_id() -> String {
    "unknown".to_string()
}

fn default_api_timeout_secs() -> u64 {
    30
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::default_config()
    }
}

impl AppConfig {
    /// 기본 설정값 반환
    pub fn default_config() -> Self {
        Self {
            server: ServerConfig::default(),
            vision: VisionConfig::default(),
            automation: AutomationConfig::default(),
            memory: MemoryConfig::default(),
            session: SessionConfig::default(),
            ai_provider: AiProviderConfig::default(),
        }
    }

    /// 실행 후 검증 대기 시간을 Duration으로 반환
    pub fn verify_delay(&self) -> Duration {
        Duration::from_millis(self.automation.verify_delay_ms)
    }

    /// 교육 응답 대기 시간을 Duration으로 반환
    pub fn teaching_timeout(&self) -> Duration {
        Duration::from_secs(self.automation.teaching_timeout_secs)
    }
}
