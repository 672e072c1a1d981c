//! 화면 분석 결과 모델.

use serde::{Deserialize, Serialize};

use super::command::Command;
use super::element::UiElement;
use super::session::HistoryEntry;

/// 분석 요청 컨텍스트
#[derive(Debug, Clone, Default)]
pub struct AnalysisRequest {
    /// 호출자 지정 프롬프트
    pub prompt: Option<String>,
    /// 자동화 목표
    pub goal: Option<String>,
    /// 최근 상호작용 이력 (오래된 순)
    pub history: Vec<HistoryEntry>,
    /// 휴대폰 측 OCR 텍스트
    pub ocr_text: Option<String>,
}

/// 대표 색상
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DominantColor {
    /// RGB 값
    pub rgb: [u8; 3],
    /// `#rrggbb` 표기
    pub hex: String,
    /// 샘플 내 비율 (0 ~ 100)
    pub percentage: f64,
}

impl DominantColor {
    pub fn new(rgb: [u8; 3], percentage: f64) -> Self {
        Self {
            rgb,
            hex: format!("#{:02x}{:02x}{:02x}", rgb[0], rgb[1], rgb[2]),
            percentage,
        }
    }
}

/// 색상 통계
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ColorProfile {
    /// 평균 밝기 (0.0 ~ 1.0)
    pub brightness: f64,
    /// 대표 색상 (비율 내림차순)
    pub dominant_colors: Vec<DominantColor>,
    /// 파란 픽셀 비율
    pub blue_ratio: f64,
    /// 흰 픽셀 비율
    pub white_ratio: f64,
    /// 빨간 픽셀 중심 좌표
    pub red_centroid: Option<(i32, i32)>,
}

/// 화면 분석 결과
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScreenAnalysis {
    /// 분석기 이름
    pub analyzer: String,
    /// 화면 이해 요약
    pub understanding: String,
    /// 화면 유형 (login, list, grid 등)
    #[serde(default)]
    pub screen_type: Option<String>,
    /// 감지된 앱
    #[serde(default)]
    pub detected_app: Option<String>,
    /// 인식된 텍스트 라인
    #[serde(default)]
    pub text: Vec<String>,
    /// 발견된 UI 요소
    #[serde(default)]
    pub elements: Vec<UiElement>,
    /// 색상 통계
    #[serde(default)]
    pub colors: Option<ColorProfile>,
    /// 제안 명령
    #[serde(default)]
    pub commands: Vec<Command>,
    /// 분석 신뢰도 (0.0 ~ 1.0)
    #[serde(default)]
    pub confidence: f64,
}

impl ScreenAnalysis {
    /// 빈 분석 결과
    pub fn empty(analyzer: impl Into<String>) -> Self {
        Self {
            analyzer: analyzer.into(),
            ..Default::default()
        }
    }

    /// 인식된 텍스트를 한 줄로 결합
    pub fn joined_text(&self) -> String {
        self.text.join(" ")
    }
}
