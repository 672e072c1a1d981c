//! OCR 텍스트 추출 모듈.
//!
//! `leptess` 기반 Tesseract OCR 래퍼.
//! `ocr` feature flag 활성화 시에만 빌드된다.
//! Tesseract 호출은 블로킹이므로 `spawn_blocking`에서 실행한다.

use std::path::PathBuf;
use thiserror::Error;
use tracing::debug;

use mirror_core::models::frame::Frame;

/// OCR 에러 타입
#[derive(Debug, Error)]
pub enum OcrError {
    /// Tesseract 초기화 실패
    #[error("OCR 초기화 실패: {0}")]
    Init(String),

    /// 이미지 설정 실패
    #[error("OCR 이미지 설정 실패: {0}")]
    ImageSetup(String),

    /// 텍스트 추출 실패
    #[error("OCR 텍스트 추출 실패: {0}")]
    Extraction(String),

    /// 빈 이미지 입력
    #[error("빈 이미지: 너비 또는 높이가 0")]
    EmptyImage,

    /// 비동기 작업 실패
    #[error("OCR 비동기 작업 실패: {0}")]
    Async(String),
}

/// OCR 라인 + 바운딩 박스 결과
#[derive(Debug, Clone)]
pub struct OcrLineBox {
    /// 인식된 텍스트 라인
    pub text: String,
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
    /// 평균 신뢰도 (0 ~ 100)
    pub confidence: i32,
}

/// OCR 텍스트 추출기
pub struct OcrExtractor {
    /// Tesseract 데이터 경로 (None이면 시스템 기본값)
    tessdata_path: Option<PathBuf>,
    /// 인식 언어
    language: String,
}

impl OcrExtractor {
    /// 새 OCR 추출기 생성
    pub fn new(tessdata_path: Option<PathBuf>) -> Self {
        Self {
            tessdata_path,
            language: "eng".to_string(),
        }
    }

    /// 인식 언어 설정 (예: "eng+kor")
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    /// tessdata 경로 반환
    pub fn tessdata_path(&self) -> Option<&PathBuf> {
        self.tessdata_path.as_ref()
    }

    /// 프레임에서 텍스트 라인 단위로 추출 (비동기)
    pub async fn extract_lines(&self, frame: &Frame) -> Result<Vec<OcrLineBox>, OcrError> {
        let (w, h) = (frame.width(), frame.height());
        if w == 0 || h == 0 {
            return Err(OcrError::EmptyImage);
        }

        let tessdata = self
            .tessdata_path
            .as_ref()
            .map(|p| p.to_string_lossy().to_string());
        let language = self.language.clone();
        let raw = frame.rgba.clone();

        tokio::task::spawn_blocking(move || {
            let mut lt = leptess::LepTess::new(tessdata.as_deref(), &language)
                .map_err(|e| OcrError::Init(format!("{e}")))?;

            lt.set_image_from_mem(&raw, w as i32, h as i32, 4, (w * 4) as i32)
                .map_err(|_| OcrError::ImageSetup("이미지 메모리 설정 실패".to_string()))?;

            let boxes = lt
                .get_component_boxes(leptess::capi::TessPageIteratorLevel_RIL_TEXTLINE, true)
                .ok_or_else(|| OcrError::Extraction("라인 박스 추출 실패".to_string()))?;

            let mut lines = Vec::new();
            for b in boxes.iter() {
                let geom = b.get_geometry();
                lt.set_rectangle(geom.x, geom.y, geom.w, geom.h);
                let text = lt
                    .get_utf8_text()
                    .map_err(|e| OcrError::Extraction(format!("{e}")))?;
                let text = text.trim();
                if text.is_empty() {
                    continue;
                }
                lines.push(OcrLineBox {
                    text: text.to_string(),
                    x: geom.x,
                    y: geom.y,
                    w: geom.w,
                    h: geom.h,
                    confidence: lt.mean_text_conf(),
                });
            }

            debug!(lines = lines.len(), "OCR 라인 추출 완료");
            Ok(lines)
        })
        .await
        .map_err(|e| OcrError::Async(format!("작업 조인 실패: {e}")))?
    }
}
