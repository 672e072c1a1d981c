//! 로컬 OCR 제공자: Tesseract 래퍼.
//!
//! `OcrExtractor`를 `OcrProvider` 트레이트로 래핑한다.
//! `ocr` feature 없이 빌드하면 항상 빈 결과를 반환한다.

use async_trait::async_trait;
use std::path::PathBuf;

use mirror_core::error::CoreError;
use mirror_core::models::frame::Frame;
use mirror_core::ports::ocr_provider::{OcrProvider, OcrResult};

/// 로컬 OCR 제공자 (Tesseract 기반)
pub struct LocalOcrProvider {
    #[cfg_attr(not(feature = "ocr"), allow(dead_code))]
    tessdata_path: Option<PathBuf>,
}

impl LocalOcrProvider {
    /// 새 로컬 OCR 제공자 생성
    pub fn new(tessdata_path: Option<PathBuf>) -> Self {
        Self { tessdata_path }
    }

    /// OCR 엔진이 빌드에 포함되었는지 여부
    pub fn is_available() -> bool {
        cfg!(feature = "ocr")
    }
}

impl Default for LocalOcrProvider {
    fn default() -> Self {
        Self::new(None)
    }
}

#[async_trait]
impl OcrProvider for LocalOcrProvider {
    async fn extract_elements(&self, frame: &Frame) -> Result<Vec<OcrResult>, CoreError> {
        #[cfg(feature = "ocr")]
        {
            use crate::ocr::OcrExtractor;

            let extractor = OcrExtractor::new(self.tessdata_path.clone());
            let lines = extractor
                .extract_lines(frame)
                .await
                .map_err(|e| CoreError::OcrError(format!("OCR 추출 실패: {e}")))?;

            Ok(lines
                .into_iter()
                .map(|line| OcrResult {
                    text: line.text,
                    x: line.x,
                    y: line.y,
                    width: line.w.max(0) as u32,
                    height: line.h.max(0) as u32,
                    confidence: (line.confidence.clamp(0, 100) as f64) / 100.0,
                })
                .collect())
        }

        #[cfg(not(feature = "ocr"))]
        {
            let _ = frame;
            Ok(vec![])
        }
    }

    fn provider_name(&self) -> &str {
        "local-tesseract"
    }

    fn is_external(&self) -> bool {
        false
    }
}
