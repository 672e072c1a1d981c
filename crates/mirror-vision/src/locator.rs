//! 요소 위치 추정기.
//!
//! OCR 텍스트 일치 기반 `OcrElementLocator`와 여러 추정기를 순서대로 시도하는
//! `ChainedElementLocator`를 제공한다.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use mirror_core::error::CoreError;
use mirror_core::models::element::{text_similarity, ElementBounds};
use mirror_core::models::frame::Frame;
use mirror_core::ports::ocr_provider::{OcrProvider, OcrResult};
use mirror_core::ports::vision::{ElementLocator, LocatedElement};

// ============================================================
// OcrElementLocator
// ============================================================

/// OCR 기반 위치 추정기
///
/// 프레임 OCR → 설명과 텍스트 유사도 계산 → 최고 점수 박스 중심
pub struct OcrElementLocator {
    ocr_provider: Arc<dyn OcrProvider>,
}

impl OcrElementLocator {
    pub fn new(ocr_provider: Arc<dyn OcrProvider>) -> Self {
        Self { ocr_provider }
    }

    /// OCR 결과 중 설명과 가장 잘 맞는 항목 (신뢰도 = OCR 신뢰도 × 유사도)
    fn best_match(results: &[OcrResult], description: &str) -> Option<LocatedElement> {
        results
            .iter()
            .filter_map(|r| {
                let similarity = text_similarity(&r.text, description);
                (similarity > 0.0).then(|| {
                    let bounds = ElementBounds::new(r.x, r.y, r.width, r.height);
                    LocatedElement {
                        coordinates: bounds.center().into(),
                        confidence: r.confidence * similarity,
                    }
                })
            })
            .max_by(|a, b| {
                a.confidence
                    .partial_cmp(&b.confidence)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
    }
}

#[async_trait]
impl ElementLocator for OcrElementLocator {
    async fn locate(
        &self,
        frame: &Frame,
        description: &str,
    ) -> Result<Option<LocatedElement>, CoreError> {
        debug!(
            provider = self.ocr_provider.provider_name(),
            description, "OCR 위치 추정 시작"
        );
        let results = self.ocr_provider.extract_elements(frame).await?;
        let located = Self::best_match(&results, description);
        debug!(
            candidates = results.len(),
            found = located.is_some(),
            "OCR 위치 추정 완료"
        );
        Ok(located)
    }

    fn name(&self) -> &str {
        "ocr"
    }
}

// ============================================================
// ChainedElementLocator
// ============================================================

/// 전략 체인 위치 추정기
///
/// 추정기를 순서대로 시도해 첫 결과를 반환한다. 오류는 로그 후 다음으로 넘어간다.
pub struct ChainedElementLocator {
    locators: Vec<Arc<dyn ElementLocator>>,
}

impl ChainedElementLocator {
    pub fn new(locators: Vec<Arc<dyn ElementLocator>>) -> Self {
        Self { locators }
    }
}

#[async_trait]
impl ElementLocator for ChainedElementLocator {
    async fn locate(
        &self,
        frame: &Frame,
        description: &str,
    ) -> Result<Option<LocatedElement>, CoreError> {
        for locator in &self.locators {
            match locator.locate(frame, description).await {
                Ok(Some(found)) => {
                    debug!(
                        locator = locator.name(),
                        confidence = found.confidence,
                        "체인 추정기 성공"
                    );
                    return Ok(Some(found));
                }
                Ok(None) => {
                    debug!(locator = locator.name(), "결과 없음, 다음 추정기 시도");
                }
                Err(e) => {
                    debug!(locator = locator.name(), error = %e, "추정 실패, 다음 추정기 시도");
                }
            }
        }
        Ok(None)
    }

    fn name(&self) -> &str {
        "chained"
    }
}
