//! OCR 제공자 포트.
//!
//! 디코딩된 프레임에서 텍스트와 바운딩 박스를 추출하는 인터페이스를 정의한다.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::models::frame::Frame;

/// OCR 결과 (제공자 무관 표준 구조)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrResult {
    /// 인식된 텍스트
    pub text: String,
    /// 바운딩 박스 X 좌표
    pub x: i32,
    /// 바운딩 박스 Y 좌표
    pub y: i32,
    /// 바운딩 박스 너비
    pub width: u32,
    /// 바운딩 박스 높이
    pub height: u32,
    /// 인식 신뢰도 (0.0 ~ 1.0)
    pub confidence: f64,
}

/// OCR 제공자
///
/// 구현체: `LocalOcrProvider` (Tesseract, `ocr` feature)
#[async_trait]
pub trait OcrProvider: Send + Sync {
    /// 프레임에서 텍스트 + 바운딩 박스 추출
    async fn extract_elements(&self, frame: &Frame) -> Result<Vec<OcrResult>, CoreError>;

    /// 제공자 이름 (예: "local-tesseract")
    fn provider_name(&self) -> &str;

    /// 외부 API인지 여부
    fn is_external(&self) -> bool;
}
