//! `ScreenAnalyzer` 구현체.
//!
//! - [`HeuristicAnalyzer`]: 색상/주기/레이아웃 규칙
//! - [`OcrAnalyzer`]: OCR 텍스트 규칙 + 앱 감지/규칙 + 휴리스틱
//! - [`VisionModelAnalyzer`]: 원격 비전-언어 모델

pub mod heuristic;
pub mod ocr;
pub mod vision_model;

pub use heuristic::{HeuristicAnalyzer, HeuristicReport};
pub use ocr::OcrAnalyzer;
pub use vision_model::VisionModelAnalyzer;

use mirror_core::error::CoreError;

/// 블로킹 작업 JoinError 변환
pub(crate) fn join_error(e: tokio::task::JoinError) -> CoreError {
    CoreError::Internal(format!("분석 작업 실패: {e}"))
}
