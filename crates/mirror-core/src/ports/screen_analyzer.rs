//! 화면 분석기 포트.

use async_trait::async_trait;

use crate::error::CoreError;
use crate::models::analysis::{AnalysisRequest, ScreenAnalysis};
use crate::models::frame::Frame;

/// 프레임을 분석해 화면 이해와 제안 명령을 만든다.
///
/// 구현체: `HeuristicAnalyzer`, `OcrAnalyzer`, `VisionModelAnalyzer` (mirror-vision)
#[async_trait]
pub trait ScreenAnalyzer: Send + Sync {
    /// 프레임 분석
    async fn analyze(
        &self,
        frame: &Frame,
        request: &AnalysisRequest,
    ) -> Result<ScreenAnalysis, CoreError>;

    /// 분석기 이름 (예: "heuristic", "ocr", "vision-model")
    fn name(&self) -> &str;
}
