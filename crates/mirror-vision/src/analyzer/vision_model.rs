//! 비전-언어 모델 분석기.
//!
//! 프레임을 JPEG로 인코딩해 원격 모델에 보내고 응답을 해석한다.
//! 레이아웃 검출 결과를 프롬프트 컨텍스트로 함께 보낸다.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use mirror_core::error::CoreError;
use mirror_core::models::analysis::{AnalysisRequest, ScreenAnalysis};
use mirror_core::models::element::UiElement;
use mirror_core::models::frame::Frame;
use mirror_core::ports::screen_analyzer::ScreenAnalyzer;
use mirror_core::ports::vision::{ElementLocator, LocatedElement};
use mirror_core::ports::vision_model::{EncodedImage, VisionModel};

use super::join_error;
use crate::decode::{encode_jpeg, MODEL_JPEG_QUALITY};
use crate::layout::detect_layout;
use crate::response;
use crate::rules;

/// 원격 모델 기반 분석기 + 요소 위치 추정기
pub struct VisionModelAnalyzer {
    model: Arc<dyn VisionModel>,
    jpeg_quality: u8,
}

impl VisionModelAnalyzer {
    pub fn new(model: Arc<dyn VisionModel>) -> Self {
        Self {
            model,
            jpeg_quality: MODEL_JPEG_QUALITY,
        }
    }

    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality.clamp(1, 100);
        self
    }

    /// JPEG 인코딩 + 레이아웃 요소 (spawn_blocking)
    async fn prepare(&self, frame: &Frame) -> Result<(EncodedImage, Vec<UiElement>), CoreError> {
        let frame = frame.clone();
        let quality = self.jpeg_quality;
        tokio::task::spawn_blocking(move || {
            let image = encode_jpeg(&frame, quality)?;
            let elements = detect_layout(&frame).to_elements();
            Ok::<_, CoreError>((image, elements))
        })
        .await
        .map_err(join_error)?
    }
}

#[async_trait]
impl ScreenAnalyzer for VisionModelAnalyzer {
    async fn analyze(
        &self,
        frame: &Frame,
        request: &AnalysisRequest,
    ) -> Result<ScreenAnalysis, CoreError> {
        let (image, layout_elements) = self.prepare(frame).await?;
        let prompt = response::build_analysis_prompt(request, &layout_elements);

        debug!(
            model = self.model.model_name(),
            image_bytes = image.bytes.len(),
            "비전 모델 요청"
        );
        let text = self.model.complete(&image, &prompt).await?;
        let parsed = response::parse_model_response(&text, frame.width(), frame.height());

        let detected_app = rules::detect_app(&format!(
            "{} {}",
            parsed.text.join(" "),
            parsed.screen_type.as_deref().unwrap_or_default()
        ))
        .map(String::from);

        info!(
            model = self.model.model_name(),
            commands = parsed.commands.len(),
            confidence = parsed.confidence,
            "비전 모델 분석 완료"
        );

        let elements = if parsed.elements.is_empty() {
            layout_elements
        } else {
            parsed.elements
        };

        Ok(ScreenAnalysis {
            analyzer: "vision-model".to_string(),
            understanding: parsed.understanding,
            screen_type: parsed.screen_type,
            detected_app,
            text: parsed.text,
            elements,
            colors: None,
            commands: parsed.commands,
            confidence: parsed.confidence,
        })
    }

    fn name(&self) -> &str {
        "vision-model"
    }
}

#[async_trait]
impl ElementLocator for VisionModelAnalyzer {
    async fn locate(
        &self,
        frame: &Frame,
        description: &str,
    ) -> Result<Option<LocatedElement>, CoreError> {
        let (image, _) = self.prepare(frame).await?;
        let text = self
            .model
            .complete(&image, &response::build_locate_prompt(description))
            .await?;
        let located = response::parse_locate_response(&text);
        debug!(
            description,
            found = located.is_some(),
            "비전 모델 위치 추정"
        );
        Ok(located)
    }

    fn name(&self) -> &str {
        "vision-model"
    }
}
