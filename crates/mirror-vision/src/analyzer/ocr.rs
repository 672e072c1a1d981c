//! OCR 분석기.
//!
//! 텍스트 규칙, 앱 감지, 앱별 규칙을 적용한 뒤 휴리스틱 분석 결과를 덧붙인다.
//! 휴대폰이 OCR 텍스트를 함께 보내면 로컬 OCR을 건너뛴다.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, warn};

use mirror_core::config::VisionConfig;
use mirror_core::error::CoreError;
use mirror_core::models::analysis::{AnalysisRequest, ScreenAnalysis};
use mirror_core::models::element::{ElementBounds, FinderSource, UiElement};
use mirror_core::models::frame::Frame;
use mirror_core::ports::ocr_provider::{OcrProvider, OcrResult};
use mirror_core::ports::screen_analyzer::ScreenAnalyzer;

use super::heuristic::HeuristicAnalyzer;
use crate::rules::{self, AppRuleInput};

/// OCR 규칙이 명령을 만들었을 때의 신뢰도
const TEXT_RULE_CONFIDENCE: f64 = 0.7;

/// OCR + 앱 규칙 분석기
pub struct OcrAnalyzer {
    heuristic: HeuristicAnalyzer,
    ocr: Arc<dyn OcrProvider>,
    auto_scroll_interval: Duration,
    /// 디바이스별 마지막 자동 스크롤 시각
    last_auto_scroll: Mutex<HashMap<String, Instant>>,
}

impl OcrAnalyzer {
    pub fn new(config: VisionConfig, ocr: Arc<dyn OcrProvider>) -> Self {
        let auto_scroll_interval = Duration::from_secs(config.auto_scroll_interval_secs);
        Self {
            heuristic: HeuristicAnalyzer::new(config),
            ocr,
            auto_scroll_interval,
            last_auto_scroll: Mutex::new(HashMap::new()),
        }
    }

    /// 자동 스크롤 허용 여부 확인 후 허용 시 시각 기록
    fn try_auto_scroll(&self, device_id: &str) -> bool {
        let mut last = self.last_auto_scroll.lock();
        let now = Instant::now();
        match last.get(device_id) {
            Some(at) if now.duration_since(*at) < self.auto_scroll_interval => false,
            _ => {
                last.insert(device_id.to_string(), now);
                true
            }
        }
    }

    /// 텍스트 라인 확보 (요청 텍스트 우선, 없으면 OCR)
    async fn text_lines(
        &self,
        frame: &Frame,
        request: &AnalysisRequest,
    ) -> (Vec<String>, Vec<UiElement>) {
        if let Some(text) = request.ocr_text.as_deref().filter(|t| !t.trim().is_empty()) {
            let lines = text
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(String::from)
                .collect();
            return (lines, Vec::new());
        }

        match self.ocr.extract_elements(frame).await {
            Ok(results) => {
                let lines = results.iter().map(|r| r.text.clone()).collect();
                let elements = results.iter().map(ocr_element).collect();
                (lines, elements)
            }
            Err(e) => {
                warn!(provider = self.ocr.provider_name(), "OCR 실패 (무시): {e}");
                (Vec::new(), Vec::new())
            }
        }
    }
}

fn ocr_element(result: &OcrResult) -> UiElement {
    UiElement {
        text: result.text.clone(),
        bounds: ElementBounds::new(result.x, result.y, result.width, result.height),
        role: Some("text".to_string()),
        confidence: result.confidence,
        clickable: true,
        source: FinderSource::Ocr,
    }
}

#[async_trait]
impl ScreenAnalyzer for OcrAnalyzer {
    async fn analyze(
        &self,
        frame: &Frame,
        request: &AnalysisRequest,
    ) -> Result<ScreenAnalysis, CoreError> {
        let (lines, ocr_elements) = self.text_lines(frame, request).await;
        let report = self.heuristic.report(frame).await?;
        let (width, height) = (frame.width(), frame.height());

        let joined = lines.join(" ");
        let mut commands = rules::text_rules(&joined, width, height);
        let detected_app = rules::detect_app(&joined);

        if let Some(app) = detected_app {
            let auto_scroll_allowed = app == "TikTok" && self.try_auto_scroll(&frame.metadata.device_id);
            commands.extend(rules::app_rules(&AppRuleInput {
                app,
                lines: &lines,
                layout: &report.layout,
                width,
                height,
                auto_scroll_allowed,
            }));
        }

        let text_driven = !commands.is_empty();
        let mut analysis = report.analysis;
        commands.append(&mut analysis.commands);

        debug!(
            device_id = %frame.metadata.device_id,
            lines = lines.len(),
            app = detected_app.unwrap_or("unknown"),
            commands = commands.len(),
            "OCR 분석 완료"
        );

        let mut elements = ocr_elements;
        elements.append(&mut analysis.elements);

        let understanding = match (detected_app, lines.is_empty()) {
            (Some(app), _) => format!("{app}: {}", analysis.understanding),
            (None, false) => format!("{} ({} text lines)", analysis.understanding, lines.len()),
            (None, true) => analysis.understanding,
        };

        let screen_type = if joined.contains("Sign in") || joined.contains("Login") {
            Some("login".to_string())
        } else {
            analysis.screen_type
        };

        Ok(ScreenAnalysis {
            analyzer: "ocr".to_string(),
            understanding,
            screen_type,
            detected_app: detected_app.map(String::from),
            text: lines,
            elements,
            colors: analysis.colors,
            confidence: if text_driven {
                TEXT_RULE_CONFIDENCE
            } else {
                analysis.confidence
            },
            commands,
        })
    }

    fn name(&self) -> &str {
        "ocr"
    }
}
