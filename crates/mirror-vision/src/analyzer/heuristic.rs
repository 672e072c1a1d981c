//! 휴리스틱 분석기.
//!
//! 색상 통계, 프레임 번호 주기, 레이아웃 검출만으로 명령을 만든다.
//! 외부 모델 없이 동작하는 기본 분석기.

use async_trait::async_trait;
use tracing::debug;

use mirror_core::config::VisionConfig;
use mirror_core::error::CoreError;
use mirror_core::models::analysis::{AnalysisRequest, ColorProfile, ScreenAnalysis};
use mirror_core::models::frame::Frame;
use mirror_core::ports::screen_analyzer::ScreenAnalyzer;

use super::join_error;
use crate::color::{color_stats, dominant_colors, ColorStats};
use crate::layout::{detect_layout, LayoutProfile};
use crate::rules;

/// 명령이 하나라도 있을 때의 신뢰도
const RULE_CONFIDENCE: f64 = 0.6;

/// 휴리스틱 분석 결과 (레이아웃 포함)
#[derive(Debug, Clone)]
pub struct HeuristicReport {
    pub analysis: ScreenAnalysis,
    pub layout: LayoutProfile,
}

/// 색상/주기/레이아웃 규칙 분석기
#[derive(Debug, Clone)]
pub struct HeuristicAnalyzer {
    config: VisionConfig,
}

impl HeuristicAnalyzer {
    pub fn new(config: VisionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &VisionConfig {
        &self.config
    }

    /// 동기 분석 (CPU 작업)
    pub fn analyze_blocking(&self, frame: &Frame) -> Result<HeuristicReport, CoreError> {
        let stats = color_stats(frame);
        let dominant = dominant_colors(frame, self.config.dominant_color_count)?;
        let layout = detect_layout(frame);

        let mut commands = rules::color_rules(&stats, &self.config);
        commands.extend(rules::periodic_rules(&frame.metadata, &self.config));
        commands.extend(rules::layout_rules(&layout, &frame.metadata, &self.config));

        let confidence = if commands.is_empty() {
            0.0
        } else {
            RULE_CONFIDENCE
        };

        debug!(
            frame_number = frame.metadata.frame_number,
            regions = layout.regions.len(),
            commands = commands.len(),
            "휴리스틱 분석 완료"
        );

        let analysis = ScreenAnalysis {
            analyzer: "heuristic".to_string(),
            understanding: self.describe(&stats, &layout),
            screen_type: self.screen_type(&stats, &layout),
            detected_app: None,
            text: Vec::new(),
            elements: layout.to_elements(),
            colors: Some(ColorProfile {
                brightness: stats.brightness,
                dominant_colors: dominant,
                blue_ratio: stats.blue_ratio,
                white_ratio: stats.white_ratio,
                red_centroid: stats.red_centroid,
            }),
            commands,
            confidence,
        };

        Ok(HeuristicReport { analysis, layout })
    }

    /// 비동기 분석 (spawn_blocking)
    pub async fn report(&self, frame: &Frame) -> Result<HeuristicReport, CoreError> {
        let analyzer = self.clone();
        let frame = frame.clone();
        tokio::task::spawn_blocking(move || analyzer.analyze_blocking(&frame))
            .await
            .map_err(join_error)?
    }

    fn is_loading(&self, stats: &ColorStats) -> bool {
        stats.blue_ratio > self.config.blue_ratio_threshold
            || stats.white_ratio > self.config.white_ratio_threshold
    }

    fn screen_type(&self, stats: &ColorStats, layout: &LayoutProfile) -> Option<String> {
        let kind = if self.is_loading(stats) {
            "loading"
        } else if layout.is_list_view() {
            "list"
        } else if !layout.grid_items().is_empty() {
            "grid"
        } else if layout.text_fields().next().is_some() {
            "form"
        } else {
            return None;
        };
        Some(kind.to_string())
    }

    fn describe(&self, stats: &ColorStats, layout: &LayoutProfile) -> String {
        let mut parts = Vec::new();

        if stats.blue_ratio > self.config.blue_ratio_threshold {
            parts.push("blue loading screen".to_string());
        }
        if stats.white_ratio > self.config.white_ratio_threshold {
            parts.push("mostly white screen".to_string());
        }
        if stats.red_centroid.is_some() {
            parts.push("red action element".to_string());
        }

        let buttons = layout.buttons().count();
        if buttons > 0 {
            parts.push(format!("{buttons} button(s)"));
        }
        let fields = layout.text_fields().count();
        if fields > 0 {
            parts.push(format!("{fields} text field(s)"));
        }
        if layout.is_list_view() {
            parts.push(format!(
                "list view ({} separators)",
                layout.horizontal_lines
            ));
        }
        let grid = layout.grid_items().len();
        if grid > 0 {
            parts.push(format!("grid of {grid} items"));
        }

        parts.push(format!("brightness {:.2}", stats.brightness));
        format!("Screen with {}", parts.join(", "))
    }
}

#[async_trait]
impl ScreenAnalyzer for HeuristicAnalyzer {
    async fn analyze(
        &self,
        frame: &Frame,
        _request: &AnalysisRequest,
    ) -> Result<ScreenAnalysis, CoreError> {
        Ok(self.report(frame).await?.analysis)
    }

    fn name(&self) -> &str {
        "heuristic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{draw_rect_outline, frame_from_raw, solid_frame};
    use mirror_core::models::command::CommandKind;

    #[tokio::test]
    async fn blue_screen_waits() {
        let analyzer = HeuristicAnalyzer::new(VisionConfig::default());
        let frame = solid_frame(40, 80, [0, 0, 255, 255]);
        let analysis = analyzer
            .analyze(&frame, &AnalysisRequest::default())
            .await
            .unwrap();

        assert_eq!(analysis.analyzer, "heuristic");
        assert_eq!(analysis.screen_type.as_deref(), Some("loading"));
        assert_eq!(analysis.commands[0].kind, CommandKind::Wait { duration: 2.0 });
        assert!((analysis.confidence - 0.6).abs() < 1e-9);
        let colors = analysis.colors.unwrap();
        assert_eq!(colors.dominant_colors[0].hex, "#0000ff");
    }

    #[tokio::test]
    async fn plain_screen_has_no_commands() {
        let analyzer = HeuristicAnalyzer::new(VisionConfig::default());
        // 프레임 번호 1 → 주기 규칙 미적용
        let frame = solid_frame(40, 80, [120, 120, 120, 255]);
        let analysis = analyzer
            .analyze(&frame, &AnalysisRequest::default())
            .await
            .unwrap();
        assert!(analysis.commands.is_empty());
        assert_eq!(analysis.confidence, 0.0);
        assert!(analysis.understanding.contains("brightness"));
    }

    #[tokio::test]
    async fn detected_button_is_tapped() {
        let (w, h) = (400u32, 300u32);
        let mut rgba = vec![0u8; (w * h * 4) as usize];
        for px in rgba.chunks_exact_mut(4) {
            px.copy_from_slice(&[30, 30, 30, 255]);
        }
        draw_rect_outline(&mut rgba, w, (100, 100, 150, 50), [220, 220, 220, 255]);
        let frame = frame_from_raw(w, h, rgba, 3);

        let report = HeuristicAnalyzer::new(VisionConfig::default())
            .report(&frame)
            .await
            .unwrap();
        assert!(report.layout.buttons().next().is_some());
        assert!(report
            .analysis
            .commands
            .iter()
            .any(|c| c.reason == "Button detected via CV"));
        assert!(report.analysis.understanding.contains("button"));
    }
}
