//! 프레임 → 분석 → 자동화 파이프라인.
//!
//! 프레임을 분석하고 화면을 사용자 메모리에 기록한 뒤, 과거 성공 기록을 참고해
//! 명령 하나를 만들고 점수가 충분하면 자가 치유 실행기로 실행한다.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use mirror_core::config::AutomationConfig;
use mirror_core::error::CoreError;
use mirror_core::models::analysis::{AnalysisRequest, ScreenAnalysis};
use mirror_core::models::automation::{
    ActionKind, AutomationCommand, AutomationTarget, ExecutionResult,
};
use mirror_core::models::command::CommandKind;
use mirror_core::models::element::{text_similarity, UiElement};
use mirror_core::models::frame::Frame;
use mirror_core::models::memory::{MemoryHit, ScreenRecord};
use mirror_core::models::session::HistoryEntry;
use mirror_core::ports::memory::MemoryStore;
use mirror_core::ports::screen_analyzer::ScreenAnalyzer;

use crate::executor::{ExecutionContext, SelfHealingExecutor};
use crate::scorer::{ConfidenceScorer, ScoreContext};

/// 앱을 알 수 없을 때 사용하는 이름
pub const UNKNOWN_APP: &str = "unknown";
/// 기억된 설명과 화면 요소 텍스트가 같다고 볼 최소 유사도
const MEMORY_MATCH_SIMILARITY: f64 = 0.8;

/// 파이프라인 입력
#[derive(Debug, Clone)]
pub struct FrameInput {
    pub user_id: String,
    pub device_id: String,
    pub frame: Frame,
    /// 호출자가 알고 있는 앱
    pub app: Option<String>,
    /// 휴대폰 측 OCR 텍스트
    pub ocr_text: Option<String>,
    /// 자동화 목표
    pub goal: Option<String>,
    /// 최근 상호작용 이력
    pub history: Vec<HistoryEntry>,
}

/// 파이프라인 결과
#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutcome {
    pub user_id: String,
    pub device_id: String,
    pub app: String,
    pub analysis: ScreenAnalysis,
    /// 저장된 화면 기록 ID (저장 실패 시 None)
    pub screen_id: Option<String>,
    /// 회상한 기억
    pub memories: Vec<MemoryHit>,
    /// 생성된 명령 (점수 반영)
    pub command: Option<AutomationCommand>,
    /// 신뢰도 점수
    pub confidence: f64,
    /// 실행 여부
    pub executed: bool,
    /// 실행 결과
    pub result: Option<ExecutionResult>,
    /// 실행하지 않은 사유
    pub reason: Option<String>,
}

/// 자동화 파이프라인
pub struct AutomationPipeline {
    analyzer: Arc<dyn ScreenAnalyzer>,
    memory: Arc<dyn MemoryStore>,
    scorer: Arc<ConfidenceScorer>,
    executor: Arc<SelfHealingExecutor>,
    config: AutomationConfig,
}

impl AutomationPipeline {
    pub fn new(
        analyzer: Arc<dyn ScreenAnalyzer>,
        memory: Arc<dyn MemoryStore>,
        scorer: Arc<ConfidenceScorer>,
        executor: Arc<SelfHealingExecutor>,
        config: AutomationConfig,
    ) -> Self {
        Self {
            analyzer,
            memory,
            scorer,
            executor,
            config,
        }
    }

    /// 프레임 처리
    pub async fn process_frame(&self, input: FrameInput) -> Result<PipelineOutcome, CoreError> {
        let request = AnalysisRequest {
            prompt: None,
            goal: input.goal.clone(),
            history: input.history.clone(),
            ocr_text: input.ocr_text.clone(),
        };
        let analysis = self.analyzer.analyze(&input.frame, &request).await?;

        let app = input
            .app
            .clone()
            .filter(|a| !a.trim().is_empty())
            .or_else(|| analysis.detected_app.clone())
            .unwrap_or_else(|| UNKNOWN_APP.to_string());

        let screen_id = self.store_observation(&input, &app, &analysis).await;
        let memories = match self
            .memory
            .remember(
                &input.user_id,
                &format!("What to do in {app}"),
                self.config.recall_count,
            )
            .await
        {
            Ok(hits) => hits,
            Err(e) => {
                warn!(error = %e, "메모리 회상 실패");
                Vec::new()
            }
        };

        let mut outcome = PipelineOutcome {
            user_id: input.user_id.clone(),
            device_id: input.device_id.clone(),
            app: app.clone(),
            analysis,
            screen_id,
            memories,
            command: None,
            confidence: 0.0,
            executed: false,
            result: None,
            reason: None,
        };

        let Some(mut command) = generate_command(&outcome.analysis, &outcome.memories) else {
            debug!(app = %app, "실행할 명령 없음");
            outcome.reason = Some("No actionable command".to_string());
            return Ok(outcome);
        };

        let learned_from_user = self.is_learned(&input.user_id, &app, &command).await;
        let score = self.scorer.score(&ScoreContext {
            user_id: &input.user_id,
            app: &app,
            command: &command,
            ai_confidence: Some(outcome.analysis.confidence),
            learned_from_user,
        });
        command.confidence = score;
        command.max_retries = self.config.max_retries;
        outcome.confidence = score;

        if !self.config.enabled {
            outcome.command = Some(command);
            outcome.reason = Some("Automation disabled".to_string());
            return Ok(outcome);
        }

        if score <= self.config.execute_threshold {
            debug!(score, threshold = self.config.execute_threshold, "신뢰도 부족: 실행 생략");
            outcome.reason = Some("Low confidence".to_string());
            return Ok(outcome);
        }

        let ctx = ExecutionContext {
            user_id: input.user_id.clone(),
            device_id: input.device_id.clone(),
            app: app.clone(),
            frame: input.frame,
        };
        let result = self.executor.execute(&ctx, command.clone()).await?;
        self.scorer
            .update_history(&input.user_id, &app, &command, result.success);

        info!(
            user_id = %input.user_id,
            app = %app,
            score,
            success = result.success,
            "파이프라인 명령 실행"
        );
        outcome.command = Some(command);
        outcome.executed = true;
        outcome.result = Some(result);
        Ok(outcome)
    }

    async fn store_observation(
        &self,
        input: &FrameInput,
        app: &str,
        analysis: &ScreenAnalysis,
    ) -> Option<String> {
        let text = input
            .ocr_text
            .clone()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| {
                let joined = analysis.joined_text();
                if joined.is_empty() {
                    analysis.understanding.clone()
                } else {
                    joined
                }
            });

        let record = ScreenRecord {
            confidence: analysis.confidence,
            device_id: Some(input.device_id.clone()),
            frame_number: Some(input.frame.metadata.frame_number),
            ..ScreenRecord::observation(app, text)
        };
        match self.memory.store_screen(&input.user_id, &record).await {
            Ok(id) => Some(id),
            Err(e) => {
                warn!(error = %e, "화면 기록 저장 실패");
                None
            }
        }
    }

    async fn is_learned(&self, user_id: &str, app: &str, command: &AutomationCommand) -> bool {
        let description = command.target.description_key();
        if description.is_empty() {
            return false;
        }
        match self
            .memory
            .get_element_location(user_id, app, &description)
            .await
        {
            Ok(memory) => memory.is_some_and(|m| m.learned_from_user),
            Err(e) => {
                warn!(error = %e, "요소 메모리 조회 실패");
                false
            }
        }
    }
}

/// 분석 결과와 기억으로 자동화 명령 생성
///
/// 과거에 성공한 설명과 일치하는 화면 요소가 있으면 그 요소를 누르고,
/// 없으면 분석기가 제안한 첫 탭류/입력 명령을 사용한다.
pub fn generate_command(analysis: &ScreenAnalysis, memories: &[MemoryHit]) -> Option<AutomationCommand> {
    let confidence = analysis.confidence;

    for description in memories.iter().filter_map(MemoryHit::executed_description) {
        let matched = analysis
            .elements
            .iter()
            .find(|e| text_similarity(&e.text, description) >= MEMORY_MATCH_SIMILARITY);
        if let Some(element) = matched {
            let center = element.center();
            return Some(AutomationCommand::tap(
                AutomationTarget {
                    element_id: None,
                    text: Some(element.text.clone()),
                    description: Some(description.to_string()),
                    x: Some(center.x),
                    y: Some(center.y),
                },
                confidence,
            ));
        }
    }

    analysis.commands.iter().find_map(|suggested| {
        let (action, point, text) = match &suggested.kind {
            CommandKind::Tap { x, y } => (ActionKind::Tap, Some((*x, *y)), None),
            CommandKind::DoubleTap { x, y } => (ActionKind::DoubleTap, Some((*x, *y)), None),
            CommandKind::LongPress { x, y, .. } => (ActionKind::LongPress, Some((*x, *y)), None),
            CommandKind::Type { text } => (ActionKind::Type, None, Some(text.clone())),
            _ => return None,
        };

        let overlapping = point.and_then(|(x, y)| element_at(&analysis.elements, x, y));
        let description = overlapping
            .map(|e| e.text.clone())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| suggested.reason.clone());

        Some(AutomationCommand {
            action,
            text,
            ..AutomationCommand::tap(
                AutomationTarget {
                    element_id: None,
                    text: overlapping.map(|e| e.text.clone()).filter(|t| !t.is_empty()),
                    description: Some(description).filter(|d| !d.is_empty()),
                    x: point.map(|p| p.0),
                    y: point.map(|p| p.1),
                },
                confidence,
            )
        })
    })
}

fn element_at(elements: &[UiElement], x: i32, y: i32) -> Option<&UiElement> {
    elements.iter().find(|e| e.bounds.contains(x, y))
}
