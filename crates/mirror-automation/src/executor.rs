//! 자가 치유 실행기.
//!
//! 고수준 자동화 명령을 다음 순서로 실행한다.
//!
//! 1. 접근성: 명령 신뢰도가 게이트를 넘을 때 요소 ID, 텍스트 순으로 조회
//! 2. 시각: 요소 캐시 → 사용자 메모리 → 위치 추정기 → 명시 좌표, 실행 후 화면 변화 검증
//! 3. 재시도: 좌표 보정 + 신뢰도 감쇠 후 1부터 다시
//! 4. 사용자 교육: 재시도 소진 후 한 번 요청, 응답 좌표를 학습
//!
//! 성공하면 캐시 통계, 요소 메모리, 화면 기록을 갱신한다.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use mirror_core::config::AutomationConfig;
use mirror_core::error::CoreError;
use mirror_core::models::automation::{
    ActionKind, Adjustment, AutomationCommand, ExecutionMethod, ExecutionResult,
};
use mirror_core::models::command::Command;
use mirror_core::models::element::{AccessibilityNode, Point};
use mirror_core::models::frame::Frame;
use mirror_core::models::memory::{ElementMemory, ScreenRecord, TeachingExample};
use mirror_core::models::teaching::{TeachingRequest, TeachingResponse};
use mirror_core::ports::accessibility::AccessibilityService;
use mirror_core::ports::device::DeviceController;
use mirror_core::ports::memory::MemoryStore;
use mirror_core::ports::teaching::TeachingChannel;
use mirror_core::ports::vision::{ElementLocator, FrameComparator};

use crate::audit::{AuditLogger, AuditScope};
use crate::element_cache::ElementCache;

/// 재시도마다 곱하는 신뢰도 감쇠율
const RETRY_CONFIDENCE_DECAY: f64 = 0.9;
/// 접근성 ID 일치 신뢰도
const ACCESSIBILITY_ID_CONFIDENCE: f64 = 0.99;
/// 접근성 텍스트 일치 신뢰도
const ACCESSIBILITY_TEXT_CONFIDENCE: f64 = 0.95;

/// 실행 컨텍스트
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub user_id: String,
    pub device_id: String,
    pub app: String,
    /// 실행 직전 화면
    pub frame: Frame,
}

/// 실행기가 사용하는 포트 묶음
#[derive(Clone)]
pub struct ExecutorPorts {
    pub device: Arc<dyn DeviceController>,
    pub accessibility: Arc<dyn AccessibilityService>,
    pub locator: Arc<dyn ElementLocator>,
    pub comparator: Arc<dyn FrameComparator>,
    pub memory: Arc<dyn MemoryStore>,
    pub teaching: Arc<dyn TeachingChannel>,
}

/// 시각 레이어가 고른 좌표
#[derive(Debug, Clone)]
struct Candidate {
    point: Point,
    method: ExecutionMethod,
    confidence: f64,
    /// 사용자 메모리에서 온 경우 해당 항목
    memory: Option<ElementMemory>,
}

/// 성공한 실행
#[derive(Debug, Clone)]
struct Success {
    method: ExecutionMethod,
    confidence: f64,
    coordinates: Option<Point>,
    element: Option<AccessibilityNode>,
    verified: Option<bool>,
    learned_from_user: bool,
    /// 메모리에서 온 좌표의 기존 (성공, 시도) 횟수
    history: Option<(u32, u32)>,
}

/// 자가 치유 실행기
pub struct SelfHealingExecutor {
    ports: ExecutorPorts,
    cache: Arc<ElementCache>,
    audit: Arc<RwLock<AuditLogger>>,
    config: AutomationConfig,
}

impl SelfHealingExecutor {
    pub fn new(
        ports: ExecutorPorts,
        cache: Arc<ElementCache>,
        audit: Arc<RwLock<AuditLogger>>,
        config: AutomationConfig,
    ) -> Self {
        Self {
            ports,
            cache,
            audit,
            config,
        }
    }

    pub fn config(&self) -> &AutomationConfig {
        &self.config
    }

    /// 자동화 명령 실행
    pub async fn execute(
        &self,
        ctx: &ExecutionContext,
        command: AutomationCommand,
    ) -> Result<ExecutionResult, CoreError> {
        let start = Instant::now();
        let execution_id = uuid::Uuid::new_v4().to_string();
        let scope = AuditScope {
            execution_id: &execution_id,
            user_id: &ctx.user_id,
            device_id: &ctx.device_id,
        };
        let description = command.target.description_key();
        let action_type = format!("{} {}", command.action.as_str(), description);

        self.audit.write().await.log_start(scope, &action_type);
        info!(
            user_id = %ctx.user_id,
            device_id = %ctx.device_id,
            app = %ctx.app,
            action = command.action.as_str(),
            description = %description,
            "자동화 실행 시작"
        );

        let outcome = self.run_layers(ctx, command, &description).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        let mut audit = self.audit.write().await;
        match outcome {
            Ok(mut result) => {
                result.elapsed_ms = elapsed_ms;
                if result.success {
                    let method = result.method.map_or("unknown", |m| m.as_str());
                    audit.log_complete(scope, &action_type, method, elapsed_ms);
                    info!(method, attempts = result.attempts, elapsed_ms, "자동화 실행 성공");
                } else {
                    let error = result.error.as_deref().unwrap_or("실패");
                    audit.log_failed(scope, &action_type, error, elapsed_ms);
                    warn!(error, attempts = result.attempts, elapsed_ms, "자동화 실행 실패");
                }
                Ok(result)
            }
            Err(e) => {
                audit.log_failed(scope, &action_type, &e.to_string(), elapsed_ms);
                warn!(error = %e, elapsed_ms, "자동화 실행 오류");
                Err(e)
            }
        }
    }

    async fn run_layers(
        &self,
        ctx: &ExecutionContext,
        mut command: AutomationCommand,
        description: &str,
    ) -> Result<ExecutionResult, CoreError> {
        let mut current_frame = ctx.frame.clone();
        let mut adjustments: Vec<Adjustment> = Vec::new();
        let mut attempts = 0u32;
        let mut last_point: Option<Point> = None;
        let mut verified: Option<bool> = None;
        let mut last_error = String::from("요소 위치를 찾지 못함");

        loop {
            attempts += 1;

            if command.confidence > self.config.accessibility_gate {
                if let Some(success) = self.try_accessibility(ctx, &command).await? {
                    self.store_success(ctx, &command, description, &success)
                        .await;
                    return Ok(success_result(success, attempts, adjustments));
                }
            }

            match self
                .resolve_visual(ctx, &command, description, &current_frame, attempts > 1)
                .await
            {
                Some(candidate) => {
                    last_point = Some(candidate.point);
                    if self.dispatch(ctx, &command, candidate.point).await? {
                        let (changed, after) = self.verify(&ctx.device_id, &current_frame).await?;
                        verified = Some(changed);
                        if let Some(after) = after {
                            current_frame = after;
                        }

                        if changed {
                            let success = Success {
                                method: candidate.method,
                                confidence: candidate.confidence,
                                coordinates: Some(candidate.point),
                                element: candidate.memory.as_ref().and_then(|m| m.element.clone()),
                                verified: Some(true),
                                learned_from_user: candidate
                                    .memory
                                    .as_ref()
                                    .is_some_and(|m| m.learned_from_user),
                                history: candidate
                                    .memory
                                    .as_ref()
                                    .map(|m| (m.success_count, m.total_count)),
                            };
                            self.store_success(ctx, &command, description, &success)
                                .await;
                            return Ok(success_result(success, attempts, adjustments));
                        }

                        self.record_failure(ctx, description, &candidate).await;
                        last_error = "실행 후 화면 변화 없음".to_string();
                    } else {
                        last_error = "디바이스 명령 전달 실패".to_string();
                    }
                }
                None => {
                    debug!(description, attempts, "시각 레이어 좌표 없음");
                }
            }

            if command.retry_count >= command.max_retries {
                break;
            }

            command.retry_count += 1;
            let adjustment = Adjustment::for_retry(command.retry_count);
            if let Some(base) = last_point.or(command.target.point()) {
                let adjusted = adjustment.apply(base);
                command.target.x = Some(adjusted.x);
                command.target.y = Some(adjusted.y);
                adjustments.push(adjustment);
            }
            command.confidence *= RETRY_CONFIDENCE_DECAY;
            debug!(
                retry = command.retry_count,
                max = command.max_retries,
                ?adjustment,
                confidence = command.confidence,
                "좌표 보정 후 재시도"
            );
        }

        if self.config.teaching_enabled {
            if let Some(success) = self.request_teaching(ctx, &command, description).await? {
                return Ok(success_result(success, attempts, adjustments));
            }
            last_error = format!("{last_error}; 사용자 교육 응답 없음");
        }

        Ok(ExecutionResult {
            success: false,
            confidence: 0.0,
            coordinates: last_point,
            attempts,
            adjustments,
            verified,
            error: Some(last_error),
            ..Default::default()
        })
    }

    // ============================================================
    // 접근성 레이어
    // ============================================================

    async fn try_accessibility(
        &self,
        ctx: &ExecutionContext,
        command: &AutomationCommand,
    ) -> Result<Option<Success>, CoreError> {
        let accessibility = &self.ports.accessibility;

        if let Some(element_id) = command.target.element_id.as_deref() {
            if let Some(node) = accessibility.find_by_id(&ctx.device_id, element_id).await? {
                if self.activate(ctx, command, &node).await? {
                    debug!(element_id, "접근성 ID 일치 실행");
                    return Ok(Some(accessibility_success(
                        node,
                        ExecutionMethod::AccessibilityApi,
                        ACCESSIBILITY_ID_CONFIDENCE,
                    )));
                }
            }
        }

        if let Some(text) = command.target.text.as_deref() {
            let nodes = accessibility.find_by_text(&ctx.device_id, text).await?;
            if let Some(node) = nodes.into_iter().next() {
                if self.activate(ctx, command, &node).await? {
                    debug!(text, "접근성 텍스트 일치 실행");
                    return Ok(Some(accessibility_success(
                        node,
                        ExecutionMethod::AccessibilityTextMatch,
                        ACCESSIBILITY_TEXT_CONFIDENCE,
                    )));
                }
            }
        }

        Ok(None)
    }

    /// 접근성 요소 실행 (tap/type은 활성화, 그 외 제스처는 중심 좌표로 전달)
    async fn activate(
        &self,
        ctx: &ExecutionContext,
        command: &AutomationCommand,
        node: &AccessibilityNode,
    ) -> Result<bool, CoreError> {
        match command.action {
            ActionKind::Tap => self.ports.accessibility.activate(&ctx.device_id, node).await,
            ActionKind::Type => {
                if !self.ports.accessibility.activate(&ctx.device_id, node).await? {
                    return Ok(false);
                }
                let text = command.text.clone().unwrap_or_default();
                let typed = Command::type_text(
                    text,
                    format!("type {}", command.target.description_key()),
                );
                self.ports.device.execute(&ctx.device_id, &typed).await
            }
            ActionKind::DoubleTap | ActionKind::LongPress => {
                if !node.enabled {
                    return Ok(false);
                }
                self.dispatch(ctx, command, node.bounds.center().into()).await
            }
        }
    }

    // ============================================================
    // 시각 레이어
    // ============================================================

    async fn resolve_visual(
        &self,
        ctx: &ExecutionContext,
        command: &AutomationCommand,
        description: &str,
        frame: &Frame,
        retrying: bool,
    ) -> Option<Candidate> {
        let explicit = command.target.point().map(|point| Candidate {
            point,
            method: ExecutionMethod::ExplicitCoordinates,
            confidence: command.confidence,
            memory: None,
        });

        // 재시도 중에는 보정된 좌표를 먼저 사용
        if retrying && explicit.is_some() {
            return explicit;
        }

        if !description.is_empty() {
            if let Some(cached) = self.cache.get(&ctx.user_id, &ctx.app, description) {
                debug!(description, rate = cached.success_rate(), "요소 캐시 적중");
                return Some(Candidate {
                    point: cached.coordinates,
                    method: ExecutionMethod::ElementCache,
                    confidence: cached.success_rate(),
                    memory: None,
                });
            }

            match self
                .ports
                .memory
                .get_element_location(&ctx.user_id, &ctx.app, description)
                .await
            {
                Ok(Some(memory)) => {
                    debug!(description, rate = memory.success_rate, "사용자 메모리 적중");
                    return Some(Candidate {
                        point: memory.coordinates,
                        method: ExecutionMethod::VisualAiMemory,
                        confidence: memory.success_rate,
                        memory: Some(memory),
                    });
                }
                Ok(None) => {}
                Err(e) => warn!(error = %e, "요소 메모리 조회 실패"),
            }

            match self.ports.locator.locate(frame, description).await {
                Ok(Some(located)) if located.confidence > self.config.confidence_threshold => {
                    debug!(
                        locator = self.ports.locator.name(),
                        confidence = located.confidence,
                        "위치 추정 채택"
                    );
                    return Some(Candidate {
                        point: located.coordinates,
                        method: ExecutionMethod::VisualAiModel,
                        confidence: located.confidence,
                        memory: None,
                    });
                }
                Ok(Some(located)) => {
                    debug!(confidence = located.confidence, "위치 추정 신뢰도 부족");
                }
                Ok(None) => {}
                Err(e) => warn!(error = %e, "위치 추정 실패"),
            }
        }

        explicit
    }

    /// 좌표에 명령 전달 (모두 전달되면 true)
    async fn dispatch(
        &self,
        ctx: &ExecutionContext,
        command: &AutomationCommand,
        at: Point,
    ) -> Result<bool, CoreError> {
        for device_command in command.to_device_commands(at) {
            if !self
                .ports
                .device
                .execute(&ctx.device_id, &device_command)
                .await?
            {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// 실행 후 화면 변화 검증 → (변화 여부, 새 화면)
    async fn verify(
        &self,
        device_id: &str,
        before: &Frame,
    ) -> Result<(bool, Option<Frame>), CoreError> {
        tokio::time::sleep(Duration::from_millis(self.config.verify_delay_ms)).await;

        let Some(after) = self.ports.device.capture_screen(device_id).await? else {
            debug!(device_id, "검증용 화면 없음");
            return Ok((false, None));
        };

        let diff = self.ports.comparator.diff_ratio(before, &after);
        let changed = diff > self.config.min_screen_change;
        debug!(device_id, diff, changed, "화면 변화 검증");
        Ok((changed, Some(after)))
    }

    /// 검증 실패를 캐시/메모리 성공률에 반영
    async fn record_failure(&self, ctx: &ExecutionContext, description: &str, candidate: &Candidate) {
        if description.is_empty() {
            return;
        }
        self.cache
            .record(&ctx.user_id, &ctx.app, description, candidate.point, false);

        if let Some(memory) = &candidate.memory {
            let total_count = memory.total_count.saturating_add(1);
            let updated = ElementMemory {
                success_rate: memory.success_count as f64 / total_count as f64,
                total_count,
                last_seen: Utc::now(),
                ..memory.clone()
            };
            if let Err(e) = self
                .ports
                .memory
                .store_ui_element(&ctx.user_id, &ctx.app, description, &updated)
                .await
            {
                warn!(error = %e, "요소 메모리 갱신 실패");
            }
        }
    }

    // ============================================================
    // 사용자 교육
    // ============================================================

    async fn request_teaching(
        &self,
        ctx: &ExecutionContext,
        command: &AutomationCommand,
        description: &str,
    ) -> Result<Option<Success>, CoreError> {
        let request = TeachingRequest::new(&ctx.user_id, &ctx.device_id, &ctx.app, description);
        let Some(response) = self.ports.teaching.request_teaching(request).await? else {
            return Ok(None);
        };

        let point = response.coordinates;
        if !self.dispatch(ctx, command, point).await? {
            warn!("교육 좌표 명령 전달 실패");
            return Ok(None);
        }

        self.learn_from_user(ctx, description, &response).await;
        Ok(Some(Success {
            method: ExecutionMethod::UserTeaching,
            confidence: 1.0,
            coordinates: Some(point),
            element: response.element,
            verified: None,
            learned_from_user: true,
            history: None,
        }))
    }

    async fn learn_from_user(
        &self,
        ctx: &ExecutionContext,
        description: &str,
        response: &TeachingResponse,
    ) {
        let key = if description.is_empty() {
            "unknown"
        } else {
            description
        };
        let point = response.coordinates;
        let memory = ElementMemory::learned(point, response.element.clone());

        if let Err(e) = self
            .ports
            .memory
            .store_ui_element(&ctx.user_id, &ctx.app, key, &memory)
            .await
        {
            warn!(error = %e, "교육 요소 저장 실패");
        }
        self.cache.learn(&ctx.user_id, &ctx.app, key, point);

        let example = TeachingExample {
            app: ctx.app.clone(),
            prompt: format!("Find {key} in {}", ctx.app),
            response: serde_json::json!({ "x": point.x, "y": point.y }).to_string(),
            created_at: Utc::now(),
        };
        if let Err(e) = self
            .ports
            .memory
            .record_teaching_example(&ctx.user_id, &example)
            .await
        {
            warn!(error = %e, "교육 예제 기록 실패");
        }

        info!(app = %ctx.app, description = key, x = point.x, y = point.y, "사용자 교육 학습 완료");
    }

    // ============================================================
    // 성공 기록
    // ============================================================

    async fn store_success(
        &self,
        ctx: &ExecutionContext,
        command: &AutomationCommand,
        description: &str,
        success: &Success,
    ) {
        if let (Some(point), false) = (success.coordinates, description.is_empty()) {
            // 메모리 좌표는 저장된 통계에 누적하고 캐시도 그 값으로 채운다
            let (success_count, total_count) = match success.history {
                Some((succeeded, total)) => {
                    let counts = (succeeded.saturating_add(1), total.saturating_add(1));
                    self.cache
                        .restore(&ctx.user_id, &ctx.app, description, point, counts.0, counts.1);
                    counts
                }
                None => {
                    self.cache
                        .record(&ctx.user_id, &ctx.app, description, point, true);
                    self.cache
                        .get(&ctx.user_id, &ctx.app, description)
                        .map_or((1, 1), |c| (c.success_count, c.total_count))
                }
            };
            let memory = ElementMemory {
                coordinates: point,
                element: success.element.clone(),
                success_rate: success_count as f64 / total_count.max(1) as f64,
                success_count,
                total_count,
                learned_from_user: success.learned_from_user,
                last_seen: Utc::now(),
            };
            if let Err(e) = self
                .ports
                .memory
                .store_ui_element(&ctx.user_id, &ctx.app, description, &memory)
                .await
            {
                warn!(error = %e, "요소 메모리 저장 실패");
            }
        }

        let record = ScreenRecord {
            app: ctx.app.clone(),
            action: command.action.as_str().to_string(),
            success: true,
            method: Some(success.method),
            confidence: success.confidence,
            text_content: format!(
                "Successfully executed {} on {description}",
                command.action.as_str()
            ),
            device_id: Some(ctx.device_id.clone()),
            frame_number: Some(ctx.frame.metadata.frame_number),
        };
        if let Err(e) = self.ports.memory.store_screen(&ctx.user_id, &record).await {
            warn!(error = %e, "성공 기록 저장 실패");
        }
    }
}

fn accessibility_success(
    node: AccessibilityNode,
    method: ExecutionMethod,
    confidence: f64,
) -> Success {
    Success {
        method,
        confidence,
        coordinates: Some(node.bounds.center().into()),
        element: Some(node),
        verified: None,
        learned_from_user: false,
        history: None,
    }
}

fn success_result(success: Success, attempts: u32, adjustments: Vec<Adjustment>) -> ExecutionResult {
    ExecutionResult {
        success: true,
        method: Some(success.method),
        confidence: success.confidence,
        coordinates: success.coordinates,
        element: success.element,
        attempts,
        adjustments,
        verified: success.verified,
        error: None,
        elapsed_ms: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{
        frame_for, node, node_at, FixedAccessibility, FixedLocator, FixedTeaching, InMemoryStore,
        RecordingDevice, ScriptedComparator,
    };
    use mirror_core::models::automation::AutomationTarget;
    use mirror_core::models::command::CommandKind;
    use mirror_core::ports::vision::LocatedElement;

    // --- 조립 ---

    struct Harness {
        device: Arc<RecordingDevice>,
        accessibility: Arc<FixedAccessibility>,
        memory: Arc<InMemoryStore>,
        responder: Arc<FixedTeaching>,
        cache: Arc<ElementCache>,
        audit: Arc<RwLock<AuditLogger>>,
        executor: SelfHealingExecutor,
    }

    struct Setup {
        nodes: Vec<AccessibilityNode>,
        located: Option<LocatedElement>,
        ratios: Vec<f64>,
        teaching: Option<Point>,
    }

    impl Default for Setup {
        fn default() -> Self {
            Self {
                nodes: Vec::new(),
                located: None,
                ratios: vec![0.5],
                teaching: None,
            }
        }
    }

    fn harness(setup: Setup) -> Harness {
        let device = Arc::new(RecordingDevice::default());
        let accessibility = Arc::new(FixedAccessibility {
            nodes: setup.nodes,
            ..Default::default()
        });
        let memory = Arc::new(InMemoryStore::default());
        let responder = Arc::new(FixedTeaching::new(setup.teaching));
        let cache = Arc::new(ElementCache::new(64));
        let audit = Arc::new(RwLock::new(AuditLogger::new(100)));
        let config = AutomationConfig {
            verify_delay_ms: 0,
            ..AutomationConfig::default()
        };

        let executor = SelfHealingExecutor::new(
            ExecutorPorts {
                device: device.clone(),
                accessibility: accessibility.clone(),
                locator: Arc::new(FixedLocator(setup.located)),
                comparator: Arc::new(ScriptedComparator::new(&setup.ratios)),
                memory: memory.clone(),
                teaching: responder.clone(),
            },
            cache.clone(),
            audit.clone(),
            config,
        );

        Harness {
            device,
            accessibility,
            memory,
            responder,
            cache,
            audit,
            executor,
        }
    }

    fn ctx() -> ExecutionContext {
        ExecutionContext {
            user_id: "alice".to_string(),
            device_id: "iphone".to_string(),
            app: "Uber".to_string(),
            frame: frame_for("iphone", 1),
        }
    }

    fn tap(target: AutomationTarget, confidence: f64) -> AutomationCommand {
        AutomationCommand::tap(target, confidence)
    }

    fn described(description: &str) -> AutomationTarget {
        AutomationTarget {
            description: Some(description.to_string()),
            ..Default::default()
        }
    }

    fn tapped_points(device: &RecordingDevice) -> Vec<(i32, i32)> {
        device.executed.lock().iter().filter_map(Command::point).collect()
    }

    // --- 접근성 레이어 ---

    #[tokio::test]
    async fn accessibility_id_match_when_confident() {
        let h = harness(Setup {
            nodes: vec![node_at("btn_confirm", "Confirm", 100, 700)],
            ..Default::default()
        });
        let target = AutomationTarget {
            element_id: Some("btn_confirm".to_string()),
            description: Some("Confirm".to_string()),
            ..Default::default()
        };

        let result = h.executor.execute(&ctx(), tap(target, 0.95)).await.unwrap();
        assert!(result.success);
        assert_eq!(result.method, Some(ExecutionMethod::AccessibilityApi));
        assert!((result.confidence - 0.99).abs() < 1e-9);
        assert_eq!(result.coordinates, Some(Point::new(150, 720)));
        assert_eq!(result.verified, None);
        assert_eq!(*h.accessibility.activations.lock(), vec!["btn_confirm".to_string()]);

        // 성공 기록: 화면 기록 + 요소 메모리 + 캐시
        let screens = h.memory.screens.lock();
        assert_eq!(screens[0].1.text_content, "Successfully executed tap on Confirm");
        assert!(h.cache.get("alice", "Uber", "Confirm").is_some());
    }

    #[tokio::test]
    async fn accessibility_text_match_fallback() {
        let h = harness(Setup {
            nodes: vec![node("btn_1", "Login")],
            ..Default::default()
        });
        let target = AutomationTarget {
            element_id: Some("missing".to_string()),
            text: Some("Login".to_string()),
            ..Default::default()
        };

        let result = h.executor.execute(&ctx(), tap(target, 0.95)).await.unwrap();
        assert_eq!(result.method, Some(ExecutionMethod::AccessibilityTextMatch));
        assert!((result.confidence - 0.95).abs() < 1e-9);
    }

    #[tokio::test]
    async fn accessibility_skipped_below_gate() {
        let h = harness(Setup {
            nodes: vec![node("btn_1", "Login")],
            ..Default::default()
        });
        let target = AutomationTarget {
            text: Some("Login".to_string()),
            x: Some(10),
            y: Some(20),
            ..Default::default()
        };

        let result = h.executor.execute(&ctx(), tap(target, 0.8)).await.unwrap();
        assert!(h.accessibility.activations.lock().is_empty());
        assert_eq!(result.method, Some(ExecutionMethod::ExplicitCoordinates));
        assert_eq!(result.verified, Some(true));
    }

    #[tokio::test]
    async fn type_action_types_after_activation() {
        let h = harness(Setup {
            nodes: vec![node("field", "Where to?")],
            ..Default::default()
        });
        let command = AutomationCommand {
            action: ActionKind::Type,
            text: Some("Airport".to_string()),
            ..tap(
                AutomationTarget {
                    element_id: Some("field".to_string()),
                    ..Default::default()
                },
                0.95,
            )
        };

        let result = h.executor.execute(&ctx(), command).await.unwrap();
        assert!(result.success);
        let executed = h.device.executed.lock();
        assert_eq!(
            executed[0].kind,
            CommandKind::Type {
                text: "Airport".to_string()
            }
        );
    }

    // --- 시각 레이어 ---

    #[tokio::test]
    async fn element_cache_is_preferred() {
        let h = harness(Setup::default());
        h.cache.learn("alice", "Uber", "Confirm", Point::new(200, 700));
        h.memory
            .store_ui_element(
                "alice",
                "Uber",
                "Confirm",
                &ElementMemory::learned(Point::new(1, 1), None),
            )
            .await
            .unwrap();

        let result = h.executor.execute(&ctx(), tap(described("Confirm"), 0.5)).await.unwrap();
        assert_eq!(result.method, Some(ExecutionMethod::ElementCache));
        assert_eq!(tapped_points(&h.device), vec![(200, 700)]);
        assert_eq!(h.cache.get("alice", "Uber", "Confirm").unwrap().total_count, 2);
    }

    #[tokio::test]
    async fn user_memory_then_updates_cache() {
        let h = harness(Setup::default());
        h.memory
            .store_ui_element(
                "alice",
                "Uber",
                "Confirm",
                &ElementMemory::learned(Point::new(300, 800), None),
            )
            .await
            .unwrap();

        let result = h.executor.execute(&ctx(), tap(described("Confirm"), 0.5)).await.unwrap();
        assert_eq!(result.method, Some(ExecutionMethod::VisualAiMemory));
        assert!((result.confidence - 1.0).abs() < 1e-9);
        assert_eq!(
            h.cache.get("alice", "Uber", "Confirm").unwrap().coordinates,
            Point::new(300, 800)
        );
        let stored = h
            .memory
            .get_element_location("alice", "Uber", "Confirm")
            .await
            .unwrap()
            .unwrap();
        assert!(stored.learned_from_user);
    }

    #[tokio::test]
    async fn memory_success_accumulates_stored_history() {
        let h = harness(Setup::default());
        let observed = ElementMemory {
            coordinates: Point::new(300, 800),
            element: None,
            success_rate: 0.25,
            success_count: 1,
            total_count: 4,
            learned_from_user: false,
            last_seen: chrono::Utc::now(),
        };
        h.memory
            .store_ui_element("alice", "Uber", "Confirm", &observed)
            .await
            .unwrap();

        let result = h.executor.execute(&ctx(), tap(described("Confirm"), 0.5)).await.unwrap();
        assert_eq!(result.method, Some(ExecutionMethod::VisualAiMemory));
        assert!((result.confidence - 0.25).abs() < 1e-9);

        let stored = h
            .memory
            .get_element_location("alice", "Uber", "Confirm")
            .await
            .unwrap()
            .unwrap();
        assert_eq!((stored.success_count, stored.total_count), (2, 5));
        assert!((stored.success_rate - 0.4).abs() < 1e-9);
        assert!(!stored.learned_from_user);

        let cached = h.cache.get("alice", "Uber", "Confirm").unwrap();
        assert_eq!((cached.success_count, cached.total_count), (2, 5));
    }

    #[tokio::test]
    async fn locator_requires_high_confidence() {
        let h = harness(Setup {
            located: Some(LocatedElement {
                coordinates: Point::new(50, 60),
                confidence: 0.97,
            }),
            ..Default::default()
        });
        let result = h.executor.execute(&ctx(), tap(described("Send"), 0.5)).await.unwrap();
        assert_eq!(result.method, Some(ExecutionMethod::VisualAiModel));
        assert_eq!(result.coordinates, Some(Point::new(50, 60)));

        let h = harness(Setup {
            located: Some(LocatedElement {
                coordinates: Point::new(50, 60),
                confidence: 0.9,
            }),
            ..Default::default()
        });
        let result = h.executor.execute(&ctx(), tap(described("Send"), 0.5)).await.unwrap();
        assert!(!result.success);
        assert!(h.device.executed.lock().is_empty());
    }

    // --- 재시도 ---

    #[tokio::test]
    async fn retries_apply_adjustments_until_screen_changes() {
        // 첫 두 번은 변화 없음, 세 번째에 변화
        let h = harness(Setup {
            ratios: vec![0.0, 0.01, 0.5],
            ..Default::default()
        });
        let target = AutomationTarget {
            description: Some("Confirm".to_string()),
            x: Some(100),
            y: Some(200),
            ..Default::default()
        };

        let result = h.executor.execute(&ctx(), tap(target, 0.5)).await.unwrap();
        assert!(result.success);
        assert_eq!(result.attempts, 3);
        assert_eq!(
            result.adjustments,
            vec![
                Adjustment::Offset { dx: 10, dy: 0 },
                Adjustment::Offset { dx: -10, dy: 0 }
            ]
        );
        assert_eq!(tapped_points(&h.device), vec![(100, 200), (110, 200), (100, 200)]);
        // 재시도마다 0.9배 감쇠: 0.5 * 0.81
        assert!((result.confidence - 0.405).abs() < 1e-9);
    }

    #[tokio::test]
    async fn failed_verification_lowers_memory_rate() {
        let h = harness(Setup {
            ratios: vec![0.0],
            ..Default::default()
        });
        let mut memory = ElementMemory::learned(Point::new(10, 10), None);
        memory.learned_from_user = false;
        h.memory
            .store_ui_element("alice", "Uber", "Confirm", &memory)
            .await
            .unwrap();

        let command = AutomationCommand {
            max_retries: 0,
            ..tap(described("Confirm"), 0.5)
        };
        let result = h.executor.execute(&ctx(), command).await.unwrap();
        assert!(!result.success);
        assert_eq!(result.verified, Some(false));

        let stored = h
            .memory
            .get_element_location("alice", "Uber", "Confirm")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.total_count, 2);
        assert!((stored.success_rate - 0.5).abs() < 1e-9);
    }

    // --- 사용자 교육 ---

    #[tokio::test]
    async fn teaching_after_retries_exhausted() {
        let h = harness(Setup {
            teaching: Some(Point::new(321, 654)),
            ..Default::default()
        });

        let result = h.executor.execute(&ctx(), tap(described("Pay"), 0.5)).await.unwrap();
        assert!(result.success);
        assert_eq!(result.method, Some(ExecutionMethod::UserTeaching));
        assert_eq!(result.attempts, 4);
        assert_eq!(h.responder.requests.lock().len(), 1);
        assert_eq!(tapped_points(&h.device), vec![(321, 654)]);

        let learned = h
            .memory
            .get_element_location("alice", "Uber", "Pay")
            .await
            .unwrap()
            .unwrap();
        assert!(learned.learned_from_user);
        assert_eq!(h.cache.get("alice", "Uber", "Pay").unwrap().coordinates, Point::new(321, 654));

        let examples = h.memory.examples.lock();
        assert_eq!(examples[0].1.prompt, "Find Pay in Uber");
        assert_eq!(examples[0].1.response, r#"{"x":321,"y":654}"#);
    }

    #[tokio::test]
    async fn no_teaching_answer_fails_and_audits() {
        let h = harness(Setup::default());
        let result = h.executor.execute(&ctx(), tap(described("Pay"), 0.5)).await.unwrap();

        assert!(!result.success);
        assert!(result.error.unwrap().contains("사용자 교육"));
        assert!(h.memory.screens.lock().is_empty());

        let audit = h.audit.read().await;
        let stats = audit.stats();
        assert_eq!(stats.failed, 1);
        assert_eq!(audit.len(), 2);
    }
}
