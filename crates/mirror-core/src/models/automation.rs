//! 자가 치유 자동화 명령/결과 모델.
//!
//! 고수준 자동화 명령(`AutomationCommand`)은 "무엇을" 누를지를 설명하고,
//! 실행기가 접근성 → 메모리 → 모델 → 재시도 → 사용자 교육 순으로 "어디를" 결정한다.

use serde::{Deserialize, Serialize};

use super::command::{Command, CommandKind};
use super::element::{AccessibilityNode, Point};

/// 자동화 액션 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Tap,
    DoubleTap,
    LongPress,
    /// 대상 필드 탭 후 텍스트 입력
    Type,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tap => "tap",
            Self::DoubleTap => "double_tap",
            Self::LongPress => "long_press",
            Self::Type => "type",
        }
    }
}

/// 자동화 대상
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AutomationTarget {
    /// 접근성 요소 ID
    #[serde(default)]
    pub element_id: Option<String>,
    /// 표시 텍스트
    #[serde(default)]
    pub text: Option<String>,
    /// 자연어 설명 (예: "login button")
    #[serde(default)]
    pub description: Option<String>,
    /// 명시 X 좌표
    #[serde(default)]
    pub x: Option<i32>,
    /// 명시 Y 좌표
    #[serde(default)]
    pub y: Option<i32>,
}

impl AutomationTarget {
    /// 메모리/캐시 키로 쓰는 설명 (description → text → element_id 순)
    pub fn description_key(&self) -> String {
        self.description
            .as_deref()
            .or(self.text.as_deref())
            .or(self.element_id.as_deref())
            .unwrap_or_default()
            .to_string()
    }

    /// 명시 좌표
    pub fn point(&self) -> Option<Point> {
        match (self.x, self.y) {
            (Some(x), Some(y)) => Some(Point::new(x, y)),
            _ => None,
        }
    }
}

/// 자동화 명령
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutomationCommand {
    /// 액션
    pub action: ActionKind,
    /// 대상
    #[serde(default)]
    pub target: AutomationTarget,
    /// 입력 텍스트 (action=type)
    #[serde(default)]
    pub text: Option<String>,
    /// 명령 신뢰도
    #[serde(default = "default_command_confidence")]
    pub confidence: f64,
    /// 현재까지 재시도 횟수
    #[serde(default)]
    pub retry_count: u32,
    /// 최대 재시도 횟수
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_command_confidence() -> f64 {
    0.5
}

fn default_max_retries() -> u32 {
    3
}

impl AutomationCommand {
    /// 탭 명령 생성
    pub fn tap(target: AutomationTarget, confidence: f64) -> Self {
        Self {
            action: ActionKind::Tap,
            target,
            text: None,
            confidence,
            retry_count: 0,
            max_retries: default_max_retries(),
        }
    }

    /// 결정된 좌표로 휴대폰 명령 생성
    ///
    /// `type`은 대상 필드를 먼저 탭하고 텍스트를 입력한다.
    pub fn to_device_commands(&self, at: Point) -> Vec<Command> {
        let reason = format!("{} {}", self.action.as_str(), self.target.description_key());
        match self.action {
            ActionKind::Tap => vec![Command::tap(at.x, at.y, reason)],
            ActionKind::DoubleTap => vec![Command::new(
                CommandKind::DoubleTap { x: at.x, y: at.y },
                reason,
            )],
            ActionKind::LongPress => vec![Command::new(
                CommandKind::LongPress {
                    x: at.x,
                    y: at.y,
                    duration: 1.0,
                },
                reason,
            )],
            ActionKind::Type => vec![
                Command::tap(at.x, at.y, reason.clone()),
                Command::type_text(self.text.clone().unwrap_or_default(), reason),
            ],
        }
    }
}

/// 좌표 보정
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Adjustment {
    /// 픽셀 이동
    Offset { dx: i32, dy: i32 },
    /// 원점 기준 배율
    Scale(f64),
}

/// 재시도 시 순서대로 적용하는 보정 목록
pub const ADJUSTMENTS: [Adjustment; 6] = [
    Adjustment::Offset { dx: 10, dy: 0 },
    Adjustment::Offset { dx: -10, dy: 0 },
    Adjustment::Offset { dx: 0, dy: 10 },
    Adjustment::Offset { dx: 0, dy: -10 },
    Adjustment::Scale(0.9),
    Adjustment::Scale(1.1),
];

impl Adjustment {
    /// n번째 재시도(1부터)에 적용할 보정
    ///
    /// 첫 재시도는 (+10, 0)부터 시작하고, 순서를 넘어서면 마지막 보정을 반복한다.
    pub fn for_retry(retry: u32) -> Adjustment {
        let idx = (retry.saturating_sub(1) as usize).min(ADJUSTMENTS.len() - 1);
        ADJUSTMENTS[idx]
    }

    /// 좌표에 보정 적용
    pub fn apply(&self, point: Point) -> Point {
        match *self {
            Self::Offset { dx, dy } => Point::new(point.x.saturating_add(dx), point.y.saturating_add(dy)),
            Self::Scale(factor) => Point::new(
                (point.x as f64 * factor).round() as i32,
                (point.y as f64 * factor).round() as i32,
            ),
        }
    }
}

/// 실행 방법 (어느 레이어에서 성공했는가)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMethod {
    /// 접근성 요소 ID 일치
    AccessibilityApi,
    /// 접근성 텍스트 일치
    AccessibilityTextMatch,
    /// 요소 캐시
    ElementCache,
    /// 사용자 메모리
    VisualAiMemory,
    /// 비전 모델 예측
    VisualAiModel,
    /// 명시 좌표
    ExplicitCoordinates,
    /// 사용자 교육
    UserTeaching,
}

impl ExecutionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AccessibilityApi => "accessibility_api",
            Self::AccessibilityTextMatch => "accessibility_text_match",
            Self::ElementCache => "element_cache",
            Self::VisualAiMemory => "visual_ai_memory",
            Self::VisualAiModel => "visual_ai_model",
            Self::ExplicitCoordinates => "explicit_coordinates",
            Self::UserTeaching => "user_teaching",
        }
    }
}

/// 자동화 실행 결과
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// 성공 여부
    pub success: bool,
    /// 성공한 실행 방법
    pub method: Option<ExecutionMethod>,
    /// 결과 신뢰도
    pub confidence: f64,
    /// 실행 좌표
    pub coordinates: Option<Point>,
    /// 사용된 접근성 요소
    pub element: Option<AccessibilityNode>,
    /// 시도 횟수
    pub attempts: u32,
    /// 적용된 보정
    pub adjustments: Vec<Adjustment>,
    /// 화면 변화 검증 결과 (검증하지 않은 경로는 None)
    pub verified: Option<bool>,
    /// 실패 사유
    pub error: Option<String>,
    /// 소요 시간 (밀리초)
    pub elapsed_ms: u64,
}

impl ExecutionResult {
    /// 실패 결과
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Default::default()
        }
    }
}
