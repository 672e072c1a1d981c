//! 휴대폰으로 전달되는 제스처 명령 모델.
//!
//! 와이어 형식은 `action` 필드를 태그로 사용하는 평탄한 JSON 객체이다.
//! 예: `{"action":"tap","x":195,"y":422,"reason":"Login screen detected"}`

use serde::{Deserialize, Deserializer, Serialize};

/// 제스처 종류와 파라미터
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum CommandKind {
    /// 단일 탭
    Tap {
        #[serde(deserialize_with = "de_coord")]
        x: i32,
        #[serde(deserialize_with = "de_coord")]
        y: i32,
    },
    /// 더블 탭
    DoubleTap {
        #[serde(deserialize_with = "de_coord")]
        x: i32,
        #[serde(deserialize_with = "de_coord")]
        y: i32,
    },
    /// 길게 누르기
    LongPress {
        #[serde(deserialize_with = "de_coord")]
        x: i32,
        #[serde(deserialize_with = "de_coord")]
        y: i32,
        /// 누르는 시간 (초)
        #[serde(default = "default_long_press_duration")]
        duration: f64,
    },
    /// 스와이프 (scroll 별칭 허용)
    #[serde(alias = "scroll")]
    Swipe {
        #[serde(deserialize_with = "de_coord")]
        start_x: i32,
        #[serde(deserialize_with = "de_coord")]
        start_y: i32,
        #[serde(deserialize_with = "de_coord")]
        end_x: i32,
        #[serde(deserialize_with = "de_coord")]
        end_y: i32,
        /// 스와이프 시간 (초)
        #[serde(default = "default_swipe_duration")]
        duration: f64,
    },
    /// 텍스트 입력
    Type { text: String },
    /// 대기
    Wait {
        /// 대기 시간 (초)
        #[serde(default = "default_wait_duration")]
        duration: f64,
    },
    /// 뒤로 가기
    Back,
    /// 홈 화면
    Home,
}

/// 휴대폰에 전달하는 명령 (제스처 + 사유)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    /// 제스처
    #[serde(flatten)]
    pub kind: CommandKind,
    /// 사람이 읽을 수 있는 명령 사유
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reason: String,
}

fn default_long_press_duration() -> f64 {
    1.0
}

fn default_swipe_duration() -> f64 {
    0.5
}

fn default_wait_duration() -> f64 {
    2.0
}

/// 정수/실수 좌표를 모두 받아 반올림한다.
fn de_coord<'de, D>(deserializer: D) -> Result<i32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = f64::deserialize(deserializer)?;
    Ok(value.round() as i32)
}

impl Command {
    /// 사유와 함께 명령 생성
    pub fn new(kind: CommandKind, reason: impl Into<String>) -> Self {
        Self {
            kind,
            reason: reason.into(),
        }
    }

    /// 탭 명령
    pub fn tap(x: i32, y: i32, reason: impl Into<String>) -> Self {
        Self::new(CommandKind::Tap { x, y }, reason)
    }

    /// 스와이프 명령
    pub fn swipe(
        start: (i32, i32),
        end: (i32, i32),
        duration: f64,
        reason: impl Into<String>,
    ) -> Self {
        Self::new(
            CommandKind::Swipe {
                start_x: start.0,
                start_y: start.1,
                end_x: end.0,
                end_y: end.1,
                duration,
            },
            reason,
        )
    }

    /// 화면 높이 70% → 30% 지점으로 위로 스크롤
    pub fn scroll_up(width: u32, height: u32, reason: impl Into<String>) -> Self {
        let x = (width / 2) as i32;
        let start_y = (height as f64 * 0.7).round() as i32;
        let end_y = (height as f64 * 0.3).round() as i32;
        Self::swipe((x, start_y), (x, end_y), default_swipe_duration(), reason)
    }

    /// 텍스트 입력 명령
    pub fn type_text(text: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(CommandKind::Type { text: text.into() }, reason)
    }

    /// 대기 명령
    pub fn wait(duration: f64, reason: impl Into<String>) -> Self {
        Self::new(CommandKind::Wait { duration }, reason)
    }

    /// 뒤로 가기 명령
    pub fn back(reason: impl Into<String>) -> Self {
        Self::new(CommandKind::Back, reason)
    }

    /// 홈 명령
    pub fn home(reason: impl Into<String>) -> Self {
        Self::new(CommandKind::Home, reason)
    }

    /// 와이어 형식의 액션 이름
    pub fn action_name(&self) -> &'static str {
        match self.kind {
            CommandKind::Tap { .. } => "tap",
            CommandKind::DoubleTap { .. } => "double_tap",
            CommandKind::LongPress { .. } => "long_press",
            CommandKind::Swipe { .. } => "swipe",
            CommandKind::Type { .. } => "type",
            CommandKind::Wait { .. } => "wait",
            CommandKind::Back => "back",
            CommandKind::Home => "home",
        }
    }

    /// 좌표 기반 명령이면 대상 좌표 반환
    pub fn point(&self) -> Option<(i32, i32)> {
        match self.kind {
            CommandKind::Tap { x, y }
            | CommandKind::DoubleTap { x, y }
            | CommandKind::LongPress { x, y, .. } => Some((x, y)),
            _ => None,
        }
    }
}
