//! 화면 휴리스틱 → 명령 규칙.
//!
//! 색상 통계, 프레임 번호, 레이아웃, OCR 텍스트, 감지된 앱을 입력으로
//! 휴대폰에 보낼 명령을 만든다. 모든 규칙은 순수 함수이며 결과는 누적된다.

use mirror_core::config::VisionConfig;
use mirror_core::models::command::Command;
use mirror_core::models::frame::FrameMetadata;

use crate::color::ColorStats;
use crate::layout::LayoutProfile;

/// 로딩 화면 대기 시간 (초)
const LOADING_WAIT_SECS: f64 = 2.0;

/// 앱 자동 스크롤 거리 (픽셀)
const AUTO_SCROLL_DISTANCE: i32 = 500;

/// 색상 규칙: 파란/흰 로딩 화면 대기, 빨간 버튼 탭
pub fn color_rules(stats: &ColorStats, config: &VisionConfig) -> Vec<Command> {
    let mut commands = Vec::new();

    if stats.blue_ratio > config.blue_ratio_threshold {
        commands.push(Command::wait(LOADING_WAIT_SECS, "Loading screen detected"));
    }
    if stats.white_ratio > config.white_ratio_threshold {
        commands.push(Command::wait(
            LOADING_WAIT_SECS,
            "White/loading screen detected",
        ));
    }
    if let Some((x, y)) = stats.red_centroid {
        commands.push(Command::tap(x, y, "Red action button detected"));
    }

    commands
}

/// 주기 규칙: N 프레임마다 중앙 탭, M 프레임마다 위로 스크롤
///
/// 휴대폰이 프레임 번호를 보고한 경우에만 적용한다.
pub fn periodic_rules(metadata: &FrameMetadata, config: &VisionConfig) -> Vec<Command> {
    let mut commands = Vec::new();
    let n = metadata.frame_number;
    if !metadata.frame_number_reported || n == 0 {
        return commands;
    }

    if config.periodic_tap_interval > 0 && n % config.periodic_tap_interval == 0 {
        commands.push(Command::tap(
            (metadata.width / 2) as i32,
            (metadata.height / 2) as i32,
            "Center tap - periodic action",
        ));
    }
    if config.periodic_swipe_interval > 0 && n % config.periodic_swipe_interval == 0 {
        commands.push(Command::scroll_up(metadata.width, metadata.height, "Scroll up"));
    }

    commands
}

/// 레이아웃 규칙: 버튼/입력창 탭, 리스트 스크롤, 그리드 순회
pub fn layout_rules(
    layout: &LayoutProfile,
    metadata: &FrameMetadata,
    config: &VisionConfig,
) -> Vec<Command> {
    let mut commands = Vec::new();
    let n = metadata.frame_number;

    if let Some(button) = layout.buttons().next() {
        let (x, y) = button.center();
        commands.push(Command::tap(x, y, "Button detected via CV"));
    }
    if let Some(field) = layout.text_fields().next() {
        let (x, y) = field.center();
        commands.push(Command::tap(x, y, "Text field detected"));
    }
    if layout.is_list_view()
        && config.list_scroll_interval > 0
        && n % config.list_scroll_interval == 0
    {
        commands.push(Command::scroll_up(
            metadata.width,
            metadata.height,
            "List view - scrolling for more content",
        ));
    }

    let grid = layout.grid_items();
    if !grid.is_empty() {
        let item = grid[(n % grid.len() as u64) as usize];
        let (x, y) = item.center();
        commands.push(Command::tap(x, y, "Exploring grid item"));
    }

    commands
}

/// OCR 텍스트 규칙 (대소문자 구분)
pub fn text_rules(text: &str, width: u32, height: u32) -> Vec<Command> {
    let mut commands = Vec::new();
    let (w, h) = (width as f64, height as f64);
    let at = |fx: f64, fy: f64| ((w * fx).round() as i32, (h * fy).round() as i32);

    if text.contains("Sign in") || text.contains("Login") {
        let (x, y) = at(0.5, 0.5);
        commands.push(Command::tap(x, y, "Login screen detected"));
    }
    if text.contains("Accept") || text.contains("Allow") {
        let (x, y) = at(0.5, 0.7);
        commands.push(Command::tap(x, y, "Accept/Allow button detected"));
    }
    if text.contains("Next") || text.contains("Continue") {
        let (x, y) = at(0.8, 0.9);
        commands.push(Command::tap(x, y, "Next/Continue button detected"));
    }

    commands
}

/// 인식 텍스트로 앱 감지
pub fn detect_app(text: &str) -> Option<&'static str> {
    let lower = text.to_lowercase();
    if lower.contains("messages") {
        Some("iMessage")
    } else if lower.contains("uber") {
        Some("Uber")
    } else if lower.contains("tiktok") || lower.contains("for you") {
        Some("TikTok")
    } else {
        None
    }
}

/// 앱 규칙 입력
pub struct AppRuleInput<'a> {
    /// 감지된 앱
    pub app: &'a str,
    /// OCR 텍스트 라인
    pub lines: &'a [String],
    /// 레이아웃
    pub layout: &'a LayoutProfile,
    pub width: u32,
    pub height: u32,
    /// 자동 스크롤 허용 여부 (디바이스별 최소 간격 경과)
    pub auto_scroll_allowed: bool,
}

/// 앱별 규칙
pub fn app_rules(input: &AppRuleInput<'_>) -> Vec<Command> {
    let has_line = |needle: &str| {
        input
            .lines
            .iter()
            .any(|line| line.to_lowercase().contains(needle))
    };

    match input.app {
        "Uber" if has_line("confirm") => input
            .layout
            .button_candidates()
            .next()
            .map(|b| {
                let (x, y) = b.center();
                vec![Command::tap(x, y, "Uber confirm button")]
            })
            .unwrap_or_default(),
        "iMessage" if has_line("delivered") => {
            vec![Command::home("Message delivered - returning home")]
        }
        "TikTok" if input.auto_scroll_allowed => {
            let x = (input.width / 2) as i32;
            let start_y = (input.height as f64 * 0.75).round() as i32;
            let end_y = (start_y - AUTO_SCROLL_DISTANCE).max(0);
            vec![Command::swipe(
                (x, start_y),
                (x, end_y),
                0.5,
                "TikTok - next video",
            )]
        }
        _ => Vec::new(),
    }
}
