//! 비전 모델 응답 해석.
//!
//! 모델 프롬프트를 만들고, 응답 텍스트에서 JSON을 추출해 화면 유형, 텍스트,
//! UI 요소, 명령으로 변환한다. JSON이 없으면 키워드 휴리스틱으로 명령을 만든다.

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use mirror_core::models::analysis::AnalysisRequest;
use mirror_core::models::command::{Command, CommandKind};
use mirror_core::models::element::{ElementBounds, FinderSource, Point, UiElement};
use mirror_core::ports::vision::LocatedElement;

/// 목표 미지정 시 기본 목표
pub const DEFAULT_GOAL: &str = "Interact intelligently with the app";

/// 프롬프트에 포함할 최대 요소 수
const PROMPT_ELEMENT_LIMIT: usize = 10;

/// 프롬프트에 포함할 최대 이력 수
const PROMPT_HISTORY_LIMIT: usize = 5;

/// 모델 응답에 신뢰도가 없을 때
const DEFAULT_CONFIDENCE: f64 = 0.5;

/// 모델 요소의 기본 크기
const DEFAULT_ELEMENT_WIDTH: f64 = 100.0;
const DEFAULT_ELEMENT_HEIGHT: f64 = 50.0;

/// 화면 크기를 알 수 없을 때 최소 크기
const MIN_SCREEN_WIDTH: u32 = 400;
const MIN_SCREEN_HEIGHT: u32 = 800;

/// 화면 크기를 모를 때 모델 좌표 상한
const MAX_SCREEN_EXTENT: u32 = 16_384;

// ============================================
// 응답 원형 (serde)
// ============================================

#[derive(Debug, Default, Deserialize)]
struct RawElement {
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    x: Option<f64>,
    #[serde(default)]
    y: Option<f64>,
    #[serde(default)]
    width: Option<f64>,
    #[serde(default)]
    height: Option<f64>,
    #[serde(default)]
    position: Option<String>,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    clickable: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct RawCommand {
    #[serde(default = "default_action")]
    action: String,
    #[serde(default)]
    parameters: Map<String, Value>,
    #[serde(default)]
    reason: String,
}

fn default_action() -> String {
    "tap".to_string()
}

#[derive(Debug, Default, Deserialize)]
struct RawResponse {
    #[serde(default)]
    screen_type: Option<String>,
    #[serde(default)]
    text_content: Option<Value>,
    #[serde(default)]
    elements: Vec<RawElement>,
    #[serde(default)]
    explanation: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    commands: Vec<RawCommand>,
}

// ============================================
// 해석 결과
// ============================================

/// 모델 응답 해석 결과
#[derive(Debug, Clone, Default)]
pub struct ModelResponse {
    /// 화면 이해 (설명 또는 원문)
    pub understanding: String,
    pub screen_type: Option<String>,
    /// 인식된 텍스트 라인
    pub text: Vec<String>,
    pub elements: Vec<UiElement>,
    pub commands: Vec<Command>,
    pub confidence: f64,
}

/// 첫 `{`부터 마지막 `}`까지 잘라낸다.
pub fn extract_json(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// 응답 텍스트 해석
///
/// `width`/`height`가 0이면 요소 위치에서 화면 크기를 추정한다.
pub fn parse_model_response(text: &str, width: u32, height: u32) -> ModelResponse {
    let parsed = extract_json(text).and_then(|json| {
        serde_json::from_str::<RawResponse>(json)
            .map_err(|e| warn!("모델 응답 JSON 해석 실패: {e}"))
            .ok()
    });

    let Some(raw) = parsed else {
        let (w, h) = screen_size(&[], width, height);
        return ModelResponse {
            understanding: text.trim().to_string(),
            commands: keyword_commands(text, w, h),
            confidence: DEFAULT_CONFIDENCE,
            ..Default::default()
        };
    };

    let ((bw, bh), limit) = if width > 0 && height > 0 {
        ((width, height), (width, height))
    } else {
        (
            (MIN_SCREEN_WIDTH, MIN_SCREEN_HEIGHT),
            (MAX_SCREEN_EXTENT, MAX_SCREEN_EXTENT),
        )
    };
    let elements: Vec<UiElement> = raw
        .elements
        .iter()
        .map(|e| to_ui_element(e, bw, bh, limit))
        .collect();
    let (w, h) = screen_size(&elements, width, height);

    let mut commands: Vec<Command> = raw
        .commands
        .iter()
        .filter_map(|c| create_command(&c.action, &c.parameters, &c.reason, &elements, w, h))
        .collect();

    let explanation = raw
        .explanation
        .or(raw.description)
        .filter(|s| !s.is_empty());

    if commands.is_empty() {
        if let Some(explanation) = &explanation {
            commands = keyword_commands(explanation, w, h);
        }
    }
    if commands.is_empty() {
        commands.push(fallback_command(&elements));
    }

    debug!(
        elements = elements.len(),
        commands = commands.len(),
        "모델 응답 해석 완료"
    );

    ModelResponse {
        understanding: explanation.unwrap_or_else(|| text.trim().to_string()),
        screen_type: raw.screen_type,
        text: text_lines(raw.text_content.as_ref()),
        elements,
        commands,
        confidence: raw.confidence.unwrap_or(DEFAULT_CONFIDENCE).clamp(0.0, 1.0),
    }
}

fn text_lines(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::String(s)) => s
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str())
            .map(String::from)
            .collect(),
        _ => Vec::new(),
    }
}

/// 요소 바운딩 박스 계산
///
/// 절대 좌표가 있으면 `limit` 안으로 잘라 사용, 없으면 위치 키워드 기준 ±50/±25 박스.
fn calculate_bounds(
    element: &RawElement,
    width: u32,
    height: u32,
    limit: (u32, u32),
) -> ElementBounds {
    if let (Some(x), Some(y)) = (element.x, element.y) {
        let (max_x, max_y) = (limit.0 as f64, limit.1 as f64);
        let x = finite_or_zero(x).clamp(0.0, max_x);
        let y = finite_or_zero(y).clamp(0.0, max_y);
        let w = finite_or_zero(element.width.unwrap_or(DEFAULT_ELEMENT_WIDTH)).clamp(0.0, max_x - x);
        let h = finite_or_zero(element.height.unwrap_or(DEFAULT_ELEMENT_HEIGHT)).clamp(0.0, max_y - y);
        return ElementBounds::new(x as i32, y as i32, w as u32, h as u32);
    }

    let (w, h) = (width as f64, height as f64);
    let position = element
        .position
        .as_deref()
        .unwrap_or("center")
        .to_lowercase();
    let (cx, cy) = match position.as_str() {
        "top" => ((width / 2) as f64, h * 0.1),
        "bottom" => ((width / 2) as f64, h * 0.9),
        "top-left" => (w * 0.2, h * 0.1),
        "top-right" => (w * 0.8, h * 0.1),
        "bottom-left" => (w * 0.2, h * 0.9),
        "bottom-right" => (w * 0.8, h * 0.9),
        _ => ((width / 2) as f64, (height / 2) as f64),
    };
    ElementBounds::new((cx - 50.0) as i32, (cy - 25.0) as i32, 100, 50)
}

fn finite_or_zero(v: f64) -> f64 {
    if v.is_finite() {
        v
    } else {
        0.0
    }
}

fn to_ui_element(raw: &RawElement, width: u32, height: u32, limit: (u32, u32)) -> UiElement {
    UiElement {
        text: raw.text.clone().unwrap_or_default(),
        bounds: calculate_bounds(raw, width, height, limit),
        role: Some(raw.kind.clone().unwrap_or_else(|| "unknown".to_string())),
        confidence: raw.confidence.unwrap_or(0.9),
        clickable: raw.clickable.unwrap_or(true),
        source: FinderSource::VisionModel,
    }
}

/// 화면 크기 결정 (알 수 없으면 요소 범위와 최소 크기로 추정)
pub fn screen_size(elements: &[UiElement], width: u32, height: u32) -> (u32, u32) {
    if width > 0 && height > 0 {
        return (width, height);
    }
    let max_x = elements
        .iter()
        .map(|e| (e.bounds.x.max(0) as u32).saturating_add(e.bounds.width))
        .max()
        .unwrap_or(0);
    let max_y = elements
        .iter()
        .map(|e| (e.bounds.y.max(0) as u32).saturating_add(e.bounds.height))
        .max()
        .unwrap_or(0);
    (max_x.max(MIN_SCREEN_WIDTH), max_y.max(MIN_SCREEN_HEIGHT))
}

fn param_i32(params: &Map<String, Value>, key: &str) -> Option<i32> {
    params.get(key).and_then(Value::as_f64).map(|v| v.round() as i32)
}

fn param_f64(params: &Map<String, Value>, key: &str) -> Option<f64> {
    params.get(key).and_then(Value::as_f64)
}

fn or_default(reason: &str, default: &str) -> String {
    if reason.is_empty() {
        default.to_string()
    } else {
        reason.to_string()
    }
}

/// 모델 명령 → 디바이스 명령 (알 수 없는 동작은 None)
pub fn create_command(
    action: &str,
    params: &Map<String, Value>,
    reason: &str,
    elements: &[UiElement],
    width: u32,
    height: u32,
) -> Option<Command> {
    let (cx, cy) = ((width / 2) as i32, (height / 2) as i32);

    match action.to_lowercase().as_str() {
        "tap" => {
            if let Some(target) = params.get("target").and_then(Value::as_str) {
                let needle = target.to_lowercase();
                let hit = elements.iter().find(|e| {
                    (!e.text.is_empty() && e.text.to_lowercase().contains(&needle))
                        || e.role
                            .as_deref()
                            .is_some_and(|r| r.to_lowercase().contains(&needle))
                });
                if let Some(element) = hit {
                    let Point { x, y } = element.center();
                    return Some(Command::tap(
                        x,
                        y,
                        or_default(reason, &format!("Tapping {target}")),
                    ));
                }
            }
            Some(Command::tap(
                param_i32(params, "x").unwrap_or(cx),
                param_i32(params, "y").unwrap_or(cy),
                reason,
            ))
        }
        "swipe" | "scroll" => Some(Command::new(
            CommandKind::Swipe {
                start_x: param_i32(params, "start_x").unwrap_or(cx),
                start_y: param_i32(params, "start_y")
                    .unwrap_or((height as f64 * 0.7).round() as i32),
                end_x: param_i32(params, "end_x").unwrap_or(cx),
                end_y: param_i32(params, "end_y").unwrap_or((height as f64 * 0.3).round() as i32),
                duration: param_f64(params, "duration").unwrap_or(0.5),
            },
            or_default(reason, "Scrolling for more content"),
        )),
        "type" => Some(Command::type_text(
            params
                .get("text")
                .and_then(Value::as_str)
                .unwrap_or_default(),
            or_default(reason, "Entering text"),
        )),
        "wait" => Some(Command::wait(
            param_f64(params, "duration").unwrap_or(2.0),
            or_default(reason, "Waiting for screen to load"),
        )),
        "back" => Some(Command::back(or_default(reason, "Going back"))),
        other => {
            debug!(action = other, "알 수 없는 모델 동작 무시");
            None
        }
    }
}

/// 모델 텍스트 키워드 → 명령 (해당 항목 모두 누적)
pub fn keyword_commands(text: &str, width: u32, height: u32) -> Vec<Command> {
    let lower = text.to_lowercase();
    let has_any = |words: &[&str]| words.iter().any(|w| lower.contains(w));
    let (w, h) = (width as f64, height as f64);
    let cx = (width / 2) as i32;
    let mut commands = Vec::new();

    if has_any(&["login", "sign in", "password", "username"]) {
        commands.push(Command::tap(cx, (height / 3) as i32, "Login field detected"));
    }
    if has_any(&["button", "continue", "next", "submit", "accept"]) {
        commands.push(Command::tap(
            cx,
            (h * 0.7).round() as i32,
            "Action button detected",
        ));
    }
    if has_any(&["list", "scroll", "feed", "items"]) {
        commands.push(Command::scroll_up(width, height, "Scrollable content detected"));
    }
    if has_any(&["text field", "input", "search", "type"]) {
        commands.push(Command::type_text(
            "AI automated input",
            "Text input field detected",
        ));
    }
    for (i, fx) in [0.2, 0.4, 0.6, 0.8].iter().enumerate() {
        let n = i + 1;
        if lower.contains(&format!("tab {n}")) || lower.contains(&format!("position {n}")) {
            commands.push(Command::tap(
                (w * fx) as i32,
                (h * 0.95) as i32,
                format!("Tab {n} detected"),
            ));
        }
    }

    commands
}

/// 아무 명령도 없을 때: 첫 클릭 가능 요소 탭, 없으면 스크롤
pub fn fallback_command(elements: &[UiElement]) -> Command {
    match elements.iter().find(|e| e.clickable) {
        Some(element) => {
            let Point { x, y } = element.center();
            Command::tap(x, y, format!("Tapping {}", element.role.as_deref().unwrap_or("element")))
        }
        None => Command::swipe((200, 600), (200, 200), 0.5, "Exploring by scrolling"),
    }
}

// ============================================
// 프롬프트
// ============================================

fn format_elements(elements: &[UiElement]) -> String {
    if elements.is_empty() {
        return "No elements detected".to_string();
    }
    elements
        .iter()
        .take(PROMPT_ELEMENT_LIMIT)
        .enumerate()
        .map(|(i, e)| {
            let mut line = format!("{}. {}", i + 1, e.role.as_deref().unwrap_or("unknown"));
            if !e.text.is_empty() {
                line.push_str(&format!(": '{}'", e.text));
            }
            if e.clickable {
                line.push_str(" [clickable]");
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_history(request: &AnalysisRequest) -> String {
    if request.history.is_empty() {
        return "No previous interactions".to_string();
    }
    let skip = request.history.len().saturating_sub(PROMPT_HISTORY_LIMIT);
    let lines: Vec<String> = request
        .history
        .iter()
        .skip(skip)
        .filter_map(|entry| entry.action_taken.as_ref())
        .enumerate()
        .map(|(i, cmd)| format!("{}. {}: {}", i + 1, cmd.action_name(), cmd.reason))
        .collect();
    if lines.is_empty() {
        "No actions taken yet".to_string()
    } else {
        lines.join("\n")
    }
}

/// 화면 분석 프롬프트
pub fn build_analysis_prompt(request: &AnalysisRequest, elements: &[UiElement]) -> String {
    let goal = request.goal.as_deref().unwrap_or(DEFAULT_GOAL);
    let instructions = request.prompt.as_deref().unwrap_or(
        "Identify the screen type, every visible UI element with its position, \
         and all visible text. Then decide the next best action.",
    );

    format!(
        "You are controlling a smartphone through screen mirroring.\n\n\
         {instructions}\n\n\
         DETECTED ELEMENTS:\n{elements}\n\n\
         INTERACTION HISTORY:\n{history}\n\n\
         USER GOAL: {goal}\n\n\
         Respond as JSON:\n\
         {{\"screen_type\": \"...\", \"text_content\": \"...\", \
         \"elements\": [{{\"type\": \"button\", \"text\": \"...\", \"x\": 0, \"y\": 0, \
         \"width\": 100, \"height\": 50, \"clickable\": true}}], \
         \"explanation\": \"...\", \"confidence\": 0.0, \
         \"commands\": [{{\"action\": \"tap|swipe|type|scroll|wait|back\", \
         \"parameters\": {{}}, \"reason\": \"...\"}}]}}",
        elements = format_elements(elements),
        history = format_history(request),
    )
}

/// 요소 위치 질의 프롬프트
pub fn build_locate_prompt(description: &str) -> String {
    format!(
        "Find and tap: {description}\n\
         Respond only as JSON: {{\"x\": <int>, \"y\": <int>, \"confidence\": <0.0-1.0>}}. \
         If the element is not visible respond {{\"confidence\": 0}}."
    )
}

#[derive(Debug, Deserialize)]
struct RawLocation {
    #[serde(default)]
    x: Option<f64>,
    #[serde(default)]
    y: Option<f64>,
    #[serde(default)]
    confidence: Option<f64>,
}

/// 위치 응답 해석 (좌표가 없으면 None)
pub fn parse_locate_response(text: &str) -> Option<LocatedElement> {
    let raw: RawLocation = serde_json::from_str(extract_json(text)?).ok()?;
    let (x, y) = (raw.x?, raw.y?);
    Some(LocatedElement {
        coordinates: Point::new(x.round() as i32, y.round() as i32),
        confidence: raw.confidence.unwrap_or(0.0).clamp(0.0, 1.0),
    })
}
