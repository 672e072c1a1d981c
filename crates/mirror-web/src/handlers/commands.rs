//! 명령 큐 핸들러.
//!
//! 휴대폰은 `GET /commands`를 주기적으로 폴링해 대기 명령을 가져간다.

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::HeaderMap,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use mirror_core::models::command::Command;

use super::{epoch_seconds, DeviceQuery};
use crate::{error::ApiError, AppState};

/// 폴링 세션 헤더
pub const SESSION_HEADER: &str = "x-session-id";
/// 헤더/쿼리 모두 없을 때의 폴링 키
const DEFAULT_POLL_KEY: &str = "default";

// ============================================================
// DTO
// ============================================================

/// 명령 적재 결과
#[derive(Debug, Serialize)]
pub struct CommandQueuedDto {
    pub success: bool,
    pub command: Command,
    /// 적재 시각 (에포크 초)
    pub queued_at: f64,
    /// 적재된 디바이스 목록
    pub queued_for: Vec<String>,
}

/// 폴링 응답
#[derive(Debug, Serialize)]
pub struct PollResponse {
    pub commands: Vec<Command>,
    pub session_id: String,
    pub timestamp: f64,
}

/// 실행 피드백
#[derive(Debug, Deserialize)]
pub struct FeedbackRequest {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub device_id: Option<String>,
}

/// 피드백 확인
#[derive(Debug, Serialize)]
pub struct FeedbackAck {
    pub acknowledged: bool,
}

// ============================================================
// 핸들러
// ============================================================

/// 지정 디바이스 또는 전체 세션에 적재
fn queue_command(state: &AppState, device_id: Option<&str>, command: Command) -> CommandQueuedDto {
    let queued_for = match device_id {
        Some(device_id) => {
            state.sessions.enqueue(device_id, [command.clone()]);
            vec![device_id.to_string()]
        }
        None => state.sessions.enqueue_all(std::slice::from_ref(&command)),
    };

    info!(
        action = command.action_name(),
        devices = queued_for.len(),
        "수동 명령 적재"
    );

    CommandQueuedDto {
        success: true,
        command,
        queued_at: epoch_seconds(Utc::now()),
        queued_for,
    }
}

/// POST /command: 수동 명령 적재
pub async fn post_command(
    State(state): State<AppState>,
    query: Result<Query<DeviceQuery>, QueryRejection>,
    payload: Result<Json<Command>, JsonRejection>,
) -> Result<Json<CommandQueuedDto>, ApiError> {
    let Query(query) = query?;
    let Json(command) = payload?;
    Ok(Json(queue_command(&state, query.device(), command)))
}

/// GET /commands: 대기 명령 폴링
pub async fn poll_commands(
    State(state): State<AppState>,
    query: Result<Query<DeviceQuery>, QueryRejection>,
    headers: HeaderMap,
) -> Result<Json<PollResponse>, ApiError> {
    let Query(query) = query?;
    let key = headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .or_else(|| query.device())
        .unwrap_or(DEFAULT_POLL_KEY)
        .to_string();

    let (commands, session_id) = match state.sessions.drain_commands(&key) {
        Some(drained) => (drained.commands, drained.session_id),
        None => (Vec::new(), key),
    };
    state.stats.add_commands_sent(commands.len());

    Ok(Json(PollResponse {
        commands,
        session_id,
        timestamp: epoch_seconds(Utc::now()),
    }))
}

/// POST /commands/feedback: 실행 결과 보고
pub async fn post_feedback(
    State(state): State<AppState>,
    payload: Result<Json<FeedbackRequest>, JsonRejection>,
) -> Result<Json<FeedbackAck>, ApiError> {
    let Json(feedback) = payload?;
    let device_id = state
        .sessions
        .device_id_or_default(feedback.device_id.as_deref());

    if !state.sessions.record_feedback(&device_id, feedback.success) {
        warn!(device_id = %device_id, "알 수 없는 디바이스의 피드백");
    }
    if let Some(error) = feedback.error.as_deref().filter(|_| !feedback.success) {
        warn!(device_id = %device_id, error, "명령 실행 실패 보고");
    }

    Ok(Json(FeedbackAck { acknowledged: true }))
}

/// GET /test-command: 모든 세션에 테스트 탭 적재
pub async fn test_command(State(state): State<AppState>) -> Json<CommandQueuedDto> {
    let command = Command::tap(200, 400, "Test command");
    Json(queue_command(&state, None, command))
}
