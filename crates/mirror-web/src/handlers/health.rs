//! 헬스 체크 핸들러.

use axum::{extract::State, Json};
use serde::Serialize;

use super::epoch_seconds;
use crate::AppState;

/// 서버 상태
#[derive(Debug, Serialize)]
pub struct HealthDto {
    pub status: &'static str,
    pub uptime_seconds: f64,
    pub frames_received: u64,
    pub commands_sent: u64,
    /// 마지막 프레임 수신 시각 (에포크 초)
    pub last_frame: Option<f64>,
    pub analyzer: String,
    pub active_sessions: usize,
    pub history_length: usize,
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthDto> {
    Json(HealthDto {
        status: "healthy",
        uptime_seconds: state.stats.uptime_seconds(),
        frames_received: state.stats.frames_received(),
        commands_sent: state.stats.commands_sent(),
        last_frame: state.stats.last_frame().map(epoch_seconds),
        analyzer: state.analyzer.name().to_string(),
        active_sessions: state.sessions.len(),
        history_length: state.sessions.total_history_len(),
    })
}
