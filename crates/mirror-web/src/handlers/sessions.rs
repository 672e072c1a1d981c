//! 세션/이력 핸들러.

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    Json,
};
use serde::Serialize;

use mirror_core::models::session::{HistoryEntry, SessionSummary};

use super::DeviceQuery;
use crate::{error::ApiError, AppState};

// ============================================================
// DTO
// ============================================================

/// GET /status 응답
#[derive(Debug, Serialize)]
pub struct StatusDto {
    pub sessions: usize,
    pub total_frames: u64,
    pub devices: Vec<String>,
}

/// GET /sessions 응답
#[derive(Debug, Serialize)]
pub struct SessionListDto {
    pub sessions: Vec<SessionSummary>,
}

/// POST /reset 응답
#[derive(Debug, Serialize)]
pub struct ResetDto {
    pub success: bool,
    pub message: &'static str,
}

/// GET /history 응답
#[derive(Debug, Serialize)]
pub struct HistoryDto {
    pub history: Vec<HistoryEntry>,
    pub length: usize,
}

// ============================================================
// 핸들러
// ============================================================

/// GET /status
pub async fn status(State(state): State<AppState>) -> Json<StatusDto> {
    Json(StatusDto {
        sessions: state.sessions.len(),
        total_frames: state.sessions.total_frames(),
        devices: state.sessions.device_ids(),
    })
}

/// GET /sessions
pub async fn list_sessions(State(state): State<AppState>) -> Json<SessionListDto> {
    Json(SessionListDto {
        sessions: state.sessions.summaries(),
    })
}

/// POST /reset: 이력 초기화 (디바이스 미지정 시 전체)
pub async fn reset(
    State(state): State<AppState>,
    query: Result<Query<DeviceQuery>, QueryRejection>,
) -> Result<Json<ResetDto>, ApiError> {
    let Query(query) = query?;
    state.sessions.reset(query.device());
    Ok(Json(ResetDto {
        success: true,
        message: "Context reset",
    }))
}

/// GET /history: 디바이스 이력 또는 전체 병합 이력
pub async fn history(
    State(state): State<AppState>,
    query: Result<Query<DeviceQuery>, QueryRejection>,
) -> Result<Json<HistoryDto>, ApiError> {
    let Query(query) = query?;
    let history = state.sessions.history(query.device());
    Ok(Json(HistoryDto {
        length: history.len(),
        history,
    }))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::{json, Value};

    use crate::test_support::{call, frame_body, get, post_json, router, state};

    #[tokio::test]
    async fn status_and_session_listing() {
        let app = router(state());
        call(&app, post_json("/frame", &frame_body("iphone"))).await;
        call(&app, post_json("/broadcast-frame", &frame_body("ipad"))).await;

        let (_, status) = call(&app, get("/status")).await;
        assert_eq!(status["sessions"], 2);
        assert_eq!(status["total_frames"], 2);
        assert_eq!(status["devices"], json!(["ipad", "iphone"]));

        let (status, body) = call(&app, get("/sessions")).await;
        assert_eq!(status, StatusCode::OK);
        let sessions = body["sessions"].as_array().unwrap();
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0]["device_id"], "ipad");
        assert_eq!(sessions[0]["queued_commands"], 1);
        assert_eq!(sessions[1]["context_length"], 1);
    }

    #[tokio::test]
    async fn history_and_reset_per_device() {
        let app = router(state());
        for _ in 0..3 {
            call(&app, post_json("/frame", &frame_body("iphone"))).await;
        }
        call(&app, post_json("/frame", &frame_body("ipad"))).await;

        let (_, body) = call(&app, get("/history?device_id=iphone")).await;
        assert_eq!(body["length"], 3);
        let numbers: Vec<Value> = body["history"]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["frame_number"].clone())
            .collect();
        assert_eq!(numbers, vec![json!(1), json!(2), json!(3)]);
        assert_eq!(body["history"][0]["action_taken"]["action"], "tap");

        let (status, body) = call(&app, post_json("/reset?device_id=iphone", &json!({}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Context reset");

        let (_, body) = call(&app, get("/history")).await;
        assert_eq!(body["length"], 1);
        assert_eq!(body["history"][0]["device_id"], "ipad");
    }

    #[tokio::test]
    async fn reset_all_keeps_sessions() {
        let app = router(state());
        call(&app, post_json("/frame", &frame_body("iphone"))).await;

        let (_, body) = call(&app, post_json("/reset", &json!({}))).await;
        assert_eq!(body["success"], true);

        let (_, history) = call(&app, get("/history")).await;
        assert_eq!(history["length"], 0);
        let (_, status) = call(&app, get("/status")).await;
        assert_eq!(status["sessions"], 1);
    }
}
