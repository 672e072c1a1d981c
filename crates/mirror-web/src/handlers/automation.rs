//! 자동화 API 핸들러.
//!
//! 파이프라인 실행, 단일 명령 자가 치유 실행, 사용자 교육 응답,
//! 감사 로그와 사용자 메모리 조회.

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use mirror_automation::audit::{AuditEntry, AuditStats, AuditStatus};
use mirror_automation::executor::ExecutionContext;
use mirror_automation::pipeline::{FrameInput, PipelineOutcome, UNKNOWN_APP};
use mirror_core::models::automation::{AutomationCommand, ExecutionResult};
use mirror_core::models::frame::FrameSubmission;
use mirror_core::models::memory::MemoryHit;
use mirror_core::models::teaching::{TeachingRequest, TeachingResponse};

use super::frames::{receive, record_history};
use crate::{error::ApiError, AppState};

// ============================================================
// DTO
// ============================================================

/// POST /automation/process 요청
#[derive(Debug, Deserialize)]
pub struct ProcessRequest {
    pub user_id: String,
    #[serde(flatten)]
    pub submission: FrameSubmission,
}

/// POST /automation/execute 요청
#[derive(Debug, Deserialize)]
pub struct ExecuteRequest {
    pub user_id: String,
    pub device_id: String,
    #[serde(default)]
    pub app: Option<String>,
    pub command: AutomationCommand,
}

/// 대기 중인 교육 요청 목록
#[derive(Debug, Serialize)]
pub struct TeachingListDto {
    pub requests: Vec<TeachingRequest>,
}

/// 교육 응답 처리 결과
#[derive(Debug, Serialize)]
pub struct TeachingAckDto {
    pub success: bool,
    pub request_id: String,
}

/// 감사 로그 쿼리
#[derive(Debug, Deserialize)]
pub struct AuditQuery {
    #[serde(default = "default_audit_limit")]
    pub limit: usize,
    pub status: Option<String>,
}

fn default_audit_limit() -> usize {
    50
}

/// 감사 로그 응답
#[derive(Debug, Serialize)]
pub struct AuditListDto {
    pub entries: Vec<AuditEntry>,
    pub stats: AuditStats,
}

/// 메모리 조회 쿼리
#[derive(Debug, Deserialize)]
pub struct MemoryQuery {
    pub user_id: Option<String>,
    #[serde(default)]
    pub query: String,
    #[serde(default = "default_memory_limit")]
    pub limit: usize,
}

fn default_memory_limit() -> usize {
    5
}

/// 메모리 조회 응답
#[derive(Debug, Serialize)]
pub struct MemoryResultsDto {
    pub user_id: String,
    pub query: String,
    pub results: Vec<MemoryHit>,
}

// ============================================================
// 핸들러
// ============================================================

/// POST /automation/process: 프레임 → 분석 → 명령 → 실행
pub async fn process_frame(
    State(state): State<AppState>,
    payload: Result<Json<ProcessRequest>, JsonRejection>,
) -> Result<Json<PipelineOutcome>, ApiError> {
    let Json(body) = payload?;
    let received = receive(&state, body.submission).await?;

    let outcome = state
        .automation
        .pipeline
        .process_frame(FrameInput {
            user_id: body.user_id,
            device_id: received.device_id.clone(),
            frame: received.frame.clone(),
            app: received.app,
            ocr_text: received.request.ocr_text,
            goal: received.request.goal,
            history: received.request.history,
        })
        .await?;

    record_history(&state, &received.device_id, &received.frame, &outcome.analysis);
    Ok(Json(outcome))
}

/// POST /automation/execute: 디바이스 최신 화면 기준 단일 명령 실행
pub async fn execute_command(
    State(state): State<AppState>,
    payload: Result<Json<ExecuteRequest>, JsonRejection>,
) -> Result<Json<ExecutionResult>, ApiError> {
    let Json(body) = payload?;
    let frame = state.sessions.device_frame(&body.device_id).ok_or_else(|| {
        ApiError::NotFound(format!("No frames received for device {}", body.device_id))
    })?;

    let ctx = ExecutionContext {
        user_id: body.user_id,
        device_id: body.device_id,
        app: body
            .app
            .filter(|a| !a.trim().is_empty())
            .unwrap_or_else(|| UNKNOWN_APP.to_string()),
        frame,
    };
    let result = state.automation.executor.execute(&ctx, body.command).await?;
    Ok(Json(result))
}

/// GET /automation/teaching: 응답 대기 중인 교육 요청
pub async fn list_teaching(State(state): State<AppState>) -> Json<TeachingListDto> {
    Json(TeachingListDto {
        requests: state.automation.teaching.pending(),
    })
}

/// POST /automation/teaching/{id}: 사용자가 위치를 알려줌
pub async fn respond_teaching(
    State(state): State<AppState>,
    Path(request_id): Path<String>,
    payload: Result<Json<TeachingResponse>, JsonRejection>,
) -> Result<Json<TeachingAckDto>, ApiError> {
    let Json(response) = payload?;
    state.automation.teaching.respond(&request_id, response)?;
    info!(request_id = %request_id, "교육 응답 전달");
    Ok(Json(TeachingAckDto {
        success: true,
        request_id,
    }))
}

/// GET /automation/audit: 최근 감사 로그
pub async fn get_audit_logs(
    State(state): State<AppState>,
    query: Result<Query<AuditQuery>, QueryRejection>,
) -> Result<Json<AuditListDto>, ApiError> {
    let Query(query) = query?;
    let status = match query.status.as_deref() {
        Some(raw) => Some(
            AuditStatus::parse(raw)
                .ok_or_else(|| ApiError::BadRequest(format!("알 수 없는 상태: {raw}")))?,
        ),
        None => None,
    };

    let logger = state.automation.audit.read().await;
    let entries = match status {
        Some(status) => logger.entries_by_status(status, query.limit),
        None => logger.recent_entries(query.limit),
    };

    Ok(Json(AuditListDto {
        entries,
        stats: logger.stats(),
    }))
}

/// GET /automation/memory: 사용자 메모리 회상
pub async fn search_memory(
    State(state): State<AppState>,
    query: Result<Query<MemoryQuery>, QueryRejection>,
) -> Result<Json<MemoryResultsDto>, ApiError> {
    let Query(query) = query?;
    let user_id = query
        .user_id
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("user_id is required".to_string()))?;

    let results = state
        .automation
        .memory
        .remember(&user_id, &query.query, query.limit)
        .await?;

    Ok(Json(MemoryResultsDto {
        user_id,
        query: query.query,
        results,
    }))
}
