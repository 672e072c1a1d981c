//! 프레임 수신/분석 핸들러.

use axum::{extract::rejection::JsonRejection, extract::State, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use mirror_core::models::analysis::{AnalysisRequest, DominantColor, ScreenAnalysis};
use mirror_core::models::command::Command;
use mirror_core::models::frame::{Frame, FrameMetadata, FrameSubmission};
use mirror_core::models::session::HistoryEntry;
use mirror_vision::decode::{decode_base64_image, decode_submission, frame_from_image};

use super::{epoch_seconds, join_error};
use crate::{error::ApiError, AppState};

/// 분석 프롬프트에 넣는 최근 이력 수
const PROMPT_HISTORY: usize = 5;

// ============================================================
// DTO
// ============================================================

/// POST /frame 응답
#[derive(Debug, Serialize)]
pub struct FrameResponse {
    pub success: bool,
    pub frame_id: u64,
    pub device_id: String,
    pub understanding: String,
    pub analyzer: String,
    pub commands: Vec<Command>,
    pub confidence: f64,
    pub ui_elements_found: usize,
}

/// POST /broadcast-frame 응답
#[derive(Debug, Serialize)]
pub struct BroadcastResponse {
    pub success: bool,
    pub frame_number: u64,
    pub commands_queued: usize,
}

/// GET /analyze 응답
#[derive(Debug, Serialize)]
pub struct LatestAnalysisDto {
    /// 프레임 시각 (에포크 초)
    pub timestamp: f64,
    pub device_id: String,
    pub frame_number: u64,
    pub image_size: [u32; 2],
    pub image_mode: &'static str,
    pub dominant_colors: Vec<DominantColor>,
    pub brightness: f64,
    pub suggested_actions: Vec<Command>,
}

/// POST /analyze 요청
#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    #[serde(default, alias = "frame")]
    pub image: String,
    #[serde(default)]
    pub prompt: Option<String>,
}

/// 디코딩 후 세션에 기록된 프레임
pub(crate) struct ReceivedFrame {
    pub device_id: String,
    pub frame: Frame,
    /// 분석 요청 (이번 프레임 이전 이력 포함)
    pub request: AnalysisRequest,
    pub app: Option<String>,
}

/// 분석까지 끝난 프레임
pub(crate) struct IngestedFrame {
    pub device_id: String,
    pub frame: Frame,
    pub analysis: ScreenAnalysis,
}

// ============================================================
// 공통 처리
// ============================================================

/// 디코딩 → 통계/세션 기록
pub(crate) async fn receive(
    state: &AppState,
    submission: FrameSubmission,
) -> Result<ReceivedFrame, ApiError> {
    let device_id = state
        .sessions
        .device_id_or_default(submission.device_id.as_deref());
    let fallback_number = state.sessions.next_frame_number(&device_id);

    let request = AnalysisRequest {
        prompt: submission.prompt.clone(),
        goal: submission.goal.clone(),
        history: state.sessions.recent_history(&device_id, PROMPT_HISTORY),
        ocr_text: submission.ocr_text.clone(),
    };
    let app = submission.app.clone();
    let session_id = submission.session_id.clone();

    let decode_device = device_id.clone();
    let (frame, accessibility) = tokio::task::spawn_blocking(move || {
        decode_submission(&submission, &decode_device, fallback_number)
            .map(|frame| (frame, submission.accessibility))
    })
    .await
    .map_err(join_error)??;

    state.stats.record_frame();
    state
        .sessions
        .record_frame(frame.clone(), session_id.as_deref(), accessibility);

    Ok(ReceivedFrame {
        device_id,
        frame,
        request,
        app,
    })
}

/// 분석 결과를 디바이스 이력에 추가
pub(crate) fn record_history(
    state: &AppState,
    device_id: &str,
    frame: &Frame,
    analysis: &ScreenAnalysis,
) {
    state.sessions.push_history(
        device_id,
        HistoryEntry {
            device_id: device_id.to_string(),
            frame_number: frame.metadata.frame_number,
            understanding: analysis.understanding.clone(),
            action_taken: analysis.commands.first().cloned(),
            timestamp: Utc::now(),
        },
    );
}

/// 수신 → 분석 → 이력 추가
pub(crate) async fn ingest(
    state: &AppState,
    submission: FrameSubmission,
) -> Result<IngestedFrame, ApiError> {
    let received = receive(state, submission).await?;
    let frame = received.frame;
    let analysis = state.analyzer.analyze(&frame, &received.request).await?;
    record_history(state, &received.device_id, &frame, &analysis);

    info!(
        device_id = %received.device_id,
        frame_number = frame.metadata.frame_number,
        width = frame.width(),
        height = frame.height(),
        commands = analysis.commands.len(),
        confidence = analysis.confidence,
        "프레임 분석 완료"
    );

    Ok(IngestedFrame {
        device_id: received.device_id,
        frame,
        analysis,
    })
}

// ============================================================
// 핸들러
// ============================================================

/// POST /frame: 분석 후 명령을 바로 응답
pub async fn post_frame(
    State(state): State<AppState>,
    payload: Result<Json<FrameSubmission>, JsonRejection>,
) -> Result<Json<FrameResponse>, ApiError> {
    let Json(submission) = payload?;
    let ingested = ingest(&state, submission).await?;

    let commands = ingested.analysis.commands;
    state.stats.add_commands_sent(commands.len());
    state.sessions.with_session(&ingested.device_id, |session| {
        session.commands_sent += commands.len() as u64;
    });

    Ok(Json(FrameResponse {
        success: true,
        frame_id: ingested.frame.metadata.frame_number,
        device_id: ingested.device_id,
        understanding: ingested.analysis.understanding,
        analyzer: ingested.analysis.analyzer,
        ui_elements_found: ingested.analysis.elements.len(),
        confidence: ingested.analysis.confidence,
        commands,
    }))
}

/// POST /broadcast-frame: 분석 후 명령을 디바이스 큐에 적재
pub async fn broadcast_frame(
    State(state): State<AppState>,
    payload: Result<Json<FrameSubmission>, JsonRejection>,
) -> Result<Json<BroadcastResponse>, ApiError> {
    let Json(submission) = payload?;
    let ingested = ingest(&state, submission).await?;

    let queued = state
        .sessions
        .enqueue(&ingested.device_id, ingested.analysis.commands);
    if queued > 0 {
        debug!(device_id = %ingested.device_id, queued, "명령 큐 적재");
    }

    Ok(Json(BroadcastResponse {
        success: true,
        frame_number: ingested.frame.metadata.frame_number,
        commands_queued: queued,
    }))
}

/// GET /analyze: 최신 프레임 색상 분석
pub async fn get_latest_analysis(
    State(state): State<AppState>,
) -> Result<Json<LatestAnalysisDto>, ApiError> {
    let frame = state
        .sessions
        .latest_frame()
        .ok_or_else(|| ApiError::NotFound("No frames received yet".to_string()))?;

    let report = state.heuristic.report(&frame).await?;
    let colors = report.analysis.colors.unwrap_or_default();

    Ok(Json(LatestAnalysisDto {
        timestamp: epoch_seconds(frame.metadata.timestamp),
        device_id: frame.metadata.device_id.clone(),
        frame_number: frame.metadata.frame_number,
        image_size: [frame.width(), frame.height()],
        image_mode: "RGBA",
        dominant_colors: colors.dominant_colors,
        brightness: colors.brightness,
        suggested_actions: report.analysis.commands,
    }))
}

/// POST /analyze: 임의 이미지 분석 (세션 기록 없음)
pub async fn post_analyze(
    State(state): State<AppState>,
    payload: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Result<Json<ScreenAnalysis>, ApiError> {
    let Json(body) = payload?;
    let device_id = state.sessions.device_id_or_default(None);

    let image = body.image;
    let frame = tokio::task::spawn_blocking(move || {
        let decoded = decode_base64_image(&image)?;
        frame_from_image(
            decoded,
            FrameMetadata {
                device_id,
                frame_number: 0,
                frame_number_reported: false,
                timestamp: Utc::now(),
                width: 0,
                height: 0,
                source: None,
            },
        )
    })
    .await
    .map_err(join_error)??;

    let request = AnalysisRequest {
        prompt: body.prompt,
        ..Default::default()
    };
    let analysis = state.analyzer.analyze(&frame, &request).await?;
    Ok(Json(analysis))
}
