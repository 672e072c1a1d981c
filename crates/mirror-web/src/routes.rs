//! API 라우트 정의.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers;
use crate::AppState;

/// 전체 라우트 생성
pub fn routes() -> Router<AppState> {
    Router::new()
        // 헬스 체크
        .route("/health", get(handlers::health::health))
        // 프레임 수신
        .route("/frame", post(handlers::frames::post_frame))
        .route("/broadcast-frame", post(handlers::frames::broadcast_frame))
        // 분석
        .route(
            "/analyze",
            get(handlers::frames::get_latest_analysis).post(handlers::frames::post_analyze),
        )
        // 명령 큐
        .route("/command", post(handlers::commands::post_command))
        .route("/commands", get(handlers::commands::poll_commands))
        .route("/commands/feedback", post(handlers::commands::post_feedback))
        .route("/test-command", get(handlers::commands::test_command))
        // 세션/이력
        .route("/status", get(handlers::sessions::status))
        .route("/sessions", get(handlers::sessions::list_sessions))
        .route("/reset", post(handlers::sessions::reset))
        .route("/history", get(handlers::sessions::history))
        // 자동화
        .route(
            "/automation/process",
            post(handlers::automation::process_frame),
        )
        .route(
            "/automation/execute",
            post(handlers::automation::execute_command),
        )
        .route(
            "/automation/teaching",
            get(handlers::automation::list_teaching),
        )
        .route(
            "/automation/teaching/{id}",
            post(handlers::automation::respond_teaching),
        )
        .route("/automation/audit", get(handlers::automation::get_audit_logs))
        .route("/automation/memory", get(handlers::automation::search_memory))
}
