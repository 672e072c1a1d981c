//! # mirror-web
//!
//! 화면 미러링 자동화 HTTP 서버.
//! Axum 기반 JSON API.
//!
//! ## 기능
//! - 프레임 수신 및 분석 (`/frame`, `/broadcast-frame`, `/analyze`)
//! - 명령 큐 및 폴링 (`/command`, `/commands`, `/commands/feedback`)
//! - 세션/이력 조회 및 초기화
//! - 자가 치유 자동화, 사용자 교육, 감사 로그, 메모리 조회 (`/automation/*`)

pub mod error;
pub mod handlers;
pub mod routes;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use axum::extract::DefaultBodyLimit;
use axum::Router;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use mirror_automation::audit::AuditLogger;
use mirror_automation::executor::SelfHealingExecutor;
use mirror_automation::pipeline::AutomationPipeline;
use mirror_automation::session::SessionRegistry;
use mirror_automation::teaching::TeachingBroker;
use mirror_core::config::ServerConfig;
use mirror_core::ports::memory::MemoryStore;
use mirror_core::ports::screen_analyzer::ScreenAnalyzer;
use mirror_vision::analyzer::HeuristicAnalyzer;

/// 포트 바인드 최대 시도 횟수
const MAX_PORT_ATTEMPTS: u16 = 10;

/// 서버 전체 카운터
#[derive(Debug)]
pub struct ServerStats {
    started: Instant,
    frames_received: AtomicU64,
    commands_sent: AtomicU64,
    last_frame: RwLock<Option<DateTime<Utc>>>,
}

impl ServerStats {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            frames_received: AtomicU64::new(0),
            commands_sent: AtomicU64::new(0),
            last_frame: RwLock::new(None),
        }
    }

    /// 프레임 수신 기록 → 누적 수신 수
    pub fn record_frame(&self) -> u64 {
        *self.last_frame.write() = Some(Utc::now());
        self.frames_received.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn add_commands_sent(&self, count: usize) {
        self.commands_sent
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn uptime_seconds(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }

    pub fn frames_received(&self) -> u64 {
        self.frames_received.load(Ordering::Relaxed)
    }

    pub fn commands_sent(&self) -> u64 {
        self.commands_sent.load(Ordering::Relaxed)
    }

    pub fn last_frame(&self) -> Option<DateTime<Utc>> {
        *self.last_frame.read()
    }
}

impl Default for ServerStats {
    fn default() -> Self {
        Self::new()
    }
}

/// 자동화 서비스 묶음
#[derive(Clone)]
pub struct AutomationServices {
    pub pipeline: Arc<AutomationPipeline>,
    pub executor: Arc<SelfHealingExecutor>,
    pub teaching: Arc<TeachingBroker>,
    pub audit: Arc<tokio::sync::RwLock<AuditLogger>>,
    pub memory: Arc<dyn MemoryStore>,
}

/// 웹 서버 애플리케이션 상태
#[derive(Clone)]
pub struct AppState {
    /// 디바이스 세션
    pub sessions: Arc<SessionRegistry>,
    /// 프레임 분석기
    pub analyzer: Arc<dyn ScreenAnalyzer>,
    /// GET /analyze 용 색상/규칙 분석기
    pub heuristic: Arc<HeuristicAnalyzer>,
    /// 서버 카운터
    pub stats: Arc<ServerStats>,
    /// 자동화 서비스
    pub automation: AutomationServices,
}

/// 라우터 구성 (CORS, 요청 추적, 본문 크기 제한 포함)
pub fn build_router(state: AppState, max_body_mb: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    routes::routes()
        .layer(DefaultBodyLimit::max(max_body_mb.max(1) * 1024 * 1024))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// HTTP 서버
pub struct WebServer {
    config: ServerConfig,
    state: AppState,
}

impl WebServer {
    /// 새 웹 서버 생성
    pub fn new(config: ServerConfig, state: AppState) -> Self {
        Self { config, state }
    }

    /// 서버 실행
    ///
    /// 기본 포트에서 시작하여, 포트가 이미 사용 중이면 다음 포트를 시도합니다.
    /// 최대 10개 포트를 시도한 후 실패하면 에러를 반환합니다.
    pub async fn run(self, mut shutdown_rx: watch::Receiver<bool>) -> Result<(), std::io::Error> {
        let host = if self.config.allow_external {
            "0.0.0.0"
        } else {
            "127.0.0.1"
        };

        let app = build_router(self.state, self.config.max_body_mb);

        let base_port = self.config.port;
        let mut last_error = None;

        for attempt in 0..MAX_PORT_ATTEMPTS {
            let port = base_port.saturating_add(attempt);

            // 포트 오버플로우 체크
            if port < base_port && attempt > 0 {
                break;
            }

            let addr: SocketAddr = match format!("{host}:{port}").parse() {
                Ok(a) => a,
                Err(e) => {
                    error!("잘못된 주소 {host}:{port}: {e}");
                    continue;
                }
            };

            match TcpListener::bind(addr).await {
                Ok(listener) => {
                    if attempt > 0 {
                        warn!("포트 {base_port} 사용 불가, 대체 포트 {port} 사용");
                    }
                    info!("MIRROR 서버 시작: http://{addr}");

                    axum::serve(listener, app)
                        .with_graceful_shutdown(async move {
                            loop {
                                if *shutdown_rx.borrow() {
                                    info!("웹 서버 종료 신호 수신");
                                    break;
                                }
                                if shutdown_rx.changed().await.is_err() {
                                    break;
                                }
                            }
                        })
                        .await?;

                    info!("MIRROR 서버 종료");
                    return Ok(());
                }
                Err(e) => {
                    if e.kind() == std::io::ErrorKind::AddrInUse {
                        warn!("포트 {port} 이미 사용 중, 다음 포트 시도...");
                        last_error = Some(e);
                        continue;
                    }
                    return Err(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::AddrInUse,
                format!(
                    "포트 {}-{} 모두 사용 불가",
                    base_port,
                    base_port.saturating_add(MAX_PORT_ATTEMPTS - 1)
                ),
            )
        }))
    }

    /// 서버 URL 반환
    pub fn url(&self) -> String {
        format!("http://localhost:{}", self.config.port)
    }
}

#[cfg(test)]
pub(crate) mod test_support;
