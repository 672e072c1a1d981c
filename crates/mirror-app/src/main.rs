//! # mirror-server
//!
//! MIRROR 서버 바이너리 진입점.
//! 설정 로드, DI 와이어링, 웹 서버 실행, 종료 시그널 처리.

mod lifecycle;
mod settings;
mod wiring;

use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use mirror_core::config::AnalyzerBackend;
use mirror_web::WebServer;

use crate::lifecycle::LifecycleManager;
use crate::settings::CliOverrides;

/// MIRROR 화면 미러링 자동화 서버
///
/// 휴대폰이 보낸 화면 프레임을 분석해 다음 조작 명령을 돌려준다.
#[derive(Parser, Debug)]
#[command(name = "mirror-server")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// 서버 포트 (기본: 설정 파일 값, 없으면 5000)
    #[arg(long, short = 'p')]
    port: Option<u16>,

    /// 127.0.0.1에만 바인딩 (같은 네트워크의 휴대폰 접속 차단)
    #[arg(long)]
    local_only: bool,

    /// 화면 분석기 (heuristic, ocr, vision_model)
    #[arg(long, short = 'a', value_parser = settings::parse_analyzer)]
    analyzer: Option<AnalyzerBackend>,

    /// 설정 파일 경로 (기본: 플랫폼별 설정 디렉토리의 config.json)
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// 데이터 저장 경로 (메모리 DB)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// 설정 파일과 메모리 DB 없이 실행
    #[arg(long)]
    in_memory: bool,

    /// 로그 레벨 (trace, debug, info, warn, error)
    #[arg(long, short = 'l', default_value = "info")]
    log_level: String,
}

impl Args {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            port: self.port,
            local_only: self.local_only,
            analyzer: self.analyzer,
            data_dir: self.data_dir.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // tracing 초기화 (RUST_LOG가 있으면 우선)
    let log_filter = format!(
        "mirror_server={0},mirror_core={0},mirror_vision={0},mirror_network={0},mirror_storage={0},mirror_automation={0},mirror_web={0},tower_http={0}",
        args.log_level
    );
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_filter)),
        )
        .init();

    info!("MIRROR 서버 시작 (v{})", env!("CARGO_PKG_VERSION"));

    // 설정 로드 → CLI 인자로 오버라이드
    let loaded = settings::load(args.config.as_deref(), args.in_memory)?;
    let mut config = loaded.config;
    settings::apply_overrides(&mut config, &args.overrides());

    match &loaded.config_path {
        Some(path) => info!("설정 파일: {}", path.display()),
        None => info!("설정 파일 없이 실행 (--in-memory)"),
    }
    info!(
        analyzer = ?config.vision.analyzer,
        automation = config.automation.enabled,
        teaching = config.automation.teaching_enabled,
        "실행 설정"
    );

    // ── 어댑터 생성 (DI 와이어링) ──
    let state = wiring::build_state(&config, args.in_memory)?;

    // ── 웹 서버 ──
    let lifecycle = LifecycleManager::new();
    let web_server = WebServer::new(config.server.clone(), state);
    info!("웹 서버: {}", web_server.url());

    let mut server_task = tokio::spawn(web_server.run(lifecycle.subscribe()));

    tokio::select! {
        () = lifecycle.wait_for_signal() => {
            match server_task.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("웹 서버 오류: {e}"),
                Err(e) => error!("웹 서버 태스크 종료 실패: {e}"),
            }
        }
        joined = &mut server_task => {
            lifecycle.shutdown();
            match joined {
                Ok(Ok(())) => warn!("웹 서버가 시그널 없이 종료됨"),
                Ok(Err(e)) => return Err(anyhow!("웹 서버 시작 실패: {e}")),
                Err(e) => return Err(anyhow!("웹 서버 태스크 실패: {e}")),
            }
        }
    }

    info!("MIRROR 서버 종료");
    Ok(())
}
