//! 설정 로드.
//!
//! 우선순위: 기본값 < 설정 파일(JSON) < `MIRROR__` 환경 변수 < CLI 인자.
//! 예: `MIRROR__SERVER__PORT=6000`, `MIRROR__VISION__ANALYZER=ocr`

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use tracing::debug;

use mirror_core::config::{AnalyzerBackend, AppConfig};
use mirror_core::config_manager::ConfigManager;

/// 환경 변수 접두사
const ENV_PREFIX: &str = "MIRROR";
/// 환경 변수 경로 구분자
const ENV_SEPARATOR: &str = "__";
/// 메모리 DB 파일 이름
pub const MEMORY_DB_FILE: &str = "memory.db";

/// CLI로 덮어쓰는 값
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub port: Option<u16>,
    pub local_only: bool,
    pub analyzer: Option<AnalyzerBackend>,
    pub data_dir: Option<PathBuf>,
}

/// 로드된 설정
#[derive(Debug, Clone)]
pub struct LoadedSettings {
    pub config: AppConfig,
    /// 사용한 설정 파일 (--in-memory 실행 시 None)
    pub config_path: Option<PathBuf>,
}

/// 설정 파일 + 환경 변수 로드
///
/// 설정 파일이 없으면 기본값으로 생성한다. `in_memory`이고 경로 지정이
/// 없으면 파일을 건드리지 않고 기본값과 환경 변수만 사용한다.
pub fn load(config_path: Option<&Path>, in_memory: bool) -> Result<LoadedSettings> {
    let config_path = match (config_path, in_memory) {
        (Some(path), _) => Some(
            ConfigManager::with_path(path.to_path_buf())?
                .config_path()
                .to_path_buf(),
        ),
        (None, true) => None,
        (None, false) => Some(ConfigManager::new()?.config_path().to_path_buf()),
    };

    let config = layered(config_path.as_deref(), environment())?;
    Ok(LoadedSettings {
        config,
        config_path,
    })
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator(ENV_SEPARATOR)
        .separator(ENV_SEPARATOR)
        .try_parsing(true)
}

/// 파일과 환경 변수 소스를 합쳐 `AppConfig`로 역직렬화
fn layered(path: Option<&Path>, env: Environment) -> Result<AppConfig> {
    let mut builder = Config::builder();
    if let Some(path) = path {
        debug!("설정 파일 로드: {}", path.display());
        builder = builder.add_source(File::from(path).format(FileFormat::Json).required(false));
    }

    builder
        .add_source(env)
        .build()
        .context("설정 소스 병합 실패")?
        .try_deserialize::<AppConfig>()
        .context("설정 역직렬화 실패")
}

/// CLI 인자 적용
pub fn apply_overrides(config: &mut AppConfig, overrides: &CliOverrides) {
    if let Some(port) = overrides.port {
        config.server.port = port;
    }
    if overrides.local_only {
        config.server.allow_external = false;
    }
    if let Some(analyzer) = overrides.analyzer {
        config.vision.analyzer = analyzer;
    }
    if let Some(dir) = &overrides.data_dir {
        config.memory.db_path = Some(dir.join(MEMORY_DB_FILE));
    }
}

/// `--analyzer` 값 파싱 (설정 파일과 같은 snake_case 이름)
pub fn parse_analyzer(value: &str) -> Result<AnalyzerBackend, String> {
    let normalized = value.trim().to_ascii_lowercase().replace('-', "_");
    serde_json::from_value(serde_json::Value::String(normalized))
        .map_err(|_| format!("알 수 없는 분석기: {value} (heuristic, ocr, vision_model)"))
}
