//! 요소 위치 추정과 프레임 비교 포트.
//!
//! 자가 치유 실행기의 시각 레이어와 검증 단계가 사용한다.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::models::element::Point;
use crate::models::frame::Frame;

/// 위치 추정 결과
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocatedElement {
    /// 탭 좌표
    pub coordinates: Point,
    /// 추정 신뢰도 (0.0 ~ 1.0)
    pub confidence: f64,
}

/// 자연어 설명으로 화면 요소 위치를 추정한다.
///
/// 구현체: `OcrElementLocator`, `VisionModelAnalyzer` (mirror-vision)
#[async_trait]
pub trait ElementLocator: Send + Sync {
    /// 요소 위치 추정 (찾지 못하면 None)
    async fn locate(
        &self,
        frame: &Frame,
        description: &str,
    ) -> Result<Option<LocatedElement>, CoreError>;

    /// 위치 추정기 이름
    fn name(&self) -> &str;
}

/// 두 프레임의 변화율 계산
///
/// 구현체: `TileFrameComparator` (mirror-vision)
pub trait FrameComparator: Send + Sync {
    /// 변화율 (0.0 = 동일, 1.0 = 전부 다름)
    fn diff_ratio(&self, before: &Frame, after: &Frame) -> f64;
}
