//! 화면 프레임 모델.
//!
//! 휴대폰이 보내는 프레임 제출 요청(`FrameSubmission`)과
//! 서버가 디코딩해 보관하는 프레임(`Frame`)을 정의한다.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::element::AccessibilityNode;

/// 화면 크기
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenSize {
    pub width: u32,
    pub height: u32,
}

/// 프레임 타임스탬프: RFC3339 문자열 또는 epoch 초 (실수)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FrameTimestamp {
    /// epoch 초
    Epoch(f64),
    /// RFC3339 문자열
    Text(String),
}

impl FrameTimestamp {
    /// UTC 시각으로 변환 (해석 불가 시 None)
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Epoch(secs) => {
                let millis = (secs * 1000.0).round() as i64;
                Utc.timestamp_millis_opt(millis).single()
            }
            Self::Text(text) => DateTime::parse_from_rfc3339(text)
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
        }
    }
}

/// 프레임 제출 요청 (POST /frame, /broadcast-frame)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FrameSubmission {
    /// base64 인코딩 이미지 (`data:image/...;base64,` 접두사 허용)
    #[serde(default, alias = "frame")]
    pub image: String,
    /// 디바이스 식별자
    #[serde(default)]
    pub device_id: Option<String>,
    /// 명령 폴링용 세션 식별자 (없으면 device_id)
    #[serde(default)]
    pub session_id: Option<String>,
    /// 프레임 번호
    #[serde(default)]
    pub frame_number: Option<u64>,
    /// 캡처 시각
    #[serde(default)]
    pub timestamp: Option<FrameTimestamp>,
    /// 보고된 화면 크기 (참고용, 실제 크기는 디코딩 결과 사용)
    #[serde(default)]
    pub screen_size: Option<ScreenSize>,
    /// 전송 소스 (예: "ios_broadcast")
    #[serde(default)]
    pub source: Option<String>,
    /// 자동화 목표
    #[serde(default)]
    pub goal: Option<String>,
    /// 분석 프롬프트 재정의
    #[serde(default)]
    pub prompt: Option<String>,
    /// 휴대폰이 알고 있는 현재 앱
    #[serde(default)]
    pub app: Option<String>,
    /// 휴대폰 측 OCR 텍스트
    #[serde(default)]
    pub ocr_text: Option<String>,
    /// 접근성 트리 노드
    #[serde(default)]
    pub accessibility: Vec<AccessibilityNode>,
}

impl FrameSubmission {
    /// 이미지 데이터 존재 여부
    pub fn has_image(&self) -> bool {
        !self.image.trim().is_empty()
    }

    /// 해석된 캡처 시각 (없거나 해석 불가면 None)
    pub fn captured_at(&self) -> Option<DateTime<Utc>> {
        self.timestamp.as_ref().and_then(FrameTimestamp::to_datetime)
    }
}

/// 프레임 메타데이터
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameMetadata {
    /// 디바이스 식별자
    pub device_id: String,
    /// 프레임 번호 (제출되지 않았으면 세션 수신 카운트)
    pub frame_number: u64,
    /// 프레임 번호가 휴대폰에서 제공되었는지 여부
    #[serde(default)]
    pub frame_number_reported: bool,
    /// 캡처 시각
    pub timestamp: DateTime<Utc>,
    /// 이미지 너비
    pub width: u32,
    /// 이미지 높이
    pub height: u32,
    /// 전송 소스
    pub source: Option<String>,
}

/// 디코딩된 프레임 (RGBA8 픽셀)
///
/// 픽셀 버퍼는 `Arc`로 공유되어 복제 비용이 작다.
#[derive(Debug, Clone)]
pub struct Frame {
    pub metadata: FrameMetadata,
    /// 행 우선 RGBA8 픽셀 (`width * height * 4` 바이트)
    pub rgba: Arc<Vec<u8>>,
}

impl Frame {
    /// 메타데이터와 픽셀로 프레임 생성
    ///
    /// 픽셀 길이가 크기와 맞지 않으면 None.
    pub fn new(metadata: FrameMetadata, rgba: Vec<u8>) -> Option<Self> {
        let expected = metadata.width as usize * metadata.height as usize * 4;
        if rgba.len() != expected {
            return None;
        }
        Some(Self {
            metadata,
            rgba: Arc::new(rgba),
        })
    }

    pub fn width(&self) -> u32 {
        self.metadata.width
    }

    pub fn height(&self) -> u32 {
        self.metadata.height
    }

    /// 화면 중심 좌표
    pub fn center(&self) -> (i32, i32) {
        ((self.width() / 2) as i32, (self.height() / 2) as i32)
    }

    /// (x, y) 픽셀의 RGBA 값
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width() || y >= self.height() {
            return None;
        }
        let idx = (y as usize * self.width() as usize + x as usize) * 4;
        let px = self.rgba.get(idx..idx + 4)?;
        Some([px[0], px[1], px[2], px[3]])
    }
}
