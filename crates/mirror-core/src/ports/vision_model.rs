//! 비전-언어 모델 포트.

use async_trait::async_trait;

use crate::error::CoreError;

/// 모델에 보낼 인코딩 이미지
#[derive(Debug, Clone)]
pub struct EncodedImage {
    /// 이미지 바이트
    pub bytes: Vec<u8>,
    /// MIME 타입 (예: "image/jpeg")
    pub media_type: String,
}

/// 이미지 + 프롬프트로 텍스트 응답을 받는 원격 모델
///
/// 응답 파싱(JSON 추출, 명령 생성)은 호출 측 분석기가 담당한다.
///
/// 구현체: `RemoteVisionModel` (mirror-network)
#[async_trait]
pub trait VisionModel: Send + Sync {
    /// 모델 원문 응답 반환
    async fn complete(&self, image: &EncodedImage, prompt: &str) -> Result<String, CoreError>;

    /// 모델 이름
    fn model_name(&self) -> &str;
}
