//! 프레임 디코딩/인코딩.
//!
//! 휴대폰이 보낸 base64 이미지를 RGBA8 `Frame`으로 디코딩하고,
//! 원격 모델 전송용 JPEG/PNG로 다시 인코딩한다.

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine as _;
use chrono::Utc;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{DynamicImage, RgbaImage};
use tracing::debug;

use mirror_core::error::CoreError;
use mirror_core::models::frame::{Frame, FrameMetadata, FrameSubmission};
use mirror_core::ports::vision_model::EncodedImage;

/// 패딩 유무를 모두 허용하는 표준 base64 엔진
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// 모델 전송 JPEG 품질
pub const MODEL_JPEG_QUALITY: u8 = 85;

/// `data:image/...;base64,` 접두사 제거
fn strip_data_uri(data: &str) -> &str {
    if data.starts_with("data:") {
        if let Some((_, payload)) = data.split_once(',') {
            return payload;
        }
    }
    data
}

/// base64 문자열 → 이미지
pub fn decode_base64_image(data: &str) -> Result<DynamicImage, CoreError> {
    let payload = strip_data_uri(data.trim());
    if payload.is_empty() {
        return Err(CoreError::validation("image", "No image data provided"));
    }

    let cleaned: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = LENIENT_BASE64
        .decode(cleaned.as_bytes())
        .map_err(|e| CoreError::ImageDecode(format!("base64 디코딩 실패: {e}")))?;

    let image = image::load_from_memory(&bytes)
        .map_err(|e| CoreError::ImageDecode(format!("이미지 포맷 해석 실패: {e}")))?;

    if image.width() == 0 || image.height() == 0 {
        return Err(CoreError::ImageDecode("빈 이미지: 너비 또는 높이가 0".to_string()));
    }

    Ok(image)
}

/// 이미지 + 메타데이터 → Frame
pub fn frame_from_image(image: DynamicImage, metadata: FrameMetadata) -> Result<Frame, CoreError> {
    let rgba = image.into_rgba8();
    let metadata = FrameMetadata {
        width: rgba.width(),
        height: rgba.height(),
        ..metadata
    };
    Frame::new(metadata, rgba.into_raw())
        .ok_or_else(|| CoreError::Internal("프레임 버퍼 크기 불일치".to_string()))
}

/// 제출 요청 디코딩
///
/// - `device_id`: 이미 결정된 디바이스 ID (기본값 적용 후)
/// - `fallback_frame_number`: 요청에 프레임 번호가 없을 때 사용할 번호
pub fn decode_submission(
    submission: &FrameSubmission,
    device_id: &str,
    fallback_frame_number: u64,
) -> Result<Frame, CoreError> {
    if !submission.has_image() {
        return Err(CoreError::validation("image", "No image data provided"));
    }

    let image = decode_base64_image(&submission.image)?;
    debug!(
        device_id,
        width = image.width(),
        height = image.height(),
        "프레임 디코딩 완료"
    );

    let metadata = FrameMetadata {
        device_id: device_id.to_string(),
        frame_number: submission.frame_number.unwrap_or(fallback_frame_number),
        frame_number_reported: submission.frame_number.is_some(),
        timestamp: submission.captured_at().unwrap_or_else(Utc::now),
        width: 0,
        height: 0,
        source: submission.source.clone(),
    };

    frame_from_image(image, metadata)
}

/// Frame → image 크레이트 버퍼
pub fn to_rgba_image(frame: &Frame) -> Result<RgbaImage, CoreError> {
    RgbaImage::from_raw(frame.width(), frame.height(), frame.rgba.as_ref().clone())
        .ok_or_else(|| CoreError::Internal("프레임 이미지 복원 실패".to_string()))
}

/// JPEG 인코딩 (알파 채널 제거)
pub fn encode_jpeg(frame: &Frame, quality: u8) -> Result<EncodedImage, CoreError> {
    let rgb = DynamicImage::ImageRgba8(to_rgba_image(frame)?).into_rgb8();
    let mut bytes = Vec::new();
    rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut bytes, quality))
        .map_err(|e| CoreError::Internal(format!("JPEG 인코딩 실패: {e}")))?;
    Ok(EncodedImage {
        bytes,
        media_type: "image/jpeg".to_string(),
    })
}

/// PNG 인코딩
pub fn encode_png(frame: &Frame) -> Result<EncodedImage, CoreError> {
    let rgba = to_rgba_image(frame)?;
    let mut bytes = Vec::new();
    rgba.write_with_encoder(PngEncoder::new(&mut bytes))
        .map_err(|e| CoreError::Internal(format!("PNG 인코딩 실패: {e}")))?;
    Ok(EncodedImage {
        bytes,
        media_type: "image/png".to_string(),
    })
}

/// 이미지를 PNG base64 문자열로 인코딩 (테스트/클라이언트 도구용)
pub fn encode_base64_png(image: &RgbaImage) -> Result<String, CoreError> {
    let mut bytes = Vec::new();
    image
        .write_with_encoder(PngEncoder::new(&mut bytes))
        .map_err(|e| CoreError::Internal(format!("PNG 인코딩 실패: {e}")))?;
    Ok(base64::engine::general_purpose::STANDARD.encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use image::Rgba;

    fn sample_base64(w: u32, h: u32) -> String {
        let img = RgbaImage::from_pixel(w, h, Rgba([10, 20, 30, 255]));
        encode_base64_png(&img).unwrap()
    }

    #[test]
    fn decode_plain_and_data_uri() {
        let b64 = sample_base64(4, 3);
        let img = decode_base64_image(&b64).unwrap();
        assert_eq!((img.width(), img.height()), (4, 3));

        let uri = format!("data:image/png;base64,{b64}");
        let img = decode_base64_image(&uri).unwrap();
        assert_eq!(img.width(), 4);
    }

    #[test]
    fn decode_without_padding() {
        let b64 = sample_base64(5, 5);
        let trimmed = b64.trim_end_matches('=');
        assert!(decode_base64_image(trimmed).is_ok());
    }

    #[test]
    fn invalid_base64_is_decode_error() {
        assert_matches!(
            decode_base64_image("@@@not-base64@@@"),
            Err(CoreError::ImageDecode(_))
        );
        // 유효한 base64지만 이미지가 아님
        assert_matches!(
            decode_base64_image("aGVsbG8gd29ybGQ="),
            Err(CoreError::ImageDecode(_))
        );
    }

    #[test]
    fn empty_submission_is_validation_error() {
        let sub = FrameSubmission::default();
        assert_matches!(
            decode_submission(&sub, "d", 1),
            Err(CoreError::Validation { ref field, .. }) if field == "image"
        );
    }

    #[test]
    fn submission_metadata_is_filled() {
        let sub = FrameSubmission {
            image: sample_base64(8, 6),
            frame_number: None,
            ..Default::default()
        };
        let frame = decode_submission(&sub, "iphone", 42).unwrap();
        assert_eq!(frame.metadata.frame_number, 42);
        assert!(!frame.metadata.frame_number_reported);
        assert_eq!((frame.width(), frame.height()), (8, 6));
        assert_eq!(frame.pixel(0, 0), Some([10, 20, 30, 255]));
    }

    #[test]
    fn jpeg_and_png_encoding() {
        let sub = FrameSubmission {
            image: sample_base64(16, 16),
            ..Default::default()
        };
        let frame = decode_submission(&sub, "d", 1).unwrap();

        let jpeg = encode_jpeg(&frame, MODEL_JPEG_QUALITY).unwrap();
        assert_eq!(jpeg.media_type, "image/jpeg");
        assert_eq!(&jpeg.bytes[..2], &[0xFF, 0xD8]);

        let png = encode_png(&frame).unwrap();
        assert_eq!(png.media_type, "image/png");
        assert_eq!(&png.bytes[1..4], b"PNG");
    }
}
