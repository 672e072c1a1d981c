//! 색상 휴리스틱.
//!
//! 한 번의 픽셀 순회로 파란/흰/빨간 픽셀 비율과 평균 밝기를 계산하고,
//! 100x100 축소 이미지에서 대표 색상을 뽑는다.

use fast_image_resize::{images::Image as FirImage, ResizeAlg, ResizeOptions, Resizer};
use std::collections::HashMap;

use mirror_core::error::CoreError;
use mirror_core::models::analysis::{ColorProfile, DominantColor};
use mirror_core::models::frame::Frame;

/// 대표 색상 샘플 크기
const SAMPLE_SIZE: u32 = 100;

/// 픽셀 단위 색상 통계
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColorStats {
    /// b>200, r<100, g<100 픽셀 비율
    pub blue_ratio: f64,
    /// 모든 채널 >240 픽셀 비율
    pub white_ratio: f64,
    /// r>200, g<100, b<100 픽셀 중심 좌표
    pub red_centroid: Option<(i32, i32)>,
    /// 평균 밝기 (0.0 ~ 1.0, ITU-R 601 luma)
    pub brightness: f64,
}

#[inline]
fn is_blue(r: u8, g: u8, b: u8) -> bool {
    b > 200 && r < 100 && g < 100
}

#[inline]
fn is_white(r: u8, g: u8, b: u8) -> bool {
    r > 240 && g > 240 && b > 240
}

#[inline]
fn is_red(r: u8, g: u8, b: u8) -> bool {
    r > 200 && g < 100 && b < 100
}

/// 색상 통계 계산
pub fn color_stats(frame: &Frame) -> ColorStats {
    let (w, h) = (frame.width() as usize, frame.height() as usize);
    let total = w * h;
    if total == 0 {
        return ColorStats::default();
    }

    let raw = frame.rgba.as_slice();
    let mut blue = 0u64;
    let mut white = 0u64;
    let mut red = 0u64;
    let mut red_x = 0u64;
    let mut red_y = 0u64;
    let mut luma_sum = 0u64;

    for (i, px) in raw.chunks_exact(4).enumerate() {
        let (r, g, b) = (px[0], px[1], px[2]);
        if is_blue(r, g, b) {
            blue += 1;
        }
        if is_white(r, g, b) {
            white += 1;
        }
        if is_red(r, g, b) {
            red += 1;
            red_x += (i % w) as u64;
            red_y += (i / w) as u64;
        }
        luma_sum += (r as u64 * 299 + g as u64 * 587 + b as u64 * 114) / 1000;
    }

    let red_centroid = (red > 0).then(|| ((red_x / red) as i32, (red_y / red) as i32));

    ColorStats {
        blue_ratio: blue as f64 / total as f64,
        white_ratio: white as f64 / total as f64,
        red_centroid,
        brightness: luma_sum as f64 / total as f64 / 255.0,
    }
}

/// 100x100으로 축소 후 가장 많은 색상 상위 `count`개
pub fn dominant_colors(frame: &Frame, count: usize) -> Result<Vec<DominantColor>, CoreError> {
    if frame.width() == 0 || frame.height() == 0 {
        return Err(CoreError::Internal("소스 이미지 크기 0".to_string()));
    }

    let sample = if frame.width() == SAMPLE_SIZE && frame.height() == SAMPLE_SIZE {
        frame.rgba.as_ref().clone()
    } else {
        let src = FirImage::from_vec_u8(
            frame.width(),
            frame.height(),
            frame.rgba.as_ref().clone(),
            fast_image_resize::PixelType::U8x4,
        )
        .map_err(|e| CoreError::Internal(format!("소스 이미지 생성 실패: {e}")))?;

        let mut dst = FirImage::new(SAMPLE_SIZE, SAMPLE_SIZE, fast_image_resize::PixelType::U8x4);
        let options = ResizeOptions::new().resize_alg(ResizeAlg::Convolution(
            fast_image_resize::FilterType::Bilinear,
        ));
        Resizer::new()
            .resize(&src, &mut dst, &options)
            .map_err(|e| CoreError::Internal(format!("리사이즈 실패: {e}")))?;
        dst.into_vec()
    };

    let mut counts: HashMap<[u8; 3], u32> = HashMap::new();
    for px in sample.chunks_exact(4) {
        *counts.entry([px[0], px[1], px[2]]).or_insert(0) += 1;
    }

    let total = (sample.len() / 4) as f64;
    let mut ranked: Vec<([u8; 3], u32)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    Ok(ranked
        .into_iter()
        .take(count)
        .map(|(rgb, n)| DominantColor::new(rgb, n as f64 / total * 100.0))
        .collect())
}

/// 색상 통계 + 대표 색상
pub fn color_profile(frame: &Frame, dominant_count: usize) -> Result<ColorProfile, CoreError> {
    let stats = color_stats(frame);
    Ok(ColorProfile {
        brightness: stats.brightness,
        dominant_colors: dominant_colors(frame, dominant_count)?,
        blue_ratio: stats.blue_ratio,
        white_ratio: stats.white_ratio,
        red_centroid: stats.red_centroid,
    })
}
