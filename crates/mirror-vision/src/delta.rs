//! 타일 델타 비교.
//!
//! 16x16 타일 단위로 두 프레임의 변경 영역과 변화율을 계산한다.
//! 자동화 실행 후 화면이 실제로 바뀌었는지 검증하는 데 쓰인다.

use tracing::debug;

use mirror_core::models::element::ElementBounds;
use mirror_core::models::frame::Frame;
use mirror_core::ports::vision::FrameComparator;

/// 델타 영역 정보
#[derive(Debug, Clone)]
pub struct DeltaRegion {
    /// 변경 영역 바운딩 박스
    pub region: ElementBounds,
    /// 전체 대비 변경 비율 (0.0 ~ 1.0)
    pub changed_ratio: f64,
    /// 변경된 타일 수
    pub changed_tiles: u32,
    /// 전체 타일 수
    pub total_tiles: u32,
}

/// 타일 크기
const TILE_SIZE: u32 = 16;

/// 변경 감지 임계값 (타일 평균 RGB 차이 합)
const CHANGE_THRESHOLD: u64 = 30;

/// 두 프레임 간 델타 계산 (변경 없으면 None)
pub fn compute_delta(prev: &Frame, curr: &Frame) -> Option<DeltaRegion> {
    let (pw, ph) = (prev.width(), prev.height());
    let (cw, ch) = (curr.width(), curr.height());

    // 해상도 불일치 시 전체 변경으로 판단
    if pw != cw || ph != ch {
        let total = cw.div_ceil(TILE_SIZE).max(1) * ch.div_ceil(TILE_SIZE).max(1);
        return Some(DeltaRegion {
            region: ElementBounds::new(0, 0, cw, ch),
            changed_ratio: 1.0,
            changed_tiles: total,
            total_tiles: total,
        });
    }

    let prev_raw = prev.rgba.as_slice();
    let curr_raw = curr.rgba.as_slice();
    let stride = pw as usize * 4;

    let tiles_x = pw.div_ceil(TILE_SIZE);
    let tiles_y = ph.div_ceil(TILE_SIZE);
    let total_tiles = tiles_x * tiles_y;
    if total_tiles == 0 {
        return None;
    }

    let mut changed_tiles = 0u32;
    let (mut min_x, mut min_y) = (pw, ph);
    let (mut max_x, mut max_y) = (0u32, 0u32);

    for ty in 0..tiles_y {
        for tx in 0..tiles_x {
            let start_x = tx * TILE_SIZE;
            let start_y = ty * TILE_SIZE;
            let end_x = (start_x + TILE_SIZE).min(pw);
            let end_y = (start_y + TILE_SIZE).min(ph);

            if is_tile_changed(prev_raw, curr_raw, stride, (start_x, start_y), (end_x, end_y)) {
                changed_tiles += 1;
                min_x = min_x.min(start_x);
                min_y = min_y.min(start_y);
                max_x = max_x.max(end_x);
                max_y = max_y.max(end_y);
            }
        }
    }

    if changed_tiles == 0 {
        return None;
    }

    let changed_ratio = changed_tiles as f64 / total_tiles as f64;
    debug!(
        "델타 감지: {changed_tiles}/{total_tiles} 타일 변경 ({:.1}%)",
        changed_ratio * 100.0
    );

    Some(DeltaRegion {
        region: ElementBounds::new(min_x as i32, min_y as i32, max_x - min_x, max_y - min_y),
        changed_ratio,
        changed_tiles,
        total_tiles,
    })
}

/// 타일 평균 RGB 차이가 임계값을 넘는지 판단 (바이트 슬라이스 직접 접근)
#[inline]
fn is_tile_changed(
    prev: &[u8],
    curr: &[u8],
    stride: usize,
    (start_x, start_y): (u32, u32),
    (end_x, end_y): (u32, u32),
) -> bool {
    let mut diff_sum = 0u64;
    let mut pixel_count = 0u64;

    for y in start_y as usize..end_y as usize {
        let row_offset = y * stride;
        for x in start_x as usize..end_x as usize {
            let offset = row_offset + x * 4;
            let dr = (prev[offset] as i32 - curr[offset] as i32).unsigned_abs();
            let dg = (prev[offset + 1] as i32 - curr[offset + 1] as i32).unsigned_abs();
            let db = (prev[offset + 2] as i32 - curr[offset + 2] as i32).unsigned_abs();
            diff_sum += (dr + dg + db) as u64;
            pixel_count += 1;
        }
    }

    pixel_count > 0 && diff_sum / pixel_count > CHANGE_THRESHOLD
}

/// 타일 델타 기반 프레임 비교기
#[derive(Debug, Default, Clone, Copy)]
pub struct TileFrameComparator;

impl FrameComparator for TileFrameComparator {
    fn diff_ratio(&self, before: &Frame, after: &Frame) -> f64 {
        compute_delta(before, after)
            .map(|d| d.changed_ratio)
            .unwrap_or(0.0)
    }
}
