//! 에지 기반 레이아웃 검출.
//!
//! 그레이스케일 Sobel 그래디언트로 에지 맵을 만들고,
//! 8-연결 요소의 외곽 바운딩 박스와 가로 구분선을 추출한다.
//! 박스 모양(크기, 비율)으로 버튼/입력창/그리드 아이템을 분류한다.

use tracing::debug;

use mirror_core::models::element::{ElementBounds, FinderSource, UiElement};
use mirror_core::models::frame::Frame;

/// 에지 판정 그래디언트 임계값 (|gx| + |gy|)
const EDGE_THRESHOLD: i32 = 100;

/// 잡음으로 간주하는 최소 박스 면적
const MIN_REGION_AREA: u32 = 16;

/// 가로선 최소 길이 (화면 너비 대비)
const LINE_MIN_RATIO: f64 = 0.8;

/// 가로선 내 허용 공백 (픽셀)
const LINE_MAX_GAP: usize = 10;

/// 같은 선으로 병합할 행 간격
const LINE_MERGE_DISTANCE: usize = 2;

/// 리스트 화면 판정 최소 가로선 수 (초과)
const LIST_MIN_LINES: usize = 3;

/// 그리드 판정 최소 아이템 수 (초과)
const GRID_MIN_ITEMS: usize = 4;

/// 그리드 아이템 최대 개수
const GRID_MAX_ITEMS: usize = 9;

/// 레이아웃 검출 결과
#[derive(Debug, Clone, Default)]
pub struct LayoutProfile {
    /// 외곽 영역 (위→아래, 왼→오른쪽 순)
    pub regions: Vec<ElementBounds>,
    /// 화면 너비 80% 이상 가로선 수
    pub horizontal_lines: usize,
}

impl LayoutProfile {
    /// 버튼 모양: 비율 2~5, 높이 30~100
    pub fn buttons(&self) -> impl Iterator<Item = &ElementBounds> {
        self.regions.iter().filter(|r| {
            let aspect = r.aspect_ratio();
            aspect > 2.0 && aspect < 5.0 && r.height > 30 && r.height < 100
        })
    }

    /// 입력창 모양: 비율 5 초과, 높이 30~60
    pub fn text_fields(&self) -> impl Iterator<Item = &ElementBounds> {
        self.regions
            .iter()
            .filter(|r| r.aspect_ratio() > 5.0 && r.height > 30 && r.height < 60)
    }

    /// 앱 규칙용 버튼 후보: 너비 50~300, 높이 30~80
    pub fn button_candidates(&self) -> impl Iterator<Item = &ElementBounds> {
        self.regions
            .iter()
            .filter(|r| r.width > 50 && r.width < 300 && r.height > 30 && r.height < 80)
    }

    /// 그리드 아이템 (50~200 정사각형류가 4개 초과일 때 앞 9개)
    pub fn grid_items(&self) -> Vec<ElementBounds> {
        let items: Vec<ElementBounds> = self
            .regions
            .iter()
            .filter(|r| r.width > 50 && r.width < 200 && r.height > 50 && r.height < 200)
            .copied()
            .collect();
        if items.len() > GRID_MIN_ITEMS {
            items.into_iter().take(GRID_MAX_ITEMS).collect()
        } else {
            Vec::new()
        }
    }

    /// 리스트 화면 여부
    pub fn is_list_view(&self) -> bool {
        self.horizontal_lines > LIST_MIN_LINES
    }

    /// 분류된 영역을 UI 요소로 변환
    pub fn to_elements(&self) -> Vec<UiElement> {
        let button = self.buttons().map(|b| (b, "button"));
        let field = self.text_fields().map(|b| (b, "text_field"));
        button
            .chain(field)
            .map(|(bounds, role)| UiElement {
                text: String::new(),
                bounds: *bounds,
                role: Some(role.to_string()),
                confidence: 0.5,
                clickable: true,
                source: FinderSource::Layout,
            })
            .collect()
    }
}

/// 프레임 레이아웃 검출
pub fn detect_layout(frame: &Frame) -> LayoutProfile {
    let (w, h) = (frame.width() as usize, frame.height() as usize);
    if w < 3 || h < 3 {
        return LayoutProfile::default();
    }

    let gray = grayscale(frame.rgba.as_slice());
    let edges = edge_map(&gray, w, h);
    let regions = external_regions(&edges, w, h);
    let horizontal_lines = count_horizontal_lines(&edges, w, h);

    debug!(
        regions = regions.len(),
        horizontal_lines, "레이아웃 검출 완료"
    );

    LayoutProfile {
        regions,
        horizontal_lines,
    }
}

fn grayscale(rgba: &[u8]) -> Vec<u8> {
    rgba.chunks_exact(4)
        .map(|px| ((px[0] as u32 * 299 + px[1] as u32 * 587 + px[2] as u32 * 114) / 1000) as u8)
        .collect()
}

/// Sobel 에지 맵 (테두리 1픽셀은 항상 false)
fn edge_map(gray: &[u8], w: usize, h: usize) -> Vec<bool> {
    let mut edges = vec![false; w * h];
    let at = |x: usize, y: usize| gray[y * w + x] as i32;

    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let gx = (at(x + 1, y - 1) + 2 * at(x + 1, y) + at(x + 1, y + 1))
                - (at(x - 1, y - 1) + 2 * at(x - 1, y) + at(x - 1, y + 1));
            let gy = (at(x - 1, y + 1) + 2 * at(x, y + 1) + at(x + 1, y + 1))
                - (at(x - 1, y - 1) + 2 * at(x, y - 1) + at(x + 1, y - 1));
            edges[y * w + x] = gx.abs() + gy.abs() > EDGE_THRESHOLD;
        }
    }
    edges
}

/// 8-연결 요소 바운딩 박스 중 다른 박스에 포함되지 않는 것만 반환
fn external_regions(edges: &[bool], w: usize, h: usize) -> Vec<ElementBounds> {
    let mut visited = vec![false; w * h];
    let mut boxes = Vec::new();
    let mut stack = Vec::new();

    for start in 0..w * h {
        if !edges[start] || visited[start] {
            continue;
        }
        visited[start] = true;
        stack.push(start);

        let (mut min_x, mut min_y) = (w, h);
        let (mut max_x, mut max_y) = (0usize, 0usize);

        while let Some(idx) = stack.pop() {
            let (x, y) = (idx % w, idx / w);
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);

            for ny in y.saturating_sub(1)..=(y + 1).min(h - 1) {
                for nx in x.saturating_sub(1)..=(x + 1).min(w - 1) {
                    let n = ny * w + nx;
                    if edges[n] && !visited[n] {
                        visited[n] = true;
                        stack.push(n);
                    }
                }
            }
        }

        let bounds = ElementBounds::new(
            min_x as i32,
            min_y as i32,
            (max_x - min_x + 1) as u32,
            (max_y - min_y + 1) as u32,
        );
        if bounds.width * bounds.height >= MIN_REGION_AREA {
            boxes.push(bounds);
        }
    }

    let contains = |outer: &ElementBounds, inner: &ElementBounds| {
        outer != inner
            && inner.x >= outer.x
            && inner.y >= outer.y
            && inner.x + inner.width as i32 <= outer.x + outer.width as i32
            && inner.y + inner.height as i32 <= outer.y + outer.height as i32
    };

    let mut external: Vec<ElementBounds> = boxes
        .iter()
        .filter(|inner| !boxes.iter().any(|outer| contains(outer, inner)))
        .copied()
        .collect();
    external.sort_by_key(|b| (b.y, b.x));
    external
}

/// 너비 80% 이상 가로선 수 (인접 행은 하나로 병합)
fn count_horizontal_lines(edges: &[bool], w: usize, h: usize) -> usize {
    let min_len = (w as f64 * LINE_MIN_RATIO).ceil() as usize;
    let mut lines = 0;
    let mut last_line_row: Option<usize> = None;

    for y in 0..h {
        let row = &edges[y * w..(y + 1) * w];
        if longest_run(row) < min_len {
            continue;
        }
        match last_line_row {
            Some(prev) if y - prev <= LINE_MERGE_DISTANCE => {}
            _ => lines += 1,
        }
        last_line_row = Some(y);
    }
    lines
}

/// 공백 `LINE_MAX_GAP` 이하를 허용한 최장 에지 구간 길이
fn longest_run(row: &[bool]) -> usize {
    let mut best = 0;
    let mut run_start: Option<usize> = None;
    let mut last_edge = 0usize;

    for (x, &is_edge) in row.iter().enumerate() {
        if !is_edge {
            continue;
        }
        match run_start {
            Some(start) if x - last_edge <= LINE_MAX_GAP + 1 => {
                best = best.max(x - start + 1);
            }
            _ => {
                run_start = Some(x);
                best = best.max(1);
            }
        }
        last_edge = x;
    }
    best
}
