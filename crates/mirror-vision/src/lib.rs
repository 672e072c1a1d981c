//! # mirror-vision
//!
//! 화면 프레임 분석 크레이트.
//! base64 프레임 디코딩, 색상/레이아웃 휴리스틱, 타일 델타 비교, OCR,
//! 비전-언어 모델 응답 해석 등 서버 측 화면 이해 파이프라인을 담당한다.
//!
//! ## 구조
//!
//! - [`decode`]: base64 → `Frame`, 모델 전송용 JPEG/PNG 인코딩
//! - [`color`]: 파란/흰/빨간 픽셀 비율, 밝기, 대표 색상
//! - [`layout`]: 에지 맵 + 연결 요소 → 버튼/입력창/그리드/리스트 검출
//! - [`delta`]: 16x16 타일 변화율 (`TileFrameComparator`)
//! - [`rules`]: 화면 휴리스틱 → 명령 규칙
//! - [`response`]: 비전 모델 응답 JSON 해석 및 명령 생성
//! - [`analyzer`]: `ScreenAnalyzer` 구현체
//! - [`locator`]: OCR 기반 `ElementLocator`

pub mod analyzer;
pub mod color;
pub mod decode;
pub mod delta;
pub mod layout;
pub mod local_ocr_provider;
pub mod locator;
#[cfg(feature = "ocr")]
pub mod ocr;
pub mod response;
pub mod rules;
