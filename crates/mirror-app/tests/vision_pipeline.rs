//! 비전 파이프라인 통합 테스트.
//!
//! 제출 디코딩 → 휴리스틱/OCR 분석기 → 타일 비교 cross-crate 연동.

mod harness;

use std::io::Cursor;
use std::sync::Arc;

use base64::Engine as _;
use image::{ImageFormat, Rgba, RgbaImage};

use mirror_core::config::VisionConfig;
use mirror_core::models::analysis::AnalysisRequest;
use mirror_core::models::command::CommandKind;
use mirror_core::models::frame::FrameSubmission;
use mirror_core::ports::screen_analyzer::ScreenAnalyzer;
use mirror_core::ports::vision::FrameComparator;
use mirror_vision::analyzer::{HeuristicAnalyzer, OcrAnalyzer};
use mirror_vision::decode::decode_submission;
use mirror_vision::delta::TileFrameComparator;

use harness::{ocr_line, png_base64, solid_frame, FixedOcr};

/// 어두운 배경 + 빨간 사각형 (40,100)~(59,119)
fn red_button_png() -> String {
    let mut image = RgbaImage::from_pixel(100, 200, Rgba([25, 25, 25, 255]));
    for y in 100..120 {
        for x in 40..60 {
            image.put_pixel(x, y, Rgba([230, 20, 20, 255]));
        }
    }
    let mut bytes = Cursor::new(Vec::new());
    image.write_to(&mut bytes, ImageFormat::Png).unwrap();
    base64::engine::general_purpose::STANDARD.encode(bytes.into_inner())
}

fn tap_at(kind: &CommandKind) -> Option<(i32, i32)> {
    match kind {
        CommandKind::Tap { x, y } => Some((*x, *y)),
        _ => None,
    }
}

/// 제출 → 프레임 → 빨간 버튼 탭
#[tokio::test]
async fn submission_to_red_button_tap() {
    let submission = FrameSubmission {
        image: format!("data:image/png;base64,{}", red_button_png()),
        device_id: Some("pixel".to_string()),
        ..Default::default()
    };
    let frame = decode_submission(&submission, "pixel", 9).unwrap();
    assert_eq!((frame.width(), frame.height()), (100, 200));
    assert_eq!(frame.metadata.frame_number, 9);
    assert!(!frame.metadata.frame_number_reported);

    let analyzer = HeuristicAnalyzer::new(VisionConfig::default());
    let analysis = analyzer
        .analyze(&frame, &AnalysisRequest::default())
        .await
        .unwrap();

    assert_eq!(analysis.analyzer, "heuristic");
    assert_eq!(analysis.commands[0].reason, "Red action button detected");
    assert_eq!(tap_at(&analysis.commands[0].kind), Some((49, 109)));
    assert!(analysis.confidence > 0.0);
    let colors = analysis.colors.unwrap();
    assert_eq!(colors.red_centroid, Some((49, 109)));
}

/// OCR 제공자 텍스트 → 로그인 화면 규칙
#[tokio::test]
async fn ocr_provider_text_drives_rules() {
    let ocr = Arc::new(FixedOcr(vec![ocr_line("Sign in", 20, 90, 60, 20)]));
    let analyzer = OcrAnalyzer::new(VisionConfig::default(), ocr);
    let frame = solid_frame("pixel", 100, 200, [25, 25, 25, 255]);

    let analysis = analyzer
        .analyze(&frame, &AnalysisRequest::default())
        .await
        .unwrap();

    assert_eq!(analysis.analyzer, "ocr");
    assert_eq!(analysis.screen_type.as_deref(), Some("login"));
    assert_eq!(analysis.text, vec!["Sign in".to_string()]);
    assert_eq!(analysis.elements[0].text, "Sign in");
    assert_eq!(analysis.commands[0].reason, "Login screen detected");
    assert_eq!(tap_at(&analysis.commands[0].kind), Some((50, 100)));
    assert!((analysis.confidence - 0.7).abs() < 1e-9);
}

/// 휴대폰이 보낸 OCR 텍스트가 있으면 제공자보다 우선
#[tokio::test]
async fn phone_text_overrides_provider() {
    let ocr = Arc::new(FixedOcr(vec![ocr_line("Sign in", 20, 90, 60, 20)]));
    let analyzer = OcrAnalyzer::new(VisionConfig::default(), ocr);
    let frame = solid_frame("pixel", 100, 200, [25, 25, 25, 255]);
    let request = AnalysisRequest {
        ocr_text: Some("Allow notifications\n\nContinue".to_string()),
        ..Default::default()
    };

    let analysis = analyzer.analyze(&frame, &request).await.unwrap();

    assert_eq!(analysis.text.len(), 2);
    assert!(analysis.elements.iter().all(|e| e.text != "Sign in"));
    let taps: Vec<_> = analysis
        .commands
        .iter()
        .filter_map(|c| tap_at(&c.kind))
        .collect();
    assert_eq!(taps[..2], [(50, 140), (80, 180)]);
}

/// 손상된 제출은 분석 전에 거부
#[test]
fn undecodable_submission_is_rejected() {
    let empty = FrameSubmission::default();
    assert!(decode_submission(&empty, "pixel", 1).is_err());

    let garbage = FrameSubmission {
        image: "bm90IGFuIGltYWdl".to_string(),
        ..Default::default()
    };
    assert!(decode_submission(&garbage, "pixel", 1).is_err());

    let tiny = FrameSubmission {
        image: png_base64(2, 2, [0, 0, 0, 255]),
        frame_number: Some(4),
        ..Default::default()
    };
    let frame = decode_submission(&tiny, "pixel", 1).unwrap();
    assert_eq!(frame.metadata.frame_number, 4);
    assert!(frame.metadata.frame_number_reported);
}

/// 한 타일만 바뀌면 변화율 = 1/16
#[test]
fn tile_comparator_measures_partial_change() {
    let before = solid_frame("pixel", 64, 64, [30, 30, 30, 255]);
    let mut rgba = before.rgba.as_ref().clone();
    for y in 0..16usize {
        for x in 0..16usize {
            let idx = (y * 64 + x) * 4;
            rgba[idx..idx + 3].copy_from_slice(&[220, 220, 220]);
        }
    }
    let after = mirror_core::models::frame::Frame::new(before.metadata.clone(), rgba).unwrap();

    let comparator = TileFrameComparator;
    assert_eq!(comparator.diff_ratio(&before, &before), 0.0);
    assert!((comparator.diff_ratio(&before, &after) - 1.0 / 16.0).abs() < 1e-9);
}
