//! # mirror-storage
//!
//! 사용자별 벡터 메모리 어댑터.
//! SQLite에 화면 기록, 학습된 요소 위치, 교육 예제를 저장하고
//! 해싱 임베딩 + 코사인 유사도로 관련 기록을 찾는다.
//!
//! ## 모듈
//! - `sqlite`: `MemoryStore` 포트 구현
//! - `embedding`: 특징 해싱 임베딩 (`Embedder` 포트 구현)
//! - `vector`: 벡터 BLOB 직렬화, 코사인 유사도
//! - `migration`: 스키마 마이그레이션

pub mod embedding;
pub mod migration;
pub mod sqlite;
pub mod vector;
