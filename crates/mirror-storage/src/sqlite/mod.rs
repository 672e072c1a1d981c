//! SQLite 메모리 저장소.
//!
//! `MemoryStore` 포트 구현. 모든 쿼리는 `user_id` 조건을 포함한다.
//!
//! # 모듈 구조
//! - `screens`: 화면 기록 저장 + 유사도 검색
//! - `elements`: 요소 위치 upsert + 조회
//! - `teaching`: 교육 예제 기록

mod elements;
mod screens;
mod teaching;

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use tracing::info;

use mirror_core::error::CoreError;
use mirror_core::models::memory::{ElementMemory, MemoryHit, ScreenRecord, TeachingExample};
use mirror_core::ports::memory::{Embedder, MemoryStore};

use crate::migration;

/// 요소 유사도 검색 기본 하한
pub const DEFAULT_MIN_SIMILARITY: f32 = 0.35;

/// SQLite 메모리 저장소: `MemoryStore` 포트 구현
pub struct SqliteMemoryStore {
    pub(super) conn: Mutex<Connection>,
    pub(super) embedder: Arc<dyn Embedder>,
    /// 요소 설명 유사도 하한
    pub(super) min_similarity: f32,
}

impl SqliteMemoryStore {
    /// 파일 기반 저장소 생성
    pub fn open(path: &Path, embedder: Arc<dyn Embedder>) -> Result<Self, CoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)
            .map_err(|e| CoreError::Internal(format!("SQLite 열기 실패: {e}")))?;

        conn.execute_batch(
            "
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;
            PRAGMA cache_size=8000;
            PRAGMA temp_store=MEMORY;
            PRAGMA foreign_keys=ON;
            ",
        )
        .map_err(|e| CoreError::Internal(format!("PRAGMA 설정 실패: {e}")))?;

        migration::run_migrations(&conn)
            .map_err(|e| CoreError::Internal(format!("마이그레이션 실패: {e}")))?;

        info!("메모리 저장소 초기화: {}", path.display());

        Ok(Self {
            conn: Mutex::new(conn),
            embedder,
            min_similarity: DEFAULT_MIN_SIMILARITY,
        })
    }

    /// 인메모리 저장소 생성 (테스트, `--in-memory` 실행용)
    pub fn open_in_memory(embedder: Arc<dyn Embedder>) -> Result<Self, CoreError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| CoreError::Internal(format!("인메모리 SQLite 생성 실패: {e}")))?;

        migration::run_migrations(&conn)
            .map_err(|e| CoreError::Internal(format!("마이그레이션 실패: {e}")))?;

        Ok(Self {
            conn: Mutex::new(conn),
            embedder,
            min_similarity: DEFAULT_MIN_SIMILARITY,
        })
    }

    /// 요소 유사도 하한 설정
    pub fn with_min_similarity(mut self, min_similarity: f32) -> Self {
        self.min_similarity = min_similarity.clamp(0.0, 1.0);
        self
    }

    pub(super) fn lock(&self) -> Result<MutexGuard<'_, Connection>, CoreError> {
        self.conn
            .lock()
            .map_err(|e| CoreError::Internal(format!("잠금 획득 실패: {e}")))
    }
}

/// RFC3339 문자열 → UTC 시각 (파싱 실패 시 현재 시각)
pub(super) fn parse_timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[async_trait]
impl MemoryStore for SqliteMemoryStore {
    async fn store_screen(
        &self,
        user_id: &str,
        record: &ScreenRecord,
    ) -> Result<String, CoreError> {
        self.insert_screen(user_id, record)
    }

    async fn remember(
        &self,
        user_id: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<MemoryHit>, CoreError> {
        self.search_screens(user_id, query, limit)
    }

    async fn store_ui_element(
        &self,
        user_id: &str,
        app: &str,
        element_key: &str,
        element: &ElementMemory,
    ) -> Result<(), CoreError> {
        self.upsert_element(user_id, app, element_key, element)
    }

    async fn get_element_location(
        &self,
        user_id: &str,
        app: &str,
        description: &str,
    ) -> Result<Option<ElementMemory>, CoreError> {
        self.find_element(user_id, app, description)
    }

    async fn record_teaching_example(
        &self,
        user_id: &str,
        example: &TeachingExample,
    ) -> Result<(), CoreError> {
        self.insert_teaching_example(user_id, example)
    }

    async fn teaching_examples(
        &self,
        user_id: &str,
        app: &str,
    ) -> Result<Vec<TeachingExample>, CoreError> {
        self.list_teaching_examples(user_id, app)
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashingEmbedder;
    use mirror_core::models::element::Point;
    use tempfile::TempDir;

    #[tokio::test]
    async fn file_store_persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("memory.db");
        let embedder: Arc<dyn Embedder> = Arc::new(HashingEmbedder::default());

        {
            let store = SqliteMemoryStore::open(&path, embedder.clone()).unwrap();
            store
                .store_ui_element(
                    "alice",
                    "Uber",
                    "Confirm button",
                    &ElementMemory::learned(Point::new(10, 20), None),
                )
                .await
                .unwrap();
        }

        let reopened = SqliteMemoryStore::open(&path, embedder).unwrap();
        let found = reopened
            .get_element_location("alice", "Uber", "Confirm button")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.coordinates, Point::new(10, 20));
        assert!(found.learned_from_user);
    }

    #[test]
    fn timestamp_parsing_falls_back() {
        let ts = parse_timestamp("2025-01-02T03:04:05Z");
        assert_eq!(ts.to_rfc3339(), "2025-01-02T03:04:05+00:00");
        let before = Utc::now();
        assert!(parse_timestamp("garbage") >= before);
    }
}
